//! Error types for chef-exporter-core

use chef_exporter_client::ChefError;
use thiserror::Error;

/// Reasons a scrape cycle produced no samples
#[derive(Error, Debug)]
pub enum ScrapeError {
    /// A required Chef setting is missing
    #[error("chef {0} is not configured")]
    NotConfigured(&'static str),

    /// The Chef server could not be queried
    #[error("chef search failed: {0}")]
    Chef(#[from] ChefError),
}

impl ScrapeError {
    /// Whether the Chef server rejected the exporter's credentials
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ScrapeError::Chef(e) if e.is_unauthorized())
    }
}

/// A search row that did not have the expected shape
#[derive(Error, Debug)]
pub enum RowError {
    /// Row is missing `data`, or `data.name` is absent or not a string
    #[error("malformed search row: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Errors raised while building or rendering metrics
#[derive(Error, Debug)]
pub enum ExporterError {
    /// Metric registration or construction failed
    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Rendered exposition was not valid UTF-8
    #[error("encoding error: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
}
