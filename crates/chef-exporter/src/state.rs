//! Application state shared across HTTP handlers

use std::sync::Arc;

use chef_exporter_core::Exporter;

use crate::config::Config;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Metric state and scrape lock
    pub exporter: Arc<Exporter>,
    /// Application configuration
    pub config: Arc<Config>,
}

impl AppState {
    /// Create new application state
    pub fn new(exporter: Exporter, config: Config) -> Self {
        Self {
            exporter: Arc::new(exporter),
            config: Arc::new(config),
        }
    }
}
