//! chef-exporter-core: scrape cycle and metric state
//!
//! Implements the [`Exporter`], which owns the Prometheus metric state and
//! serialises scrapes, and the [`ChefScraper`], which turns one Chef partial
//! search into per-node samples.

pub mod collector;
pub mod config;
pub mod error;
pub mod node;
pub mod scraper;

pub use collector::{Exporter, NAMESPACE, encode_text, text_content_type};
pub use config::ChefSettings;
pub use error::{ExporterError, RowError, ScrapeError};
pub use node::{NodeMetric, NodeRow, NodeSample, UNKNOWN_STALENESS, decode_row, seconds_since};
pub use scraper::{ChefScraper, ScrapeReport, Scraper};

pub use prometheus::Error as PrometheusError;
