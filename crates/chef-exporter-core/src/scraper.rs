//! Chef partial search scraper

use std::time::Instant;

use async_trait::async_trait;
use chef_exporter_client::{ChefClient, ClientKey, PartialSearchResponse, Projection};
use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use crate::config::ChefSettings;
use crate::error::ScrapeError;
use crate::node::{NodeMetric, NodeSample, decode_row};

/// Search index holding node documents
const NODE_INDEX: &str = "node";

/// Match every node
const MATCH_ALL: &str = "*:*";

/// Samples gathered by one scrape
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScrapeReport {
    /// One entry per node and node metric
    pub samples: Vec<NodeSample>,
    /// Rows that were skipped because they could not be decoded
    pub parse_failures: u64,
}

impl ScrapeReport {
    /// Decode search rows into samples relative to `now` (Unix seconds)
    ///
    /// Malformed rows are skipped and counted.
    #[must_use]
    pub fn from_rows(response: &PartialSearchResponse, now: f64) -> Self {
        let mut report = ScrapeReport::default();
        for row in &response.rows {
            match decode_row(row) {
                Ok(node) => report.samples.extend(node.samples(now)),
                Err(e) => {
                    warn!(error = %e, "skipping malformed search row");
                    report.parse_failures += 1;
                }
            }
        }
        report
    }
}

/// Source of per-node samples, run once per scrape cycle
#[async_trait]
pub trait Scraper: Send + Sync {
    /// Fetch the current inventory and convert it to samples
    async fn scrape(&self) -> Result<ScrapeReport, ScrapeError>;
}

/// Scraper backed by a Chef server partial search
pub struct ChefScraper {
    settings: ChefSettings,
    transport: reqwest::Client,
    clock: fn() -> f64,
}

impl ChefScraper {
    /// Create a scraper for `settings`
    ///
    /// # Errors
    /// Returns an error if the HTTP transport cannot be built.
    pub fn new(settings: ChefSettings) -> Result<Self, ScrapeError> {
        let transport = ChefClient::transport(settings.request_timeout())?;
        Ok(Self {
            settings,
            transport,
            clock: unix_now,
        })
    }

    /// Use a fixed clock, returning Unix seconds
    #[must_use]
    pub fn with_clock(mut self, clock: fn() -> f64) -> Self {
        self.clock = clock;
        self
    }

    /// Attributes requested from every node
    #[must_use]
    pub fn projection() -> Projection {
        NodeMetric::ALL
            .iter()
            .fold(Projection::new(), |p, metric| {
                p.attribute(metric.attribute(), &[metric.attribute()])
            })
            .attribute("name", &["name"])
    }

    /// Load the signing key, or `None` if it cannot be read
    ///
    /// The search is still attempted without a key; the server will reject it.
    fn load_key(&self) -> Option<ClientKey> {
        let Some(path) = &self.settings.client_key else {
            warn!("no chef client key configured, sending unsigned requests");
            return None;
        };
        match ClientKey::from_file(path) {
            Ok(key) => Some(key),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "couldn't read chef client key");
                None
            }
        }
    }

    /// Build a client for this scrape, sharing the pooled transport
    fn client(&self) -> Result<ChefClient, ScrapeError> {
        let server_url = self
            .settings
            .server_url
            .as_deref()
            .ok_or(ScrapeError::NotConfigured("server_url"))?;
        let client_name = self
            .settings
            .client_name
            .as_deref()
            .ok_or(ScrapeError::NotConfigured("client_name"))?;

        let key = self.load_key();
        Ok(ChefClient::with_client(
            server_url,
            client_name,
            key,
            self.transport.clone(),
        )?)
    }
}

#[async_trait]
impl Scraper for ChefScraper {
    #[instrument(skip(self))]
    async fn scrape(&self) -> Result<ScrapeReport, ScrapeError> {
        let started = Instant::now();
        let client = self.client()?;

        info!("partial search");
        let response = client
            .partial_search(NODE_INDEX, MATCH_ALL, &Self::projection())
            .await?;

        let report = ScrapeReport::from_rows(&response, (self.clock)());
        debug!(
            rows = response.rows.len(),
            samples = report.samples.len(),
            parse_failures = report.parse_failures,
            elapsed_ms = started.elapsed().as_millis(),
            "scrape finished"
        );
        Ok(report)
    }
}

#[allow(clippy::cast_precision_loss)]
fn unix_now() -> f64 {
    Utc::now().timestamp() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_projection_requests_name_and_ohai_time() {
        let body = serde_json::to_value(ChefScraper::projection()).unwrap();
        assert_eq!(
            body,
            json!({"name": ["name"], "ohai_time": ["ohai_time"]})
        );
    }

    #[test]
    fn test_report_skips_and_counts_malformed_rows() {
        let response = PartialSearchResponse {
            total: 4,
            start: 0,
            rows: vec![
                json!({"data": {"name": "web1", "ohai_time": 1700000000}}),
                json!({"url": "https://chef/nodes/ghost"}),
                json!({"data": {"name": "web2", "ohai_time": "not-a-number"}}),
                json!({"data": {"ohai_time": 1700000000}}),
            ],
        };

        let report = ScrapeReport::from_rows(&response, 1_700_000_100.0);

        assert_eq!(report.parse_failures, 2);
        assert_eq!(report.samples.len(), 2);
        assert_eq!(report.samples[0].node, "web1");
        assert_eq!(report.samples[0].value, 100.0);
        assert_eq!(report.samples[1].node, "web2");
        assert_eq!(report.samples[1].value, 999_999_999.0);
    }

    #[test]
    fn test_report_from_empty_response() {
        let report = ScrapeReport::from_rows(&PartialSearchResponse::default(), 0.0);
        assert!(report.samples.is_empty());
        assert_eq!(report.parse_failures, 0);
    }

    #[tokio::test]
    async fn test_missing_server_url_fails_scrape() {
        let scraper = ChefScraper::new(ChefSettings {
            client_name: Some("exporter".to_string()),
            ..ChefSettings::default()
        })
        .unwrap();

        let err = scraper.scrape().await.unwrap_err();
        assert!(matches!(err, ScrapeError::NotConfigured("server_url")));
    }

    #[tokio::test]
    async fn test_invalid_server_url_fails_scrape() {
        let scraper = ChefScraper::new(ChefSettings {
            client_name: Some("exporter".to_string()),
            server_url: Some("not a url".to_string()),
            ..ChefSettings::default()
        })
        .unwrap();

        let err = scraper.scrape().await.unwrap_err();
        assert!(matches!(err, ScrapeError::Chef(_)));
    }
}
