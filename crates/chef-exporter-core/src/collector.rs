//! Metric state and the scrape cycle
//!
//! The [`Exporter`] owns every exported metric. Each call to
//! [`Exporter::collect`] runs one full scrape cycle under an exclusive lock:
//! node gauges are reset, the scraper runs, and the resulting metric families
//! are returned for encoding. Overlapping polls queue behind the lock, so no
//! poll ever sees a half-updated gauge set and no scrape is skipped.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use prometheus::{Encoder, Gauge, GaugeVec, IntCounter, Opts, TextEncoder};
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use crate::error::ExporterError;
use crate::node::NodeMetric;
use crate::scraper::Scraper;

/// Prefix of every exported metric
pub const NAMESPACE: &str = "chef";

/// Label carrying the node name
const NODE_LABEL: &str = "node";

/// Chef exporter metric state
pub struct Exporter {
    scraper: Arc<dyn Scraper>,
    /// Held for the whole reset, scrape, publish sequence
    scrape_lock: Mutex<()>,
    up: Gauge,
    total_scrapes: IntCounter,
    parse_failures: IntCounter,
    node_metrics: BTreeMap<NodeMetric, GaugeVec>,
}

impl Exporter {
    /// Create an exporter driving `scraper`
    ///
    /// # Errors
    /// Returns an error if a metric descriptor is invalid.
    pub fn new(scraper: Arc<dyn Scraper>) -> Result<Self, ExporterError> {
        let up = Gauge::with_opts(
            Opts::new("up", "Was the last scrape successful.").namespace(NAMESPACE),
        )?;
        let total_scrapes = IntCounter::with_opts(
            Opts::new("exporter_total_scrapes", "Current total scrapes.").namespace(NAMESPACE),
        )?;
        let parse_failures = IntCounter::with_opts(
            Opts::new(
                "exporter_parse_failures",
                "Number of errors while fetching metrics.",
            )
            .namespace(NAMESPACE),
        )?;

        let mut node_metrics = BTreeMap::new();
        for metric in NodeMetric::ALL {
            let opts = Opts::new(metric.to_string(), metric.help()).namespace(NAMESPACE);
            node_metrics.insert(metric, GaugeVec::new(opts, &[NODE_LABEL])?);
        }

        Ok(Self {
            scraper,
            scrape_lock: Mutex::new(()),
            up,
            total_scrapes,
            parse_failures,
            node_metrics,
        })
    }

    /// Descriptors of every metric this exporter can emit
    ///
    /// Does not scrape; valid before the first poll.
    #[must_use]
    pub fn describe(&self) -> Vec<Desc> {
        let mut descs = Vec::new();
        for gauge in self.node_metrics.values() {
            descs.extend(gauge.desc().into_iter().cloned());
        }
        descs.extend(self.up.desc().into_iter().cloned());
        descs.extend(self.total_scrapes.desc().into_iter().cloned());
        descs.extend(self.parse_failures.desc().into_iter().cloned());
        descs
    }

    /// Run one scrape cycle and return every current sample
    ///
    /// Concurrent callers are served one at a time, in arrival order.
    #[instrument(skip(self))]
    pub async fn collect(&self) -> Vec<MetricFamily> {
        let _guard = self.scrape_lock.lock().await;

        self.reset_metrics();
        self.scrape().await;

        let mut families = Vec::new();
        families.extend(self.up.collect());
        families.extend(self.total_scrapes.collect());
        families.extend(self.parse_failures.collect());
        for gauge in self.node_metrics.values() {
            families.extend(gauge.collect());
        }
        // the text format rejects families without samples
        families.retain(|f| !f.get_metric().is_empty());
        families
    }

    fn reset_metrics(&self) {
        for gauge in self.node_metrics.values() {
            gauge.reset();
        }
    }

    async fn scrape(&self) {
        self.total_scrapes.inc();
        let started = Instant::now();

        match self.scraper.scrape().await {
            Ok(report) => {
                for sample in &report.samples {
                    if let Some(gauge) = self.node_metrics.get(&sample.metric) {
                        gauge.with_label_values(&[sample.node.as_str()]).set(sample.value);
                    }
                }
                self.parse_failures.inc_by(report.parse_failures);
                self.up.set(1.0);
                debug!(
                    samples = report.samples.len(),
                    parse_failures = report.parse_failures,
                    elapsed_ms = started.elapsed().as_millis(),
                    "scrape succeeded"
                );
            }
            Err(e) => {
                self.up.set(0.0);
                warn!(
                    error = %e,
                    unauthorized = e.is_unauthorized(),
                    elapsed_ms = started.elapsed().as_millis(),
                    "scrape failed"
                );
            }
        }
    }
}

/// Render metric families in the Prometheus text exposition format
///
/// # Errors
/// Returns an error if encoding fails.
pub fn encode_text(families: &[MetricFamily]) -> Result<String, ExporterError> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

/// Content type of [`encode_text`] output
#[must_use]
pub fn text_content_type() -> String {
    TextEncoder::new().format_type().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScrapeError;
    use crate::node::NodeSample;
    use crate::scraper::ScrapeReport;
    use async_trait::async_trait;

    struct FixedScraper(Vec<(&'static str, f64)>);

    #[async_trait]
    impl Scraper for FixedScraper {
        async fn scrape(&self) -> Result<ScrapeReport, ScrapeError> {
            Ok(ScrapeReport {
                samples: self
                    .0
                    .iter()
                    .map(|(node, value)| NodeSample {
                        metric: NodeMetric::OhaiTime,
                        node: (*node).to_string(),
                        value: *value,
                    })
                    .collect(),
                parse_failures: 0,
            })
        }
    }

    struct FailingScraper;

    #[async_trait]
    impl Scraper for FailingScraper {
        async fn scrape(&self) -> Result<ScrapeReport, ScrapeError> {
            Err(ScrapeError::NotConfigured("server_url"))
        }
    }

    #[test]
    fn test_describe_before_any_scrape() {
        let exporter = Exporter::new(Arc::new(FailingScraper)).unwrap();
        let names: Vec<String> = exporter
            .describe()
            .iter()
            .map(|d| d.fq_name.clone())
            .collect();
        assert_eq!(
            names,
            [
                "chef_node_ohai_time",
                "chef_up",
                "chef_exporter_total_scrapes",
                "chef_exporter_parse_failures",
            ]
        );
        assert_eq!(exporter.describe()[0].variable_labels, ["node"]);
    }

    #[tokio::test]
    async fn test_collect_renders_node_gauge() {
        let exporter = Exporter::new(Arc::new(FixedScraper(vec![("web1", 100.0)]))).unwrap();
        let text = encode_text(&exporter.collect().await).unwrap();

        assert!(text.contains("chef_node_ohai_time{node=\"web1\"} 100\n"));
        assert!(text.contains("chef_up 1\n"));
        assert!(text.contains("chef_exporter_total_scrapes 1\n"));
        assert!(text.contains("chef_exporter_parse_failures 0\n"));
        assert!(text.contains("# TYPE chef_node_ohai_time gauge"));
        assert!(text.contains("# TYPE chef_exporter_total_scrapes counter"));
    }

    #[tokio::test]
    async fn test_failed_scrape_sets_up_to_zero() {
        let exporter = Exporter::new(Arc::new(FailingScraper)).unwrap();
        let text = encode_text(&exporter.collect().await).unwrap();

        assert!(text.contains("chef_up 0\n"));
        assert!(text.contains("chef_exporter_total_scrapes 1\n"));
        assert!(!text.contains("chef_node_ohai_time"));
    }

    #[test]
    fn test_content_type_is_text_format() {
        assert!(text_content_type().starts_with("text/plain"));
    }
}
