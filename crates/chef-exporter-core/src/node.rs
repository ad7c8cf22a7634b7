//! Per-node metrics and search row decoding

use std::fmt;

use serde::Deserialize;
use serde_json::Value;

use crate::error::RowError;

/// Value reported when a node's last Ohai run is unknown
///
/// Large enough to trip any staleness alert, never mistaken for a fresh node.
pub const UNKNOWN_STALENESS: f64 = 999_999_999.0;

/// Metrics exported once per node, labelled by node name
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NodeMetric {
    /// Seconds since the node's last Ohai run
    OhaiTime,
}

impl NodeMetric {
    /// Every tracked node metric
    pub const ALL: [NodeMetric; 1] = [NodeMetric::OhaiTime];

    /// Metric name below the `chef_node_` prefix
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            NodeMetric::OhaiTime => "ohai_time",
        }
    }

    /// Help text
    #[must_use]
    pub fn help(self) -> &'static str {
        match self {
            NodeMetric::OhaiTime => "The time at which Ohai was last run",
        }
    }

    /// Node attribute requested from the search projection
    #[must_use]
    pub fn attribute(self) -> &'static str {
        match self {
            NodeMetric::OhaiTime => "ohai_time",
        }
    }
}

impl fmt::Display for NodeMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node_{}", self.name())
    }
}

/// One gauge value for one node
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSample {
    /// Which node metric this sets
    pub metric: NodeMetric,
    /// Node name, used as the `node` label
    pub node: String,
    /// Gauge value
    pub value: f64,
}

/// Decoded `data` object of a partial search row
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NodeRow {
    /// Node name
    pub name: String,
    /// Raw `ohai_time` attribute; may be absent, null, or of any type
    #[serde(default)]
    ohai_time: Option<Value>,
}

impl NodeRow {
    /// Create a row directly
    #[must_use]
    pub fn new(name: impl Into<String>, ohai_time: Option<Value>) -> Self {
        Self {
            name: name.into(),
            ohai_time,
        }
    }

    /// Unix timestamp of the last Ohai run, if the attribute is numeric
    #[must_use]
    pub fn ohai_time(&self) -> Option<f64> {
        self.ohai_time.as_ref().and_then(Value::as_f64)
    }

    /// Build the node's samples relative to `now` (Unix seconds)
    #[must_use]
    pub fn samples(&self, now: f64) -> Vec<NodeSample> {
        NodeMetric::ALL
            .iter()
            .map(|&metric| {
                let value = match metric {
                    NodeMetric::OhaiTime => seconds_since(self.ohai_time(), now),
                };
                NodeSample {
                    metric,
                    node: self.name.clone(),
                    value,
                }
            })
            .collect()
    }
}

#[derive(Deserialize)]
struct SearchRow {
    data: NodeRow,
}

/// Decode one `{"data": {...}}` search row
///
/// # Errors
/// Returns `RowError::Malformed` if `data` or a string `name` is missing.
pub fn decode_row(row: &Value) -> Result<NodeRow, RowError> {
    let row = SearchRow::deserialize(row)?;
    Ok(row.data)
}

/// Seconds elapsed between `ohai_time` and `now`, or [`UNKNOWN_STALENESS`]
#[must_use]
pub fn seconds_since(ohai_time: Option<f64>, now: f64) -> f64 {
    match ohai_time {
        Some(t) => now - t,
        None => UNKNOWN_STALENESS,
    }
}
