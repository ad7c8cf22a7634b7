//! Chef search request and response shapes

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Attribute projection for a partial search
///
/// Maps the key each row will carry to the attribute path on the node
/// document, e.g. `"ohai_time" => ["ohai_time"]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Projection(BTreeMap<String, Vec<String>>);

impl Projection {
    /// Create an empty projection
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request an attribute under `key`
    #[must_use]
    pub fn attribute(mut self, key: impl Into<String>, path: &[&str]) -> Self {
        self.0
            .insert(key.into(), path.iter().map(ToString::to_string).collect());
        self
    }

    /// Keys that will appear in each row's `data`
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

/// Body returned by `POST /search/{index}`
///
/// Rows are left undecoded; their shape depends on the projection and is
/// validated by the caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PartialSearchResponse {
    /// Total number of matches on the server
    #[serde(default)]
    pub total: u64,
    /// Offset of the first row
    #[serde(default)]
    pub start: u64,
    /// Matching rows, each `{"url": ..., "data": {...}}`
    #[serde(default)]
    pub rows: Vec<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_projection_serializes_as_map() {
        let projection = Projection::new()
            .attribute("ohai_time", &["ohai_time"])
            .attribute("name", &["name"]);

        let json = serde_json::to_value(&projection).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"name": ["name"], "ohai_time": ["ohai_time"]})
        );
        assert_eq!(projection.keys().collect::<Vec<_>>(), ["name", "ohai_time"]);
    }

    #[test]
    fn test_response_tolerates_missing_fields() {
        let resp: PartialSearchResponse = serde_json::from_str(r#"{"rows": []}"#).unwrap();
        assert_eq!(resp.total, 0);
        assert!(resp.rows.is_empty());
    }

    #[test]
    fn test_response_keeps_rows_raw() {
        let resp: PartialSearchResponse = serde_json::from_str(
            r#"{"total": 2, "start": 0, "rows": [
                {"url": "https://chef/nodes/web1", "data": {"name": "web1", "ohai_time": 1700000000.5}},
                {"unexpected": true}
            ]}"#,
        )
        .unwrap();
        assert_eq!(resp.total, 2);
        assert_eq!(resp.rows.len(), 2);
        assert_eq!(resp.rows[0]["data"]["name"], "web1");
    }
}
