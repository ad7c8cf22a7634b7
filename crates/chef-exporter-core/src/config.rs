//! Chef connection settings

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Environment variable naming the Chef API client
pub const ENV_CLIENT_NAME: &str = "CHEF_CLIENT_NAME";
/// Environment variable pointing at the client's private key file
pub const ENV_CLIENT_KEY: &str = "CHEF_CLIENT_KEY";
/// Environment variable holding the Chef server base URL
pub const ENV_SERVER_URL: &str = "CHEF_SERVER_URL";

/// How to reach and authenticate against the Chef server
///
/// Built once at startup and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChefSettings {
    /// API client name (`X-Ops-UserId`)
    #[serde(default)]
    pub client_name: Option<String>,
    /// Path to the client's PEM private key
    #[serde(default)]
    pub client_key: Option<PathBuf>,
    /// Base URL, including `/organizations/<org>` when applicable
    #[serde(default)]
    pub server_url: Option<String>,
    /// Deadline for the search request, in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ChefSettings {
    fn default() -> Self {
        Self {
            client_name: None,
            client_key: None,
            server_url: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl ChefSettings {
    /// Request deadline
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Override settings from `CHEF_CLIENT_NAME`, `CHEF_CLIENT_KEY` and
    /// `CHEF_SERVER_URL` as returned by `lookup`; empty values are ignored
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |name: &str| lookup(name).filter(|v| !v.is_empty());
        if let Some(name) = get(ENV_CLIENT_NAME) {
            self.client_name = Some(name);
        }
        if let Some(key) = get(ENV_CLIENT_KEY) {
            self.client_key = Some(PathBuf::from(key));
        }
        if let Some(url) = get(ENV_SERVER_URL) {
            self.server_url = Some(url);
        }
    }

    /// Names of settings that are not set
    #[must_use]
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.client_name.is_none() {
            missing.push("client_name");
        }
        if self.client_key.is_none() {
            missing.push("client_key");
        }
        if self.server_url.is_none() {
            missing.push("server_url");
        }
        missing
    }
}
