//! Configuration loading and types

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use chef_exporter_core::ChefSettings;
use serde::{Deserialize, Serialize};

/// Environment variable naming the config file
pub const CONFIG_ENV: &str = "CHEF_EXPORTER_CONFIG";

/// Top-level configuration for chef-exporter
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server settings
    #[serde(default)]
    pub web: WebConfig,
    /// Chef server connection
    #[serde(default)]
    pub chef: ChefSettings,
    /// Logging
    #[serde(default)]
    pub log: LogConfig,
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    /// Address to listen on; `:port` binds every interface
    #[serde(default = "default_listen_address")]
    pub listen_address: String,
    /// Path under which metrics are exposed
    #[serde(default = "default_telemetry_path")]
    pub telemetry_path: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            listen_address: default_listen_address(),
            telemetry_path: default_telemetry_path(),
        }
    }
}

fn default_listen_address() -> String {
    ":9101".to_string()
}

fn default_telemetry_path() -> String {
    "/metrics".to_string()
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from file
    ///
    /// # Errors
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &Path) -> eyre::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| eyre::eyre!("failed to read {}: {e}", path.display()))?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML text
    ///
    /// # Errors
    /// Returns error if the text is not a valid configuration
    pub fn parse(content: &str) -> eyre::Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Find a config file: `CHEF_EXPORTER_CONFIG`, then the usual locations
    pub fn discover() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Some(PathBuf::from(path));
        }

        let paths = [
            Some(PathBuf::from("chef-exporter.toml")),
            Some(PathBuf::from("/etc/chef-exporter/chef-exporter.toml")),
            dirs::config_dir().map(|p| p.join("chef-exporter/chef-exporter.toml")),
        ];

        paths.into_iter().flatten().find(|p| p.exists())
    }

    /// Apply `CHEF_*` environment overrides from the process environment
    pub fn apply_env(&mut self) {
        self.chef.apply_env(|name| std::env::var(name).ok());
    }

    /// Check settings that would prevent the server from starting
    ///
    /// # Errors
    /// Returns error if the listen address or telemetry path is unusable
    pub fn validate(&self) -> eyre::Result<()> {
        let path = &self.web.telemetry_path;
        if !path.starts_with('/') {
            eyre::bail!("telemetry path must start with '/': {path}");
        }
        if path == "/" {
            eyre::bail!("telemetry path cannot be '/', it is used by the landing page");
        }
        if let Some(segment) = path
            .split('/')
            .find(|s| s.starts_with([':', '*']) || s.contains(['{', '}']))
        {
            eyre::bail!("telemetry path segment {segment:?} would be a route parameter");
        }
        if self.chef.request_timeout_secs == 0 {
            eyre::bail!("chef request_timeout_secs must be greater than zero");
        }
        self.listen_addr()?;
        Ok(())
    }

    /// Resolve the listen address
    ///
    /// # Errors
    /// Returns error if the address does not parse
    pub fn listen_addr(&self) -> eyre::Result<SocketAddr> {
        parse_listen_address(&self.web.listen_address)
    }
}

/// Parse `host:port`, treating a bare `:port` as every interface
fn parse_listen_address(addr: &str) -> eyre::Result<SocketAddr> {
    let addr = if addr.starts_with(':') {
        format!("0.0.0.0{addr}")
    } else {
        addr.to_string()
    };
    addr.parse()
        .map_err(|e| eyre::eyre!("invalid listen address {addr}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.web.listen_address, ":9101");
        assert_eq!(config.web.telemetry_path, "/metrics");
        assert_eq!(config.log.level, "info");
        assert_eq!(
            config.listen_addr().unwrap(),
            "0.0.0.0:9101".parse::<SocketAddr>().unwrap()
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full_file() {
        let config = Config::parse(
            r#"
            [web]
            listen_address = "127.0.0.1:9200"
            telemetry_path = "/chef/metrics"

            [chef]
            client_name = "exporter"
            client_key = "/etc/chef/exporter.pem"
            server_url = "https://chef.example.com/organizations/acme"
            request_timeout_secs = 10

            [log]
            level = "debug"
            json = true
            "#,
        )
        .unwrap();

        assert_eq!(config.listen_addr().unwrap().port(), 9200);
        assert_eq!(config.web.telemetry_path, "/chef/metrics");
        assert_eq!(config.chef.client_name.as_deref(), Some("exporter"));
        assert_eq!(config.chef.request_timeout_secs, 10);
        assert!(config.chef.missing().is_empty());
        assert!(config.log.json);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = Config::parse("[chef]\nclient_name = \"exporter\"\n").unwrap();
        assert_eq!(config.web.listen_address, ":9101");
        assert_eq!(config.chef.request_timeout_secs, 30);
        assert_eq!(config.chef.missing(), ["client_key", "server_url"]);
    }

    #[test]
    fn test_invalid_toml_rejected() {
        assert!(Config::parse("[web\nlisten_address = ").is_err());
    }

    #[test]
    fn test_validate_rejects_bad_paths() {
        let mut config = Config::default();
        config.web.telemetry_path = "metrics".to_string();
        assert!(config.validate().is_err());

        config.web.telemetry_path = "/".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_route_parameters() {
        let mut config = Config::default();
        for path in ["/:metrics", "/chef/*rest", "/{metrics}", "/chef/{id}/metrics"] {
            config.web.telemetry_path = path.to_string();
            assert!(config.validate().is_err(), "{path} accepted");
        }

        config.web.telemetry_path = "/chef/metrics:v1".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let mut config = Config::parse("[chef]\nrequest_timeout_secs = 0\n").unwrap();
        assert!(config.validate().is_err());

        config.chef.request_timeout_secs = 1;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_address() {
        let mut config = Config::default();
        config.web.listen_address = "not-an-address".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_missing_file() {
        assert!(Config::load(Path::new("/nonexistent/chef-exporter.toml")).is_err());
    }
}
