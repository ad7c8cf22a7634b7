//! chef-exporter daemon
//!
//! Serves a Prometheus endpoint reporting how long ago every Chef node last
//! ran Ohai. Each request to the metrics path runs one partial search.

use std::path::PathBuf;
use std::sync::Arc;

use chef_exporter_core::{ChefScraper, Exporter};
use clap::Parser;
use color_eyre::Result;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod api;
mod config;
mod router;
mod state;

use crate::config::Config;
use crate::state::AppState;

#[derive(Parser)]
#[command(name = "chef-exporter", version)]
#[command(about = "Prometheus exporter for Chef node Ohai run times", long_about = None)]
struct Cli {
    /// Address to listen on for web interface and telemetry
    #[arg(long = "web.listen-address")]
    listen_address: Option<String>,

    /// Path under which to expose metrics
    #[arg(long = "web.telemetry-path")]
    telemetry_path: Option<String>,

    /// Configuration file
    #[arg(long, env = config::CONFIG_ENV)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    /// Build the effective configuration: file, then environment, then flags
    fn into_config(self) -> Result<(Config, Option<PathBuf>)> {
        let path = self.config.or_else(Config::discover);
        let mut config = match &path {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };
        config.apply_env();

        if let Some(addr) = self.listen_address {
            config.web.listen_address = addr;
        }
        if let Some(path) = self.telemetry_path {
            config.web.telemetry_path = path;
        }
        if let Some(level) = self.log_level {
            config.log.level = level;
        }
        Ok((config, path))
    }
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if config.log.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("shutting down");
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let (config, config_path) = Cli::parse().into_config()?;
    init_tracing(&config);
    config.validate()?;

    info!(version = env!("CARGO_PKG_VERSION"), "starting chef-exporter");
    match &config_path {
        Some(path) => info!(path = %path.display(), "loaded configuration"),
        None => warn!("no config file found, using defaults and environment"),
    }
    let missing = config.chef.missing();
    if !missing.is_empty() {
        warn!(?missing, "chef settings incomplete, scrapes will report chef_up 0");
    }

    let scraper = ChefScraper::new(config.chef.clone())?;
    let exporter = Exporter::new(Arc::new(scraper))?;
    let metrics: Vec<String> = exporter.describe().into_iter().map(|d| d.fq_name).collect();
    info!(?metrics, "exporting metrics");

    let addr = config.listen_addr()?;
    let telemetry_path = config.web.telemetry_path.clone();
    let state = Arc::new(AppState::new(exporter, config));
    let app = router::create_router(state);

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, %telemetry_path, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
