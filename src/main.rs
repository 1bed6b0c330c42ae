//! ccloud-exporter Binary Entry Point
//!
//! Loads the configuration, fetches the Metrics API descriptors and serves
//! the Prometheus endpoint until interrupted.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use ccloud_exporter::{
    Credentials, Exporter, FatalSignal, Granularity, MetricsApiClient,
    config::{AppConfig, ConfigError, parse_duration},
    server::{AppState, create_router},
};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Prometheus exporter for the Confluent Cloud Metrics API
#[derive(Parser, Debug)]
#[command(name = "ccloud-exporter", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        default_value = "configs/config.yaml",
        env = "CCLOUD_EXPORTER_CONFIG"
    )]
    config: PathBuf,

    /// Listener address (overrides config file)
    #[arg(long, env = "CCLOUD_EXPORTER_LISTENER")]
    listener: Option<String>,

    /// Metrics API base URL (overrides config file)
    #[arg(long, env = "CCLOUD_EXPORTER_ENDPOINT")]
    endpoint: Option<String>,

    /// HTTP request timeout, e.g. `60s` (overrides config file)
    #[arg(long, env = "CCLOUD_EXPORTER_TIMEOUT", value_parser = parse_duration)]
    timeout: Option<Duration>,

    /// Query window delay, e.g. `2m` (overrides config file)
    #[arg(long, env = "CCLOUD_EXPORTER_DELAY", value_parser = parse_duration)]
    delay: Option<Duration>,

    /// Query granularity: PT1M, PT5M, PT15M, PT30M or PT1H (overrides config file)
    #[arg(long, env = "CCLOUD_EXPORTER_GRANULARITY")]
    granularity: Option<Granularity>,

    /// Result cache TTL, `0s` disables (overrides config file)
    #[arg(long, env = "CCLOUD_EXPORTER_CACHE_TTL", value_parser = parse_duration)]
    cache_ttl: Option<Duration>,

    /// Do not propagate data point timestamps
    #[arg(long, env = "CCLOUD_EXPORTER_NO_TIMESTAMP")]
    no_timestamp: bool,

    /// Cluster to collect when the config file has no rule (repeatable)
    #[arg(long = "cluster", env = "CCLOUD_EXPORTER_CLUSTERS", value_delimiter = ',')]
    clusters: Vec<String>,

    /// Cloud API key
    #[arg(long, env = "CCLOUD_API_KEY", hide_env_values = true)]
    api_key: String,

    /// Cloud API secret
    #[arg(long, env = "CCLOUD_API_SECRET", hide_env_values = true)]
    api_secret: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,ccloud_exporter=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("ccloud-exporter {}", env!("CARGO_PKG_VERSION"));

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration from file; optional when clusters are given
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let mut config = match AppConfig::read(&cli.config) {
        Ok(config) => config,
        Err(ConfigError::IoError(e)) if !cli.clusters.is_empty() => {
            tracing::info!(error = %e, "No configuration file, using a default rule");
            AppConfig::default()
        }
        Err(e) => return Err(e.into()),
    };

    // Apply CLI/env overrides (CLI > ENV > config file)
    if let Some(listener) = cli.listener {
        config.config.listener = listener;
    }
    if let Some(endpoint) = cli.endpoint {
        config.config.http.base_url = endpoint;
    }
    if let Some(timeout) = cli.timeout {
        config.config.http.timeout = timeout;
    }
    if let Some(delay) = cli.delay {
        config.config.delay = delay;
    }
    if let Some(granularity) = cli.granularity {
        config.config.granularity = granularity;
    }
    if let Some(cache_ttl) = cli.cache_ttl {
        config.config.cache_ttl = cache_ttl;
    }
    if cli.no_timestamp {
        config.config.no_timestamp = true;
    }
    config.ensure_default_rule(&cli.clusters);
    config.validate()?;

    let rules = config.to_rules()?;
    tracing::info!(
        endpoint = %config.config.http.base_url,
        rules = rules.len(),
        delay = ?config.config.delay,
        granularity = %config.config.granularity,
        cache_ttl = ?config.config.cache_ttl,
        "Configuration loaded"
    );

    // Build Metrics API client and fetch descriptors
    let client = MetricsApiClient::new(
        &config.config.http.base_url,
        Credentials::new(cli.api_key, cli.api_secret),
        config.config.http.timeout,
    )?;
    let exporter = Exporter::bootstrap(Arc::new(client), rules, config.exporter_settings()).await?;
    let fatal = exporter.fatal_signal();
    tracing::info!(families = exporter.describe().len(), "Exporter ready");

    // Build Axum router
    let app = create_router(AppState {
        exporter: Arc::new(exporter),
    });

    let addr = config.listen_addr()?;
    tracing::info!("Listening on: http://{}/metrics", addr);
    tracing::info!("Press Ctrl+C to shutdown");

    // Start server with graceful shutdown
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(fatal.clone()))
        .await?;

    if let Some(reason) = fatal.raised() {
        tracing::error!(reason = %reason, "Stopped on a fatal Metrics API error");
        return Err(reason.into());
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Setup graceful shutdown signal handler.
async fn shutdown_signal(fatal: FatalSignal) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
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
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal");
        }
        reason = fatal.triggered() => {
            tracing::error!(reason = %reason, "Fatal error, shutting down");
        }
    }
}
