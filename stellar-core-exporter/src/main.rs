//! Prometheus exporter for stellar-core.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::watch;
use tracing::{Level, error, info};
use tracing_subscriber::EnvFilter;

use stellar_core_exporter::config::{
    DEFAULT_INFO_URI, DEFAULT_METRICS_URI, DEFAULT_PORT, DEFAULT_TIMEOUT_SECS, LogFormat,
    LoggingConfig, ServerConfig, UpstreamConfig,
};
use stellar_core_exporter::http::wait_for_stop;
use stellar_core_exporter::{ExporterConfig, HttpServer, NodeClient, Scraper};

/// Simple stellar-core Prometheus exporter/scraper.
#[derive(Parser, Debug)]
#[command(name = "stellar-core-exporter")]
#[command(about = "Export stellar-core metrics and node status as Prometheus metrics")]
#[command(version)]
struct Args {
    /// Core metrics URI.
    #[arg(long, default_value = DEFAULT_METRICS_URI)]
    uri: String,

    /// Info endpoint URI.
    #[arg(long, default_value = DEFAULT_INFO_URI)]
    info_uri: String,

    /// HTTP bind port.
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Timeout for each upstream request, in seconds.
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout: u64,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

impl Args {
    fn into_config(self) -> ExporterConfig {
        ExporterConfig {
            upstream: UpstreamConfig {
                metrics_uri: self.uri,
                info_uri: self.info_uri,
                timeout_secs: self.timeout,
            },
            server: ServerConfig { port: self.port },
            logging: LoggingConfig {
                level: self.log_level,
                format: self.log_format,
            },
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Args::parse().into_config();
    config.validate()?;

    // Initialize logging
    let log_level = config.logging.level.parse().unwrap_or(Level::INFO);
    let filter = EnvFilter::new(format!("warn,stellar_core_exporter={}", log_level))
        .add_directive(format!("tower_http={}", log_level).parse()?);

    match config.logging.format {
        LogFormat::Json => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .json()
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    }

    info!(
        metrics_uri = %config.upstream.metrics_uri,
        info_uri = %config.upstream.info_uri,
        timeout_secs = config.upstream.timeout_secs,
        "Starting stellar-core exporter"
    );

    // Create shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let client = NodeClient::new(&config.upstream)?;
    let scraper = Arc::new(Scraper::new(client));
    let http_server = HttpServer::new(scraper, config.server.listen_addr());

    // Start HTTP server
    let mut http_task = tokio::spawn(async move { http_server.run(shutdown_rx).await });

    // Wait for shutdown signal, or for the server to stop on its own
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate() => {
            info!("Received SIGTERM, shutting down...");
        }
        result = &mut http_task => {
            return match result {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => {
                    error!("HTTP server error: {}", e);
                    Err(e)
                }
                Err(e) => Err(e.into()),
            };
        }
    }

    // Signal shutdown
    shutdown_tx.send(true)?;

    // Give in-flight scrapes time to complete
    let grace = Duration::from_secs(config.upstream.timeout_secs * 2 + 1);
    wait_for_stop(http_task, grace).await;

    info!("Exporter stopped");
    Ok(())
}

#[cfg(unix)]
async fn terminate() {
    match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            error!("Failed to install SIGTERM handler: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}
