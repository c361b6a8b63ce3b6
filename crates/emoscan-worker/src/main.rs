//! Facial emotion analysis worker binary.

use anyhow::Context;
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use emoscan_worker::WorkerConfig;

const DEFAULT_LOG_DIRECTIVES: &str = "emoscan_worker=info,emoscan_media=info,ort=warn";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_DIRECTIVES));

    // Readings go to stdout, so logs go to stderr.
    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    info!("Starting emoscan-worker");

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    if let Some(addr) = config.metrics_addr {
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("Failed to install Prometheus exporter")?;
        info!(%addr, "Prometheus metrics listening");
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let shutdown_timeout = config.shutdown_timeout;
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal");
            shutdown_tx.send(true).ok();
            // Hard exit if graceful shutdown stalls.
            tokio::time::sleep(shutdown_timeout).await;
            warn!("Graceful shutdown timed out");
            std::process::exit(1);
        }
    });

    match emoscan_worker::run(&config, shutdown_rx).await {
        Ok(_) => {
            info!("Worker shutdown complete");
            Ok(())
        }
        Err(e) => {
            error!("Worker failed: {}", e);
            Err(e.into())
        }
    }
}
