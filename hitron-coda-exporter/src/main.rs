//! Prometheus exporter for Hitron CODA cable modems.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use hitron_coda::HttpConnector;
use tokio::sync::watch;
use tracing::{error, info};

use hitron_coda_exporter::logging::{LoggingConfig, init_tracing};
use hitron_coda_exporter::{
    AppState, ConfigStore, ExporterMetrics, HttpServer, ReloadCoordinator, Scraper,
};

/// Prometheus exporter for Hitron CODA cable modems.
#[derive(Parser, Debug)]
#[command(name = "hitron-coda-exporter")]
#[command(about = "Export Hitron CODA cable modem state as Prometheus metrics")]
#[command(version)]
struct Args {
    /// Path to the device configuration file (JSON5 format).
    #[arg(short, long, default_value = "hitron_coda.json5")]
    config: PathBuf,

    /// HTTP listen address.
    #[arg(long, default_value = "0.0.0.0:9780")]
    listen: SocketAddr,

    #[command(flatten)]
    logging: LoggingConfig,

    /// Timeout for each request to the modem, in seconds.
    #[arg(long, default_value_t = 10)]
    device_timeout_secs: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_tracing(&args.logging)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        revision = option_env!("GIT_COMMIT").unwrap_or("unknown"),
        "Starting Hitron CODA exporter"
    );

    // Bail early if the config is bad.
    let store = match ConfigStore::load(&args.config) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            error!(path = %args.config.display(), error = %e, "Error parsing config file");
            return Err(e.into());
        }
    };
    info!(path = %args.config.display(), host = %store.get().host, "Loaded config file");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let device_timeout = Duration::from_secs(args.device_timeout_secs);
    let metrics = ExporterMetrics::new();
    let scraper = Arc::new(
        Scraper::new(HttpConnector::new(device_timeout), metrics.clone())
            .with_close_timeout(device_timeout),
    );

    let (coordinator, reload_handle, trigger) =
        ReloadCoordinator::new(store.clone(), args.config.clone());
    let coordinator_task = tokio::spawn(coordinator.run(shutdown_rx.clone()));

    #[cfg(unix)]
    let sighup_task = {
        let shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            if let Err(e) = hitron_coda_exporter::reload::forward_sighup(trigger, shutdown).await {
                error!("SIGHUP listener error: {}", e);
            }
        })
    };
    #[cfg(not(unix))]
    drop(trigger);

    let state = AppState::new(store, scraper, reload_handle, metrics);
    let http_server = HttpServer::new(state, args.listen);
    let http_shutdown = shutdown_rx.clone();
    let http_task = tokio::spawn(async move {
        if let Err(e) = http_server.run(http_shutdown).await {
            error!("HTTP server error: {}", e);
        }
    });

    wait_for_shutdown().await;

    shutdown_tx.send(true)?;

    let _ = tokio::time::timeout(Duration::from_secs(5), async {
        let _ = http_task.await;
        let _ = coordinator_task.await;
        #[cfg(unix)]
        let _ = sighup_task.await;
    })
    .await;

    info!("Exporter stopped");
    Ok(())
}

async fn wait_for_shutdown() {
    let terminate = async {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};
            match signal(SignalKind::terminate()) {
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
        {
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down...");
        }
    }
}
