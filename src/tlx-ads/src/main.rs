//! TLX Ads — multi-tenant ads/CRM backend.
//!
//! Main entry point: loads configuration, builds the shared state and
//! serves the HTTP API next to the metrics exporter and delivery worker.

use clap::Parser;
use tlx_api::ApiServer;
use tlx_core::config::AppConfig;
use tokio::sync::watch;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "tlx-ads")]
#[command(about = "Multi-tenant ads and CRM backend")]
#[command(version)]
struct Cli {
    /// Bind address (overrides config)
    #[arg(long, env = "TLX__API__HOST")]
    host: Option<String>,

    /// HTTP port (overrides config)
    #[arg(long, env = "TLX__API__HTTP_PORT")]
    http_port: Option<u16>,

    /// Metrics port (overrides config)
    #[arg(long, env = "TLX__METRICS__PORT")]
    metrics_port: Option<u16>,

    /// Do not run the background delivery worker
    #[arg(long, default_value_t = false)]
    no_worker: bool,

    /// Also serve the service-shop API on its own port
    #[arg(long, default_value_t = false)]
    with_workshop: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tlx_ads=info,tlx_api=info,tlx_delivery=info,tower_http=info".into()),
        )
        .json()
        .init();

    let cli = Cli::parse();

    info!("TLX Ads starting up");

    let mut config = AppConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    if let Some(host) = cli.host {
        config.api.host = host;
    }
    if let Some(port) = cli.http_port {
        config.api.http_port = port;
    }
    if let Some(port) = cli.metrics_port {
        config.metrics.port = port;
    }
    if cli.no_worker {
        config.jobs.worker_enabled = false;
    }

    info!(
        service = %config.service_name,
        http_port = config.api.http_port,
        metrics_port = config.metrics.port,
        worker = config.jobs.worker_enabled,
        "Configuration loaded"
    );

    let api_server = ApiServer::new(config.clone());
    let (state, worker) = api_server.build_state().await?;

    if let Err(e) = api_server.start_metrics().await {
        error!(error = %e, "Failed to start metrics exporter");
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker_handle = api_server.spawn_worker(worker.clone(), shutdown_rx);

    if cli.with_workshop {
        let workshop = ApiServer::new(config.clone());
        tokio::spawn(async move {
            if let Err(e) = workshop.start_workshop().await {
                error!(error = %e, "Workshop server stopped");
            }
        });
    }

    info!("TLX Ads is ready to serve traffic");

    tokio::select! {
        result = api_server.start_http(state, worker) => result?,
        _ = tokio::signal::ctrl_c() => info!("Shutdown signal received"),
    }

    let _ = shutdown_tx.send(true);
    if let Some(handle) = worker_handle {
        let _ = handle.await;
    }

    Ok(())
}
