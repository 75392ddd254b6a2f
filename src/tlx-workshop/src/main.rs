//! TLX Workshop — service-shop API (customers, vehicles, service orders,
//! appointments) as a standalone server.

use clap::Parser;
use tlx_api::ApiServer;
use tlx_core::config::AppConfig;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "tlx-workshop")]
#[command(about = "Service-shop management API")]
#[command(version)]
struct Cli {
    /// Bind address (overrides config)
    #[arg(long, env = "TLX__API__HOST")]
    host: Option<String>,

    /// HTTP port (overrides config)
    #[arg(long, env = "TLX__API__WORKSHOP_PORT")]
    port: Option<u16>,

    /// Metrics port (overrides config)
    #[arg(long, env = "TLX__METRICS__PORT")]
    metrics_port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tlx_workshop=info,tlx_api=info,tower_http=info".into()),
        )
        .json()
        .init();

    let cli = Cli::parse();

    let mut config = AppConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    if let Some(host) = cli.host {
        config.api.host = host;
    }
    if let Some(port) = cli.port {
        config.api.workshop_port = port;
    }
    if let Some(port) = cli.metrics_port {
        config.metrics.port = port;
    }

    info!(port = config.api.workshop_port, "Configuration loaded");

    let server = ApiServer::new(config);
    if let Err(e) = server.start_metrics().await {
        error!(error = %e, "Failed to start metrics exporter");
    }

    tokio::select! {
        result = server.start_workshop() => result?,
        _ = tokio::signal::ctrl_c() => info!("Shutdown signal received"),
    }
    Ok(())
}
