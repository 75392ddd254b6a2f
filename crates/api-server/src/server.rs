//! API server — the ads/CRM HTTP API, the service-shop API on its own port,
//! the Prometheus exporter and the background delivery worker.

use crate::jobs;
use crate::rest::{self, PublicState};
use crate::swagger::ApiDoc;
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tlx_cache::RedisCounter;
use tlx_core::config::AppConfig;
use tlx_delivery::{DeliveryRunner, DeliveryWorker, SimulatedSender};
use tlx_management::{management_router, AppState};
use tlx_platform::RateLimiter;
use tlx_workshop::{workshop_router, WorkshopState};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Full ads/CRM application: authenticated API, dashboards, public tracking,
/// job triggers and the API docs.
pub fn router(app: AppState, worker: Arc<DeliveryWorker>) -> Router {
    let public = Router::new()
        .route("/health", get(rest::health_check))
        .route("/r/:slug", get(rest::handle_redirect))
        .route("/px/impression.gif", get(rest::handle_pixel))
        .route("/events/conversion", post(rest::handle_conversion))
        .route("/jobs/run-due", post(jobs::handle_run_due))
        .route("/jobs/process-deliveries", post(jobs::handle_process_deliveries))
        .with_state(PublicState {
            app: app.clone(),
            worker,
        });

    Router::new()
        .merge(public)
        .merge(management_router(app.clone()))
        .merge(tlx_reporting::reporting_router(app))
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
}

pub struct ApiServer {
    config: AppConfig,
}

impl ApiServer {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    /// Shared-counter limiter when Redis is configured and reachable,
    /// otherwise the in-process one.
    async fn rate_limiter(&self) -> RateLimiter {
        let settings = &self.config.rate_limit;
        if self.config.redis.url.is_none() {
            return RateLimiter::in_memory(settings);
        }
        match RedisCounter::connect(&self.config.redis).await {
            Ok(counter) => RateLimiter::redis(settings, counter),
            Err(e) => {
                warn!(error = %e, "Redis unavailable, falling back to in-memory rate limiting");
                RateLimiter::in_memory(settings)
            }
        }
    }

    /// Build the shared ads/CRM state and the delivery worker over it.
    pub async fn build_state(&self) -> anyhow::Result<(AppState, Arc<DeliveryWorker>)> {
        let limiter = self.rate_limiter().await;
        info!(backend = limiter.backend_name(), "Rate limiter ready");
        let state = AppState::new(self.config.clone(), limiter)?;
        let worker = Arc::new(DeliveryWorker::new(
            state.store.clone(),
            state.meter.clone(),
            Arc::new(SimulatedSender),
        ));
        Ok((state, worker))
    }

    /// Start the ads/CRM HTTP server.
    pub async fn start_http(&self, state: AppState, worker: Arc<DeliveryWorker>) -> anyhow::Result<()> {
        let app = router(state, worker)
            .layer(CompressionLayer::new())
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http());

        let addr = SocketAddr::new(self.config.api.host.parse()?, self.config.api.http_port);
        info!(addr = %addr, "Starting HTTP server");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
        Ok(())
    }

    /// Start the service-shop API on its own port.
    pub async fn start_workshop(&self) -> anyhow::Result<()> {
        let state = WorkshopState::new(&self.config);
        let app = workshop_router(state)
            .layer(CompressionLayer::new())
            .layer(TraceLayer::new_for_http());

        let addr = SocketAddr::new(self.config.api.host.parse()?, self.config.api.workshop_port);
        info!(addr = %addr, "Starting workshop server");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;
        Ok(())
    }

    /// Start the metrics server on a separate port.
    pub async fn start_metrics(&self) -> anyhow::Result<()> {
        let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
        let handle = builder
            .with_http_listener(SocketAddr::new(
                self.config.api.host.parse()?,
                self.config.metrics.port,
            ))
            .install_recorder()?;

        info!(port = self.config.metrics.port, "Metrics exporter started");

        // Keep the handle alive
        std::mem::forget(handle);
        Ok(())
    }

    /// Spawn the background delivery loop when enabled.
    pub fn spawn_worker(&self, worker: Arc<DeliveryWorker>, shutdown: watch::Receiver<bool>) -> Option<JoinHandle<()>> {
        let jobs = &self.config.jobs;
        if !jobs.worker_enabled {
            info!("Background delivery worker disabled");
            return None;
        }
        let runner = DeliveryRunner::new(worker, Duration::from_secs(jobs.worker_interval_secs.max(1)), jobs.batch_size);
        Some(runner.spawn(shutdown))
    }
}
