use axum::http::HeaderValue;
use axum::routing::{get, patch, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;

use crate::handlers::{appointments, shop, users};
use crate::state::WorkshopState;

fn api_routes() -> Router<WorkshopState> {
    Router::new()
        .route("/health", get(users::health))
        // Auth
        .route("/auth/login", post(users::login))
        .route("/auth/me", get(users::me))
        .route("/auth/users", get(users::list_users).post(users::create_user))
        // Customers
        .route("/customers", get(shop::list_customers).post(shop::create_customer))
        .route(
            "/customers/:id",
            get(shop::get_customer)
                .patch(shop::update_customer)
                .delete(shop::delete_customer),
        )
        // Vehicles
        .route("/vehicles", get(shop::list_vehicles).post(shop::create_vehicle))
        .route("/vehicles/:id", patch(shop::update_vehicle).delete(shop::delete_vehicle))
        // Service orders
        .route("/service-orders", get(shop::list_orders).post(shop::create_order))
        .route("/service-orders/:id", patch(shop::update_order).delete(shop::delete_order))
        .route("/stats", get(shop::stats))
        // Appointments
        .route(
            "/appointments",
            get(appointments::list_appointments).post(appointments::create_appointment),
        )
        .route("/appointments/reminders", get(appointments::reminders))
        .route(
            "/appointments/:id",
            patch(appointments::update_appointment).delete(appointments::delete_appointment),
        )
        .route("/appointments/:id/mark-reminded", post(appointments::mark_reminded))
}

/// Pre-`/api` paths older clients still call.
fn legacy_routes() -> Router<WorkshopState> {
    Router::new()
        .route("/health", get(users::health))
        .route("/customers", get(shop::list_customers).post(shop::create_customer))
}

fn cors(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// The service-shop API: everything under `/api` plus the legacy paths,
/// with CORS restricted to the configured origins.
pub fn workshop_router(state: WorkshopState) -> Router {
    let cors = cors(&state.config.cors_origins);
    Router::new()
        .nest("/api", api_routes())
        .merge(legacy_routes())
        .layer(cors)
        .with_state(state)
}
