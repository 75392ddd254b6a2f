//! Ads/CRM backend — tenants, accounts, ads, templates, short links,
//! campaigns, contacts, segments, automation and the delivery queue.
//!
//! Provides the REST API consumed by the dashboard UI.
//! Data stored in DashMap (development); swap to PostgreSQL for production.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod models;
pub mod router;
pub mod state;
pub mod store;

pub use auth::{AuthUser, ClientIp};
pub use error::{ApiError, ApiResult, ErrorResponse};
pub use router::management_router;
pub use state::AppState;
pub use store::ManagementStore;
