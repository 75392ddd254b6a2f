//! Tenant dashboards — clicks, conversions, channel and campaign breakdowns,
//! and delivery-queue SLA.

pub mod dashboard;
pub mod handlers;

pub use dashboard::Dashboards;
pub use handlers::{reporting_router, ReportingState};
