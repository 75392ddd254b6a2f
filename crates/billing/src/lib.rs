//! Plans, usage metering, and Stripe billing for TLX tenants.
//!
//! Quotas are enforced against per-tenant usage counters; plan changes
//! arrive either through the billing endpoints or Stripe webhooks. Data
//! stored in DashMap (development); swap to PostgreSQL for production.

pub mod metering;
pub mod plans;
pub mod prices;
pub mod service;
pub mod stripe;
pub mod subscriptions;
pub mod webhook;

pub use metering::{MonthlyResource, PlanSnapshot, UsageMeter, UsageSnapshot};
pub use plans::{PlanLimits, PlanName, PlanStatus};
pub use prices::PriceBook;
pub use service::{BillingService, Purchaser};
pub use stripe::{StripeClient, StripeError};
pub use subscriptions::{PlanChange, PlanRegistry, TenantPlan};
pub use webhook::WebhookOutcome;
