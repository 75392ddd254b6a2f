pub mod config;
pub mod error;
pub mod ids;
pub mod patch;
pub mod templates;
pub mod time;
pub mod types;
pub mod utm;

pub use config::AppConfig;
pub use error::{TlxError, TlxResult};
pub use templates::{render_template, variables_from_json, Variables};
pub use types::{AdStatus, CampaignStatus, DeliveryResult, MetricEventType, QueueStatus, Role};
