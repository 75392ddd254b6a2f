//! Client side of the TLX APIs: HTTP client with a stored bearer token,
//! ads/CRM and service-shop calls, CSV export, reminder and dashboard
//! polling, and dashboard route resolution.

pub mod ads;
pub mod client;
pub mod error;
pub mod export;
pub mod poller;
pub mod route;
pub mod table;
pub mod token;
pub mod workshop;

pub use ads::AdsApi;
pub use client::{ApiClient, DEFAULT_TIMEOUT};
pub use error::{ClientError, ClientResult};
pub use export::{to_csv, Delimiter};
pub use poller::{DashboardPoller, PollerSettings, ReminderPoller};
pub use route::Route;
pub use token::{StoredToken, TokenStore};
pub use workshop::{AppointmentRange, WorkshopApi};
