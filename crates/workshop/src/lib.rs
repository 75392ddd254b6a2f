//! Service-shop backend — users, customers, vehicles, service orders,
//! stats and appointments with overlap checks and reminders — plus the
//! week calendar model the agenda view is drawn from.
//!
//! Data stored in DashMap (development); swap to PostgreSQL for production.

pub mod auth;
pub mod calendar;
pub mod handlers;
pub mod models;
pub mod router;
pub mod state;
pub mod store;

pub use calendar::{reschedule, snap_to_slot, week_start, CalendarBlock, CalendarGrid, DayColumn, WeekView};
pub use router::workshop_router;
pub use state::WorkshopState;
pub use store::WorkshopStore;
