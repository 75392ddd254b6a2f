//! Axum handlers for the service-shop API. Every route except login and
//! health requires an active user; user management requires an admin.

pub mod appointments;
pub mod shop;
pub mod users;
