#![warn(clippy::unwrap_used)]

pub mod jobs;
pub mod rest;
pub mod server;
pub mod swagger;

pub use rest::PublicState;
pub use server::{router, ApiServer};
pub use swagger::ApiDoc;
