//! Fixed-window counters behind the rate limiter: a shared Redis one and
//! an in-process fallback.

#![warn(clippy::unwrap_used)]

pub mod client;
pub mod local;

pub use client::RedisCounter;
pub use local::LocalCounter;
