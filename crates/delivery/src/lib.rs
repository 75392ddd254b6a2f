//! Delivery pipeline — drains the outbound queue, dispatches scheduled ads
//! and runs both on a background interval.
//!
//! Providers are pluggable through [`DeliverySender`]; the bundled
//! [`SimulatedSender`] never talks to a real channel.

pub mod backoff;
pub mod runner;
pub mod sender;
pub mod worker;

pub use backoff::backoff_seconds;
pub use runner::DeliveryRunner;
pub use sender::{DeliverySender, SendError, SimulatedSender};
pub use worker::{DeliveryWorker, ProcessReport, RunDueReport};
