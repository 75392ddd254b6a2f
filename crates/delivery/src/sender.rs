//! Outbound providers for queued deliveries.

use serde_json::Value;
use thiserror::Error;
use tlx_management::models::QueuedDelivery;

#[derive(Debug, Error)]
pub enum SendError {
    #[error("Simulated failure")]
    Simulated,

    #[error("Provider error: {0}")]
    Provider(String),
}

/// Channel provider the worker hands each claimed row to.
pub trait DeliverySender: Send + Sync {
    fn send(&self, delivery: &QueuedDelivery) -> Result<(), SendError>;
}

/// Stand-in provider with deterministic failures: an address containing
/// "fail", a payload with `force_fail: true`, or the channel "fail".
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatedSender;

impl SimulatedSender {
    fn should_fail(delivery: &QueuedDelivery) -> bool {
        delivery.to_addr.to_lowercase().contains("fail")
            || delivery.payload.get("force_fail") == Some(&Value::Bool(true))
            || delivery.channel.eq_ignore_ascii_case("fail")
    }
}

impl DeliverySender for SimulatedSender {
    fn send(&self, delivery: &QueuedDelivery) -> Result<(), SendError> {
        if Self::should_fail(delivery) {
            return Err(SendError::Simulated);
        }
        Ok(())
    }
}
