//! Stripe webhook verification and event application.

use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;
use tlx_core::time::unix_to_iso;
use tracing::{debug, info};

use crate::plans::{PlanName, PlanStatus};
use crate::prices::PriceBook;
use crate::subscriptions::{PlanChange, PlanRegistry};

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error, PartialEq)]
pub enum SignatureError {
    #[error("signature header is malformed")]
    Malformed,
    #[error("timestamp outside tolerance")]
    Stale,
    #[error("no matching v1 signature")]
    Mismatch,
}

/// Verify a `Stripe-Signature` header (`t=<unix>,v1=<hex>[,v1=...]`).
///
/// The expected signature is hex HMAC-SHA256 of `"{t}.{payload}"` keyed by
/// the endpoint secret.
pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    tolerance_secs: i64,
    now_unix: i64,
) -> Result<(), SignatureError> {
    let mut timestamp: Option<i64> = None;
    let mut candidates: Vec<&str> = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", v)) => timestamp = v.parse().ok(),
            Some(("v1", v)) => candidates.push(v),
            _ => {}
        }
    }
    let timestamp = timestamp.ok_or(SignatureError::Malformed)?;
    if candidates.is_empty() {
        return Err(SignatureError::Malformed);
    }
    if tolerance_secs > 0 && (now_unix - timestamp).abs() > tolerance_secs {
        return Err(SignatureError::Stale);
    }

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    let expected = hex::encode(mac.finalize().into_bytes());

    let matched = candidates
        .iter()
        .any(|c| bool::from(c.as_bytes().ct_eq(expected.as_bytes())));
    if matched {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

/// What applying an event did.
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookOutcome {
    Duplicate,
    Applied { tenant_id: i64, plan: PlanName, status: PlanStatus },
    Ignored,
}

fn str_at<'a>(v: &'a Value, pointer: &str) -> Option<&'a str> {
    v.pointer(pointer).and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// `tenant_id` metadata arrives as a string; tolerate numbers too.
fn metadata_tenant(obj: &Value) -> Option<i64> {
    let raw = obj.pointer("/metadata/tenant_id")?;
    let id = match raw {
        Value::String(s) => s.trim().parse().ok()?,
        Value::Number(n) => n.as_i64()?,
        _ => return None,
    };
    (id > 0).then_some(id)
}

/// Apply a verified event to the plan registry. Event ids are processed at
/// most once.
pub fn apply_event(registry: &PlanRegistry, prices: &PriceBook, event: &Value) -> WebhookOutcome {
    let event_type = event.get("type").and_then(Value::as_str).unwrap_or_default();
    let event_id = event.get("id").and_then(Value::as_str).unwrap_or_default();

    if !event_id.is_empty() && !registry.mark_event_processed(event_id, event_type) {
        debug!(event_id = event_id, "Duplicate Stripe event");
        return WebhookOutcome::Duplicate;
    }

    let obj = event.pointer("/data/object").cloned().unwrap_or(Value::Null);
    let metadata_plan = || PlanName::parse_or_free(str_at(&obj, "/metadata/plan").unwrap_or("free"));

    let outcome = match event_type {
        "customer.subscription.created"
        | "customer.subscription.updated"
        | "customer.subscription.deleted" => {
            let plan = str_at(&obj, "/items/data/0/price/id")
                .and_then(|p| prices.plan_for(p))
                .unwrap_or_else(metadata_plan);
            let customer = str_at(&obj, "/customer");
            let subscription = str_at(&obj, "/id");
            let status = PlanStatus::normalize(str_at(&obj, "/status").unwrap_or("active"));
            let period_end = obj.get("current_period_end").and_then(Value::as_i64);
            metadata_tenant(&obj)
                .or_else(|| registry.find_by_stripe(subscription, customer))
                .map(|tenant_id| {
                    registry.set_plan(
                        tenant_id,
                        plan,
                        status,
                        PlanChange {
                            current_period_end: unix_to_iso(period_end),
                            stripe_customer_id: customer.map(str::to_string),
                            stripe_subscription_id: subscription.map(str::to_string),
                        },
                    );
                    (tenant_id, plan, status)
                })
        }
        "invoice.payment_succeeded" | "invoice.payment_failed" => {
            let plan = str_at(&obj, "/lines/data/0/price/id")
                .and_then(|p| prices.plan_for(p))
                .unwrap_or_else(metadata_plan);
            let customer = str_at(&obj, "/customer");
            let subscription = str_at(&obj, "/subscription");
            let period_end = obj.pointer("/lines/data/0/period/end").and_then(Value::as_i64);
            let status = if event_type == "invoice.payment_succeeded" {
                PlanStatus::Active
            } else {
                PlanStatus::PastDue
            };
            metadata_tenant(&obj)
                .or_else(|| registry.find_by_stripe(subscription, customer))
                .map(|tenant_id| {
                    registry.set_plan(
                        tenant_id,
                        plan,
                        status,
                        PlanChange {
                            current_period_end: unix_to_iso(period_end),
                            stripe_customer_id: customer.map(str::to_string),
                            stripe_subscription_id: subscription.map(str::to_string),
                        },
                    );
                    (tenant_id, plan, status)
                })
        }
        "checkout.session.completed" if str_at(&obj, "/mode") == Some("subscription") => {
            metadata_tenant(&obj).map(|tenant_id| {
                let plan = metadata_plan();
                registry.set_plan(
                    tenant_id,
                    plan,
                    PlanStatus::Active,
                    PlanChange {
                        current_period_end: None,
                        stripe_customer_id: str_at(&obj, "/customer").map(str::to_string),
                        stripe_subscription_id: str_at(&obj, "/subscription").map(str::to_string),
                    },
                );
                (tenant_id, plan, PlanStatus::Active)
            })
        }
        _ => None,
    };

    match outcome {
        Some((tenant_id, plan, status)) => {
            info!(event_type = event_type, tenant_id = tenant_id, plan = %plan, status = %status, "Stripe event applied");
            metrics::counter!("billing.webhook.applied").increment(1);
            WebhookOutcome::Applied { tenant_id, plan, status }
        }
        None => WebhookOutcome::Ignored,
    }
}
