//! Per-tenant plan rows, Stripe references, and processed webhook events.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;

use crate::plans::{PlanName, PlanStatus};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TenantPlan {
    pub tenant_id: i64,
    pub plan: PlanName,
    pub status: PlanStatus,
    pub trial_ends_at: Option<String>,
    pub current_period_end: Option<String>,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TenantPlan {
    fn fresh(tenant_id: i64) -> Self {
        let now = tlx_core::time::now();
        Self {
            tenant_id,
            plan: PlanName::Free,
            status: PlanStatus::Active,
            trial_ends_at: None,
            current_period_end: None,
            stripe_customer_id: None,
            stripe_subscription_id: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Optional fields applied by `set_plan`. Stripe ids are only overwritten
/// when present.
#[derive(Debug, Clone, Default)]
pub struct PlanChange {
    pub current_period_end: Option<String>,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Data stored in DashMap (development); swap to PostgreSQL for production.
pub struct PlanRegistry {
    plans: Arc<DashMap<i64, TenantPlan>>,
    processed_events: Arc<DashMap<String, (String, DateTime<Utc>)>>,
}

impl Default for PlanRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PlanRegistry {
    pub fn new() -> Self {
        Self {
            plans: Arc::new(DashMap::new()),
            processed_events: Arc::new(DashMap::new()),
        }
    }

    /// Plan row for a tenant, created as free/active on first access.
    pub fn get(&self, tenant_id: i64) -> TenantPlan {
        self.plans
            .entry(tenant_id)
            .or_insert_with(|| TenantPlan::fresh(tenant_id))
            .clone()
    }

    pub fn plan_and_status(&self, tenant_id: i64) -> (PlanName, PlanStatus) {
        let row = self.get(tenant_id);
        (row.plan, row.status)
    }

    pub fn set_plan(
        &self,
        tenant_id: i64,
        plan: PlanName,
        status: PlanStatus,
        change: PlanChange,
    ) -> TenantPlan {
        let mut row = self
            .plans
            .entry(tenant_id)
            .or_insert_with(|| TenantPlan::fresh(tenant_id));
        row.plan = plan;
        row.status = status;
        row.current_period_end = change.current_period_end;
        if let Some(customer) = change.stripe_customer_id.filter(|c| !c.is_empty()) {
            row.stripe_customer_id = Some(customer);
        }
        if let Some(sub) = change.stripe_subscription_id.filter(|s| !s.is_empty()) {
            row.stripe_subscription_id = Some(sub);
        }
        row.updated_at = tlx_core::time::now();

        info!(
            tenant_id = tenant_id,
            plan = %plan,
            status = %status,
            "Tenant plan updated"
        );
        row.clone()
    }

    /// `(customer_id, subscription_id)` for a tenant.
    pub fn stripe_refs(&self, tenant_id: i64) -> (Option<String>, Option<String>) {
        let row = self.get(tenant_id);
        (row.stripe_customer_id, row.stripe_subscription_id)
    }

    /// Tenant owning a Stripe subscription or customer, if any.
    pub fn find_by_stripe(
        &self,
        subscription_id: Option<&str>,
        customer_id: Option<&str>,
    ) -> Option<i64> {
        let sub = subscription_id.map(str::trim).filter(|s| !s.is_empty());
        let cust = customer_id.map(str::trim).filter(|c| !c.is_empty());
        if sub.is_none() && cust.is_none() {
            return None;
        }
        self.plans
            .iter()
            .find(|row| {
                (sub.is_some() && row.stripe_subscription_id.as_deref() == sub)
                    || (cust.is_some() && row.stripe_customer_id.as_deref() == cust)
            })
            .map(|row| row.tenant_id)
    }

    /// Record a webhook event id. Returns false when it was already seen.
    pub fn mark_event_processed(&self, event_id: &str, event_type: &str) -> bool {
        if self.processed_events.contains_key(event_id) {
            return false;
        }
        self.processed_events
            .insert(
                event_id.to_string(),
                (event_type.to_string(), tlx_core::time::now()),
            )
            .is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_tenant_defaults_to_free_active() {
        let registry = PlanRegistry::new();
        assert_eq!(
            registry.plan_and_status(9),
            (PlanName::Free, PlanStatus::Active)
        );
        assert_eq!(registry.stripe_refs(9), (None, None));
    }

    #[test]
    fn set_plan_keeps_existing_refs_when_absent() {
        let registry = PlanRegistry::new();
        registry.set_plan(
            1,
            PlanName::Pro,
            PlanStatus::Active,
            PlanChange {
                current_period_end: Some("2026-02-01T00:00:00+00:00".into()),
                stripe_customer_id: Some("cus_1".into()),
                stripe_subscription_id: Some("sub_1".into()),
            },
        );
        let row = registry.set_plan(1, PlanName::Pro, PlanStatus::PastDue, PlanChange::default());
        assert_eq!(row.stripe_customer_id.as_deref(), Some("cus_1"));
        assert_eq!(row.status, PlanStatus::PastDue);
        assert_eq!(row.current_period_end, None);

        assert_eq!(registry.find_by_stripe(Some("sub_1"), None), Some(1));
        assert_eq!(registry.find_by_stripe(None, Some("cus_1")), Some(1));
        assert_eq!(registry.find_by_stripe(Some("sub_x"), Some("")), None);
        assert_eq!(registry.find_by_stripe(None, None), None);
    }

    #[test]
    fn events_are_deduplicated() {
        let registry = PlanRegistry::new();
        assert!(registry.mark_event_processed("evt_1", "invoice.payment_succeeded"));
        assert!(!registry.mark_event_processed("evt_1", "invoice.payment_succeeded"));
    }
}
