//! Usage metering and quota enforcement.
//!
//! Monthly counters cover resource creation (ads, templates, links,
//! invites); daily counters cover sends, in total and per channel. Counters
//! are bucketed by UTC `YYYY-MM` and `YYYY-MM-DD` keys.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tlx_core::time::{day_key, month_key};
use tlx_core::{TlxError, TlxResult};
use tracing::{debug, warn};
use utoipa::ToSchema;

use crate::plans::{PlanLimits, PlanName, PlanStatus};
use crate::subscriptions::PlanRegistry;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonthlyResource {
    AdsCreated,
    TemplatesCreated,
    LinksCreated,
    InvitesCreated,
}

impl MonthlyResource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AdsCreated => "ads_created",
            Self::TemplatesCreated => "templates_created",
            Self::LinksCreated => "links_created",
            Self::InvitesCreated => "invites_created",
        }
    }

    fn limit(self, limits: &PlanLimits) -> Option<u64> {
        match self {
            Self::AdsCreated => limits.ads_created_monthly,
            Self::TemplatesCreated => limits.templates_created_monthly,
            Self::LinksCreated => limits.links_created_monthly,
            Self::InvitesCreated => limits.invites_created_monthly,
        }
    }
}

impl fmt::Display for MonthlyResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-channel daily send bucket. Channels without their own bucket only
/// count towards the total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendChannel {
    Whatsapp,
    X,
    Email,
    Other,
}

impl SendChannel {
    pub fn from_name(channel: &str) -> Self {
        match channel.trim().to_ascii_lowercase().as_str() {
            "whatsapp" => Self::Whatsapp,
            "x" | "twitter" => Self::X,
            "email" => Self::Email,
            _ => Self::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
struct MonthlyUsage {
    ads_created: u64,
    templates_created: u64,
    links_created: u64,
    invites_created: u64,
}

impl MonthlyUsage {
    fn get(&self, resource: MonthlyResource) -> u64 {
        match resource {
            MonthlyResource::AdsCreated => self.ads_created,
            MonthlyResource::TemplatesCreated => self.templates_created,
            MonthlyResource::LinksCreated => self.links_created,
            MonthlyResource::InvitesCreated => self.invites_created,
        }
    }

    fn add(&mut self, resource: MonthlyResource, amount: u64) {
        let slot = match resource {
            MonthlyResource::AdsCreated => &mut self.ads_created,
            MonthlyResource::TemplatesCreated => &mut self.templates_created,
            MonthlyResource::LinksCreated => &mut self.links_created,
            MonthlyResource::InvitesCreated => &mut self.invites_created,
        };
        *slot += amount;
    }

    fn sub(&mut self, resource: MonthlyResource, amount: u64) {
        let slot = match resource {
            MonthlyResource::AdsCreated => &mut self.ads_created,
            MonthlyResource::TemplatesCreated => &mut self.templates_created,
            MonthlyResource::LinksCreated => &mut self.links_created,
            MonthlyResource::InvitesCreated => &mut self.invites_created,
        };
        *slot = slot.saturating_sub(amount);
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
struct DailyUsage {
    sends_total: u64,
    sends_whatsapp: u64,
    sends_x: u64,
    sends_email: u64,
}

/// Usage counters as reported to the plan dashboard.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UsageSnapshot {
    pub month: String,
    pub ads_created: u64,
    pub templates_created: u64,
    pub links_created: u64,
    pub invites_created: u64,
    pub day: String,
    pub sends_total: u64,
    pub sends_whatsapp: u64,
    pub sends_x: u64,
    pub sends_email: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PlanSnapshot {
    pub tenant_id: i64,
    pub plan: PlanName,
    pub status: PlanStatus,
    pub limits: PlanLimits,
    pub usage: UsageSnapshot,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// In-memory usage meter backed by `DashMap`.
pub struct UsageMeter {
    registry: Arc<PlanRegistry>,
    monthly: DashMap<(i64, String), MonthlyUsage>,
    daily: DashMap<(i64, String), DailyUsage>,
    /// Serialises check-then-increment so concurrent requests cannot both
    /// take the last unit of quota.
    reserve_lock: Mutex<()>,
}

impl UsageMeter {
    pub fn new(registry: Arc<PlanRegistry>) -> Self {
        Self {
            registry,
            monthly: DashMap::new(),
            daily: DashMap::new(),
            reserve_lock: Mutex::new(()),
        }
    }

    pub fn registry(&self) -> &Arc<PlanRegistry> {
        &self.registry
    }

    fn active_limits(&self, tenant_id: i64) -> TlxResult<PlanLimits> {
        let (plan, status) = self.registry.plan_and_status(tenant_id);
        if status == PlanStatus::Canceled {
            return Err(TlxError::PaymentRequired(
                "Plan inactive; update your subscription to continue.".into(),
            ));
        }
        Ok(plan.limits())
    }

    // --- monthly ---

    pub fn check_monthly(&self, tenant_id: i64, resource: MonthlyResource, amount: u64) -> TlxResult<()> {
        self.check_monthly_at(tenant_id, resource, amount, Utc::now())
    }

    pub fn check_monthly_at(
        &self,
        tenant_id: i64,
        resource: MonthlyResource,
        amount: u64,
        now: DateTime<Utc>,
    ) -> TlxResult<()> {
        let limits = self.active_limits(tenant_id)?;
        let Some(limit) = resource.limit(&limits) else {
            return Ok(());
        };
        let month = month_key(now);
        let current = self
            .monthly
            .get(&(tenant_id, month.clone()))
            .map(|u| u.get(resource))
            .unwrap_or(0);
        if current + amount > limit {
            warn!(tenant_id = tenant_id, resource = %resource, limit = limit, "Monthly quota exceeded");
            metrics::counter!("billing.quota.exceeded").increment(1);
            return Err(TlxError::PaymentRequired(format!(
                "Plan limit reached for {resource} (month {month})."
            )));
        }
        Ok(())
    }

    pub fn increment_monthly(&self, tenant_id: i64, resource: MonthlyResource, amount: u64) {
        self.increment_monthly_at(tenant_id, resource, amount, Utc::now())
    }

    pub fn increment_monthly_at(
        &self,
        tenant_id: i64,
        resource: MonthlyResource,
        amount: u64,
        now: DateTime<Utc>,
    ) {
        self.monthly
            .entry((tenant_id, month_key(now)))
            .or_default()
            .add(resource, amount);
        debug!(tenant_id = tenant_id, resource = %resource, amount = amount, "Monthly usage recorded");
    }

    /// Check and increment as one step.
    pub fn reserve_monthly(&self, tenant_id: i64, resource: MonthlyResource, amount: u64) -> TlxResult<()> {
        self.reserve_monthly_at(tenant_id, resource, amount, Utc::now())
    }

    pub fn reserve_monthly_at(
        &self,
        tenant_id: i64,
        resource: MonthlyResource,
        amount: u64,
        now: DateTime<Utc>,
    ) -> TlxResult<()> {
        let _guard = self.reserve_lock.lock();
        self.check_monthly_at(tenant_id, resource, amount, now)?;
        self.increment_monthly_at(tenant_id, resource, amount, now);
        Ok(())
    }

    /// Give back a reservation whose operation did not go through.
    pub fn release_monthly(&self, tenant_id: i64, resource: MonthlyResource, amount: u64) {
        if let Some(mut usage) = self.monthly.get_mut(&(tenant_id, month_key(Utc::now()))) {
            usage.sub(resource, amount);
        }
        debug!(tenant_id = tenant_id, resource = %resource, amount = amount, "Monthly reservation released");
    }

    // --- daily sends ---

    pub fn check_daily_send(&self, tenant_id: i64, amount: u64) -> TlxResult<()> {
        self.check_daily_send_at(tenant_id, amount, Utc::now())
    }

    pub fn check_daily_send_at(&self, tenant_id: i64, amount: u64, now: DateTime<Utc>) -> TlxResult<()> {
        let limits = self.active_limits(tenant_id)?;
        let Some(limit) = limits.sends_daily_total else {
            return Ok(());
        };
        let day = day_key(now);
        let current = self
            .daily
            .get(&(tenant_id, day.clone()))
            .map(|u| u.sends_total)
            .unwrap_or(0);
        if current + amount > limit {
            warn!(tenant_id = tenant_id, limit = limit, "Daily send quota exceeded");
            metrics::counter!("billing.quota.exceeded").increment(1);
            return Err(TlxError::PaymentRequired(format!(
                "Daily send limit reached (day {day})."
            )));
        }
        Ok(())
    }

    pub fn increment_daily_send(&self, tenant_id: i64, channel: &str, amount: u64) {
        self.increment_daily_send_at(tenant_id, channel, amount, Utc::now())
    }

    pub fn increment_daily_send_at(&self, tenant_id: i64, channel: &str, amount: u64, now: DateTime<Utc>) {
        let mut usage = self.daily.entry((tenant_id, day_key(now))).or_default();
        usage.sends_total += amount;
        match SendChannel::from_name(channel) {
            SendChannel::Whatsapp => usage.sends_whatsapp += amount,
            SendChannel::X => usage.sends_x += amount,
            SendChannel::Email => usage.sends_email += amount,
            SendChannel::Other => {}
        }
    }

    /// Check and increment the daily send counters as one step.
    pub fn reserve_daily_send(&self, tenant_id: i64, channel: &str, amount: u64) -> TlxResult<()> {
        self.reserve_daily_send_at(tenant_id, channel, amount, Utc::now())
    }

    pub fn reserve_daily_send_at(
        &self,
        tenant_id: i64,
        channel: &str,
        amount: u64,
        now: DateTime<Utc>,
    ) -> TlxResult<()> {
        let _guard = self.reserve_lock.lock();
        self.check_daily_send_at(tenant_id, amount, now)?;
        self.increment_daily_send_at(tenant_id, channel, amount, now);
        Ok(())
    }

    pub fn release_daily_send(&self, tenant_id: i64, channel: &str, amount: u64) {
        let Some(mut usage) = self.daily.get_mut(&(tenant_id, day_key(Utc::now()))) else {
            return;
        };
        usage.sends_total = usage.sends_total.saturating_sub(amount);
        let slot = match SendChannel::from_name(channel) {
            SendChannel::Whatsapp => &mut usage.sends_whatsapp,
            SendChannel::X => &mut usage.sends_x,
            SendChannel::Email => &mut usage.sends_email,
            SendChannel::Other => return,
        };
        *slot = slot.saturating_sub(amount);
    }

    // --- reporting ---

    pub fn snapshot(&self, tenant_id: i64) -> PlanSnapshot {
        self.snapshot_at(tenant_id, Utc::now())
    }

    pub fn snapshot_at(&self, tenant_id: i64, now: DateTime<Utc>) -> PlanSnapshot {
        let (plan, status) = self.registry.plan_and_status(tenant_id);
        let month = month_key(now);
        let day = day_key(now);
        let m = self
            .monthly
            .get(&(tenant_id, month.clone()))
            .map(|u| *u)
            .unwrap_or_default();
        let d = self
            .daily
            .get(&(tenant_id, day.clone()))
            .map(|u| *u)
            .unwrap_or_default();

        PlanSnapshot {
            tenant_id,
            plan,
            status,
            limits: plan.limits(),
            usage: UsageSnapshot {
                month,
                ads_created: m.ads_created,
                templates_created: m.templates_created,
                links_created: m.links_created,
                invites_created: m.invites_created,
                day,
                sends_total: d.sends_total,
                sends_whatsapp: d.sends_whatsapp,
                sends_x: d.sends_x,
                sends_email: d.sends_email,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscriptions::PlanChange;
    use chrono::TimeZone;

    fn meter() -> UsageMeter {
        UsageMeter::new(Arc::new(PlanRegistry::new()))
    }

    #[test]
    fn monthly_quota_is_enforced_per_month() {
        let meter = meter();
        let jan = Utc.with_ymd_and_hms(2026, 1, 20, 12, 0, 0).unwrap();
        let feb = Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap();

        meter.increment_monthly_at(1, MonthlyResource::TemplatesCreated, 20, jan);
        let err = meter
            .check_monthly_at(1, MonthlyResource::TemplatesCreated, 1, jan)
            .unwrap_err();
        assert_eq!(err.status_code(), 402);
        assert_eq!(
            err.to_string(),
            "Plan limit reached for templates_created (month 2026-01)."
        );
        assert!(meter
            .check_monthly_at(1, MonthlyResource::TemplatesCreated, 1, feb)
            .is_ok());
        assert!(meter
            .check_monthly_at(1, MonthlyResource::AdsCreated, 1, jan)
            .is_ok());
    }

    #[test]
    fn canceled_plan_blocks_everything() {
        let meter = meter();
        meter
            .registry()
            .set_plan(2, PlanName::Pro, PlanStatus::Canceled, PlanChange::default());
        let err = meter.check_daily_send(2, 1).unwrap_err();
        assert_eq!(err.status_code(), 402);
        assert!(err.to_string().starts_with("Plan inactive"));
        assert!(meter.reserve_monthly(2, MonthlyResource::LinksCreated, 1).is_err());
    }

    #[test]
    fn enterprise_is_unlimited() {
        let meter = meter();
        meter
            .registry()
            .set_plan(3, PlanName::Enterprise, PlanStatus::Active, PlanChange::default());
        meter.increment_daily_send(3, "email", 1_000_000);
        assert!(meter.check_daily_send(3, 1).is_ok());
    }

    #[test]
    fn daily_sends_count_total_and_channel_once() {
        let meter = meter();
        meter.increment_daily_send(4, "WhatsApp", 2);
        meter.increment_daily_send(4, "twitter", 1);
        meter.increment_daily_send(4, "sms", 3);

        let snap = meter.snapshot(4);
        assert_eq!(snap.usage.sends_total, 6);
        assert_eq!(snap.usage.sends_whatsapp, 2);
        assert_eq!(snap.usage.sends_x, 1);
        assert_eq!(snap.usage.sends_email, 0);
        assert_eq!(snap.plan, PlanName::Free);
        assert_eq!(snap.limits.sends_daily_total, Some(200));
    }

    #[test]
    fn reserve_daily_send_stops_at_limit() {
        let meter = meter();
        meter.increment_daily_send(5, "email", 199);
        meter.reserve_daily_send(5, "email", 1).unwrap();
        let err = meter.reserve_daily_send(5, "email", 1).unwrap_err();
        assert!(err.to_string().starts_with("Daily send limit reached"));
        assert_eq!(meter.snapshot(5).usage.sends_total, 200);
    }

    #[test]
    fn concurrent_reservations_never_overshoot() {
        let meter = Arc::new(meter());
        let barrier = Arc::new(std::sync::Barrier::new(8));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let meter = meter.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    (0..20)
                        .filter(|_| meter.reserve_monthly(6, MonthlyResource::AdsCreated, 1).is_ok())
                        .count()
                })
            })
            .collect();
        let granted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

        assert_eq!(granted, 50);
        assert_eq!(meter.snapshot(6).usage.ads_created, 50);
    }

    #[test]
    fn released_reservations_free_the_quota() {
        let meter = meter();
        meter.increment_monthly(7, MonthlyResource::LinksCreated, 199);
        meter.reserve_monthly(7, MonthlyResource::LinksCreated, 1).unwrap();
        assert!(meter.reserve_monthly(7, MonthlyResource::LinksCreated, 1).is_err());
        meter.release_monthly(7, MonthlyResource::LinksCreated, 1);
        assert!(meter.reserve_monthly(7, MonthlyResource::LinksCreated, 1).is_ok());

        meter.reserve_daily_send(7, "x", 2).unwrap();
        meter.release_daily_send(7, "x", 1);
        let usage = meter.snapshot(7).usage;
        assert_eq!((usage.sends_total, usage.sends_x), (1, 1));
    }
}
