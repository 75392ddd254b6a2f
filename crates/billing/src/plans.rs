//! Subscription plans, their quota limits, and plan status.

use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

// ---------------------------------------------------------------------------
// Plans
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PlanName {
    Free,
    Pro,
    Business,
    Enterprise,
}

impl PlanName {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Pro => "pro",
            Self::Business => "business",
            Self::Enterprise => "enterprise",
        }
    }

    /// Unknown or empty names fall back to the free plan.
    pub fn parse_or_free(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "pro" => Self::Pro,
            "business" => Self::Business,
            "enterprise" => Self::Enterprise,
            _ => Self::Free,
        }
    }

    /// Plans a tenant can buy through checkout. Enterprise is sold offline.
    pub fn purchasable(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "free" => Some(Self::Free),
            "pro" => Some(Self::Pro),
            "business" => Some(Self::Business),
            _ => None,
        }
    }

    pub fn limits(self) -> PlanLimits {
        match self {
            Self::Free => PlanLimits::capped(50, 20, 200, 20, 200),
            Self::Pro => PlanLimits::capped(300, 200, 2_000, 200, 2_000),
            Self::Business => PlanLimits::capped(2_000, 1_000, 20_000, 2_000, 20_000),
            Self::Enterprise => PlanLimits::unlimited(),
        }
    }
}

impl fmt::Display for PlanName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Quota limits for one plan. `None` means unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PlanLimits {
    pub ads_created_monthly: Option<u64>,
    pub templates_created_monthly: Option<u64>,
    pub links_created_monthly: Option<u64>,
    pub invites_created_monthly: Option<u64>,
    pub sends_daily_total: Option<u64>,
}

impl PlanLimits {
    const fn capped(ads: u64, templates: u64, links: u64, invites: u64, sends: u64) -> Self {
        Self {
            ads_created_monthly: Some(ads),
            templates_created_monthly: Some(templates),
            links_created_monthly: Some(links),
            invites_created_monthly: Some(invites),
            sends_daily_total: Some(sends),
        }
    }

    const fn unlimited() -> Self {
        Self {
            ads_created_monthly: None,
            templates_created_monthly: None,
            links_created_monthly: None,
            invites_created_monthly: None,
            sends_daily_total: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Active,
    Trialing,
    PastDue,
    Canceled,
}

impl PlanStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Trialing => "trialing",
            Self::PastDue => "past_due",
            Self::Canceled => "canceled",
        }
    }

    /// Map a Stripe subscription status onto the four statuses we track.
    pub fn normalize(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "trialing" => Self::Trialing,
            "past_due" | "incomplete" | "unpaid" | "incomplete_expired" => Self::PastDue,
            "canceled" => Self::Canceled,
            _ => Self::Active,
        }
    }
}

impl fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
