//! In-memory management store backed by DashMap.
//!
//! Production: replace with PostgreSQL (sqlx) or similar ACID store.
//! This provides the same API surface for development and testing.
//!
//! Every table gets its own monotonically increasing `i64` id. Checks that
//! span rows (unique emails, slugs, idempotency keys) run under
//! `unique_lock` so check-then-insert cannot race.

mod accounts;
mod content;
mod crm;
mod queue;

use crate::models::*;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicI64, Ordering};
use tlx_core::time;
use tracing::info;

pub use accounts::TenantChoice;
pub use content::NewAd;
pub use crm::{normalize_email, normalize_phone, ContactFields};
pub use queue::QueueFilter;

/// Tenant every token without a tenant claim resolves to.
pub const DEFAULT_TENANT_ID: i64 = 1;
pub const DEFAULT_TENANT_SLUG: &str = "default";

#[derive(Default)]
pub(crate) struct IdSeq(AtomicI64);

impl IdSeq {
    pub(crate) fn next(&self) -> i64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }
}

/// Thread-safe in-memory store for tenants, accounts, ads, CRM data and the
/// delivery queue.
pub struct ManagementStore {
    pub(crate) tenants: DashMap<i64, Tenant>,
    pub(crate) users: DashMap<i64, User>,
    pub(crate) memberships: DashMap<i64, Membership>,
    pub(crate) invites: DashMap<i64, InviteToken>,
    pub(crate) resets: DashMap<i64, ResetToken>,
    pub(crate) ads: DashMap<i64, Ad>,
    pub(crate) ad_deliveries: DashMap<i64, AdDelivery>,
    pub(crate) templates: DashMap<i64, Template>,
    pub(crate) links: DashMap<i64, ShortLink>,
    pub(crate) events: DashMap<i64, MetricEvent>,
    pub(crate) campaigns: DashMap<i64, Campaign>,
    pub(crate) contacts: DashMap<i64, Contact>,
    pub(crate) segments: DashMap<i64, Segment>,
    pub(crate) segment_members: DashMap<i64, SegmentMember>,
    pub(crate) deliveries: DashMap<i64, QueuedDelivery>,
    pub(crate) ids: Ids,
    pub(crate) unique_lock: Mutex<()>,
}

#[derive(Default)]
pub(crate) struct Ids {
    pub(crate) tenant: IdSeq,
    pub(crate) user: IdSeq,
    pub(crate) membership: IdSeq,
    pub(crate) invite: IdSeq,
    pub(crate) reset: IdSeq,
    pub(crate) ad: IdSeq,
    pub(crate) ad_delivery: IdSeq,
    pub(crate) template: IdSeq,
    pub(crate) link: IdSeq,
    pub(crate) event: IdSeq,
    pub(crate) campaign: IdSeq,
    pub(crate) contact: IdSeq,
    pub(crate) segment: IdSeq,
    pub(crate) segment_member: IdSeq,
    pub(crate) delivery: IdSeq,
}

impl Default for ManagementStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ManagementStore {
    pub fn new() -> Self {
        info!("Management store initialized (in-memory, development mode)");
        let store = Self {
            tenants: DashMap::new(),
            users: DashMap::new(),
            memberships: DashMap::new(),
            invites: DashMap::new(),
            resets: DashMap::new(),
            ads: DashMap::new(),
            ad_deliveries: DashMap::new(),
            templates: DashMap::new(),
            links: DashMap::new(),
            events: DashMap::new(),
            campaigns: DashMap::new(),
            contacts: DashMap::new(),
            segments: DashMap::new(),
            segment_members: DashMap::new(),
            deliveries: DashMap::new(),
            ids: Ids::default(),
            unique_lock: Mutex::new(()),
        };
        store.seed_default_tenant();
        store
    }

    fn seed_default_tenant(&self) {
        let id = self.ids.tenant.next();
        self.tenants.insert(
            id,
            Tenant {
                id,
                name: "Default".to_string(),
                slug: DEFAULT_TENANT_SLUG.to_string(),
                created_at: time::now(),
            },
        );
    }
}

/// Collect rows matching `keep`, newest id first.
pub(crate) fn newest_first<T: Clone>(
    table: &DashMap<i64, T>,
    keep: impl Fn(&T) -> bool,
) -> Vec<T> {
    let mut rows: Vec<(i64, T)> = table
        .iter()
        .filter(|r| keep(r.value()))
        .map(|r| (*r.key(), r.value().clone()))
        .collect();
    rows.sort_by(|a, b| b.0.cmp(&a.0));
    rows.into_iter().map(|(_, row)| row).collect()
}

/// Case-insensitive substring match; `needle` must already be lowercase.
pub(crate) fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

/// Collect rows matching `keep`, oldest id first.
pub(crate) fn oldest_first<T: Clone>(
    table: &DashMap<i64, T>,
    keep: impl Fn(&T) -> bool,
) -> Vec<T> {
    let mut rows = newest_first(table, keep);
    rows.reverse();
    rows
}
