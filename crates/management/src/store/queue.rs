use chrono::{DateTime, Utc};
use tlx_core::{time, QueueStatus};

use super::{newest_first, oldest_first, ManagementStore};
use crate::models::*;

#[derive(Debug, Clone, Copy, Default)]
pub struct QueueFilter {
    pub status: Option<QueueStatus>,
    pub campaign_id: Option<i64>,
}

impl ManagementStore {
    /// Insert a queue row unless the tenant already used the idempotency
    /// key. Returns the row and whether it was created.
    pub fn enqueue_delivery(&self, new: NewDelivery) -> (QueuedDelivery, bool) {
        let _guard = self.unique_lock.lock();
        if let Some(existing) = self.delivery_by_key(new.tenant_id, &new.idempotency_key) {
            return (existing, false);
        }
        let now = time::now();
        let id = self.ids.delivery.next();
        let row = QueuedDelivery {
            id,
            tenant_id: new.tenant_id,
            campaign_id: new.campaign_id,
            channel: new.channel,
            to_addr: new.to_addr,
            payload: new.payload,
            idempotency_key: new.idempotency_key,
            status: QueueStatus::Queued,
            attempts: 0,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            next_attempt_at: new.next_attempt_at,
            last_error: None,
            created_at: now,
            updated_at: now,
        };
        self.deliveries.insert(id, row.clone());
        (row, true)
    }

    pub fn delivery_by_key(&self, tenant_id: i64, key: &str) -> Option<QueuedDelivery> {
        self.deliveries
            .iter()
            .find(|r| r.value().tenant_id == tenant_id && r.value().idempotency_key == key)
            .map(|r| r.value().clone())
    }

    pub fn delivery(&self, id: i64) -> Option<QueuedDelivery> {
        self.deliveries.get(&id).map(|r| r.value().clone())
    }

    pub fn list_deliveries(&self, tenant_id: i64, filter: QueueFilter, page: Page) -> Vec<QueuedDelivery> {
        let rows = newest_first(&self.deliveries, |d| {
            d.tenant_id == tenant_id
                && filter.status.map_or(true, |s| d.status == s)
                && filter.campaign_id.map_or(true, |c| d.campaign_id == Some(c))
        });
        page.apply(rows)
    }

    /// Queue rows of a tenant created at or after `since`, oldest first.
    pub fn deliveries_since(&self, tenant_id: i64, since: DateTime<Utc>) -> Vec<QueuedDelivery> {
        oldest_first(&self.deliveries, |d| d.tenant_id == tenant_id && d.created_at >= since)
    }

    /// Pick up to `batch` due rows (queued or retrying, `next_attempt_at`
    /// unset or past), oldest first, and mark them `sending` with one more
    /// attempt.
    pub fn claim_due_deliveries(&self, now: DateTime<Utc>, batch: usize) -> Vec<QueuedDelivery> {
        let _guard = self.unique_lock.lock();
        let due: Vec<i64> = oldest_first(&self.deliveries, |d| {
            d.status.is_pending() && d.next_attempt_at.map_or(true, |at| at <= now)
        })
        .into_iter()
        .take(batch)
        .map(|d| d.id)
        .collect();

        due.into_iter()
            .filter_map(|id| {
                let mut row = self.deliveries.get_mut(&id)?;
                row.status = QueueStatus::Sending;
                row.attempts += 1;
                row.updated_at = now;
                Some(row.clone())
            })
            .collect()
    }

    /// Record the outcome of a send attempt.
    pub fn finish_delivery(
        &self,
        id: i64,
        status: QueueStatus,
        last_error: Option<String>,
        next_attempt_at: Option<DateTime<Utc>>,
    ) -> Option<QueuedDelivery> {
        let mut row = self.deliveries.get_mut(&id)?;
        row.status = status;
        row.last_error = last_error;
        row.next_attempt_at = next_attempt_at;
        row.updated_at = time::now();
        Some(row.clone())
    }
}
