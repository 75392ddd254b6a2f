//! Delivery-queue worker and scheduled-ad dispatcher.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tlx_billing::UsageMeter;
use tlx_core::time::{self, to_iso};
use tlx_core::{DeliveryResult, QueueStatus};
use tlx_management::ManagementStore;
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use crate::backoff::backoff_seconds;
use crate::sender::DeliverySender;

/// Outcome of one queue pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ProcessReport {
    pub processed: u64,
    pub sent: u64,
    pub retried: u64,
    pub failed: u64,
    pub ts: String,
}

/// Outcome of one scheduled-ad pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RunDueReport {
    pub sent: u64,
    pub ts: String,
}

pub struct DeliveryWorker {
    store: Arc<ManagementStore>,
    meter: Arc<UsageMeter>,
    sender: Arc<dyn DeliverySender>,
}

impl DeliveryWorker {
    pub fn new(store: Arc<ManagementStore>, meter: Arc<UsageMeter>, sender: Arc<dyn DeliverySender>) -> Self {
        Self { store, meter, sender }
    }

    pub fn process_deliveries(&self, batch: usize) -> ProcessReport {
        self.process_deliveries_at(time::now(), batch)
    }

    /// Claim up to `batch` due rows and attempt each once. Failed rows are
    /// retried with exponential backoff until `max_attempts`, then parked as
    /// `failed`.
    pub fn process_deliveries_at(&self, now: DateTime<Utc>, batch: usize) -> ProcessReport {
        let mut report = ProcessReport::default();

        for row in self.store.claim_due_deliveries(now, batch) {
            match self.sender.send(&row) {
                Ok(()) => {
                    self.store.finish_delivery(row.id, QueueStatus::Sent, None, None);
                    report.sent += 1;
                }
                Err(e) if row.attempts >= row.max_attempts => {
                    warn!(delivery_id = row.id, attempts = row.attempts, error = %e, "Delivery moved to DLQ");
                    self.store
                        .finish_delivery(row.id, QueueStatus::Failed, Some(format!("{e} (DLQ)")), None);
                    report.failed += 1;
                }
                Err(e) => {
                    let wait = backoff_seconds(row.attempts);
                    let next = now + Duration::seconds(wait);
                    debug!(delivery_id = row.id, attempts = row.attempts, retry_in = wait, "Delivery will be retried");
                    self.store
                        .finish_delivery(row.id, QueueStatus::Retrying, Some(e.to_string()), Some(next));
                    report.retried += 1;
                }
            }
            report.processed += 1;
        }

        metrics::counter!("delivery.worker.sent").increment(report.sent);
        metrics::counter!("delivery.worker.retried").increment(report.retried);
        metrics::counter!("delivery.worker.failed").increment(report.failed);
        if report.processed > 0 {
            info!(
                processed = report.processed,
                sent = report.sent,
                retried = report.retried,
                failed = report.failed,
                "Delivery batch processed"
            );
        }
        report.ts = to_iso(time::now());
        report
    }

    pub fn run_due(&self) -> RunDueReport {
        self.run_due_at(time::now())
    }

    /// Dispatch scheduled ads whose time has come. An ad over the tenant's
    /// daily send quota stays scheduled and gets a failed delivery record.
    pub fn run_due_at(&self, now: DateTime<Utc>) -> RunDueReport {
        let mut report = RunDueReport::default();

        for ad in self.store.claim_due_ads(now) {
            if let Err(e) = self.meter.reserve_daily_send_at(ad.tenant_id, &ad.channel, 1, now) {
                warn!(tenant_id = ad.tenant_id, ad_id = ad.id, error = %e, "Scheduled ad blocked by quota");
                self.store.unclaim_ad(ad.id);
                self.store
                    .record_ad_delivery(ad.id, DeliveryResult::Fail, format!("Quota exceeded: {e}"));
                continue;
            }

            self.store
                .record_ad_delivery(ad.id, DeliveryResult::Ok, "Simulated delivery");
            report.sent += 1;
        }

        metrics::counter!("delivery.ads.sent").increment(report.sent);
        if report.sent > 0 {
            info!(sent = report.sent, "Scheduled ads dispatched");
        }
        report.ts = to_iso(time::now());
        report
    }
}
