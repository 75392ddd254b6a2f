//! Background loop that drives the worker on a fixed interval.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::worker::{DeliveryWorker, ProcessReport, RunDueReport};

pub struct DeliveryRunner {
    worker: Arc<DeliveryWorker>,
    interval: Duration,
    batch_size: usize,
}

impl DeliveryRunner {
    pub fn new(worker: Arc<DeliveryWorker>, interval: Duration, batch_size: usize) -> Self {
        Self {
            worker,
            interval,
            batch_size,
        }
    }

    /// One tick: dispatch due ads, then drain a queue batch. A panic inside
    /// a pass is logged and the loop keeps going.
    async fn tick(&self) -> Option<(RunDueReport, ProcessReport)> {
        let worker = self.worker.clone();
        let batch = self.batch_size;
        let result = tokio::task::spawn_blocking(move || {
            let due = worker.run_due();
            let processed = worker.process_deliveries(batch);
            (due, processed)
        })
        .await;
        match result {
            Ok((due, processed)) => {
                debug!(
                    ads_sent = due.sent,
                    processed = processed.processed,
                    sent = processed.sent,
                    retried = processed.retried,
                    failed = processed.failed,
                    "Delivery tick"
                );
                Some((due, processed))
            }
            Err(e) => {
                error!(error = %e, "Delivery pass failed");
                None
            }
        }
    }

    /// Run until `shutdown` flips to `true` (or its sender is dropped).
    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                interval_secs = self.interval.as_secs(),
                batch_size = self.batch_size,
                "Delivery worker started"
            );
            let mut interval = tokio::time::interval(self.interval);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        self.tick().await;
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            info!("Delivery worker stopped");
        })
    }
}
