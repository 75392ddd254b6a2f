//! Interval polling: appointment reminders with per-appointment
//! deduplication, and dashboard counters reported when they change.

use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};
use serde_json::Value;
use tlx_core::time;
use tlx_workshop::models::Appointment;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::ads::AdsApi;
use crate::error::{ClientError, ClientResult};
use crate::workshop::WorkshopApi;

#[derive(Debug, Clone)]
pub struct PollerSettings {
    pub interval: std::time::Duration,
    pub within_minutes: u32,
    /// Tell the server once an appointment has been announced.
    pub mark_reminded: bool,
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            interval: std::time::Duration::from_secs(60),
            within_minutes: 15,
            mark_reminded: false,
        }
    }
}

/// Announces each due appointment once. An id is remembered while the
/// server keeps returning it or its start is still ahead, so memory stays
/// bounded without trusting the local clock alone.
pub struct ReminderPoller {
    settings: PollerSettings,
    /// Appointment id to the start it was announced for.
    notified: HashMap<i64, DateTime<Utc>>,
}

impl ReminderPoller {
    pub fn new(settings: PollerSettings) -> Self {
        Self {
            settings,
            notified: HashMap::new(),
        }
    }

    pub fn tracked(&self) -> usize {
        self.notified.len()
    }

    fn prune(&mut self, now: DateTime<Utc>, due: &[Appointment]) {
        let listed: HashSet<i64> = due.iter().map(|a| a.id).collect();
        self.notified
            .retain(|id, starts_at| listed.contains(id) || *starts_at >= now);
    }

    /// The appointments of `due` not announced before.
    pub fn take_new(&mut self, now: DateTime<Utc>, due: Vec<Appointment>) -> Vec<Appointment> {
        self.prune(now, &due);
        let window = Duration::minutes(i64::from(self.settings.within_minutes));
        due.into_iter()
            .filter(|a| {
                if self.notified.contains_key(&a.id) {
                    return false;
                }
                let starts_at = a.starts_at().unwrap_or(now + window);
                self.notified.insert(a.id, starts_at);
                true
            })
            .collect()
    }

    /// One poll: fetch reminders, return the new ones and optionally mark
    /// them on the server. A failed mark is logged; the appointment still
    /// counts as announced.
    pub async fn poll_once(&mut self, api: &WorkshopApi) -> ClientResult<Vec<Appointment>> {
        let due = api.reminders(self.settings.within_minutes).await?;
        let fresh = self.take_new(time::now(), due);
        if self.settings.mark_reminded {
            for appt in &fresh {
                if let Err(e) = api.mark_reminded(appt.id).await {
                    warn!(appointment_id = appt.id, error = %e, "Could not mark appointment reminded");
                }
            }
        }
        Ok(fresh)
    }

    /// Poll until `shutdown` flips to `true`. Transient errors are logged
    /// and retried on the next tick; an expired session ends the loop.
    pub async fn run(
        mut self,
        api: &WorkshopApi,
        mut shutdown: watch::Receiver<bool>,
        mut on_reminder: impl FnMut(&Appointment),
    ) -> ClientResult<()> {
        info!(
            interval_secs = self.settings.interval.as_secs(),
            within_minutes = self.settings.within_minutes,
            "Reminder polling started"
        );
        let mut interval = tokio::time::interval(self.settings.interval);
        loop {
            tokio::select! {
                _ = interval.tick() => match self.poll_once(api).await {
                    Ok(fresh) => fresh.iter().for_each(&mut on_reminder),
                    Err(e @ ClientError::Unauthorized(_)) => return Err(e),
                    Err(e) => warn!(error = %e, "Reminder poll failed"),
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Reminder polling stopped");
                        return Ok(());
                    }
                }
            }
        }
    }
}

/// Polls the ads dashboard summary and reports a snapshot whenever the
/// counters move. The first successful poll is always reported.
pub struct DashboardPoller {
    interval: std::time::Duration,
    last: Option<Value>,
}

impl DashboardPoller {
    pub fn new(interval: std::time::Duration) -> Self {
        Self { interval, last: None }
    }

    /// `snapshot` if it differs from the previous one, ignoring the
    /// server's `ts` stamp.
    pub fn take_changed(&mut self, snapshot: Value) -> Option<Value> {
        let counters = without_ts(&snapshot);
        if self.last.as_ref() == Some(&counters) {
            return None;
        }
        self.last = Some(counters);
        Some(snapshot)
    }

    pub async fn poll_once(&mut self, api: &AdsApi) -> ClientResult<Option<Value>> {
        let snapshot = api.dashboard().await?;
        Ok(self.take_changed(snapshot))
    }

    /// Poll until `shutdown` flips to `true`. Same error policy as the
    /// reminder loop: an expired session ends it, anything else is retried.
    pub async fn run(
        mut self,
        api: &AdsApi,
        mut shutdown: watch::Receiver<bool>,
        mut on_update: impl FnMut(&Value),
    ) -> ClientResult<()> {
        info!(interval_secs = self.interval.as_secs(), "Dashboard polling started");
        let mut interval = tokio::time::interval(self.interval);
        loop {
            tokio::select! {
                _ = interval.tick() => match self.poll_once(api).await {
                    Ok(Some(snapshot)) => on_update(&snapshot),
                    Ok(None) => {}
                    Err(e @ ClientError::Unauthorized(_)) => return Err(e),
                    Err(e) => warn!(error = %e, "Dashboard poll failed"),
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Dashboard polling stopped");
                        return Ok(());
                    }
                }
            }
        }
    }
}

fn without_ts(snapshot: &Value) -> Value {
    let mut counters = snapshot.clone();
    if let Some(map) = counters.as_object_mut() {
        map.remove("ts");
    }
    counters
}
