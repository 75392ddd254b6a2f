//! Tenant dashboard — click/conversion aggregation and delivery SLA figures.
//!
//! Everything is computed on demand from the management store; windows are
//! whole UTC days ending today.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tlx_core::time::{self, day_key};
use tlx_core::{MetricEventType, QueueStatus};
use tlx_management::models::{MetricEvent, QueuedDelivery};
use tlx_management::ManagementStore;

/// Bucket name for deliveries and ads outside any campaign.
pub const NO_CAMPAIGN: &str = "No campaign";

/// Clicks over impressions, 0 when nothing was shown.
pub fn ctr(clicks: u64, impressions: u64) -> f64 {
    if impressions == 0 {
        0.0
    } else {
        clicks as f64 / impressions as f64
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardOut {
    pub clicks: u64,
    pub conversions: u64,
    pub impressions_proxy: u64,
    pub ctr_proxy: f64,
    pub ts: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryPoint {
    pub day: String,
    pub clicks: u64,
    pub conversions: u64,
    pub impressions_proxy: u64,
    pub ctr_proxy: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelPoint {
    pub channel: String,
    pub clicks: u64,
    pub conversions: u64,
    pub impressions_proxy: u64,
    pub ctr_proxy: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignPoint {
    pub campaign_id: Option<i64>,
    pub campaign_name: String,
    pub total: u64,
    pub sent: u64,
    pub failed: u64,
    pub retrying: u64,
    pub queued: u64,
    pub sending: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignConversionPoint {
    pub campaign_id: Option<i64>,
    pub campaign_name: String,
    pub clicks: u64,
    pub conversions: u64,
}

/// `days` plus the points of the window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Series<T> {
    pub days: u32,
    pub points: Vec<T>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SlaOut {
    pub days: u32,
    pub total: u64,
    pub sent: u64,
    pub failed: u64,
    pub retrying: u64,
    pub queued: u64,
    pub sending: u64,
    pub avg_attempts: f64,
    pub avg_time_sec: f64,
    pub failure_rate: f64,
}

#[derive(Debug, Clone, Copy, Default)]
struct EventTotals {
    clicks: u64,
    conversions: u64,
    impressions: u64,
}

impl EventTotals {
    fn add(&mut self, event: &MetricEvent) {
        let value = event.value.max(0) as u64;
        match event.event_type {
            MetricEventType::Click => self.clicks += value,
            MetricEventType::Conversion => self.conversions += value,
            MetricEventType::Impression => self.impressions += value,
        }
    }

    /// Without impression events the click count stands in.
    fn impressions_proxy(&self) -> u64 {
        if self.impressions == 0 {
            self.clicks
        } else {
            self.impressions
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct StatusCounts {
    sent: u64,
    failed: u64,
    retrying: u64,
    queued: u64,
    sending: u64,
}

impl StatusCounts {
    fn add(&mut self, status: QueueStatus) {
        match status {
            QueueStatus::Sent => self.sent += 1,
            QueueStatus::Failed => self.failed += 1,
            QueueStatus::Retrying => self.retrying += 1,
            QueueStatus::Queued => self.queued += 1,
            QueueStatus::Sending => self.sending += 1,
        }
    }

    fn total(&self) -> u64 {
        self.sent + self.failed + self.retrying + self.queued + self.sending
    }
}

/// Midnight (UTC) of the first day of a `days`-long window ending today.
pub fn window_start(now: DateTime<Utc>, days: u32) -> DateTime<Utc> {
    let today = now.date_naive();
    let first = today - Duration::days(i64::from(days.max(1)) - 1);
    first.and_time(chrono::NaiveTime::MIN).and_utc()
}

// ─── Pure aggregations ─────────────────────────────────────────────────────

pub fn summarize(events: &[MetricEvent]) -> DashboardOut {
    let mut totals = EventTotals::default();
    for event in events {
        totals.add(event);
    }
    // Headline proxy is always the click count.
    let impressions_proxy = totals.clicks;
    DashboardOut {
        clicks: totals.clicks,
        conversions: totals.conversions,
        impressions_proxy,
        ctr_proxy: ctr(totals.clicks, impressions_proxy),
        ts: time::now_iso(),
    }
}

/// One point per day of the window, oldest first, zero-filled.
pub fn history(events: &[MetricEvent], now: DateTime<Utc>, days: u32) -> Vec<HistoryPoint> {
    let start = window_start(now, days);
    let mut by_day: HashMap<String, EventTotals> = HashMap::new();
    for event in events.iter().filter(|e| e.created_at >= start) {
        by_day.entry(day_key(event.created_at)).or_default().add(event);
    }

    let first: NaiveDate = start.date_naive();
    (0..i64::from(days))
        .map(|offset| {
            let day = (first + Duration::days(offset)).format("%Y-%m-%d").to_string();
            let totals = by_day.get(&day).copied().unwrap_or_default();
            let impressions = totals.impressions_proxy();
            HistoryPoint {
                day,
                clicks: totals.clicks,
                conversions: totals.conversions,
                impressions_proxy: impressions,
                ctr_proxy: ctr(totals.clicks, impressions),
            }
        })
        .collect()
}

/// Totals per ad channel, sorted by channel name. Events without a known
/// ad are left out.
pub fn channels(events: &[MetricEvent], ad_channel: impl Fn(i64) -> Option<String>) -> Vec<ChannelPoint> {
    let mut by_channel: BTreeMap<String, EventTotals> = BTreeMap::new();
    for event in events {
        let Some(channel) = event.ad_id.and_then(&ad_channel) else {
            continue;
        };
        by_channel.entry(channel).or_default().add(event);
    }
    by_channel
        .into_iter()
        .map(|(channel, totals)| {
            let impressions = totals.impressions_proxy();
            ChannelPoint {
                channel,
                clicks: totals.clicks,
                conversions: totals.conversions,
                impressions_proxy: impressions,
                ctr_proxy: ctr(totals.clicks, impressions),
            }
        })
        .collect()
}

/// Delivery status counts per campaign, largest first.
pub fn campaign_deliveries(
    deliveries: &[QueuedDelivery],
    campaign_name: impl Fn(i64) -> Option<String>,
) -> Vec<CampaignPoint> {
    let mut by_campaign: HashMap<Option<i64>, StatusCounts> = HashMap::new();
    for d in deliveries {
        by_campaign.entry(d.campaign_id).or_default().add(d.status);
    }

    let mut points: Vec<CampaignPoint> = by_campaign
        .into_iter()
        .map(|(campaign_id, counts)| CampaignPoint {
            campaign_id,
            campaign_name: campaign_id
                .and_then(&campaign_name)
                .unwrap_or_else(|| NO_CAMPAIGN.to_string()),
            total: counts.total(),
            sent: counts.sent,
            failed: counts.failed,
            retrying: counts.retrying,
            queued: counts.queued,
            sending: counts.sending,
        })
        .collect();
    points.sort_by(|a, b| (b.total, &b.campaign_name).cmp(&(a.total, &a.campaign_name)));
    points
}

/// Clicks and conversions per campaign of the clicked ad, best first.
/// `ad_campaign` returns `None` for unknown ads and `Some(None)` for ads
/// outside any campaign.
pub fn campaign_conversions(
    events: &[MetricEvent],
    ad_campaign: impl Fn(i64) -> Option<Option<i64>>,
    campaign_name: impl Fn(i64) -> Option<String>,
) -> Vec<CampaignConversionPoint> {
    let mut by_campaign: HashMap<Option<i64>, EventTotals> = HashMap::new();
    for event in events {
        let Some(campaign_id) = event.ad_id.and_then(&ad_campaign) else {
            continue;
        };
        by_campaign.entry(campaign_id).or_default().add(event);
    }

    let mut points: Vec<CampaignConversionPoint> = by_campaign
        .into_iter()
        .map(|(campaign_id, totals)| CampaignConversionPoint {
            campaign_id,
            campaign_name: campaign_id
                .and_then(&campaign_name)
                .unwrap_or_else(|| NO_CAMPAIGN.to_string()),
            clicks: totals.clicks,
            conversions: totals.conversions,
        })
        .collect();
    points.sort_by(|a, b| {
        (b.conversions, b.clicks, &b.campaign_name).cmp(&(a.conversions, a.clicks, &a.campaign_name))
    });
    points
}

/// Queue health: counts, mean attempts, and mean seconds from enqueue to
/// the final status over rows that reached one.
pub fn sla(deliveries: &[QueuedDelivery], days: u32) -> SlaOut {
    let mut counts = StatusCounts::default();
    let mut attempts_sum = 0u64;
    let mut time_sum = 0f64;
    let mut time_count = 0u64;

    for d in deliveries {
        counts.add(d.status);
        attempts_sum += u64::from(d.attempts);
        if d.status.is_terminal() {
            let secs = (d.updated_at - d.created_at).num_milliseconds() as f64 / 1000.0;
            time_sum += secs.max(0.0);
            time_count += 1;
        }
    }

    let total = deliveries.len() as u64;
    let ratio = |n: f64, d: u64| if d == 0 { 0.0 } else { n / d as f64 };
    SlaOut {
        days,
        total,
        sent: counts.sent,
        failed: counts.failed,
        retrying: counts.retrying,
        queued: counts.queued,
        sending: counts.sending,
        avg_attempts: ratio(attempts_sum as f64, total),
        avg_time_sec: ratio(time_sum, time_count),
        failure_rate: ratio(counts.failed as f64, total),
    }
}

// ─── Store-backed facade ───────────────────────────────────────────────────

/// Computes the dashboards of one tenant from the management store.
#[derive(Clone)]
pub struct Dashboards {
    store: Arc<ManagementStore>,
}

impl Dashboards {
    pub fn new(store: Arc<ManagementStore>) -> Self {
        Self { store }
    }

    pub fn summary(&self, tenant_id: i64) -> DashboardOut {
        summarize(&self.store.events(tenant_id, None))
    }

    pub fn history(&self, tenant_id: i64, days: u32) -> Series<HistoryPoint> {
        let now = time::now();
        let events = self.store.events(tenant_id, Some(window_start(now, days)));
        Series {
            days,
            points: history(&events, now, days),
        }
    }

    pub fn channels(&self, tenant_id: i64, days: u32) -> Series<ChannelPoint> {
        let events = self.store.events(tenant_id, Some(window_start(time::now(), days)));
        let points = channels(&events, |ad_id| self.store.ad(tenant_id, ad_id).map(|ad| ad.channel));
        Series { days, points }
    }

    pub fn campaigns(&self, tenant_id: i64, days: u32) -> Series<CampaignPoint> {
        let deliveries = self
            .store
            .deliveries_since(tenant_id, window_start(time::now(), days));
        let points = campaign_deliveries(&deliveries, |id| self.campaign_name(tenant_id, id));
        Series { days, points }
    }

    pub fn campaign_conversions(&self, tenant_id: i64, days: u32) -> Series<CampaignConversionPoint> {
        let events = self.store.events(tenant_id, Some(window_start(time::now(), days)));
        let points = campaign_conversions(
            &events,
            |ad_id| self.store.ad(tenant_id, ad_id).map(|ad| ad.campaign_id),
            |id| self.campaign_name(tenant_id, id),
        );
        Series { days, points }
    }

    pub fn sla(&self, tenant_id: i64, days: u32) -> SlaOut {
        let deliveries = self
            .store
            .deliveries_since(tenant_id, window_start(time::now(), days));
        sla(&deliveries, days)
    }

    fn campaign_name(&self, tenant_id: i64, campaign_id: i64) -> Option<String> {
        self.store.campaign(tenant_id, campaign_id).map(|c| c.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn event(ad_id: Option<i64>, event_type: MetricEventType, at: DateTime<Utc>) -> MetricEvent {
        MetricEvent {
            id: 0,
            tenant_id: 1,
            ad_id,
            link_id: None,
            event_type,
            value: 1,
            created_at: at,
        }
    }

    fn delivery(campaign_id: Option<i64>, status: QueueStatus, attempts: u32, secs: i64) -> QueuedDelivery {
        let created = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        QueuedDelivery {
            id: 0,
            tenant_id: 1,
            campaign_id,
            channel: "email".into(),
            to_addr: "a@b.c".into(),
            payload: json!({}),
            idempotency_key: "k".into(),
            status,
            attempts,
            max_attempts: 5,
            next_attempt_at: None,
            last_error: None,
            created_at: created,
            updated_at: created + Duration::seconds(secs),
        }
    }

    #[test]
    fn ctr_handles_zero() {
        assert_eq!(ctr(0, 0), 0.0);
        assert_eq!(ctr(1, 4), 0.25);
    }

    #[test]
    fn window_starts_at_midnight() {
        let now = Utc.with_ymd_and_hms(2024, 5, 10, 15, 30, 0).unwrap();
        assert_eq!(window_start(now, 1), Utc.with_ymd_and_hms(2024, 5, 10, 0, 0, 0).unwrap());
        assert_eq!(window_start(now, 14), Utc.with_ymd_and_hms(2024, 4, 27, 0, 0, 0).unwrap());
    }

    #[test]
    fn summary_uses_clicks_as_impressions() {
        let now = Utc::now();
        let events = vec![
            event(None, MetricEventType::Click, now),
            event(None, MetricEventType::Click, now),
            event(None, MetricEventType::Conversion, now),
            event(None, MetricEventType::Impression, now),
        ];
        let out = summarize(&events);
        assert_eq!((out.clicks, out.conversions, out.impressions_proxy), (2, 1, 2));
        assert_eq!(out.ctr_proxy, 1.0);
    }

    #[test]
    fn history_zero_fills_and_prefers_impressions() {
        let now = Utc.with_ymd_and_hms(2024, 5, 10, 15, 0, 0).unwrap();
        let yesterday = now - Duration::days(1);
        let events = vec![
            event(None, MetricEventType::Click, now),
            event(None, MetricEventType::Click, yesterday),
            event(None, MetricEventType::Impression, yesterday),
            event(None, MetricEventType::Impression, yesterday),
            event(None, MetricEventType::Impression, yesterday),
            event(None, MetricEventType::Impression, yesterday),
        ];
        let points = history(&events, now, 3);
        assert_eq!(points.len(), 3);
        assert_eq!(points[0].day, "2024-05-08");
        assert_eq!(points[0].clicks, 0);
        assert_eq!(points[1].impressions_proxy, 4);
        assert_eq!(points[1].ctr_proxy, 0.25);
        assert_eq!(points[2].day, "2024-05-10");
        assert_eq!(points[2].impressions_proxy, 1);
    }

    #[test]
    fn channels_skip_events_without_ads() {
        let now = Utc::now();
        let events = vec![
            event(Some(1), MetricEventType::Click, now),
            event(Some(2), MetricEventType::Conversion, now),
            event(None, MetricEventType::Click, now),
        ];
        let lookup = |id: i64| match id {
            1 => Some("whatsapp".to_string()),
            2 => Some("email".to_string()),
            _ => None,
        };
        let points = channels(&events, lookup);
        assert_eq!(points.iter().map(|p| p.channel.as_str()).collect::<Vec<_>>(), ["email", "whatsapp"]);
        assert_eq!(points[1].clicks, 1);
    }

    #[test]
    fn campaign_buckets_sorted_by_total() {
        let rows = vec![
            delivery(Some(7), QueueStatus::Sent, 1, 5),
            delivery(None, QueueStatus::Failed, 5, 60),
            delivery(None, QueueStatus::Queued, 0, 0),
            delivery(None, QueueStatus::Sent, 1, 1),
        ];
        let points = campaign_deliveries(&rows, |id| (id == 7).then(|| "Spring".to_string()));
        assert_eq!(points[0].campaign_name, NO_CAMPAIGN);
        assert_eq!(points[0].campaign_id, None);
        assert_eq!((points[0].total, points[0].failed, points[0].queued), (3, 1, 1));
        assert_eq!(points[1].campaign_name, "Spring");
    }

    #[test]
    fn conversions_sorted_by_conversions_then_clicks() {
        let now = Utc::now();
        let events = vec![
            event(Some(1), MetricEventType::Click, now),
            event(Some(1), MetricEventType::Click, now),
            event(Some(2), MetricEventType::Conversion, now),
            event(Some(3), MetricEventType::Click, now),
        ];
        let ad_campaign = |ad: i64| match ad {
            1 => Some(Some(10)),
            2 => Some(Some(20)),
            3 => Some(None),
            _ => None,
        };
        let names = |id: i64| Some(format!("c{id}"));
        let points = campaign_conversions(&events, ad_campaign, names);
        assert_eq!(points[0].campaign_name, "c20");
        assert_eq!(points[1].campaign_name, "c10");
        assert_eq!(points[2].campaign_name, NO_CAMPAIGN);
    }

    #[test]
    fn sla_averages() {
        let rows = vec![
            delivery(None, QueueStatus::Sent, 1, 10),
            delivery(None, QueueStatus::Failed, 5, 30),
            delivery(None, QueueStatus::Retrying, 2, 100),
            delivery(None, QueueStatus::Queued, 0, 0),
        ];
        let out = sla(&rows, 30);
        assert_eq!(out.total, 4);
        assert_eq!(out.avg_attempts, 2.0);
        assert_eq!(out.avg_time_sec, 20.0);
        assert_eq!(out.failure_rate, 0.25);

        let empty = sla(&[], 7);
        assert_eq!((empty.days, empty.total, empty.failure_rate), (7, 0, 0.0));
    }
}
