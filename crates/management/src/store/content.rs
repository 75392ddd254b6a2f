use chrono::{DateTime, Utc};
use tlx_core::ids::generate_slug;
use tlx_core::time::{self, parse_iso8601};
use tlx_core::{AdStatus, DeliveryResult, MetricEventType, TlxError, TlxResult, Variables};

use super::{contains_ci, newest_first, oldest_first, ManagementStore};
use crate::models::*;

/// Fields of a new ad after rendering.
#[derive(Debug, Clone)]
pub struct NewAd {
    pub title: String,
    pub body: String,
    pub rendered_body: Option<String>,
    pub target_url: Option<String>,
    pub channel: String,
    pub target: Option<String>,
    pub campaign_id: Option<i64>,
    pub template_id: Option<i64>,
    pub variables: Variables,
}

const SLUG_ATTEMPTS: usize = 10;

impl ManagementStore {
    // ─── Ads ───────────────────────────────────────────────────────────────

    pub fn create_ad(&self, tenant_id: i64, owner_user_id: i64, new: NewAd) -> Ad {
        let now = time::now();
        let id = self.ids.ad.next();
        let ad = Ad {
            id,
            tenant_id,
            owner_user_id,
            title: new.title,
            body: new.body,
            rendered_body: new.rendered_body,
            target_url: new.target_url,
            channel: new.channel,
            target: new.target,
            campaign_id: new.campaign_id,
            template_id: new.template_id,
            variables: new.variables,
            status: AdStatus::Draft,
            scheduled_at: None,
            created_at: now,
            updated_at: now,
        };
        self.ads.insert(id, ad.clone());
        ad
    }

    pub fn ad(&self, tenant_id: i64, id: i64) -> Option<Ad> {
        self.ads
            .get(&id)
            .filter(|r| r.value().tenant_id == tenant_id)
            .map(|r| r.value().clone())
    }

    /// Newest first; `q` matches title or body.
    pub fn list_ads(&self, tenant_id: i64, filter: &AdListQuery, page: Page) -> Vec<Ad> {
        let q = filter
            .q
            .as_deref()
            .filter(|q| !q.is_empty())
            .map(str::to_lowercase);
        let channel = filter.channel.as_deref().filter(|c| !c.is_empty());
        let rows = newest_first(&self.ads, |ad| {
            ad.tenant_id == tenant_id
                && filter.status.map_or(true, |s| ad.status == s)
                && channel.map_or(true, |c| ad.channel == c)
                && filter.campaign_id.map_or(true, |c| ad.campaign_id == Some(c))
                && q
                    .as_deref()
                    .map_or(true, |q| contains_ci(&ad.title, q) || contains_ci(&ad.body, q))
        });
        page.apply(rows)
    }

    /// Mutate an ad in place and bump `updated_at`.
    pub fn update_ad(&self, tenant_id: i64, id: i64, apply: impl FnOnce(&mut Ad)) -> TlxResult<Ad> {
        let mut row = self
            .ads
            .get_mut(&id)
            .filter(|r| r.value().tenant_id == tenant_id)
            .ok_or_else(|| TlxError::not_found("Ad not found"))?;
        apply(row.value_mut());
        row.updated_at = time::now();
        Ok(row.clone())
    }

    /// Remove an ad with its delivery log. Links and events keep their rows
    /// but lose the reference.
    pub fn delete_ad(&self, tenant_id: i64, id: i64) -> bool {
        if self.ads.remove_if(&id, |_, ad| ad.tenant_id == tenant_id).is_none() {
            return false;
        }
        self.ad_deliveries.retain(|_, d| d.ad_id != id);
        for mut link in self.links.iter_mut() {
            if link.ad_id == Some(id) {
                link.ad_id = None;
            }
        }
        for mut event in self.events.iter_mut() {
            if event.ad_id == Some(id) {
                event.ad_id = None;
            }
        }
        true
    }

    pub fn schedule_ad(&self, tenant_id: i64, id: i64, scheduled_at: &str) -> TlxResult<Ad> {
        self.update_ad(tenant_id, id, |ad| {
            ad.status = AdStatus::Scheduled;
            ad.scheduled_at = Some(scheduled_at.to_string());
        })
    }

    /// Scheduled ads whose `scheduled_at` has passed, oldest first. Rows with
    /// an unparseable timestamp are skipped.
    pub fn due_ads(&self, now: DateTime<Utc>) -> Vec<Ad> {
        oldest_first(&self.ads, |ad| {
            ad.status == AdStatus::Scheduled
                && ad
                    .scheduled_at
                    .as_deref()
                    .and_then(parse_iso8601)
                    .is_some_and(|at| at <= now)
        })
    }

    /// Move every due ad from `scheduled` to `sent` and return the ones this
    /// call moved. Concurrent callers never get the same ad.
    pub fn claim_due_ads(&self, now: DateTime<Utc>) -> Vec<Ad> {
        let _guard = self.unique_lock.lock();
        let stamp = time::now();
        self.due_ads(now)
            .into_iter()
            .filter_map(|ad| {
                let mut row = self.ads.get_mut(&ad.id)?;
                if row.status != AdStatus::Scheduled {
                    return None;
                }
                row.status = AdStatus::Sent;
                row.updated_at = stamp;
                Some(row.clone())
            })
            .collect()
    }

    /// Put a claimed ad back to `scheduled` when it could not be sent.
    pub fn unclaim_ad(&self, id: i64) -> Option<Ad> {
        let mut row = self.ads.get_mut(&id)?;
        if row.status == AdStatus::Sent {
            row.status = AdStatus::Scheduled;
            row.updated_at = time::now();
        }
        Some(row.clone())
    }

    pub fn record_ad_delivery(&self, ad_id: i64, result: DeliveryResult, details: impl Into<String>) -> AdDelivery {
        let id = self.ids.ad_delivery.next();
        let delivery = AdDelivery {
            id,
            ad_id,
            delivered_at: time::now(),
            result,
            details: Some(details.into()),
        };
        self.ad_deliveries.insert(id, delivery.clone());
        delivery
    }

    pub fn ad_deliveries(&self, ad_id: i64) -> Vec<AdDelivery> {
        newest_first(&self.ad_deliveries, |d| d.ad_id == ad_id)
    }

    // ─── Templates ─────────────────────────────────────────────────────────

    pub fn create_template(&self, tenant_id: i64, name: &str, body: &str) -> Template {
        let now = time::now();
        let id = self.ids.template.next();
        let template = Template {
            id,
            tenant_id,
            name: name.to_string(),
            body: body.to_string(),
            created_at: now,
            updated_at: now,
        };
        self.templates.insert(id, template.clone());
        template
    }

    pub fn template(&self, tenant_id: i64, id: i64) -> Option<Template> {
        self.templates
            .get(&id)
            .filter(|r| r.value().tenant_id == tenant_id)
            .map(|r| r.value().clone())
    }

    pub fn list_templates(&self, tenant_id: i64) -> Vec<Template> {
        newest_first(&self.templates, |t| t.tenant_id == tenant_id)
    }

    pub fn delete_template(&self, tenant_id: i64, id: i64) -> bool {
        self.templates
            .remove_if(&id, |_, t| t.tenant_id == tenant_id)
            .is_some()
    }

    // ─── Short links ───────────────────────────────────────────────────────

    /// Store a link under a fresh 7-character slug, retrying with 8
    /// characters on collision.
    pub fn create_link(&self, tenant_id: i64, ad_id: Option<i64>, destination_url: &str) -> TlxResult<ShortLink> {
        let _guard = self.unique_lock.lock();
        let mut slug = generate_slug(7);
        let mut attempts = 1;
        while self.links.iter().any(|r| r.value().slug == slug) {
            if attempts >= SLUG_ATTEMPTS {
                return Err(TlxError::conflict("Could not allocate a unique slug"));
            }
            slug = generate_slug(8);
            attempts += 1;
        }
        let id = self.ids.link.next();
        let link = ShortLink {
            id,
            tenant_id,
            ad_id,
            slug,
            destination_url: destination_url.to_string(),
            created_at: time::now(),
        };
        self.links.insert(id, link.clone());
        Ok(link)
    }

    pub fn link_by_slug(&self, slug: &str) -> Option<ShortLink> {
        self.links
            .iter()
            .find(|r| r.value().slug == slug)
            .map(|r| r.value().clone())
    }

    // ─── Tracking events ───────────────────────────────────────────────────

    pub fn record_event(
        &self,
        tenant_id: i64,
        ad_id: Option<i64>,
        link_id: Option<i64>,
        event_type: MetricEventType,
    ) -> MetricEvent {
        let id = self.ids.event.next();
        let event = MetricEvent {
            id,
            tenant_id,
            ad_id,
            link_id,
            event_type,
            value: 1,
            created_at: time::now(),
        };
        self.events.insert(id, event.clone());
        event
    }

    /// Events of a tenant, optionally only those at or after `since`.
    pub fn events(&self, tenant_id: i64, since: Option<DateTime<Utc>>) -> Vec<MetricEvent> {
        oldest_first(&self.events, |e| {
            e.tenant_id == tenant_id && since.map_or(true, |s| e.created_at >= s)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn new_ad(title: &str, channel: &str) -> NewAd {
        NewAd {
            title: title.to_string(),
            body: format!("{title} body"),
            rendered_body: None,
            target_url: None,
            channel: channel.to_string(),
            target: None,
            campaign_id: None,
            template_id: None,
            variables: Variables::new(),
        }
    }

    #[test]
    fn ads_are_tenant_scoped_and_filtered() {
        let store = ManagementStore::new();
        store.create_ad(1, 1, new_ad("Promo", "whatsapp"));
        store.create_ad(1, 1, new_ad("Sale", "x"));
        store.create_ad(2, 1, new_ad("Other", "x"));

        let page = Page::new(None, None).unwrap();
        let all = store.list_ads(1, &AdListQuery::default(), page);
        assert_eq!(all.iter().map(|a| a.title.as_str()).collect::<Vec<_>>(), vec!["Sale", "Promo"]);

        let by_channel = AdListQuery {
            channel: Some("x".into()),
            ..Default::default()
        };
        assert_eq!(store.list_ads(1, &by_channel, page).len(), 1);

        let by_text = AdListQuery {
            q: Some("PROMO body".into()),
            ..Default::default()
        };
        assert_eq!(store.list_ads(1, &by_text, page)[0].title, "Promo");
        assert!(store.ad(2, 1).is_none());
    }

    #[test]
    fn due_ads_skip_future_and_garbage() {
        let store = ManagementStore::new();
        let now = time::now();
        let past = store.create_ad(1, 1, new_ad("past", "x"));
        let future = store.create_ad(1, 1, new_ad("future", "x"));
        let broken = store.create_ad(1, 1, new_ad("broken", "x"));
        store.schedule_ad(1, past.id, &time::to_iso(now - Duration::minutes(1))).unwrap();
        store.schedule_ad(1, future.id, &time::to_iso(now + Duration::hours(1))).unwrap();
        store.schedule_ad(1, broken.id, "soon").unwrap();

        let due = store.due_ads(now);
        assert_eq!(due.iter().map(|a| a.id).collect::<Vec<_>>(), vec![past.id]);
    }

    #[test]
    fn due_ads_are_claimed_once() {
        let store = ManagementStore::new();
        let now = time::now();
        let ad = store.create_ad(1, 1, new_ad("due", "x"));
        store.schedule_ad(1, ad.id, &time::to_iso(now - Duration::minutes(1))).unwrap();

        let claimed = store.claim_due_ads(now);
        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].status, AdStatus::Sent);
        assert!(store.claim_due_ads(now).is_empty());

        assert_eq!(store.unclaim_ad(ad.id).unwrap().status, AdStatus::Scheduled);
        assert_eq!(store.claim_due_ads(now).len(), 1);
    }

    #[test]
    fn deleting_an_ad_detaches_links() {
        let store = ManagementStore::new();
        let ad = store.create_ad(1, 1, new_ad("a", "x"));
        let link = store.create_link(1, Some(ad.id), "https://example.com").unwrap();
        store.record_ad_delivery(ad.id, DeliveryResult::Ok, "Simulated delivery");

        assert!(!store.delete_ad(2, ad.id));
        assert!(store.delete_ad(1, ad.id));
        assert!(store.ad_deliveries(ad.id).is_empty());
        assert_eq!(store.link_by_slug(&link.slug).unwrap().ad_id, None);
    }

    #[test]
    fn link_slugs_are_seven_chars_and_unique() {
        let store = ManagementStore::new();
        let a = store.create_link(1, None, "https://a.example").unwrap();
        let b = store.create_link(1, None, "https://b.example").unwrap();
        assert_eq!(a.slug.len(), 7);
        assert_ne!(a.slug, b.slug);
        assert_eq!(store.link_by_slug(&b.slug).unwrap().destination_url, "https://b.example");
    }

    #[test]
    fn events_filter_by_time() {
        let store = ManagementStore::new();
        store.record_event(1, None, None, MetricEventType::Click);
        store.record_event(2, None, None, MetricEventType::Click);
        assert_eq!(store.events(1, None).len(), 1);
        assert!(store
            .events(1, Some(time::now() + Duration::hours(1)))
            .is_empty());
    }
}
