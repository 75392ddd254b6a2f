use tlx_core::{time, TlxError, TlxResult};

use super::{contains_ci, newest_first, oldest_first, ManagementStore};
use crate::models::*;

/// Normalised contact columns. Email is trimmed and lowercased, phone
/// trimmed; blanks become `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContactFields {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub consent_at: Option<String>,
    pub meta_json: Option<String>,
}

pub fn normalize_email(value: Option<&str>) -> Option<String> {
    value
        .map(|v| v.trim().to_lowercase())
        .filter(|v| !v.is_empty())
}

pub fn normalize_phone(value: Option<&str>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl ManagementStore {
    // ─── Campaigns ─────────────────────────────────────────────────────────

    pub fn create_campaign(&self, tenant_id: i64, req: &CampaignCreateIn) -> Campaign {
        let now = time::now();
        let id = self.ids.campaign.next();
        let campaign = Campaign {
            id,
            tenant_id,
            name: req.name.clone(),
            objective: req.objective.clone(),
            status: req.status,
            start_at: req.start_at.clone(),
            end_at: req.end_at.clone(),
            created_at: now,
            updated_at: now,
        };
        self.campaigns.insert(id, campaign.clone());
        campaign
    }

    pub fn campaign(&self, tenant_id: i64, id: i64) -> Option<Campaign> {
        self.campaigns
            .get(&id)
            .filter(|r| r.value().tenant_id == tenant_id)
            .map(|r| r.value().clone())
    }

    pub fn list_campaigns(&self, tenant_id: i64, page: Page) -> Vec<Campaign> {
        page.apply(newest_first(&self.campaigns, |c| c.tenant_id == tenant_id))
    }

    pub fn update_campaign(&self, tenant_id: i64, id: i64, patch: &CampaignUpdateIn) -> TlxResult<Campaign> {
        let mut row = self
            .campaigns
            .get_mut(&id)
            .filter(|r| r.value().tenant_id == tenant_id)
            .ok_or_else(|| TlxError::not_found("Campaign not found"))?;
        let c = row.value_mut();
        if let Some(name) = &patch.name {
            c.name = name.clone();
        }
        if let Some(status) = patch.status {
            c.status = status;
        }
        tlx_core::patch::apply(&mut c.objective, patch.objective.clone());
        tlx_core::patch::apply(&mut c.start_at, patch.start_at.clone());
        tlx_core::patch::apply(&mut c.end_at, patch.end_at.clone());
        c.updated_at = time::now();
        Ok(c.clone())
    }

    /// Ads and queued deliveries keep their rows without the campaign.
    pub fn delete_campaign(&self, tenant_id: i64, id: i64) -> bool {
        if self
            .campaigns
            .remove_if(&id, |_, c| c.tenant_id == tenant_id)
            .is_none()
        {
            return false;
        }
        for mut ad in self.ads.iter_mut() {
            if ad.campaign_id == Some(id) {
                ad.campaign_id = None;
            }
        }
        for mut row in self.deliveries.iter_mut() {
            if row.campaign_id == Some(id) {
                row.campaign_id = None;
            }
        }
        true
    }

    // ─── Contacts ──────────────────────────────────────────────────────────

    /// Email and phone are unique per tenant. `skip` excludes the row being
    /// updated.
    fn contact_clash(&self, tenant_id: i64, fields: &ContactFields, skip: Option<i64>) -> bool {
        self.contacts.iter().any(|r| {
            let c = r.value();
            c.tenant_id == tenant_id
                && Some(c.id) != skip
                && ((fields.email.is_some() && c.email == fields.email)
                    || (fields.phone.is_some() && c.phone == fields.phone))
        })
    }

    pub fn create_contact(&self, tenant_id: i64, fields: ContactFields) -> TlxResult<Contact> {
        if fields.email.is_none() && fields.phone.is_none() {
            return Err(TlxError::bad_request("email or phone is required"));
        }
        let _guard = self.unique_lock.lock();
        if self.contact_clash(tenant_id, &fields, None) {
            return Err(TlxError::conflict("Contact already exists (email/phone)"));
        }
        let now = time::now();
        let id = self.ids.contact.next();
        let contact = Contact {
            id,
            tenant_id,
            name: fields.name,
            email: fields.email,
            phone: fields.phone,
            consent_at: fields.consent_at,
            meta_json: fields.meta_json,
            created_at: now,
            updated_at: now,
        };
        self.contacts.insert(id, contact.clone());
        Ok(contact)
    }

    pub fn contact(&self, tenant_id: i64, id: i64) -> Option<Contact> {
        self.contacts
            .get(&id)
            .filter(|r| r.value().tenant_id == tenant_id)
            .map(|r| r.value().clone())
    }

    /// Newest first; `q` matches name, email or phone.
    pub fn list_contacts(&self, tenant_id: i64, q: Option<&str>, page: Page) -> Vec<Contact> {
        let q = q.filter(|q| !q.is_empty()).map(str::to_lowercase);
        let rows = newest_first(&self.contacts, |c| {
            c.tenant_id == tenant_id
                && q.as_deref().map_or(true, |q| {
                    [&c.name, &c.email, &c.phone]
                        .into_iter()
                        .flatten()
                        .any(|v| contains_ci(v, q))
                })
        });
        page.apply(rows)
    }

    /// Replace the contact's columns with `fields` (already merged with the
    /// current row by the caller).
    pub fn update_contact(&self, tenant_id: i64, id: i64, fields: ContactFields) -> TlxResult<Contact> {
        let _guard = self.unique_lock.lock();
        if self.contact(tenant_id, id).is_none() {
            return Err(TlxError::not_found("Contact not found"));
        }
        if self.contact_clash(tenant_id, &fields, Some(id)) {
            return Err(TlxError::conflict("Contact already exists (email/phone)"));
        }
        let mut row = self
            .contacts
            .get_mut(&id)
            .ok_or_else(|| TlxError::not_found("Contact not found"))?;
        row.name = fields.name;
        row.email = fields.email;
        row.phone = fields.phone;
        row.consent_at = fields.consent_at;
        row.meta_json = fields.meta_json;
        row.updated_at = time::now();
        Ok(row.clone())
    }

    pub fn delete_contact(&self, tenant_id: i64, id: i64) -> bool {
        if self
            .contacts
            .remove_if(&id, |_, c| c.tenant_id == tenant_id)
            .is_none()
        {
            return false;
        }
        self.segment_members.retain(|_, m| m.contact_id != id);
        true
    }

    // ─── Segments ──────────────────────────────────────────────────────────

    fn segment_name_taken(&self, tenant_id: i64, name: &str, skip: Option<i64>) -> bool {
        self.segments
            .iter()
            .any(|r| r.value().tenant_id == tenant_id && r.value().name == name && Some(r.value().id) != skip)
    }

    pub fn create_segment(&self, tenant_id: i64, name: &str) -> TlxResult<Segment> {
        let name = name.trim();
        let _guard = self.unique_lock.lock();
        if self.segment_name_taken(tenant_id, name, None) {
            return Err(TlxError::conflict("Segment already exists"));
        }
        let now = time::now();
        let id = self.ids.segment.next();
        let segment = Segment {
            id,
            tenant_id,
            name: name.to_string(),
            created_at: now,
            updated_at: now,
        };
        self.segments.insert(id, segment.clone());
        Ok(segment)
    }

    pub fn segment(&self, tenant_id: i64, id: i64) -> Option<Segment> {
        self.segments
            .get(&id)
            .filter(|r| r.value().tenant_id == tenant_id)
            .map(|r| r.value().clone())
    }

    pub fn list_segments(&self, tenant_id: i64) -> Vec<Segment> {
        newest_first(&self.segments, |s| s.tenant_id == tenant_id)
    }

    pub fn rename_segment(&self, tenant_id: i64, id: i64, name: &str) -> TlxResult<Segment> {
        let name = name.trim();
        if name.is_empty() {
            return Err(TlxError::bad_request("Invalid name"));
        }
        let _guard = self.unique_lock.lock();
        if self.segment(tenant_id, id).is_none() {
            return Err(TlxError::not_found("Segment not found"));
        }
        if self.segment_name_taken(tenant_id, name, Some(id)) {
            return Err(TlxError::conflict("Segment already exists"));
        }
        let mut row = self
            .segments
            .get_mut(&id)
            .ok_or_else(|| TlxError::not_found("Segment not found"))?;
        row.name = name.to_string();
        row.updated_at = time::now();
        Ok(row.clone())
    }

    pub fn delete_segment(&self, tenant_id: i64, id: i64) -> bool {
        if self
            .segments
            .remove_if(&id, |_, s| s.tenant_id == tenant_id)
            .is_none()
        {
            return false;
        }
        self.segment_members.retain(|_, m| m.segment_id != id);
        true
    }

    /// Contacts of a segment, most recently added first.
    pub fn segment_members(&self, tenant_id: i64, segment_id: i64) -> TlxResult<Vec<SegmentMemberOut>> {
        if self.segment(tenant_id, segment_id).is_none() {
            return Err(TlxError::not_found("Segment not found"));
        }
        Ok(newest_first(&self.segment_members, |m| m.segment_id == segment_id)
            .into_iter()
            .filter_map(|m| self.contact(tenant_id, m.contact_id))
            .map(|c| SegmentMemberOut {
                id: c.id,
                name: c.name,
                email: c.email,
                phone: c.phone,
                consent_at: c.consent_at,
            })
            .collect())
    }

    /// Contacts of a segment in the order they were added.
    pub fn segment_contacts(&self, tenant_id: i64, segment_id: i64) -> Vec<Contact> {
        oldest_first(&self.segment_members, |m| m.segment_id == segment_id)
            .into_iter()
            .filter_map(|m| self.contact(tenant_id, m.contact_id))
            .collect()
    }

    /// Idempotent: adding an existing member is a no-op.
    pub fn add_segment_member(&self, tenant_id: i64, segment_id: i64, contact_id: i64) -> TlxResult<()> {
        if self.segment(tenant_id, segment_id).is_none() {
            return Err(TlxError::not_found("Segment not found"));
        }
        if self.contact(tenant_id, contact_id).is_none() {
            return Err(TlxError::not_found("Contact not found"));
        }
        let _guard = self.unique_lock.lock();
        let exists = self
            .segment_members
            .iter()
            .any(|r| r.value().segment_id == segment_id && r.value().contact_id == contact_id);
        if !exists {
            let id = self.ids.segment_member.next();
            self.segment_members.insert(
                id,
                SegmentMember {
                    id,
                    segment_id,
                    contact_id,
                    created_at: time::now(),
                },
            );
        }
        Ok(())
    }

    pub fn remove_segment_member(&self, tenant_id: i64, segment_id: i64, contact_id: i64) -> TlxResult<()> {
        if self.segment(tenant_id, segment_id).is_none() {
            return Err(TlxError::not_found("Segment not found"));
        }
        let before = self.segment_members.len();
        self.segment_members
            .retain(|_, m| !(m.segment_id == segment_id && m.contact_id == contact_id));
        if self.segment_members.len() == before {
            return Err(TlxError::not_found("Member not found"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tlx_core::CampaignStatus;

    fn contact(email: Option<&str>, phone: Option<&str>) -> ContactFields {
        ContactFields {
            name: Some("Ana".into()),
            email: normalize_email(email),
            phone: normalize_phone(phone),
            ..Default::default()
        }
    }

    #[test]
    fn contact_requires_email_or_phone_and_is_unique() {
        let store = ManagementStore::new();
        assert_eq!(store.create_contact(1, contact(None, Some("  "))).unwrap_err().status_code(), 400);

        let c = store.create_contact(1, contact(Some(" Ana@X.io "), None)).unwrap();
        assert_eq!(c.email.as_deref(), Some("ana@x.io"));
        let dup = store.create_contact(1, contact(Some("ana@x.io"), None));
        assert_eq!(dup.unwrap_err().status_code(), 409);
        assert!(store.create_contact(2, contact(Some("ana@x.io"), None)).is_ok());
    }

    #[test]
    fn contact_search_and_update_clash() {
        let store = ManagementStore::new();
        let a = store.create_contact(1, contact(Some("a@x.io"), Some("+5511"))).unwrap();
        store.create_contact(1, contact(Some("b@x.io"), None)).unwrap();
        let page = Page::new(None, None).unwrap();
        assert_eq!(store.list_contacts(1, Some("5511"), page).len(), 1);
        assert_eq!(store.list_contacts(1, Some("ANA"), page).len(), 2);

        let clash = store.update_contact(1, a.id, contact(Some("b@x.io"), None));
        assert_eq!(clash.unwrap_err().status_code(), 409);
        let same = store.update_contact(1, a.id, contact(Some("a@x.io"), None)).unwrap();
        assert_eq!(same.phone, None);
    }

    #[test]
    fn campaign_patch_is_tri_state() {
        let store = ManagementStore::new();
        let c = store.create_campaign(
            1,
            &CampaignCreateIn {
                name: "Launch".into(),
                objective: Some("leads".into()),
                status: CampaignStatus::Active,
                start_at: None,
                end_at: None,
            },
        );
        let patch: CampaignUpdateIn =
            serde_json::from_str(r#"{"objective": null, "status": "paused"}"#).unwrap();
        let updated = store.update_campaign(1, c.id, &patch).unwrap();
        assert_eq!(updated.objective, None);
        assert_eq!(updated.status, CampaignStatus::Paused);
        assert_eq!(updated.name, "Launch");
        assert_eq!(store.update_campaign(2, c.id, &patch).unwrap_err().status_code(), 404);
    }

    #[test]
    fn segment_membership() {
        let store = ManagementStore::new();
        let seg = store.create_segment(1, " VIP ").unwrap();
        assert_eq!(seg.name, "VIP");
        assert_eq!(store.create_segment(1, "VIP").unwrap_err().status_code(), 409);

        let a = store.create_contact(1, contact(Some("a@x.io"), None)).unwrap();
        let b = store.create_contact(1, contact(None, Some("+55"))).unwrap();
        store.add_segment_member(1, seg.id, a.id).unwrap();
        store.add_segment_member(1, seg.id, b.id).unwrap();
        store.add_segment_member(1, seg.id, a.id).unwrap();

        let members = store.segment_members(1, seg.id).unwrap();
        assert_eq!(members.iter().map(|m| m.id).collect::<Vec<_>>(), vec![b.id, a.id]);
        assert_eq!(store.segment_contacts(1, seg.id)[0].id, a.id);

        store.remove_segment_member(1, seg.id, a.id).unwrap();
        assert_eq!(store.remove_segment_member(1, seg.id, a.id).unwrap_err().status_code(), 404);
        assert_eq!(store.add_segment_member(1, seg.id, 999).unwrap_err().to_string(), "Contact not found");

        store.delete_contact(1, b.id);
        assert!(store.segment_members(1, seg.id).unwrap().is_empty());
    }

    #[test]
    fn rename_segment_validates() {
        let store = ManagementStore::new();
        let a = store.create_segment(1, "A").unwrap();
        store.create_segment(1, "B").unwrap();
        assert_eq!(store.rename_segment(1, a.id, "  ").unwrap_err().to_string(), "Invalid name");
        assert_eq!(store.rename_segment(1, a.id, "B").unwrap_err().status_code(), 409);
        assert_eq!(store.rename_segment(1, a.id, "C").unwrap().name, "C");
    }
}
