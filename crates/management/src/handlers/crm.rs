//! Campaigns, contacts and segments.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde_json::json;
use tlx_core::{Role, TlxError, TlxResult};

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::models::*;
use crate::state::AppState;
use crate::store::{normalize_email, normalize_phone, ContactFields};

// ─── Campaigns ─────────────────────────────────────────────────────────────

pub async fn list_campaigns(
    State(state): State<AppState>,
    user: AuthUser,
    Query(page): Query<PageQuery>,
) -> ApiResult<Vec<Campaign>> {
    user.require(Role::Viewer)?;
    Ok(Json(state.store.list_campaigns(user.tenant_id, page.page()?)))
}

pub async fn create_campaign(
    State(state): State<AppState>,
    user: AuthUser,
    Json(mut req): Json<CampaignCreateIn>,
) -> ApiResult<Campaign> {
    user.require(Role::Editor)?;
    req.validate()?;
    req.name = req.name.trim().to_string();
    let campaign = state.store.create_campaign(user.tenant_id, &req);
    state.log_audit(&user, "campaigns.create", "campaign", campaign.id, json!({ "name": req.name }));
    metrics::counter!("management.campaigns.created").increment(1);
    Ok(Json(campaign))
}

pub async fn update_campaign(
    State(state): State<AppState>,
    user: AuthUser,
    Path(campaign_id): Path<i64>,
    Json(mut req): Json<CampaignUpdateIn>,
) -> ApiResult<Campaign> {
    user.require(Role::Editor)?;
    req.validate()?;
    let mut changed = req.field_names();
    if changed.is_empty() {
        return Err(TlxError::bad_request("No fields to update").into());
    }
    if let Some(name) = req.name.as_mut() {
        *name = name.trim().to_string();
    }
    let campaign = state.store.update_campaign(user.tenant_id, campaign_id, &req)?;

    changed.push("updated_at");
    changed.sort_unstable();
    state.log_audit(&user, "campaigns.update", "campaign", campaign_id, json!({ "fields": changed }));
    Ok(Json(campaign))
}

pub async fn delete_campaign(
    State(state): State<AppState>,
    user: AuthUser,
    Path(campaign_id): Path<i64>,
) -> ApiResult<Deleted> {
    user.require(Role::Editor)?;
    if !state.store.delete_campaign(user.tenant_id, campaign_id) {
        return Err(TlxError::not_found("Campaign not found").into());
    }
    state.log_audit(&user, "campaigns.delete", "campaign", campaign_id, json!({}));
    Ok(Json(Deleted::YES))
}

// ─── Contacts ──────────────────────────────────────────────────────────────

fn meta_to_json(meta: Option<&serde_json::Map<String, serde_json::Value>>) -> TlxResult<Option<String>> {
    Ok(match meta {
        Some(map) => Some(serde_json::to_string(map)?),
        None => None,
    })
}

pub async fn list_contacts(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ContactListQuery>,
) -> ApiResult<Vec<Contact>> {
    user.require(Role::Viewer)?;
    let page = Page::new(query.limit, query.offset)?;
    Ok(Json(state.store.list_contacts(user.tenant_id, query.q.as_deref(), page)))
}

pub async fn create_contact(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<ContactCreateIn>,
) -> ApiResult<Contact> {
    user.require(Role::Editor)?;
    req.validate()?;
    let fields = ContactFields {
        name: req.name,
        email: normalize_email(req.email.as_deref()),
        phone: normalize_phone(req.phone.as_deref()),
        consent_at: req.consent_at,
        meta_json: meta_to_json(req.meta.as_ref())?,
    };
    let contact = state.store.create_contact(user.tenant_id, fields)?;

    state.log_audit(
        &user,
        "contacts.create",
        "contact",
        contact.id,
        json!({ "email": contact.email, "phone": contact.phone }),
    );
    metrics::counter!("management.contacts.created").increment(1);
    Ok(Json(contact))
}

pub async fn update_contact(
    State(state): State<AppState>,
    user: AuthUser,
    Path(contact_id): Path<i64>,
    Json(req): Json<ContactUpdateIn>,
) -> ApiResult<Contact> {
    user.require(Role::Editor)?;
    req.validate()?;
    let mut changed = req.field_names();
    if changed.is_empty() {
        return Err(TlxError::bad_request("No fields to update").into());
    }
    let current = state
        .store
        .contact(user.tenant_id, contact_id)
        .ok_or_else(|| TlxError::not_found("Contact not found"))?;

    let mut fields = ContactFields {
        name: current.name,
        email: current.email,
        phone: current.phone,
        consent_at: current.consent_at,
        meta_json: current.meta_json,
    };
    if let Some(name) = req.name {
        fields.name = name;
    }
    if let Some(email) = req.email {
        fields.email = normalize_email(email.as_deref());
    }
    if let Some(phone) = req.phone {
        fields.phone = normalize_phone(phone.as_deref());
    }
    if let Some(consent_at) = req.consent_at {
        fields.consent_at = consent_at;
    }
    if let Some(meta) = req.meta {
        fields.meta_json = meta_to_json(meta.as_ref())?;
    }
    let contact = state.store.update_contact(user.tenant_id, contact_id, fields)?;

    changed.push("updated_at");
    changed.sort_unstable();
    state.log_audit(&user, "contacts.update", "contact", contact_id, json!({ "fields": changed }));
    Ok(Json(contact))
}

pub async fn delete_contact(
    State(state): State<AppState>,
    user: AuthUser,
    Path(contact_id): Path<i64>,
) -> ApiResult<Deleted> {
    user.require(Role::Editor)?;
    if !state.store.delete_contact(user.tenant_id, contact_id) {
        return Err(TlxError::not_found("Contact not found").into());
    }
    state.log_audit(&user, "contacts.delete", "contact", contact_id, json!({}));
    Ok(Json(Deleted::YES))
}

// ─── Segments ──────────────────────────────────────────────────────────────

pub async fn list_segments(State(state): State<AppState>, user: AuthUser) -> ApiResult<Vec<Segment>> {
    user.require(Role::Viewer)?;
    Ok(Json(state.store.list_segments(user.tenant_id)))
}

pub async fn create_segment(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<SegmentCreateIn>,
) -> ApiResult<Segment> {
    user.require(Role::Editor)?;
    req.validate()?;
    let segment = state.store.create_segment(user.tenant_id, &req.name)?;
    state.log_audit(&user, "segments.create", "segment", segment.id, json!({ "name": req.name }));
    metrics::counter!("management.segments.created").increment(1);
    Ok(Json(segment))
}

pub async fn update_segment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(segment_id): Path<i64>,
    Json(req): Json<SegmentUpdateIn>,
) -> ApiResult<Segment> {
    user.require(Role::Editor)?;
    req.validate()?;
    let name = req.name.as_deref().unwrap_or_default();
    let segment = state.store.rename_segment(user.tenant_id, segment_id, name)?;
    state.log_audit(&user, "segments.update", "segment", segment_id, json!({ "name": segment.name }));
    Ok(Json(segment))
}

pub async fn delete_segment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(segment_id): Path<i64>,
) -> ApiResult<Deleted> {
    user.require(Role::Editor)?;
    if !state.store.delete_segment(user.tenant_id, segment_id) {
        return Err(TlxError::not_found("Segment not found").into());
    }
    state.log_audit(&user, "segments.delete", "segment", segment_id, json!({}));
    Ok(Json(Deleted::YES))
}

pub async fn list_segment_members(
    State(state): State<AppState>,
    user: AuthUser,
    Path(segment_id): Path<i64>,
) -> ApiResult<Vec<SegmentMemberOut>> {
    user.require(Role::Viewer)?;
    Ok(Json(state.store.segment_members(user.tenant_id, segment_id)?))
}

pub async fn add_segment_member(
    State(state): State<AppState>,
    user: AuthUser,
    Path(segment_id): Path<i64>,
    Json(req): Json<SegmentMemberAddIn>,
) -> ApiResult<Ack> {
    user.require(Role::Editor)?;
    state
        .store
        .add_segment_member(user.tenant_id, segment_id, req.contact_id)?;
    state.log_audit(
        &user,
        "segments.add_member",
        "segment_member",
        format!("{segment_id}:{}", req.contact_id),
        json!({}),
    );
    Ok(Json(Ack::OK))
}

pub async fn remove_segment_member(
    State(state): State<AppState>,
    user: AuthUser,
    Path((segment_id, contact_id)): Path<(i64, i64)>,
) -> ApiResult<Deleted> {
    user.require(Role::Editor)?;
    state
        .store
        .remove_segment_member(user.tenant_id, segment_id, contact_id)?;
    state.log_audit(
        &user,
        "segments.remove_member",
        "segment_member",
        format!("{segment_id}:{contact_id}"),
        json!({}),
    );
    Ok(Json(Deleted::YES))
}
