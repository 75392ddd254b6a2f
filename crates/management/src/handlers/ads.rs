//! Ads, templates and short links.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde_json::json;
use tlx_billing::MonthlyResource;
use tlx_core::patch;
use tlx_core::time::require_iso8601;
use tlx_core::utm::{add_utm, UtmParams};
use tlx_core::{render_template, variables_from_json, AdStatus, Role, TlxError};
use tracing::info;

use super::{ensure_campaign, render_body};
use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::models::*;
use crate::state::AppState;
use crate::store::NewAd;

// ─── Ads ───────────────────────────────────────────────────────────────────

pub async fn list_ads(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<AdListQuery>,
) -> ApiResult<Vec<Ad>> {
    user.require(Role::Viewer)?;
    let page = Page::new(query.limit, query.offset)?;
    Ok(Json(state.store.list_ads(user.tenant_id, &query, page)))
}

pub async fn create_ad(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<AdCreateIn>,
) -> ApiResult<Ad> {
    user.require(Role::Editor)?;
    req.validate()?;
    let tenant_id = user.tenant_id;

    ensure_campaign(&state, tenant_id, req.campaign_id)?;

    let variables = req.variables.as_ref().map(variables_from_json).unwrap_or_default();
    let rendered_body = render_body(&state, tenant_id, &req.body, req.template_id, &variables)?;

    state.meter.reserve_monthly(tenant_id, MonthlyResource::AdsCreated, 1)?;
    let ad = state.store.create_ad(
        tenant_id,
        user.user_id,
        NewAd {
            title: req.title,
            body: req.body,
            rendered_body,
            target_url: req.target_url,
            channel: req.channel,
            target: req.target,
            campaign_id: req.campaign_id,
            template_id: req.template_id,
            variables,
        },
    );

    state.log_audit(&user, "ads.create", "ad", ad.id, json!({ "channel": ad.channel }));
    metrics::counter!("management.ads.created").increment(1);
    info!(tenant_id = tenant_id, ad_id = ad.id, channel = %ad.channel, "Ad created");
    Ok(Json(ad))
}

pub async fn update_ad(
    State(state): State<AppState>,
    user: AuthUser,
    Path(ad_id): Path<i64>,
    Json(req): Json<AdUpdateIn>,
) -> ApiResult<Ad> {
    user.require(Role::Editor)?;
    req.validate()?;
    let tenant_id = user.tenant_id;

    let mut changed = req.field_names();
    if changed.is_empty() {
        return Err(TlxError::bad_request("No fields to update").into());
    }

    let current = state
        .store
        .ad(tenant_id, ad_id)
        .ok_or_else(|| TlxError::not_found("Ad not found"))?;

    if let Some(campaign_id) = req.campaign_id {
        ensure_campaign(&state, tenant_id, campaign_id)?;
    }

    let next_status = req.status.unwrap_or(current.status);
    let next_scheduled_at = match &req.scheduled_at {
        Some(value) => value.clone(),
        None => current.scheduled_at.clone(),
    };
    if let Some(at) = &next_scheduled_at {
        require_iso8601("scheduled_at", at)?;
    }
    if next_status == AdStatus::Scheduled && next_scheduled_at.as_deref().map_or(true, str::is_empty) {
        return Err(TlxError::bad_request("scheduled_at is required when status=scheduled").into());
    }

    let next_variables = match &req.variables {
        Some(Some(values)) => variables_from_json(values),
        Some(None) => Default::default(),
        None => current.variables.clone(),
    };
    let rendered = if req.needs_rerender() {
        let body = req.body.as_deref().unwrap_or(&current.body);
        let template_id = req.template_id.unwrap_or(current.template_id);
        changed.push("rendered_body");
        Some(render_body(&state, tenant_id, body, template_id, &next_variables)?)
    } else {
        None
    };

    let ad = state.store.update_ad(tenant_id, ad_id, |ad| {
        if let Some(title) = req.title {
            ad.title = title;
        }
        if let Some(body) = req.body {
            ad.body = body;
        }
        if let Some(channel) = req.channel {
            ad.channel = channel;
        }
        if let Some(status) = req.status {
            ad.status = status;
        }
        patch::apply(&mut ad.target_url, req.target_url);
        patch::apply(&mut ad.target, req.target);
        patch::apply(&mut ad.campaign_id, req.campaign_id);
        patch::apply(&mut ad.scheduled_at, req.scheduled_at);
        patch::apply(&mut ad.template_id, req.template_id);
        ad.variables = next_variables;
        if let Some(rendered) = rendered {
            ad.rendered_body = rendered;
        }
    })?;

    changed.push("updated_at");
    changed.sort_unstable();
    state.log_audit(&user, "ads.update", "ad", ad_id, json!({ "fields": changed }));
    Ok(Json(ad))
}

pub async fn delete_ad(
    State(state): State<AppState>,
    user: AuthUser,
    Path(ad_id): Path<i64>,
) -> ApiResult<Deleted> {
    user.require(Role::Editor)?;
    if !state.store.delete_ad(user.tenant_id, ad_id) {
        return Err(TlxError::not_found("Ad not found").into());
    }
    state.log_audit(&user, "ads.delete", "ad", ad_id, json!({}));
    metrics::counter!("management.ads.deleted").increment(1);
    Ok(Json(Deleted::YES))
}

pub async fn schedule_ad(
    State(state): State<AppState>,
    user: AuthUser,
    Path(ad_id): Path<i64>,
    Query(query): Query<ScheduleQuery>,
) -> ApiResult<Ad> {
    user.require(Role::Editor)?;
    require_iso8601("scheduled_at", &query.scheduled_at)?;
    let ad = state.store.schedule_ad(user.tenant_id, ad_id, &query.scheduled_at)?;
    state.log_audit(
        &user,
        "ads.schedule",
        "ad",
        ad_id,
        json!({ "scheduled_at": query.scheduled_at }),
    );
    Ok(Json(ad))
}

pub async fn list_ad_deliveries(
    State(state): State<AppState>,
    user: AuthUser,
    Path(ad_id): Path<i64>,
) -> ApiResult<Vec<AdDelivery>> {
    user.require(Role::Viewer)?;
    if state.store.ad(user.tenant_id, ad_id).is_none() {
        return Err(TlxError::not_found("Ad not found").into());
    }
    Ok(Json(state.store.ad_deliveries(ad_id)))
}

// ─── Templates ─────────────────────────────────────────────────────────────

pub async fn create_template(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<TemplateCreateIn>,
) -> ApiResult<Template> {
    user.require(Role::Editor)?;
    req.validate()?;
    let tenant_id = user.tenant_id;

    state.meter.reserve_monthly(tenant_id, MonthlyResource::TemplatesCreated, 1)?;
    let template = state.store.create_template(tenant_id, &req.name, &req.body);

    state.log_audit(&user, "templates.create", "template", template.id, json!({ "name": req.name }));
    metrics::counter!("management.templates.created").increment(1);
    Ok(Json(template))
}

pub async fn list_templates(State(state): State<AppState>, user: AuthUser) -> ApiResult<Vec<Template>> {
    user.require(Role::Viewer)?;
    Ok(Json(state.store.list_templates(user.tenant_id)))
}

pub async fn preview_template(user: AuthUser, Json(req): Json<TemplatePreviewIn>) -> ApiResult<TemplatePreviewOut> {
    user.require(Role::Viewer)?;
    req.validate()?;
    let variables = req.variables.as_ref().map(variables_from_json).unwrap_or_default();
    Ok(Json(TemplatePreviewOut {
        rendered: render_template(&req.body, &variables),
    }))
}

pub async fn delete_template(
    State(state): State<AppState>,
    user: AuthUser,
    Path(template_id): Path<i64>,
) -> ApiResult<Deleted> {
    user.require(Role::Editor)?;
    if !state.store.delete_template(user.tenant_id, template_id) {
        return Err(TlxError::not_found("Template not found").into());
    }
    state.log_audit(&user, "templates.delete", "template", template_id, json!({}));
    Ok(Json(Deleted::YES))
}

// ─── Short links ───────────────────────────────────────────────────────────

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

pub async fn create_link(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<LinkCreateIn>,
) -> ApiResult<LinkOut> {
    user.require(Role::Editor)?;
    req.validate()?;
    let tenant_id = user.tenant_id;

    let destination = match (
        non_empty(&req.utm_source),
        non_empty(&req.utm_medium),
        non_empty(&req.utm_campaign),
    ) {
        (Some(source), Some(medium), Some(campaign)) => add_utm(
            &req.destination_url,
            &UtmParams {
                source,
                medium,
                campaign,
                content: non_empty(&req.utm_content),
                term: None,
            },
        ),
        _ => req.destination_url.clone(),
    };

    if let Some(ad_id) = req.ad_id {
        if state.store.ad(tenant_id, ad_id).is_none() {
            return Err(TlxError::not_found("Ad not found").into());
        }
    }
    state.meter.reserve_monthly(tenant_id, MonthlyResource::LinksCreated, 1)?;
    let link = match state.store.create_link(tenant_id, req.ad_id, &destination) {
        Ok(link) => link,
        Err(e) => {
            state.meter.release_monthly(tenant_id, MonthlyResource::LinksCreated, 1);
            return Err(e.into());
        }
    };

    state.log_audit(&user, "links.create", "short_link", &link.slug, json!({ "ad_id": req.ad_id }));
    metrics::counter!("management.links.created").increment(1);
    Ok(Json(LinkOut {
        slug: link.slug,
        destination_url: link.destination_url,
    }))
}
