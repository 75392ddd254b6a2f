//! Delivery queue and segment automation.

use axum::extract::{Query, State};
use axum::Json;
use serde_json::{json, Value};
use tlx_core::ids::secure_token;
use tlx_core::time::{self, require_iso8601};
use tlx_core::{variables_from_json, Role, TlxError};
use tracing::{info, warn};

use super::{ensure_campaign, render_body};
use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::models::*;
use crate::state::AppState;
use crate::store::QueueFilter;

pub async fn enqueue_delivery(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<DeliveryQueueCreateIn>,
) -> ApiResult<QueuedDelivery> {
    user.require(Role::Editor)?;
    req.validate()?;
    let tenant_id = user.tenant_id;

    let channel = req.channel.trim().to_lowercase();
    let idempotency_key = req
        .idempotency_key
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| secure_token(16));

    ensure_campaign(&state, tenant_id, req.campaign_id)?;
    state.meter.reserve_daily_send(tenant_id, &channel, 1)?;

    let (row, created) = state.store.enqueue_delivery(NewDelivery {
        tenant_id,
        campaign_id: req.campaign_id,
        channel: channel.clone(),
        to_addr: req.to_addr.trim().to_string(),
        payload: Value::Object(req.payload),
        idempotency_key,
        next_attempt_at: Some(time::now()),
    });
    if !created {
        state.meter.release_daily_send(tenant_id, &channel, 1);
        return Ok(Json(row));
    }

    state.log_audit(&user, "deliveries.enqueue", "delivery", row.id, json!({ "channel": channel }));
    metrics::counter!("management.deliveries.enqueued").increment(1);
    Ok(Json(row))
}

pub async fn list_deliveries(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<DeliveryListQuery>,
) -> ApiResult<Vec<QueuedDelivery>> {
    user.require(Role::Viewer)?;
    let page = Page::new(query.limit, query.offset)?;
    let filter = QueueFilter {
        status: query.status,
        campaign_id: query.campaign_id,
    };
    Ok(Json(state.store.list_deliveries(user.tenant_id, filter, page)))
}

/// Queue one message per segment contact. Email sends go to the contact's
/// email, every other channel to the phone; contacts without that address
/// are skipped. Stops at the first contact over the daily send quota.
pub async fn segment_send(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<AutomationSegmentSendIn>,
) -> ApiResult<AutomationSegmentSendOut> {
    user.require(Role::Editor)?;
    req.validate()?;
    let tenant_id = user.tenant_id;

    let scheduled_at = match req.scheduled_at.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => Some(require_iso8601("scheduled_at", raw)?),
        None => None,
    };
    let channel = req.channel.trim().to_lowercase();
    let raw_variables = req.variables.clone().unwrap_or_default();
    let variables = variables_from_json(&raw_variables);

    if state.store.segment(tenant_id, req.segment_id).is_none() {
        return Err(TlxError::not_found("Segment not found").into());
    }
    ensure_campaign(&state, tenant_id, req.campaign_id)?;
    let body = render_body(&state, tenant_id, &req.body, req.template_id, &variables)?
        .unwrap_or_else(|| req.body.clone());

    let mut out = AutomationSegmentSendOut::default();
    for contact in state.store.segment_contacts(tenant_id, req.segment_id) {
        let address = if channel == "email" { &contact.email } else { &contact.phone };
        let Some(to_addr) = address.as_deref().map(str::trim).filter(|a| !a.is_empty()) else {
            out.skipped += 1;
            continue;
        };

        if let Err(e) = state.meter.reserve_daily_send(tenant_id, &channel, 1) {
            warn!(tenant_id = tenant_id, error = %e, "Segment send stopped by quota");
            out.failed += 1;
            break;
        }

        state.store.enqueue_delivery(NewDelivery {
            tenant_id,
            campaign_id: req.campaign_id,
            channel: channel.clone(),
            to_addr: to_addr.to_string(),
            payload: json!({
                "body": body,
                "template_id": req.template_id,
                "variables": raw_variables,
            }),
            idempotency_key: secure_token(16),
            next_attempt_at: scheduled_at,
        });
        out.queued += 1;
    }

    state.log_audit(
        &user,
        "automation.segment_send",
        "segment",
        req.segment_id,
        json!({ "queued": out.queued }),
    );
    metrics::counter!("management.automation.queued").increment(out.queued);
    info!(
        tenant_id = tenant_id,
        segment_id = req.segment_id,
        queued = out.queued,
        skipped = out.skipped,
        failed = out.failed,
        "Segment send queued"
    );
    Ok(Json(out))
}
