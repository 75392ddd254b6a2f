//! Plan dashboard, Stripe checkout/portal flows and the Stripe webhook.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde_json::json;
use tlx_billing::{PlanSnapshot, Purchaser, WebhookOutcome};
use tlx_core::Role;
use tracing::info;

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::models::*;
use crate::state::AppState;

fn purchaser(user: &AuthUser) -> Purchaser<'_> {
    Purchaser {
        tenant_id: user.tenant_id,
        user_id: user.user_id,
        email: Some(user.email.as_str()).filter(|e| !e.is_empty()),
    }
}

pub async fn plan(State(state): State<AppState>, user: AuthUser) -> ApiResult<PlanSnapshot> {
    user.require(Role::Viewer)?;
    Ok(Json(state.meter.snapshot(user.tenant_id)))
}

pub async fn checkout_session(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<PlanRequestIn>,
) -> ApiResult<UrlOut> {
    let url = state.billing.checkout(purchaser(&user), &req.plan).await?;
    state.log_audit(&user, "billing.checkout", "tenant", user.tenant_id, json!({ "plan": req.plan }));
    Ok(Json(UrlOut { url }))
}

pub async fn portal(State(state): State<AppState>, user: AuthUser) -> ApiResult<UrlOut> {
    let url = state.billing.portal(user.tenant_id).await?;
    Ok(Json(UrlOut { url }))
}

pub async fn change_plan(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<PlanRequestIn>,
) -> ApiResult<UrlOut> {
    let url = state.billing.change_plan(purchaser(&user), &req.plan).await?;
    state.log_audit(&user, "billing.change_plan", "tenant", user.tenant_id, json!({ "plan": req.plan }));
    Ok(Json(UrlOut { url }))
}

pub async fn cancel(State(state): State<AppState>, user: AuthUser) -> ApiResult<UrlOut> {
    let url = state.billing.cancel(user.tenant_id).await?;
    state.log_audit(&user, "billing.cancel", "tenant", user.tenant_id, json!({}));
    Ok(Json(UrlOut { url }))
}

pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Ack> {
    let signature = headers.get("stripe-signature").and_then(|v| v.to_str().ok());
    match state.billing.handle_webhook(&body, signature)? {
        WebhookOutcome::Applied { tenant_id, plan, status } => {
            info!(tenant_id = tenant_id, plan = %plan, status = %status, "Plan updated from Stripe");
            metrics::counter!("billing.webhook.applied").increment(1);
        }
        WebhookOutcome::Duplicate => {
            metrics::counter!("billing.webhook.duplicate").increment(1);
        }
        WebhookOutcome::Ignored => {}
    }
    Ok(Json(Ack::OK))
}
