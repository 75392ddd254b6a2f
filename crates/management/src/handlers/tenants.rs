//! Tenants, memberships and invites.

use axum::extract::{Path, State};
use axum::Json;
use chrono::Duration;
use serde_json::json;
use tlx_billing::MonthlyResource;
use tlx_core::ids::normalize_slug;
use tlx_core::{Role, TlxError};
use tlx_platform::rbac::parse_role;

use crate::auth::{AuthUser, ClientIp};
use crate::error::ApiResult;
use crate::models::*;
use crate::state::AppState;

const INVITE_TTL_HOURS: i64 = 48;

pub async fn create_tenant(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<TenantCreateIn>,
) -> ApiResult<Tenant> {
    req.validate()?;
    let slug = normalize_slug(&req.slug)?;
    let tenant = state.store.create_tenant(req.name.trim(), &slug, user.user_id)?;

    state.audit.log_action(
        tenant.id,
        Some(user.user_id),
        "tenants.create",
        "tenant",
        Some(tenant.id.to_string()),
        json!({ "slug": slug }),
    );
    metrics::counter!("management.tenants.created").increment(1);
    Ok(Json(tenant))
}

pub async fn list_members(
    State(state): State<AppState>,
    user: AuthUser,
    Path(tenant_id): Path<i64>,
) -> ApiResult<Vec<MemberOut>> {
    user.ensure_tenant(tenant_id)?;
    user.require(Role::Viewer)?;
    Ok(Json(state.store.members(tenant_id)))
}

pub async fn update_member_role(
    State(state): State<AppState>,
    user: AuthUser,
    Path((tenant_id, member_id)): Path<(i64, i64)>,
    Json(req): Json<MemberRoleUpdateIn>,
) -> ApiResult<MemberOut> {
    user.ensure_tenant(tenant_id)?;
    user.require(Role::Admin)?;
    req.validate()?;
    let role = parse_role(&req.role.trim().to_lowercase())?;

    if state.store.membership(tenant_id, user.user_id).is_none() {
        return Err(TlxError::forbidden("Not a member").into());
    }
    state.store.set_member_role(tenant_id, member_id, role)?;
    let member = state
        .store
        .members(tenant_id)
        .into_iter()
        .find(|m| m.user_id == member_id)
        .ok_or_else(|| TlxError::not_found("Member not found"))?;

    state.log_audit(
        &user,
        "members.update_role",
        "membership",
        format!("{tenant_id}:{member_id}"),
        json!({ "role": role }),
    );
    Ok(Json(member))
}

pub async fn create_invite(
    State(state): State<AppState>,
    user: AuthUser,
    ClientIp(ip): ClientIp,
    Path(tenant_id): Path<i64>,
    Json(req): Json<InviteCreateIn>,
) -> ApiResult<InviteOut> {
    req.validate()?;
    state.limiter.hit(&format!("invite:{tenant_id}:{ip}")).await?;
    user.ensure_tenant(tenant_id)?;
    user.require(Role::Admin)?;

    let email = req.email.trim().to_lowercase();
    if email.is_empty() {
        return Err(TlxError::bad_request("Email required").into());
    }
    let role = parse_role(&req.role.trim().to_lowercase())?;
    let base = req
        .invite_base_url
        .as_deref()
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("{}/accept-invite", state.config.web.base()));

    state.meter.reserve_monthly(tenant_id, MonthlyResource::InvitesCreated, 1)?;
    let invite = state
        .store
        .create_invite(tenant_id, &email, role, user.user_id, Duration::hours(INVITE_TTL_HOURS))
        .inspect_err(|_| state.meter.release_monthly(tenant_id, MonthlyResource::InvitesCreated, 1))?;

    state.audit.log_action(
        tenant_id,
        Some(user.user_id),
        "invite.create",
        "invite_token",
        None,
        json!({ "email": email, "role": role }),
    );
    metrics::counter!("management.invites.created").increment(1);

    let dev = state.config.web.dev_return_token_links;
    Ok(Json(InviteOut {
        ok: true,
        invite_link: format!("{base}?token={}", invite.token),
        expires_at: invite.expires_at,
        token: dev.then_some(invite.token),
    }))
}
