//! Registration, login, invite acceptance and password reset.

use axum::extract::State;
use axum::Json;
use chrono::Duration;
use serde_json::json;
use tlx_core::ids::normalize_slug;
use tlx_core::{time, Role, TlxError};
use tlx_platform::TokenSubject;
use tracing::info;

use crate::auth::{AuthUser, ClientIp};
use crate::error::ApiResult;
use crate::models::*;
use crate::state::AppState;
use crate::store::{TenantChoice, DEFAULT_TENANT_SLUG};

const RESET_TTL_HOURS: i64 = 2;

fn issue_token(state: &AppState, user_id: i64, tenant_id: i64, email: &str, role: Role) -> ApiResult<TokenOut> {
    let access_token = state.tokens.issue(&TokenSubject {
        user_id,
        tenant_id: Some(tenant_id),
        email: Some(email),
        role: role.as_str(),
    })?;
    Ok(Json(TokenOut {
        access_token,
        tenant_id: Some(tenant_id),
        role: Some(role),
    }))
}

pub async fn register(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Json(req): Json<RegisterIn>,
) -> ApiResult<TokenOut> {
    req.validate()?;
    state.limiter.hit(&format!("register:{ip}")).await?;

    let email = req.email.trim().to_lowercase();
    let choice = match req.tenant_slug.as_deref() {
        Some(raw) if !raw.trim().is_empty() => {
            let slug = normalize_slug(raw)?;
            let name = req
                .tenant_name
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .unwrap_or(&slug)
                .to_string();
            Some(TenantChoice { slug, name })
        }
        _ => None,
    };

    let password_hash = state.hash_password(&req.password).await?;
    let (user, tenant) = state.store.register(&email, password_hash, choice)?;

    state.audit.log_action(
        tenant.id,
        Some(user.id),
        "auth.register",
        "user",
        Some(user.id.to_string()),
        json!({ "email": user.email }),
    );
    metrics::counter!("management.users.registered").increment(1);
    info!(user_id = user.id, tenant_id = tenant.id, "User registered");

    issue_token(&state, user.id, tenant.id, &user.email, Role::Admin)
}

pub async fn login(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Json(req): Json<LoginIn>,
) -> ApiResult<TokenOut> {
    req.validate()?;
    state.limiter.hit(&format!("login:{ip}")).await?;

    let email = req.email.trim().to_lowercase();
    let user = state.store.user_by_email(&email);
    let valid = match &user {
        Some(u) => state.verify_password(&req.password, &u.password_hash).await?,
        None => false,
    };
    let user = match user {
        Some(user) if valid => user,
        _ => {
            metrics::counter!("management.auth.failed").increment(1);
            return Err(TlxError::Unauthorized("Invalid credentials".into()).into());
        }
    };

    let slug = match req.tenant_slug.as_deref() {
        Some(raw) if !raw.trim().is_empty() => normalize_slug(raw)?,
        _ => DEFAULT_TENANT_SLUG.to_string(),
    };
    let tenant = state
        .store
        .tenant_by_slug(&slug)
        .ok_or_else(|| TlxError::not_found("Tenant not found"))?;
    let membership = state
        .store
        .membership(tenant.id, user.id)
        .ok_or_else(|| TlxError::forbidden("User is not a member of this tenant"))?;

    state.audit.log_action(
        tenant.id,
        Some(user.id),
        "auth.login",
        "user",
        Some(user.id.to_string()),
        json!({ "email": user.email }),
    );
    issue_token(&state, user.id, tenant.id, &user.email, membership.role)
}

pub async fn me(user: AuthUser) -> Json<MeOut> {
    Json(MeOut {
        id: user.user_id,
        email: user.email,
        tenant_id: Some(user.tenant_id),
        role: Some(user.role),
    })
}

pub async fn accept_invite(
    State(state): State<AppState>,
    Json(req): Json<AcceptInviteIn>,
) -> ApiResult<TokenOut> {
    req.validate()?;
    let password_hash = state.hash_password(&req.password).await?;
    let (user, invite) = state.store.accept_invite(&req.token, password_hash)?;

    state.audit.log_action(
        invite.tenant_id,
        Some(user.id),
        "invite.accept",
        "membership",
        None,
        json!({ "email": invite.email, "role": invite.role }),
    );
    issue_token(&state, user.id, invite.tenant_id, &user.email, invite.role)
}

/// Answers `ok` whether or not the email is registered.
pub async fn request_password_reset(
    State(state): State<AppState>,
    Json(req): Json<PasswordResetRequestIn>,
) -> ApiResult<PasswordResetRequestOut> {
    req.validate()?;
    let ok = PasswordResetRequestOut {
        ok: true,
        ..Default::default()
    };

    let email = req.email.trim().to_lowercase();
    let Some(user) = state.store.user_by_email(&email) else {
        return Ok(Json(ok));
    };

    let reset = state.store.create_reset(user.id, Duration::hours(RESET_TTL_HOURS));
    state.audit.log_action(
        0,
        Some(user.id),
        "auth.pwd_reset_request",
        "user",
        Some(user.id.to_string()),
        json!({}),
    );

    if !state.config.web.dev_return_token_links {
        return Ok(Json(ok));
    }
    let base = req
        .reset_base_url
        .as_deref()
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("{}/reset-password", state.config.web.base()));
    Ok(Json(PasswordResetRequestOut {
        ok: true,
        reset_link: Some(format!("{base}?token={}", reset.token)),
        token: Some(reset.token),
        expires_at: Some(time::to_iso(reset.expires_at)),
    }))
}

pub async fn confirm_password_reset(
    State(state): State<AppState>,
    Json(req): Json<PasswordResetConfirmIn>,
) -> ApiResult<Ack> {
    req.validate()?;
    let password_hash = state.hash_password(&req.new_password).await?;
    let user_id = state.store.confirm_reset(&req.token, password_hash)?;
    state.audit.log_action(
        0,
        Some(user_id),
        "auth.pwd_reset_confirm",
        "user",
        Some(user_id.to_string()),
        json!({}),
    );
    Ok(Json(Ack::OK))
}
