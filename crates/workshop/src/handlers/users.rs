//! Health, login and user management.

use axum::extract::State;
use axum::Json;
use tlx_core::TlxError;
use tlx_management::ApiResult;
use tlx_platform::TokenSubject;
use tracing::info;

use crate::auth::{AdminUser, CurrentUser};
use crate::models::*;
use crate::state::WorkshopState;

pub async fn health() -> Json<HealthOut> {
    Json(HealthOut::ok())
}

pub async fn login(State(state): State<WorkshopState>, Json(req): Json<LoginIn>) -> ApiResult<TokenOut> {
    let invalid = || TlxError::Unauthorized("Invalid credentials".into());

    let user = state.store.user_by_email(&req.email).ok_or_else(invalid)?;
    if !user.is_active {
        return Err(TlxError::forbidden("User deactivated").into());
    }
    if !state.verify_password(&req.password, &user.password_hash).await? {
        metrics::counter!("workshop.login.failed").increment(1);
        return Err(invalid().into());
    }

    let access_token = state.tokens.issue(&TokenSubject {
        user_id: user.id,
        tenant_id: None,
        email: None,
        role: user.role.as_str(),
    })?;
    info!(user_id = user.id, role = %user.role, "Workshop login");
    Ok(Json(TokenOut {
        access_token,
        token_type: "bearer".to_string(),
        user: user.public(),
    }))
}

pub async fn me(CurrentUser(user): CurrentUser) -> Json<UserPublic> {
    Json(user)
}

pub async fn list_users(State(state): State<WorkshopState>, _admin: AdminUser) -> Json<Vec<UserPublic>> {
    Json(state.store.list_active_users())
}

pub async fn create_user(
    State(state): State<WorkshopState>,
    AdminUser(admin): AdminUser,
    Json(req): Json<UserCreateIn>,
) -> ApiResult<UserPublic> {
    req.validate()?;
    let hash = state.hash_password(&req.password).await?;
    let user = state.store.create_user(&req.email, hash, req.role)?;
    info!(user_id = user.id, created_by = admin.id, role = %user.role, "Workshop user created");
    Ok(Json(user.public()))
}
