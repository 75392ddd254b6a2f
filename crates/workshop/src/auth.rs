//! Bearer-token extractors for the service-shop API.
//!
//! Tokens carry only `sub` and `role`; the user row is re-read on every
//! request so deactivation takes effect immediately.

use axum::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use tlx_core::TlxError;
use tlx_management::ApiError;
use tracing::debug;

use crate::models::{ShopRole, UserPublic};
use crate::state::WorkshopState;

/// Any active user.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub UserPublic);

/// An active admin.
#[derive(Debug, Clone)]
pub struct AdminUser(pub UserPublic);

fn bearer(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    WorkshopState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let shop = WorkshopState::from_ref(state);
        let token = bearer(parts).ok_or_else(|| TlxError::Unauthorized("Not authenticated".into()))?;
        let claims = shop.tokens.verify(token).map_err(|e| {
            debug!(error = %e, "Rejected workshop token");
            TlxError::from(e)
        })?;
        let user_id = claims.user_id().map_err(TlxError::from)?;
        let user = shop
            .store
            .user(user_id)
            .ok_or_else(|| TlxError::Unauthorized("User not found".into()))?;
        if !user.is_active {
            return Err(TlxError::forbidden("User deactivated").into());
        }
        Ok(CurrentUser(user.public()))
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AdminUser
where
    WorkshopState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        if user.role != ShopRole::Admin {
            return Err(TlxError::forbidden("Admin only").into());
        }
        Ok(AdminUser(user))
    }
}
