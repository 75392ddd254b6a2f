//! Request extractors: the authenticated tenant member and the client IP.
//!
//! Tokens are HS256 bearer tokens issued at login/register. A token without a
//! tenant claim (or with `tid <= 0`) acts on the default tenant.

use axum::async_trait;
use axum::extract::{ConnectInfo, FromRef, FromRequestParts};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use tlx_core::{Role, TlxError, TlxResult};
use tlx_platform::require_role;
use tracing::debug;

use crate::error::ApiError;
use crate::state::AppState;
use crate::store::DEFAULT_TENANT_ID;

/// Caller identity resolved from the bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: i64,
    pub email: String,
    pub tenant_id: i64,
    pub role: Role,
}

impl AuthUser {
    pub fn require(&self, minimum: Role) -> TlxResult<()> {
        require_role(self.role, minimum)
    }

    /// Path-addressed tenant routes only act on the caller's own tenant.
    pub fn ensure_tenant(&self, tenant_id: i64) -> TlxResult<()> {
        if self.tenant_id != tenant_id {
            return Err(TlxError::forbidden("Tenant mismatch"));
        }
        Ok(())
    }
}

pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") || token.trim().is_empty() {
        return None;
    }
    Some(token.trim())
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app = AppState::from_ref(state);
        let token = bearer_token(&parts.headers)
            .ok_or_else(|| TlxError::Unauthorized("Missing bearer token".into()))?;
        let claims = app.tokens.verify(token).map_err(|e| {
            debug!(error = %e, "Rejected bearer token");
            TlxError::from(e)
        })?;
        let user_id = claims.user_id().map_err(TlxError::from)?;
        let tenant_id = claims
            .tid
            .filter(|tid| *tid > 0)
            .unwrap_or(DEFAULT_TENANT_ID);
        let role = claims.role.parse().unwrap_or(Role::Viewer);

        Ok(AuthUser {
            user_id,
            email: claims.email.unwrap_or_default(),
            tenant_id,
            role,
        })
    }
}

/// Peer address of the request: the socket address when the server was
/// started with connect info, else the first `X-Forwarded-For` entry, else
/// `"unknown"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(ConnectInfo(addr)) = parts.extensions.get::<ConnectInfo<SocketAddr>>() {
            return Ok(ClientIp(addr.ip().to_string()));
        }
        let forwarded = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        Ok(ClientIp(forwarded.unwrap_or("unknown").to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_parsing() {
        let mut headers = HeaderMap::new();
        assert!(bearer_token(&headers).is_none());
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(bearer_token(&headers), Some("abc.def.ghi"));
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcg=="));
        assert!(bearer_token(&headers).is_none());
        headers.insert(AUTHORIZATION, HeaderValue::from_static("bearer   "));
        assert!(bearer_token(&headers).is_none());
    }

    #[test]
    fn tenant_guard() {
        let user = AuthUser {
            user_id: 1,
            email: "a@b.c".into(),
            tenant_id: 3,
            role: Role::Editor,
        };
        assert!(user.ensure_tenant(3).is_ok());
        assert_eq!(user.ensure_tenant(4).unwrap_err().status_code(), 403);
        assert!(user.require(Role::Viewer).is_ok());
        assert_eq!(user.require(Role::Admin).unwrap_err().status_code(), 403);
    }
}
