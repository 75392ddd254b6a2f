//! HTTP mapping for [`TlxError`].

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tlx_core::TlxError;
use tracing::error;
use utoipa::ToSchema;

/// Error body returned by every endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Handler error: wraps [`TlxError`] and renders it as
/// `ErrorResponse` JSON with the mapped status code.
#[derive(Debug)]
pub struct ApiError(pub TlxError);

pub type ApiResult<T> = Result<Json<T>, ApiError>;

impl<E: Into<TlxError>> From<E> for ApiError {
    fn from(err: E) -> Self {
        ApiError(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!(error = %self.0, "Request failed");
        }
        (
            status,
            Json(ErrorResponse {
                error: self.0.kind().to_string(),
                message: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_status_and_body() {
        let resp = ApiError::from(TlxError::PaymentRequired("Daily send limit reached".into())).into_response();
        assert_eq!(resp.status(), StatusCode::PAYMENT_REQUIRED);

        let resp = ApiError::from(TlxError::RateLimited).into_response();
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}
