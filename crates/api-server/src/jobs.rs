//! Operator-triggered job endpoints, guarded by the `X-Admin-Key` header.
//! They run the same passes the background worker runs.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use subtle::ConstantTimeEq;
use tlx_core::TlxError;
use tlx_delivery::{ProcessReport, RunDueReport};
use tlx_management::{ApiResult, ErrorResponse};
use tracing::warn;

use crate::rest::PublicState;

pub const ADMIN_KEY_HEADER: &str = "x-admin-key";

fn require_admin_key(headers: &HeaderMap, expected: &str) -> Result<(), TlxError> {
    let given = headers
        .get(ADMIN_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if given.is_empty() || !bool::from(given.as_bytes().ct_eq(expected.as_bytes())) {
        warn!("Job endpoint called without a valid admin key");
        metrics::counter!("jobs.forbidden").increment(1);
        return Err(TlxError::forbidden("Forbidden"));
    }
    Ok(())
}

/// POST /jobs/run-due — Dispatch scheduled ads that are due.
#[utoipa::path(
    post,
    path = "/jobs/run-due",
    tag = "Jobs",
    params(("X-Admin-Key" = String, Header, description = "Operator key")),
    responses(
        (status = 200, description = "Due ads dispatched", body = RunDueReport),
        (status = 403, description = "Missing or wrong admin key", body = ErrorResponse),
    )
)]
pub async fn handle_run_due(State(state): State<PublicState>, headers: HeaderMap) -> ApiResult<RunDueReport> {
    require_admin_key(&headers, &state.app.config.jobs.admin_key)?;
    let worker = state.worker.clone();
    let report = tokio::task::spawn_blocking(move || worker.run_due())
        .await
        .map_err(anyhow::Error::from)?;
    Ok(Json(report))
}

/// POST /jobs/process-deliveries — Drain one batch of the delivery queue.
#[utoipa::path(
    post,
    path = "/jobs/process-deliveries",
    tag = "Jobs",
    params(("X-Admin-Key" = String, Header, description = "Operator key")),
    responses(
        (status = 200, description = "Batch processed", body = ProcessReport),
        (status = 403, description = "Missing or wrong admin key", body = ErrorResponse),
    )
)]
pub async fn handle_process_deliveries(
    State(state): State<PublicState>,
    headers: HeaderMap,
) -> ApiResult<ProcessReport> {
    require_admin_key(&headers, &state.app.config.jobs.admin_key)?;
    let worker = state.worker.clone();
    let batch = state.app.config.jobs.batch_size;
    let report = tokio::task::spawn_blocking(move || worker.process_deliveries(batch))
        .await
        .map_err(anyhow::Error::from)?;
    Ok(Json(report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn admin_key_check() {
        let mut headers = HeaderMap::new();
        assert_eq!(require_admin_key(&headers, "k3y").unwrap_err().status_code(), 403);
        headers.insert(ADMIN_KEY_HEADER, HeaderValue::from_static("nope"));
        assert!(require_admin_key(&headers, "k3y").is_err());
        headers.insert(ADMIN_KEY_HEADER, HeaderValue::from_static("k3y"));
        assert!(require_admin_key(&headers, "k3y").is_ok());
    }
}
