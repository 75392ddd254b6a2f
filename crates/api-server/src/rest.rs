//! Public REST endpoints: health, short-link redirects, the impression
//! pixel and conversion events. None of them require a token.

use axum::extract::{Path, Query, State};
use axum::http::header::{ACCESS_CONTROL_ALLOW_ORIGIN, CACHE_CONTROL, CONTENT_TYPE, LOCATION, ORIGIN, VARY};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tlx_core::{time, MetricEventType, TlxError};
use tlx_delivery::DeliveryWorker;
use tlx_management::{ApiResult, AppState, ErrorResponse};
use tracing::{debug, warn};
use utoipa::{IntoParams, ToSchema};

/// 1×1 transparent GIF.
pub const PIXEL_GIF: &[u8] = b"GIF89a\x01\x00\x01\x00\x80\x00\x00\x00\x00\x00\xff\xff\xff!\
\xf9\x04\x01\x00\x00\x00\x00,\x00\x00\x00\x00\x01\x00\x01\x00\x00\x02\x02D\x01\x00;";

const NO_STORE: &str = "no-store, no-cache, must-revalidate, max-age=0";

/// State of the public and job endpoints.
#[derive(Clone)]
pub struct PublicState {
    pub app: AppState,
    pub worker: Arc<DeliveryWorker>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub ok: bool,
    pub ts: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OkResponse {
    pub ok: bool,
}

/// GET /health — Liveness probe.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Operations",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        ts: time::now_iso(),
    })
}

/// GET /r/:slug — Record a click and redirect to the link destination.
#[utoipa::path(
    get,
    path = "/r/{slug}",
    tag = "Tracking",
    params(("slug" = String, Path, description = "Short link slug")),
    responses(
        (status = 307, description = "Redirect to the destination URL"),
        (status = 404, description = "Unknown slug", body = ErrorResponse),
        (status = 410, description = "Stored destination is not a valid Location", body = ErrorResponse),
    )
)]
pub async fn handle_redirect(State(state): State<PublicState>, Path(slug): Path<String>) -> Result<Response, tlx_management::ApiError> {
    let link = state
        .app
        .store
        .link_by_slug(&slug)
        .ok_or_else(|| TlxError::not_found("Not found"))?;
    let location = HeaderValue::try_from(link.destination_url.as_str()).map_err(|e| {
        warn!(slug = %slug, error = %e, "Short link has an unusable destination");
        TlxError::Gone("Link destination unavailable".into())
    })?;
    state
        .app
        .store
        .record_event(link.tenant_id, link.ad_id, Some(link.id), MetricEventType::Click);
    metrics::counter!("tracking.clicks").increment(1);
    Ok((StatusCode::TEMPORARY_REDIRECT, [(LOCATION, location)]).into_response())
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PixelQuery {
    pub tenant_id: i64,
    pub ad_id: Option<i64>,
    pub link_slug: Option<String>,
}

/// Whether a pixel hit from `origin` may be recorded, and whether the
/// origin is echoed back in CORS headers.
pub fn pixel_origin_policy(allowed: &[String], origin: Option<&str>) -> (bool, bool) {
    match origin {
        None => (true, false),
        Some(origin) => {
            let listed = allowed.iter().any(|a| a == origin);
            (allowed.is_empty() || listed, listed)
        }
    }
}

/// GET /px/impression.gif — Record an impression and return a 1×1 GIF.
///
/// Hits from origins outside the allowlist still get the image but are not
/// recorded. A known `link_slug` decides the tenant and fills in the ad.
#[utoipa::path(
    get,
    path = "/px/impression.gif",
    tag = "Tracking",
    params(PixelQuery),
    responses((status = 200, description = "1x1 GIF", content_type = "image/gif"))
)]
pub async fn handle_pixel(
    State(state): State<PublicState>,
    headers: HeaderMap,
    Query(query): Query<PixelQuery>,
) -> Response {
    let origin = headers.get(ORIGIN).and_then(|v| v.to_str().ok());
    let (record, echo) = pixel_origin_policy(&state.app.config.tracking.pixel_allowed_origins, origin);

    if record {
        let (mut tenant_id, mut ad_id, mut link_id) = (query.tenant_id, query.ad_id, None);
        if let Some(link) = query
            .link_slug
            .as_deref()
            .and_then(|slug| state.app.store.link_by_slug(slug))
        {
            tenant_id = link.tenant_id;
            link_id = Some(link.id);
            ad_id = ad_id.or(link.ad_id);
        }
        state
            .app
            .store
            .record_event(tenant_id, ad_id, link_id, MetricEventType::Impression);
        metrics::counter!("tracking.impressions").increment(1);
    } else {
        debug!(origin = ?origin, "Pixel hit from origin outside allowlist");
        metrics::counter!("tracking.impressions.rejected").increment(1);
    }

    let mut response = PIXEL_GIF.into_response();
    let h = response.headers_mut();
    h.insert(CONTENT_TYPE, HeaderValue::from_static("image/gif"));
    h.insert(CACHE_CONTROL, HeaderValue::from_static(NO_STORE));
    if echo {
        if let Some(value) = origin.and_then(|o| HeaderValue::from_str(o).ok()) {
            h.insert(ACCESS_CONTROL_ALLOW_ORIGIN, value);
            h.insert(VARY, HeaderValue::from_static("Origin"));
        }
    }
    response
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ConversionQuery {
    pub slug: String,
}

/// POST /events/conversion — Record a conversion for a short link.
#[utoipa::path(
    post,
    path = "/events/conversion",
    tag = "Tracking",
    params(ConversionQuery),
    responses(
        (status = 200, description = "Conversion recorded", body = OkResponse),
        (status = 404, description = "Unknown slug", body = ErrorResponse),
    )
)]
pub async fn handle_conversion(
    State(state): State<PublicState>,
    Query(query): Query<ConversionQuery>,
) -> ApiResult<OkResponse> {
    let link = state
        .app
        .store
        .link_by_slug(&query.slug)
        .ok_or_else(|| TlxError::not_found("Not found"))?;
    state
        .app
        .store
        .record_event(link.tenant_id, link.ad_id, Some(link.id), MetricEventType::Conversion);
    metrics::counter!("tracking.conversions").increment(1);
    Ok(Json(OkResponse { ok: true }))
}
