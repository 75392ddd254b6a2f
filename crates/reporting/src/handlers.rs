//! Dashboard endpoints. Any tenant member may read them.

use axum::extract::{FromRef, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use tlx_core::{Role, TlxError, TlxResult};
use tlx_management::{ApiResult, AppState, AuthUser};

use crate::dashboard::*;

#[derive(Clone)]
pub struct ReportingState {
    pub app: AppState,
    pub dashboards: Dashboards,
}

impl FromRef<ReportingState> for AppState {
    fn from_ref(state: &ReportingState) -> Self {
        state.app.clone()
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct DaysQuery {
    pub days: Option<u32>,
}

impl DaysQuery {
    fn resolve(self, default: u32, max: u32) -> TlxResult<u32> {
        let days = self.days.unwrap_or(default);
        if !(1..=max).contains(&days) {
            return Err(TlxError::validation(format!("days must be between 1 and {max}")));
        }
        Ok(days)
    }
}

pub async fn summary(State(state): State<ReportingState>, user: AuthUser) -> ApiResult<DashboardOut> {
    user.require(Role::Viewer)?;
    Ok(Json(state.dashboards.summary(user.tenant_id)))
}

pub async fn history(
    State(state): State<ReportingState>,
    user: AuthUser,
    Query(query): Query<DaysQuery>,
) -> ApiResult<Series<HistoryPoint>> {
    user.require(Role::Viewer)?;
    let days = query.resolve(14, 90)?;
    Ok(Json(state.dashboards.history(user.tenant_id, days)))
}

pub async fn channels(
    State(state): State<ReportingState>,
    user: AuthUser,
    Query(query): Query<DaysQuery>,
) -> ApiResult<Series<ChannelPoint>> {
    user.require(Role::Viewer)?;
    let days = query.resolve(14, 90)?;
    Ok(Json(state.dashboards.channels(user.tenant_id, days)))
}

pub async fn campaigns(
    State(state): State<ReportingState>,
    user: AuthUser,
    Query(query): Query<DaysQuery>,
) -> ApiResult<Series<CampaignPoint>> {
    user.require(Role::Viewer)?;
    let days = query.resolve(30, 180)?;
    Ok(Json(state.dashboards.campaigns(user.tenant_id, days)))
}

pub async fn campaign_conversions(
    State(state): State<ReportingState>,
    user: AuthUser,
    Query(query): Query<DaysQuery>,
) -> ApiResult<Series<CampaignConversionPoint>> {
    user.require(Role::Viewer)?;
    let days = query.resolve(30, 180)?;
    Ok(Json(state.dashboards.campaign_conversions(user.tenant_id, days)))
}

pub async fn sla(
    State(state): State<ReportingState>,
    user: AuthUser,
    Query(query): Query<DaysQuery>,
) -> ApiResult<SlaOut> {
    user.require(Role::Viewer)?;
    let days = query.resolve(30, 180)?;
    Ok(Json(state.dashboards.sla(user.tenant_id, days)))
}

/// Mount the dashboard endpoints over the same state as the ads/CRM API.
pub fn reporting_router(app: AppState) -> Router {
    let dashboards = Dashboards::new(app.store.clone());
    Router::new()
        .route("/dashboard", get(summary))
        .route("/dashboard/history", get(history))
        .route("/dashboard/channels", get(channels))
        .route("/dashboard/campaigns", get(campaigns))
        .route("/dashboard/campaign-conversions", get(campaign_conversions))
        .route("/dashboard/sla", get(sla))
        .with_state(ReportingState { app, dashboards })
}
