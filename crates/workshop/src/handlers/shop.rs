//! Customers, vehicles, service orders and the stats panel.

use axum::extract::{Path, Query, State};
use axum::Json;
use tlx_core::TlxError;
use tlx_management::ApiResult;
use tracing::info;

use crate::auth::CurrentUser;
use crate::models::*;
use crate::state::WorkshopState;

fn nothing_to_update() -> TlxError {
    TlxError::bad_request("Nothing to update")
}

// ─── Customers ─────────────────────────────────────────────────────────────

pub async fn list_customers(State(state): State<WorkshopState>, _user: CurrentUser) -> Json<Vec<Customer>> {
    Json(state.store.list_customers())
}

pub async fn create_customer(
    State(state): State<WorkshopState>,
    _user: CurrentUser,
    Json(req): Json<CustomerIn>,
) -> ApiResult<Customer> {
    req.validate()?;
    let customer = state.store.create_customer(req);
    metrics::counter!("workshop.customers.created").increment(1);
    Ok(Json(customer))
}

pub async fn get_customer(
    State(state): State<WorkshopState>,
    _user: CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Customer> {
    let customer = state
        .store
        .customer(id)
        .ok_or_else(|| TlxError::not_found("Customer not found"))?;
    Ok(Json(customer))
}

pub async fn update_customer(
    State(state): State<WorkshopState>,
    _user: CurrentUser,
    Path(id): Path<i64>,
    Json(patch): Json<CustomerPatch>,
) -> ApiResult<Customer> {
    if patch.is_empty() {
        return Err(nothing_to_update().into());
    }
    patch.validate()?;
    Ok(Json(state.store.update_customer(id, patch)?))
}

pub async fn delete_customer(
    State(state): State<WorkshopState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Ack> {
    state.store.delete_customer(id)?;
    info!(customer_id = id, user_id = user.id, "Customer deleted");
    Ok(Json(Ack::OK))
}

// ─── Vehicles ──────────────────────────────────────────────────────────────

pub async fn list_vehicles(
    State(state): State<WorkshopState>,
    _user: CurrentUser,
    Query(query): Query<VehicleQuery>,
) -> Json<Vec<Vehicle>> {
    Json(state.store.list_vehicles(query.customer_id))
}

pub async fn create_vehicle(
    State(state): State<WorkshopState>,
    _user: CurrentUser,
    Json(req): Json<VehicleIn>,
) -> ApiResult<Vehicle> {
    req.validate()?;
    let vehicle = state.store.create_vehicle(req)?;
    metrics::counter!("workshop.vehicles.created").increment(1);
    Ok(Json(vehicle))
}

pub async fn update_vehicle(
    State(state): State<WorkshopState>,
    _user: CurrentUser,
    Path(id): Path<i64>,
    Json(patch): Json<VehiclePatch>,
) -> ApiResult<Vehicle> {
    if patch.is_empty() {
        return Err(nothing_to_update().into());
    }
    patch.validate()?;
    Ok(Json(state.store.update_vehicle(id, patch)?))
}

pub async fn delete_vehicle(
    State(state): State<WorkshopState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Ack> {
    state.store.delete_vehicle(id)?;
    info!(vehicle_id = id, user_id = user.id, "Vehicle deleted");
    Ok(Json(Ack::OK))
}

// ─── Service orders ────────────────────────────────────────────────────────

pub async fn list_orders(
    State(state): State<WorkshopState>,
    _user: CurrentUser,
    Query(query): Query<ServiceOrderQuery>,
) -> Json<Vec<ServiceOrder>> {
    Json(state.store.list_orders(query))
}

pub async fn create_order(
    State(state): State<WorkshopState>,
    _user: CurrentUser,
    Json(req): Json<ServiceOrderIn>,
) -> ApiResult<ServiceOrder> {
    req.validate()?;
    let order = state.store.create_order(req)?;
    metrics::counter!("workshop.orders.created").increment(1);
    Ok(Json(order))
}

pub async fn update_order(
    State(state): State<WorkshopState>,
    _user: CurrentUser,
    Path(id): Path<i64>,
    Json(patch): Json<ServiceOrderPatch>,
) -> ApiResult<ServiceOrder> {
    if patch.is_empty() {
        return Err(nothing_to_update().into());
    }
    patch.validate()?;
    Ok(Json(state.store.update_order(id, patch)?))
}

pub async fn delete_order(
    State(state): State<WorkshopState>,
    _user: CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Ack> {
    state.store.delete_order(id)?;
    Ok(Json(Ack::OK))
}

pub async fn stats(State(state): State<WorkshopState>, _user: CurrentUser) -> Json<StatsOut> {
    Json(state.store.stats())
}
