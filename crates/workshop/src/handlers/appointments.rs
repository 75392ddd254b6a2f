//! Appointment booking, reminders and the reminded flag.

use axum::extract::{Path, Query, State};
use axum::Json;
use tlx_core::{time, TlxError};
use tlx_management::ApiResult;
use tracing::info;

use crate::auth::CurrentUser;
use crate::models::*;
use crate::state::WorkshopState;

pub async fn list_appointments(
    State(state): State<WorkshopState>,
    _user: CurrentUser,
    Query(query): Query<AppointmentQuery>,
) -> ApiResult<Vec<Appointment>> {
    let filter = query.filter()?;
    Ok(Json(state.store.list_appointments(&filter)))
}

pub async fn create_appointment(
    State(state): State<WorkshopState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<AppointmentIn>,
) -> ApiResult<Appointment> {
    req.validate()?;
    let appt = state.store.create_appointment(req)?;
    metrics::counter!("workshop.appointments.created").increment(1);
    info!(appointment_id = appt.id, user_id = user.id, scheduled_at = %appt.scheduled_at, "Appointment booked");
    Ok(Json(appt))
}

pub async fn update_appointment(
    State(state): State<WorkshopState>,
    _user: CurrentUser,
    Path(id): Path<i64>,
    Json(patch): Json<AppointmentPatch>,
) -> ApiResult<Appointment> {
    if patch.is_empty() {
        return Err(TlxError::bad_request("Nothing to update").into());
    }
    patch.validate()?;
    Ok(Json(state.store.update_appointment(id, patch)?))
}

pub async fn delete_appointment(
    State(state): State<WorkshopState>,
    _user: CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Ack> {
    state.store.delete_appointment(id)?;
    Ok(Json(Ack::OK))
}

pub async fn reminders(
    State(state): State<WorkshopState>,
    _user: CurrentUser,
    Query(query): Query<ReminderQuery>,
) -> ApiResult<Vec<Appointment>> {
    let window = query.window()?;
    Ok(Json(state.store.due_reminders(time::now(), window)))
}

pub async fn mark_reminded(
    State(state): State<WorkshopState>,
    _user: CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Ack> {
    state.store.mark_reminded(id, time::now())?;
    metrics::counter!("workshop.reminders.marked").increment(1);
    Ok(Json(Ack::OK))
}
