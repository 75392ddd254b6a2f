//! Service-shop domain types and the request/response bodies of its API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tlx_core::patch::double_option;
use tlx_core::time::{self, iso};
use tlx_core::{TlxError, TlxResult};

// ─── Validation ────────────────────────────────────────────────────────────

pub trait Validate {
    fn validate(&self) -> TlxResult<()>;
}

fn check_len(field: &str, value: &str, min: usize, max: usize) -> TlxResult<()> {
    let len = value.chars().count();
    if len < min || len > max {
        return Err(TlxError::validation(format!(
            "{field} must be between {min} and {max} characters"
        )));
    }
    Ok(())
}

fn check_opt_len(field: &str, value: Option<&str>, max: usize) -> TlxResult<()> {
    value.map_or(Ok(()), |v| check_len(field, v, 0, max))
}

fn check_patch_len(field: &str, value: &Option<Option<String>>, max: usize) -> TlxResult<()> {
    check_opt_len(field, value.as_ref().and_then(|v| v.as_deref()), max)
}

fn check_year(year: Option<i32>) -> TlxResult<()> {
    match year {
        Some(y) if !(1900..=2100).contains(&y) => {
            Err(TlxError::validation("year must be between 1900 and 2100"))
        }
        _ => Ok(()),
    }
}

fn check_total(total_cents: Option<i64>) -> TlxResult<()> {
    match total_cents {
        Some(t) if t < 0 => Err(TlxError::validation("total_cents must be >= 0")),
        _ => Ok(()),
    }
}

/// Appointments are booked in 30, 60 or 90 minute blocks.
pub const APPOINTMENT_DURATIONS: [u32; 3] = [30, 60, 90];

fn check_duration(minutes: Option<u32>) -> TlxResult<()> {
    match minutes {
        Some(m) if !APPOINTMENT_DURATIONS.contains(&m) => {
            Err(TlxError::validation("duration_minutes must be 30, 60 or 90"))
        }
        _ => Ok(()),
    }
}

// ─── Users ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShopRole {
    Admin,
    Operator,
}

impl ShopRole {
    pub fn as_str(self) -> &'static str {
        match self {
            ShopRole::Admin => "admin",
            ShopRole::Operator => "operator",
        }
    }
}

impl fmt::Display for ShopRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShopRole {
    type Err = TlxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(ShopRole::Admin),
            "operator" => Ok(ShopRole::Operator),
            other => Err(TlxError::validation(format!("Unknown role: {other}"))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ShopUser {
    pub id: i64,
    pub email: String,
    pub password_hash: String,
    pub role: ShopRole,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl ShopUser {
    pub fn public(&self) -> UserPublic {
        UserPublic {
            id: self.id,
            email: self.email.clone(),
            role: self.role,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPublic {
    pub id: i64,
    pub email: String,
    pub role: ShopRole,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginIn {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenOut {
    pub access_token: String,
    pub token_type: String,
    pub user: UserPublic,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserCreateIn {
    pub email: String,
    pub password: String,
    pub role: ShopRole,
}

impl Validate for UserCreateIn {
    fn validate(&self) -> TlxResult<()> {
        check_len("email", &self.email, 3, 200)?;
        check_len("password", &self.password, 6, 200)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthOut {
    pub status: String,
    #[serde(with = "iso")]
    pub server_time: DateTime<Utc>,
}

impl HealthOut {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            server_time: time::now(),
        }
    }
}

// ─── Customers & vehicles ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: i64,
    pub name: String,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CustomerIn {
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
}

impl Validate for CustomerIn {
    fn validate(&self) -> TlxResult<()> {
        check_len("name", &self.name, 1, 120)?;
        check_opt_len("phone", self.phone.as_deref(), 40)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomerPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub phone: Option<Option<String>>,
}

impl CustomerPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.phone.is_none()
    }
}

impl Validate for CustomerPatch {
    fn validate(&self) -> TlxResult<()> {
        if let Some(name) = &self.name {
            check_len("name", name, 1, 120)?;
        }
        check_patch_len("phone", &self.phone, 40)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: i64,
    pub customer_id: i64,
    pub plate: String,
    pub model: String,
    pub year: Option<i32>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VehicleIn {
    pub customer_id: i64,
    pub plate: String,
    pub model: String,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Validate for VehicleIn {
    fn validate(&self) -> TlxResult<()> {
        check_len("plate", &self.plate, 1, 20)?;
        check_len("model", &self.model, 1, 120)?;
        check_year(self.year)?;
        check_opt_len("notes", self.notes.as_deref(), 500)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VehiclePatch {
    #[serde(default)]
    pub customer_id: Option<i64>,
    #[serde(default)]
    pub plate: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub year: Option<Option<i32>>,
    #[serde(default, deserialize_with = "double_option")]
    pub notes: Option<Option<String>>,
}

impl VehiclePatch {
    pub fn is_empty(&self) -> bool {
        self.customer_id.is_none()
            && self.plate.is_none()
            && self.model.is_none()
            && self.year.is_none()
            && self.notes.is_none()
    }
}

impl Validate for VehiclePatch {
    fn validate(&self) -> TlxResult<()> {
        if let Some(plate) = &self.plate {
            check_len("plate", plate, 1, 20)?;
        }
        if let Some(model) = &self.model {
            check_len("model", model, 1, 120)?;
        }
        check_year(self.year.flatten())?;
        check_patch_len("notes", &self.notes, 500)
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct VehicleQuery {
    pub customer_id: Option<i64>,
}

// ─── Service orders ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceOrderStatus {
    #[default]
    Open,
    InProgress,
    Done,
    Canceled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceOrder {
    pub id: i64,
    pub customer_id: i64,
    pub vehicle_id: i64,
    pub description: String,
    pub status: ServiceOrderStatus,
    pub total_cents: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceOrderIn {
    pub customer_id: i64,
    pub vehicle_id: i64,
    pub description: String,
    #[serde(default)]
    pub status: ServiceOrderStatus,
    #[serde(default)]
    pub total_cents: i64,
}

impl Validate for ServiceOrderIn {
    fn validate(&self) -> TlxResult<()> {
        check_len("description", &self.description, 1, 1000)?;
        check_total(Some(self.total_cents))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceOrderPatch {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<ServiceOrderStatus>,
    #[serde(default)]
    pub total_cents: Option<i64>,
}

impl ServiceOrderPatch {
    pub fn is_empty(&self) -> bool {
        self.description.is_none() && self.status.is_none() && self.total_cents.is_none()
    }
}

impl Validate for ServiceOrderPatch {
    fn validate(&self) -> TlxResult<()> {
        if let Some(description) = &self.description {
            check_len("description", description, 1, 1000)?;
        }
        check_total(self.total_cents)
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ServiceOrderQuery {
    pub customer_id: Option<i64>,
    pub vehicle_id: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsOut {
    pub customers: u64,
    pub vehicles: u64,
    pub service_orders_total: u64,
    pub service_orders_open: u64,
    pub service_orders_in_progress: u64,
    pub service_orders_done: u64,
    pub service_orders_canceled: u64,
    pub revenue_done_cents: i64,
}

// ─── Appointments ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    #[default]
    Scheduled,
    Done,
    Canceled,
}

/// A booked bay slot. `scheduled_at` and `reminded_at` keep the client's
/// ISO 8601 text; [`Appointment::starts_at`] gives the parsed instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: i64,
    pub customer_id: i64,
    pub vehicle_id: Option<i64>,
    pub service_order_id: Option<i64>,
    pub title: String,
    pub notes: Option<String>,
    pub status: AppointmentStatus,
    pub scheduled_at: String,
    pub duration_minutes: u32,
    pub reminded_at: Option<String>,
}

impl Appointment {
    pub fn starts_at(&self) -> Option<DateTime<Utc>> {
        time::parse_iso8601(&self.scheduled_at)
    }

    pub fn ends_at(&self) -> Option<DateTime<Utc>> {
        self.starts_at()
            .map(|start| start + chrono::Duration::minutes(i64::from(self.duration_minutes)))
    }
}

fn default_duration() -> u32 {
    30
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppointmentIn {
    pub customer_id: i64,
    #[serde(default)]
    pub vehicle_id: Option<i64>,
    #[serde(default)]
    pub service_order_id: Option<i64>,
    pub title: String,
    #[serde(default)]
    pub notes: Option<String>,
    pub scheduled_at: String,
    #[serde(default = "default_duration")]
    pub duration_minutes: u32,
}

impl Validate for AppointmentIn {
    fn validate(&self) -> TlxResult<()> {
        check_len("title", &self.title, 1, 120)?;
        check_opt_len("notes", self.notes.as_deref(), 1000)?;
        check_len("scheduled_at", &self.scheduled_at, 10, 40)?;
        check_duration(Some(self.duration_minutes))
    }
}

/// PATCH body. Nullable links use `Option<Option<_>>` so `null` detaches.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppointmentPatch {
    #[serde(default)]
    pub customer_id: Option<i64>,
    #[serde(default, deserialize_with = "double_option")]
    pub vehicle_id: Option<Option<i64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub service_order_id: Option<Option<i64>>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub notes: Option<Option<String>>,
    #[serde(default)]
    pub status: Option<AppointmentStatus>,
    #[serde(default)]
    pub scheduled_at: Option<String>,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
    #[serde(default, deserialize_with = "double_option")]
    pub reminded_at: Option<Option<String>>,
}

impl AppointmentPatch {
    pub fn is_empty(&self) -> bool {
        self.customer_id.is_none()
            && self.vehicle_id.is_none()
            && self.service_order_id.is_none()
            && self.title.is_none()
            && self.notes.is_none()
            && self.status.is_none()
            && self.scheduled_at.is_none()
            && self.duration_minutes.is_none()
            && self.reminded_at.is_none()
    }
}

impl Validate for AppointmentPatch {
    fn validate(&self) -> TlxResult<()> {
        if let Some(title) = &self.title {
            check_len("title", title, 1, 120)?;
        }
        check_patch_len("notes", &self.notes, 1000)?;
        if let Some(at) = &self.scheduled_at {
            check_len("scheduled_at", at, 10, 40)?;
        }
        if let Some(Some(at)) = &self.reminded_at {
            check_len("reminded_at", at, 10, 40)?;
        }
        check_duration(self.duration_minutes)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppointmentQuery {
    #[serde(default, rename = "from")]
    pub from_ts: Option<String>,
    #[serde(default, rename = "to")]
    pub to_ts: Option<String>,
    #[serde(default)]
    pub status: Option<AppointmentStatus>,
    #[serde(default)]
    pub customer_id: Option<i64>,
    #[serde(default)]
    pub vehicle_id: Option<i64>,
    #[serde(default)]
    pub only_unreminded: bool,
}

/// Resolved list filter with parsed bounds.
#[derive(Debug, Clone, Default)]
pub struct AppointmentFilter {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub status: Option<AppointmentStatus>,
    pub customer_id: Option<i64>,
    pub vehicle_id: Option<i64>,
    pub only_unreminded: bool,
}

impl AppointmentQuery {
    pub fn filter(&self) -> TlxResult<AppointmentFilter> {
        let bound = |field: &str, value: &Option<String>| -> TlxResult<Option<DateTime<Utc>>> {
            value
                .as_deref()
                .map(|v| time::require_iso8601(field, v))
                .transpose()
        };
        Ok(AppointmentFilter {
            from: bound("from", &self.from_ts)?,
            to: bound("to", &self.to_ts)?,
            status: self.status,
            customer_id: self.customer_id,
            vehicle_id: self.vehicle_id,
            only_unreminded: self.only_unreminded,
        })
    }
}

pub const DEFAULT_REMINDER_WINDOW_MIN: i64 = 15;
pub const MAX_REMINDER_WINDOW_MIN: i64 = 24 * 60;

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ReminderQuery {
    pub within_minutes: Option<i64>,
}

impl ReminderQuery {
    pub fn window(&self) -> TlxResult<i64> {
        let minutes = self.within_minutes.unwrap_or(DEFAULT_REMINDER_WINDOW_MIN);
        if !(1..=MAX_REMINDER_WINDOW_MIN).contains(&minutes) {
            return Err(TlxError::validation(format!(
                "within_minutes must be between 1 and {MAX_REMINDER_WINDOW_MIN}"
            )));
        }
        Ok(minutes)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Ack {
    pub ok: bool,
}

impl Ack {
    pub const OK: Ack = Ack { ok: true };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appointment_defaults_and_duration_rule() {
        let body: AppointmentIn = serde_json::from_str(
            r#"{"customer_id": 1, "title": "Oil change", "scheduled_at": "2026-03-02T09:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(body.duration_minutes, 30);
        assert!(body.validate().is_ok());

        let bad = AppointmentIn {
            duration_minutes: 45,
            ..body
        };
        assert_eq!(bad.validate().unwrap_err().status_code(), 422);
    }

    #[test]
    fn patch_tells_null_from_absent() {
        let patch: AppointmentPatch = serde_json::from_str(r#"{"vehicle_id": null}"#).unwrap();
        assert_eq!(patch.vehicle_id, Some(None));
        assert!(!patch.is_empty());
        let empty: AppointmentPatch = serde_json::from_str("{}").unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn reminder_window_bounds() {
        assert_eq!(ReminderQuery::default().window().unwrap(), 15);
        assert!(ReminderQuery { within_minutes: Some(0) }.window().is_err());
        assert!(ReminderQuery { within_minutes: Some(1441) }.window().is_err());
        assert_eq!(ReminderQuery { within_minutes: Some(1440) }.window().unwrap(), 1440);
    }

    #[test]
    fn order_status_wire_names() {
        assert_eq!(serde_json::to_string(&ServiceOrderStatus::InProgress).unwrap(), "\"in_progress\"");
        let s: ServiceOrderStatus = serde_json::from_str("\"canceled\"").unwrap();
        assert_eq!(s, ServiceOrderStatus::Canceled);
    }

    #[test]
    fn vehicle_year_range() {
        let v = VehicleIn {
            customer_id: 1,
            plate: "ABC1D23".into(),
            model: "Gol".into(),
            year: Some(1899),
            notes: None,
        };
        assert!(v.validate().is_err());
        assert!(VehicleIn { year: Some(2014), ..v }.validate().is_ok());
    }
}
