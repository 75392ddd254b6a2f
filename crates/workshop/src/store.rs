//! In-memory service-shop store backed by DashMap.
//!
//! Production: replace with PostgreSQL (sqlx) or similar ACID store.
//! Cascading deletes, the unique-email check and the appointment overlap
//! check run under `write_lock`.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicI64, Ordering};
use tlx_core::time::{self, to_iso};
use tlx_core::{TlxError, TlxResult};
use tracing::info;

use crate::models::*;

#[derive(Default)]
struct IdSeq(AtomicI64);

impl IdSeq {
    fn next(&self) -> i64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }
}

#[derive(Default)]
struct Ids {
    user: IdSeq,
    customer: IdSeq,
    vehicle: IdSeq,
    order: IdSeq,
    appointment: IdSeq,
}

pub struct WorkshopStore {
    users: DashMap<i64, ShopUser>,
    customers: DashMap<i64, Customer>,
    vehicles: DashMap<i64, Vehicle>,
    orders: DashMap<i64, ServiceOrder>,
    appointments: DashMap<i64, Appointment>,
    ids: Ids,
    write_lock: Mutex<()>,
}

impl Default for WorkshopStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Newest first, the order every list endpoint uses.
fn newest_first<T: Clone>(map: &DashMap<i64, T>, keep: impl Fn(&T) -> bool) -> Vec<T> {
    let mut rows: Vec<(i64, T)> = map
        .iter()
        .filter(|r| keep(r.value()))
        .map(|r| (*r.key(), r.value().clone()))
        .collect();
    rows.sort_unstable_by(|a, b| b.0.cmp(&a.0));
    rows.into_iter().map(|(_, v)| v).collect()
}

fn customer_missing() -> TlxError {
    TlxError::not_found("Customer not found")
}

fn vehicle_missing() -> TlxError {
    TlxError::not_found("Vehicle not found")
}

fn order_missing() -> TlxError {
    TlxError::not_found("Service order not found")
}

fn appointment_missing() -> TlxError {
    TlxError::not_found("Appointment not found")
}

impl WorkshopStore {
    pub fn new() -> Self {
        info!("Workshop store initialized (in-memory, development mode)");
        Self {
            users: DashMap::new(),
            customers: DashMap::new(),
            vehicles: DashMap::new(),
            orders: DashMap::new(),
            appointments: DashMap::new(),
            ids: Ids::default(),
            write_lock: Mutex::new(()),
        }
    }

    // ─── Users ─────────────────────────────────────────────────────────────

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn user(&self, id: i64) -> Option<ShopUser> {
        self.users.get(&id).map(|u| u.clone())
    }

    pub fn user_by_email(&self, email: &str) -> Option<ShopUser> {
        let email = email.trim().to_lowercase();
        self.users
            .iter()
            .find(|u| u.email == email)
            .map(|u| u.value().clone())
    }

    pub fn create_user(&self, email: &str, password_hash: String, role: ShopRole) -> TlxResult<ShopUser> {
        let email = email.trim().to_lowercase();
        let _guard = self.write_lock.lock();
        if self.users.iter().any(|u| u.email == email) {
            return Err(TlxError::conflict("Email already exists"));
        }
        let user = ShopUser {
            id: self.ids.user.next(),
            email,
            password_hash,
            role,
            is_active: true,
            created_at: time::now(),
        };
        self.users.insert(user.id, user.clone());
        Ok(user)
    }

    /// Create the first admin when the user table is empty. Returns whether
    /// one was created.
    pub fn bootstrap_admin(&self, email: &str, password_hash: String) -> bool {
        if self.user_count() > 0 {
            return false;
        }
        self.create_user(email, password_hash, ShopRole::Admin).is_ok()
    }

    pub fn set_user_active(&self, id: i64, active: bool) -> bool {
        match self.users.get_mut(&id) {
            Some(mut user) => {
                user.is_active = active;
                true
            }
            None => false,
        }
    }

    pub fn list_active_users(&self) -> Vec<UserPublic> {
        newest_first(&self.users, |u| u.is_active)
            .iter()
            .map(ShopUser::public)
            .collect()
    }

    // ─── Customers ─────────────────────────────────────────────────────────

    pub fn list_customers(&self) -> Vec<Customer> {
        newest_first(&self.customers, |_| true)
    }

    pub fn customer(&self, id: i64) -> Option<Customer> {
        self.customers.get(&id).map(|c| c.clone())
    }

    pub fn create_customer(&self, req: CustomerIn) -> Customer {
        let customer = Customer {
            id: self.ids.customer.next(),
            name: req.name,
            phone: req.phone,
        };
        self.customers.insert(customer.id, customer.clone());
        customer
    }

    pub fn update_customer(&self, id: i64, patch: CustomerPatch) -> TlxResult<Customer> {
        let mut customer = self.customers.get_mut(&id).ok_or_else(customer_missing)?;
        if let Some(name) = patch.name {
            customer.name = name;
        }
        tlx_core::patch::apply(&mut customer.phone, patch.phone);
        Ok(customer.clone())
    }

    /// Removes the customer with their vehicles, service orders and
    /// appointments.
    pub fn delete_customer(&self, id: i64) -> TlxResult<()> {
        let _guard = self.write_lock.lock();
        self.customers.remove(&id).ok_or_else(customer_missing)?;
        self.vehicles.retain(|_, v| v.customer_id != id);
        self.orders.retain(|_, o| o.customer_id != id);
        self.appointments.retain(|_, a| a.customer_id != id);
        Ok(())
    }

    // ─── Vehicles ──────────────────────────────────────────────────────────

    pub fn list_vehicles(&self, customer_id: Option<i64>) -> Vec<Vehicle> {
        newest_first(&self.vehicles, |v| customer_id.map_or(true, |c| v.customer_id == c))
    }

    pub fn vehicle(&self, id: i64) -> Option<Vehicle> {
        self.vehicles.get(&id).map(|v| v.clone())
    }

    pub fn create_vehicle(&self, req: VehicleIn) -> TlxResult<Vehicle> {
        let _guard = self.write_lock.lock();
        if !self.customers.contains_key(&req.customer_id) {
            return Err(customer_missing());
        }
        let vehicle = Vehicle {
            id: self.ids.vehicle.next(),
            customer_id: req.customer_id,
            plate: req.plate,
            model: req.model,
            year: req.year,
            notes: req.notes,
        };
        self.vehicles.insert(vehicle.id, vehicle.clone());
        Ok(vehicle)
    }

    pub fn update_vehicle(&self, id: i64, patch: VehiclePatch) -> TlxResult<Vehicle> {
        let _guard = self.write_lock.lock();
        if !self.vehicles.contains_key(&id) {
            return Err(vehicle_missing());
        }
        if let Some(customer_id) = patch.customer_id {
            if !self.customers.contains_key(&customer_id) {
                return Err(customer_missing());
            }
        }
        let mut vehicle = self.vehicles.get_mut(&id).ok_or_else(vehicle_missing)?;
        if let Some(customer_id) = patch.customer_id {
            vehicle.customer_id = customer_id;
        }
        if let Some(plate) = patch.plate {
            vehicle.plate = plate;
        }
        if let Some(model) = patch.model {
            vehicle.model = model;
        }
        tlx_core::patch::apply(&mut vehicle.year, patch.year);
        tlx_core::patch::apply(&mut vehicle.notes, patch.notes);
        Ok(vehicle.clone())
    }

    /// Removes the vehicle and its service orders. Appointments keep their
    /// slot but lose the vehicle and any removed order link.
    pub fn delete_vehicle(&self, id: i64) -> TlxResult<()> {
        let _guard = self.write_lock.lock();
        self.vehicles.remove(&id).ok_or_else(vehicle_missing)?;
        let mut dropped = Vec::new();
        self.orders.retain(|order_id, o| {
            let keep = o.vehicle_id != id;
            if !keep {
                dropped.push(*order_id);
            }
            keep
        });
        for mut appt in self.appointments.iter_mut() {
            if appt.vehicle_id == Some(id) {
                appt.vehicle_id = None;
            }
            if appt.service_order_id.is_some_and(|so| dropped.contains(&so)) {
                appt.service_order_id = None;
            }
        }
        Ok(())
    }

    /// Vehicle exists and belongs to the customer.
    fn check_vehicle_owner(&self, vehicle_id: i64, customer_id: i64) -> TlxResult<()> {
        let vehicle = self.vehicles.get(&vehicle_id).ok_or_else(vehicle_missing)?;
        if vehicle.customer_id != customer_id {
            return Err(TlxError::bad_request("Vehicle does not belong to customer"));
        }
        Ok(())
    }

    // ─── Service orders ────────────────────────────────────────────────────

    pub fn list_orders(&self, query: ServiceOrderQuery) -> Vec<ServiceOrder> {
        newest_first(&self.orders, |o| {
            query.customer_id.map_or(true, |c| o.customer_id == c)
                && query.vehicle_id.map_or(true, |v| o.vehicle_id == v)
        })
    }

    pub fn create_order(&self, req: ServiceOrderIn) -> TlxResult<ServiceOrder> {
        let _guard = self.write_lock.lock();
        if !self.customers.contains_key(&req.customer_id) {
            return Err(customer_missing());
        }
        self.check_vehicle_owner(req.vehicle_id, req.customer_id)?;
        let order = ServiceOrder {
            id: self.ids.order.next(),
            customer_id: req.customer_id,
            vehicle_id: req.vehicle_id,
            description: req.description,
            status: req.status,
            total_cents: req.total_cents,
        };
        self.orders.insert(order.id, order.clone());
        Ok(order)
    }

    pub fn update_order(&self, id: i64, patch: ServiceOrderPatch) -> TlxResult<ServiceOrder> {
        let mut order = self.orders.get_mut(&id).ok_or_else(order_missing)?;
        if let Some(description) = patch.description {
            order.description = description;
        }
        if let Some(status) = patch.status {
            order.status = status;
        }
        if let Some(total) = patch.total_cents {
            order.total_cents = total;
        }
        Ok(order.clone())
    }

    pub fn delete_order(&self, id: i64) -> TlxResult<()> {
        let _guard = self.write_lock.lock();
        self.orders.remove(&id).ok_or_else(order_missing)?;
        for mut appt in self.appointments.iter_mut() {
            if appt.service_order_id == Some(id) {
                appt.service_order_id = None;
            }
        }
        Ok(())
    }

    pub fn stats(&self) -> StatsOut {
        let mut stats = StatsOut {
            customers: self.customers.len() as u64,
            vehicles: self.vehicles.len() as u64,
            ..StatsOut::default()
        };
        for order in self.orders.iter() {
            stats.service_orders_total += 1;
            match order.status {
                ServiceOrderStatus::Open => stats.service_orders_open += 1,
                ServiceOrderStatus::InProgress => stats.service_orders_in_progress += 1,
                ServiceOrderStatus::Done => {
                    stats.service_orders_done += 1;
                    stats.revenue_done_cents += order.total_cents;
                }
                ServiceOrderStatus::Canceled => stats.service_orders_canceled += 1,
            }
        }
        stats
    }

    // ─── Appointments ──────────────────────────────────────────────────────

    pub fn appointment(&self, id: i64) -> Option<Appointment> {
        self.appointments.get(&id).map(|a| a.clone())
    }

    /// Filtered appointments ordered by start time.
    pub fn list_appointments(&self, filter: &AppointmentFilter) -> Vec<Appointment> {
        let mut rows: Vec<(DateTime<Utc>, Appointment)> = self
            .appointments
            .iter()
            .filter_map(|a| {
                let start = a.starts_at()?;
                let keep = filter.status.map_or(true, |s| a.status == s)
                    && filter.customer_id.map_or(true, |c| a.customer_id == c)
                    && filter.vehicle_id.map_or(true, |v| a.vehicle_id == Some(v))
                    && filter.from.map_or(true, |from| start >= from)
                    && filter.to.map_or(true, |to| start <= to)
                    && (!filter.only_unreminded || a.reminded_at.is_none());
                keep.then(|| (start, a.value().clone()))
            })
            .collect();
        rows.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.id.cmp(&b.1.id)));
        rows.into_iter().map(|(_, a)| a).collect()
    }

    /// Scheduled, not yet reminded appointments starting within
    /// `[now, now + within_minutes]`.
    pub fn due_reminders(&self, now: DateTime<Utc>, within_minutes: i64) -> Vec<Appointment> {
        self.list_appointments(&AppointmentFilter {
            from: Some(now),
            to: Some(now + Duration::minutes(within_minutes)),
            status: Some(AppointmentStatus::Scheduled),
            only_unreminded: true,
            ..AppointmentFilter::default()
        })
    }

    /// Links must point at existing rows and the vehicle at the customer.
    fn check_links(&self, customer_id: i64, vehicle_id: Option<i64>, order_id: Option<i64>) -> TlxResult<()> {
        if !self.customers.contains_key(&customer_id) {
            return Err(customer_missing());
        }
        if let Some(vehicle_id) = vehicle_id {
            self.check_vehicle_owner(vehicle_id, customer_id)?;
        }
        if let Some(order_id) = order_id {
            if !self.orders.contains_key(&order_id) {
                return Err(order_missing());
            }
        }
        Ok(())
    }

    /// No two scheduled appointments may overlap, shop-wide.
    fn check_conflict(&self, scheduled_at: &str, duration_minutes: u32, exclude: Option<i64>) -> TlxResult<()> {
        let start = time::require_iso8601("scheduled_at", scheduled_at)?;
        let end = start + Duration::minutes(i64::from(duration_minutes));

        let clash = self
            .appointments
            .iter()
            .filter(|a| a.status == AppointmentStatus::Scheduled && Some(a.id) != exclude)
            .filter_map(|a| Some((a.id, a.starts_at()?, a.ends_at()?)))
            .filter(|(_, other_start, other_end)| start < *other_end && *other_start < end)
            .min_by_key(|(id, _, _)| *id);

        match clash {
            Some((id, other_start, _)) => Err(TlxError::conflict(format!(
                "Schedule conflict: appointment #{id} at {}",
                to_iso(other_start)
            ))),
            None => Ok(()),
        }
    }

    pub fn create_appointment(&self, req: AppointmentIn) -> TlxResult<Appointment> {
        let _guard = self.write_lock.lock();
        self.check_links(req.customer_id, req.vehicle_id, req.service_order_id)?;
        self.check_conflict(&req.scheduled_at, req.duration_minutes, None)?;

        let appt = Appointment {
            id: self.ids.appointment.next(),
            customer_id: req.customer_id,
            vehicle_id: req.vehicle_id,
            service_order_id: req.service_order_id,
            title: req.title,
            notes: req.notes,
            status: AppointmentStatus::Scheduled,
            scheduled_at: req.scheduled_at,
            duration_minutes: req.duration_minutes,
            reminded_at: None,
        };
        self.appointments.insert(appt.id, appt.clone());
        Ok(appt)
    }

    /// Apply a PATCH. The overlap rule only applies when the result is
    /// still (or becomes) scheduled.
    pub fn update_appointment(&self, id: i64, patch: AppointmentPatch) -> TlxResult<Appointment> {
        let _guard = self.write_lock.lock();
        let mut next = self.appointment(id).ok_or_else(appointment_missing)?;

        if let Some(customer_id) = patch.customer_id {
            next.customer_id = customer_id;
        }
        tlx_core::patch::apply(&mut next.vehicle_id, patch.vehicle_id);
        tlx_core::patch::apply(&mut next.service_order_id, patch.service_order_id);
        if let Some(title) = patch.title {
            next.title = title;
        }
        tlx_core::patch::apply(&mut next.notes, patch.notes);
        if let Some(status) = patch.status {
            next.status = status;
        }
        if let Some(at) = patch.scheduled_at {
            next.scheduled_at = at;
        }
        if let Some(minutes) = patch.duration_minutes {
            next.duration_minutes = minutes;
        }
        tlx_core::patch::apply(&mut next.reminded_at, patch.reminded_at);

        self.check_links(next.customer_id, next.vehicle_id, next.service_order_id)?;
        if next.status == AppointmentStatus::Scheduled {
            self.check_conflict(&next.scheduled_at, next.duration_minutes, Some(id))?;
        } else {
            time::require_iso8601("scheduled_at", &next.scheduled_at)?;
        }

        self.appointments.insert(id, next.clone());
        Ok(next)
    }

    pub fn delete_appointment(&self, id: i64) -> TlxResult<()> {
        self.appointments
            .remove(&id)
            .map(|_| ())
            .ok_or_else(appointment_missing)
    }

    pub fn mark_reminded(&self, id: i64, at: DateTime<Utc>) -> TlxResult<Appointment> {
        let mut appt = self.appointments.get_mut(&id).ok_or_else(appointment_missing)?;
        appt.reminded_at = Some(to_iso(at));
        Ok(appt.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> (WorkshopStore, i64, i64) {
        let store = WorkshopStore::new();
        let customer = store.create_customer(CustomerIn {
            name: "Ana".into(),
            phone: Some("+5511999990000".into()),
        });
        let vehicle = store
            .create_vehicle(VehicleIn {
                customer_id: customer.id,
                plate: "ABC1D23".into(),
                model: "Gol".into(),
                year: Some(2014),
                notes: None,
            })
            .unwrap();
        (store, customer.id, vehicle.id)
    }

    fn booking(customer_id: i64, at: &str, minutes: u32) -> AppointmentIn {
        AppointmentIn {
            customer_id,
            vehicle_id: None,
            service_order_id: None,
            title: "Revisão".into(),
            notes: None,
            scheduled_at: at.into(),
            duration_minutes: minutes,
        }
    }

    #[test]
    fn bootstrap_only_when_empty() {
        let store = WorkshopStore::new();
        assert!(store.bootstrap_admin("Admin@Shop.local", "h".into()));
        assert!(!store.bootstrap_admin("other@shop.local", "h".into()));
        let admin = store.user_by_email("admin@shop.local").unwrap();
        assert_eq!(admin.role, ShopRole::Admin);
        assert_eq!(
            store.create_user("ADMIN@shop.local", "h".into(), ShopRole::Operator).unwrap_err().status_code(),
            409
        );
    }

    #[test]
    fn order_vehicle_must_belong_to_customer() {
        let (store, customer_id, vehicle_id) = seeded();
        let other = store.create_customer(CustomerIn {
            name: "Bruno".into(),
            phone: None,
        });
        let err = store
            .create_order(ServiceOrderIn {
                customer_id: other.id,
                vehicle_id,
                description: "Brakes".into(),
                status: ServiceOrderStatus::Open,
                total_cents: 0,
            })
            .unwrap_err();
        assert_eq!(err.status_code(), 400);

        let err = store
            .create_order(ServiceOrderIn {
                customer_id,
                vehicle_id: 999,
                description: "Brakes".into(),
                status: ServiceOrderStatus::Open,
                total_cents: 0,
            })
            .unwrap_err();
        assert_eq!(err.status_code(), 404);
    }

    #[test]
    fn overlapping_scheduled_appointments_conflict() {
        let (store, customer_id, _) = seeded();
        let first = store
            .create_appointment(booking(customer_id, "2026-03-02T09:00:00Z", 60))
            .unwrap();

        let err = store
            .create_appointment(booking(customer_id, "2026-03-02T09:30:00Z", 30))
            .unwrap_err();
        assert_eq!(err.status_code(), 409);
        assert!(err.to_string().contains(&format!("#{}", first.id)));

        // Back-to-back is fine.
        store
            .create_appointment(booking(customer_id, "2026-03-02T10:00:00Z", 30))
            .unwrap();

        // Canceling frees the slot.
        store
            .update_appointment(
                first.id,
                AppointmentPatch {
                    status: Some(AppointmentStatus::Canceled),
                    ..AppointmentPatch::default()
                },
            )
            .unwrap();
        store
            .create_appointment(booking(customer_id, "2026-03-02T09:15:00+00:00", 30))
            .unwrap();
    }

    #[test]
    fn moving_an_appointment_ignores_itself() {
        let (store, customer_id, _) = seeded();
        let appt = store
            .create_appointment(booking(customer_id, "2026-03-02T09:00:00Z", 60))
            .unwrap();
        let moved = store
            .update_appointment(
                appt.id,
                AppointmentPatch {
                    scheduled_at: Some("2026-03-02T09:30:00Z".into()),
                    ..AppointmentPatch::default()
                },
            )
            .unwrap();
        assert_eq!(moved.scheduled_at, "2026-03-02T09:30:00Z");
    }

    #[test]
    fn invalid_start_is_bad_request() {
        let (store, customer_id, _) = seeded();
        let err = store
            .create_appointment(booking(customer_id, "next tuesday", 30))
            .unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn deletes_cascade() {
        let (store, customer_id, vehicle_id) = seeded();
        let order = store
            .create_order(ServiceOrderIn {
                customer_id,
                vehicle_id,
                description: "Oil".into(),
                status: ServiceOrderStatus::Done,
                total_cents: 15_000,
            })
            .unwrap();
        let appt = store
            .create_appointment(AppointmentIn {
                vehicle_id: Some(vehicle_id),
                service_order_id: Some(order.id),
                ..booking(customer_id, "2026-03-02T09:00:00Z", 30)
            })
            .unwrap();
        assert_eq!(store.stats().revenue_done_cents, 15_000);

        store.delete_vehicle(vehicle_id).unwrap();
        let appt = store.appointment(appt.id).unwrap();
        assert_eq!((appt.vehicle_id, appt.service_order_id), (None, None));
        assert_eq!(store.stats().service_orders_total, 0);

        store.delete_customer(customer_id).unwrap();
        assert!(store.appointment(appt.id).is_none());
        assert_eq!(store.delete_customer(customer_id).unwrap_err().status_code(), 404);
    }

    #[test]
    fn reminders_window() {
        let (store, customer_id, _) = seeded();
        let now = time::now();
        let soon = store
            .create_appointment(booking(customer_id, &to_iso(now + Duration::minutes(10)), 30))
            .unwrap();
        store
            .create_appointment(booking(customer_id, &to_iso(now + Duration::hours(3)), 30))
            .unwrap();

        let due = store.due_reminders(now, 15);
        assert_eq!(due.iter().map(|a| a.id).collect::<Vec<_>>(), vec![soon.id]);

        store.mark_reminded(soon.id, now).unwrap();
        assert!(store.due_reminders(now, 15).is_empty());
        assert_eq!(store.due_reminders(now, 240).len(), 1);
    }
}
