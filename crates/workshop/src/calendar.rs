//! Week calendar model for the agenda view: a Monday-first grid of fixed
//! slots per day, appointments laid out as blocks, slot snapping and
//! drag-and-drop rescheduling.
//!
//! All times are UTC.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::Serialize;
use tlx_core::time::to_iso;
use tlx_core::{TlxError, TlxResult};

use crate::models::{Appointment, AppointmentStatus};

pub const DEFAULT_SLOT_MINUTES: u32 = 30;
pub const DAY_START_HOUR: u32 = 8;
pub const DAY_END_HOUR: u32 = 18;

/// Visible hours of a day and the slot size they are cut into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarGrid {
    slot_minutes: u32,
    start_minute: u32,
    end_minute: u32,
}

impl Default for CalendarGrid {
    fn default() -> Self {
        Self {
            slot_minutes: DEFAULT_SLOT_MINUTES,
            start_minute: DAY_START_HOUR * 60,
            end_minute: DAY_END_HOUR * 60,
        }
    }
}

impl CalendarGrid {
    /// `slot_minutes` must split the visible day evenly.
    pub fn new(slot_minutes: u32, start_hour: u32, end_hour: u32) -> TlxResult<Self> {
        if start_hour >= end_hour || end_hour > 24 {
            return Err(TlxError::validation("day must start before it ends, within 24 hours"));
        }
        let minutes = (end_hour - start_hour) * 60;
        if slot_minutes == 0 || minutes % slot_minutes != 0 {
            return Err(TlxError::validation(format!(
                "slot of {slot_minutes} minutes does not divide the day"
            )));
        }
        Ok(Self {
            slot_minutes,
            start_minute: start_hour * 60,
            end_minute: end_hour * 60,
        })
    }

    pub fn slot_minutes(&self) -> u32 {
        self.slot_minutes
    }

    pub fn slots_per_day(&self) -> u32 {
        (self.end_minute - self.start_minute) / self.slot_minutes
    }

    /// Top of the visible grid on `day`.
    pub fn day_open(&self, day: NaiveDate) -> DateTime<Utc> {
        midnight(day) + Duration::minutes(i64::from(self.start_minute))
    }

    pub fn day_close(&self, day: NaiveDate) -> DateTime<Utc> {
        midnight(day) + Duration::minutes(i64::from(self.end_minute))
    }

    pub fn slot_start(&self, day: NaiveDate, slot: u32) -> DateTime<Utc> {
        self.day_open(day) + Duration::minutes(i64::from(slot * self.slot_minutes))
    }

    /// Round `dt` to the nearest slot boundary of `day`'s grid, counted from
    /// the day's opening minute. Halfway rounds up.
    pub fn snap(&self, day: NaiveDate, dt: DateTime<Utc>) -> DateTime<Utc> {
        snap_round(dt, self.day_open(day), self.slot_minutes)
    }

    /// `HH:MM` label of every slot row.
    pub fn slot_labels(&self) -> Vec<String> {
        (0..self.slots_per_day())
            .map(|slot| {
                let minute = self.start_minute + slot * self.slot_minutes;
                format!("{:02}:{:02}", minute / 60, minute % 60)
            })
            .collect()
    }
}

fn midnight(day: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&day.and_time(NaiveTime::default()))
}

/// Monday of the week containing `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

/// Round to the nearest slot boundary, counted from midnight. Halfway
/// rounds up.
pub fn snap_to_slot(dt: DateTime<Utc>, slot_minutes: u32) -> DateTime<Utc> {
    snap_round(dt, midnight(dt.date_naive()), slot_minutes)
}

fn snap_round(dt: DateTime<Utc>, origin: DateTime<Utc>, slot_minutes: u32) -> DateTime<Utc> {
    let slot = i64::from(slot_minutes.max(1)) * 60;
    let secs = (dt - origin).num_seconds();
    origin + Duration::seconds((secs + slot / 2).div_euclid(slot) * slot)
}

/// An appointment placed on the grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarBlock {
    pub appointment_id: i64,
    pub customer_id: i64,
    pub title: String,
    pub status: AppointmentStatus,
    pub scheduled_at: String,
    /// First slot row covered.
    pub top_slot: u32,
    /// Rows covered, at least one.
    pub span: u32,
    /// Side-by-side column when blocks overlap (only non-scheduled
    /// appointments can).
    pub lane: u32,
    /// The appointment runs past the visible hours.
    pub clipped: bool,
}

impl CalendarBlock {
    pub fn covers(&self, slot: u32) -> bool {
        slot >= self.top_slot && slot < self.top_slot + self.span
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayColumn {
    pub date: NaiveDate,
    pub blocks: Vec<CalendarBlock>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeekView {
    pub week_start: NaiveDate,
    pub slot_minutes: u32,
    pub slots: Vec<String>,
    pub days: Vec<DayColumn>,
    /// Appointments in this week that fall entirely outside the visible hours.
    pub off_grid: Vec<i64>,
}

impl WeekView {
    /// Lay out the appointments of the week starting at `week_start`
    /// (snapped back to Monday). Appointments of other weeks or with an
    /// unparseable start are left out.
    pub fn build(week_start_day: NaiveDate, appointments: &[Appointment], grid: &CalendarGrid) -> Self {
        let monday = week_start(week_start_day);
        let slot = i64::from(grid.slot_minutes);
        let rows = i64::from(grid.slots_per_day());

        let mut days: Vec<DayColumn> = (0..7)
            .map(|i| DayColumn {
                date: monday + Duration::days(i),
                blocks: Vec::new(),
            })
            .collect();
        let mut off_grid = Vec::new();

        let mut sorted: Vec<(DateTime<Utc>, &Appointment)> = appointments
            .iter()
            .filter_map(|a| Some((a.starts_at()?, a)))
            .collect();
        sorted.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.id.cmp(&b.1.id)));

        for (start, appt) in sorted {
            let date = start.date_naive();
            let index = (date - monday).num_days();
            if !(0..7).contains(&index) {
                continue;
            }
            let open = grid.day_open(date);
            let close = grid.day_close(date);
            let end = start + Duration::minutes(i64::from(appt.duration_minutes));
            if end <= open || start >= close {
                off_grid.push(appt.id);
                continue;
            }

            let from = (start.max(open) - open).num_minutes();
            let to = (end.min(close) - open).num_minutes();
            let top = from / slot;
            let bottom = ((to + slot - 1) / slot).clamp(top + 1, rows);

            let column = &mut days[index as usize];
            let block = CalendarBlock {
                appointment_id: appt.id,
                customer_id: appt.customer_id,
                title: appt.title.clone(),
                status: appt.status,
                scheduled_at: appt.scheduled_at.clone(),
                top_slot: top as u32,
                span: (bottom - top) as u32,
                lane: 0,
                clipped: start < open || end > close,
            };
            let lane = (0..)
                .find(|lane| {
                    !column.blocks.iter().any(|b| {
                        b.lane == *lane && b.top_slot < block.top_slot + block.span && block.top_slot < b.top_slot + b.span
                    })
                })
                .unwrap_or(0);
            column.blocks.push(CalendarBlock { lane, ..block });
        }

        Self {
            week_start: monday,
            slot_minutes: grid.slot_minutes,
            slots: grid.slot_labels(),
            days,
            off_grid,
        }
    }

    /// Block covering `slot` on day `day_index` (0 = Monday), first lane wins.
    pub fn block_at(&self, day_index: usize, slot: u32) -> Option<&CalendarBlock> {
        self.days
            .get(day_index)?
            .blocks
            .iter()
            .filter(|b| b.covers(slot))
            .min_by_key(|b| b.lane)
    }

    pub fn block_count(&self) -> usize {
        self.days.iter().map(|d| d.blocks.len()).sum()
    }
}

/// Where a dragged appointment lands: `pointer_offset_minutes` is the
/// distance from the top of the target day's grid to the block's new top
/// edge. The start is snapped to the grid and kept inside the visible
/// hours; the result is the new `scheduled_at`.
pub fn reschedule(
    grid: &CalendarGrid,
    appointment: &Appointment,
    target_day: NaiveDate,
    pointer_offset_minutes: i64,
) -> String {
    let open = grid.day_open(target_day);
    let close = grid.day_close(target_day);
    let duration = Duration::minutes(i64::from(appointment.duration_minutes));

    let snapped = grid.snap(target_day, open + Duration::minutes(pointer_offset_minutes));
    let latest = snap_floor(close - duration, open, grid.slot_minutes).max(open);
    to_iso(snapped.clamp(open, latest))
}

fn snap_floor(dt: DateTime<Utc>, origin: DateTime<Utc>, slot_minutes: u32) -> DateTime<Utc> {
    let slot = i64::from(slot_minutes.max(1));
    let offset = (dt - origin).num_minutes();
    origin + Duration::minutes(offset.div_euclid(slot) * slot)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn appt(id: i64, at: &str, minutes: u32, status: AppointmentStatus) -> Appointment {
        Appointment {
            id,
            customer_id: 1,
            vehicle_id: None,
            service_order_id: None,
            title: format!("#{id}"),
            notes: None,
            status,
            scheduled_at: at.to_string(),
            duration_minutes: minutes,
            reminded_at: None,
        }
    }

    fn at(s: &str) -> DateTime<Utc> {
        tlx_core::time::parse_iso8601(s).unwrap()
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn snaps_to_nearest_slot() {
        assert_eq!(snap_to_slot(at("2026-03-04T09:14:00Z"), 30), at("2026-03-04T09:00:00Z"));
        assert_eq!(snap_to_slot(at("2026-03-04T09:15:00Z"), 30), at("2026-03-04T09:30:00Z"));
        assert_eq!(snap_to_slot(at("2026-03-04T09:44:59Z"), 30), at("2026-03-04T09:30:00Z"));
        assert_eq!(snap_to_slot(at("2026-03-04T23:50:00Z"), 30), at("2026-03-05T00:00:00Z"));
        assert_eq!(snap_to_slot(at("2026-03-04T10:07:00Z"), 15), at("2026-03-04T10:00:00Z"));
    }

    #[test]
    fn week_starts_on_monday() {
        // 2026-03-04 is a Wednesday.
        assert_eq!(week_start(date("2026-03-04")), date("2026-03-02"));
        assert_eq!(week_start(date("2026-03-02")), date("2026-03-02"));
        assert_eq!(week_start(date("2026-03-08")), date("2026-03-02"));
    }

    #[test]
    fn default_grid_shape() {
        let grid = CalendarGrid::default();
        assert_eq!(grid.slots_per_day(), 20);
        let labels = grid.slot_labels();
        assert_eq!(labels.first().map(String::as_str), Some("08:00"));
        assert_eq!(labels.last().map(String::as_str), Some("17:30"));
        assert!(CalendarGrid::new(45, 8, 18).is_err());
        assert!(CalendarGrid::new(30, 18, 8).is_err());
        assert_eq!(CalendarGrid::new(60, 7, 19).unwrap().slots_per_day(), 12);
    }

    #[test]
    fn lays_out_blocks_per_day() {
        let grid = CalendarGrid::default();
        let appointments = vec![
            appt(1, "2026-03-02T09:00:00Z", 60, AppointmentStatus::Scheduled),
            appt(2, "2026-03-04T17:30:00Z", 90, AppointmentStatus::Scheduled),
            appt(3, "2026-03-04T06:00:00Z", 30, AppointmentStatus::Scheduled),
            appt(4, "2026-03-10T09:00:00Z", 30, AppointmentStatus::Scheduled),
            appt(5, "2026-03-02T09:30:00Z", 30, AppointmentStatus::Canceled),
            appt(6, "garbage", 30, AppointmentStatus::Scheduled),
        ];
        let view = WeekView::build(date("2026-03-04"), &appointments, &grid);

        assert_eq!(view.week_start, date("2026-03-02"));
        assert_eq!(view.days.len(), 7);
        assert_eq!(view.block_count(), 3);
        assert_eq!(view.off_grid, vec![3]);

        let monday = &view.days[0].blocks;
        assert_eq!((monday[0].top_slot, monday[0].span, monday[0].lane), (2, 2, 0));
        assert_eq!((monday[1].top_slot, monday[1].span, monday[1].lane), (3, 1, 1));
        assert_eq!(view.block_at(0, 3).map(|b| b.appointment_id), Some(1));
        assert!(view.block_at(0, 4).is_none());

        let late = &view.days[2].blocks[0];
        assert_eq!((late.top_slot, late.span, late.clipped), (19, 1, true));
    }

    #[test]
    fn reschedule_snaps_and_clamps() {
        let grid = CalendarGrid::default();
        let a = appt(1, "2026-03-02T09:00:00Z", 60, AppointmentStatus::Scheduled);
        let thursday = date("2026-03-05");

        // 2h10m below the top of the grid lands on 10:00.
        assert_eq!(reschedule(&grid, &a, thursday, 130), "2026-03-05T10:00:00+00:00");
        // 2h20m rounds to 10:30.
        assert_eq!(reschedule(&grid, &a, thursday, 140), "2026-03-05T10:30:00+00:00");
        // Dragged above the grid.
        assert_eq!(reschedule(&grid, &a, thursday, -45), "2026-03-05T08:00:00+00:00");
        // A one-hour block cannot start after 17:00.
        assert_eq!(reschedule(&grid, &a, thursday, 590), "2026-03-05T17:00:00+00:00");
    }

    #[test]
    fn reschedule_stays_on_grid_when_slots_do_not_divide_the_hour() {
        let grid = CalendarGrid::new(25, 8, 18).unwrap();
        let a = appt(1, "2026-03-02T09:00:00Z", 60, AppointmentStatus::Scheduled);
        let thursday = date("2026-03-05");
        assert_eq!(&grid.slot_labels()[..3], ["08:00", "08:25", "08:50"]);

        assert_eq!(reschedule(&grid, &a, thursday, 25), "2026-03-05T08:25:00+00:00");
        assert_eq!(reschedule(&grid, &a, thursday, 30), "2026-03-05T08:25:00+00:00");
        assert_eq!(reschedule(&grid, &a, thursday, 38), "2026-03-05T08:50:00+00:00");
        // Latest slot that still fits a one-hour block.
        assert_eq!(reschedule(&grid, &a, thursday, 600), "2026-03-05T16:45:00+00:00");
        assert_eq!(grid.snap(thursday, at("2026-03-05T12:00:00Z")), at("2026-03-05T12:10:00Z"));
    }
}
