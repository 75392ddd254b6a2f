//! `agenda` subcommands: the week grid and drag-style moves.

use anyhow::{bail, Context};
use chrono::{Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use clap::Subcommand;
use tlx_client::export::{self, Delimiter};
use tlx_client::{AppointmentRange, WorkshopApi};
use tlx_core::time::to_iso;
use tlx_workshop::{reschedule, week_start, CalendarGrid, WeekView};

const CELL: usize = 14;

#[derive(Subcommand)]
pub enum AgendaCommand {
    /// Show the week containing a date (default: today, UTC)
    Week {
        /// YYYY-MM-DD
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Print the week's appointments as CSV instead of a grid
        #[arg(long, default_value_t = false)]
        csv: bool,

        #[arg(long, default_value = ",")]
        delimiter: Delimiter,
    },

    /// Move an appointment to a day and time; the start snaps to the grid
    Move {
        id: i64,

        /// Target day, YYYY-MM-DD
        #[arg(long)]
        day: NaiveDate,

        /// Target time, HH:MM (UTC)
        #[arg(long)]
        at: NaiveTime,
    },
}

pub async fn run(api: &WorkshopApi, command: AgendaCommand) -> anyhow::Result<()> {
    match command {
        AgendaCommand::Week { date, csv: false, .. } => print_week(api, date).await,
        AgendaCommand::Week {
            date,
            csv: true,
            delimiter,
        } => {
            let appointments = fetch_week(api, week_start(date.unwrap_or_else(today))).await?;
            let items = serde_json::to_value(&appointments)?;
            let rows = export::json_rows(items.as_array().map(Vec::as_slice).unwrap_or_default(), export::APPOINTMENT_COLUMNS);
            print!("{}", export::to_csv(export::APPOINTMENT_COLUMNS, &rows, delimiter));
            Ok(())
        }
        AgendaCommand::Move { id, day, at } => move_appointment(api, id, day, at).await,
    }
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

async fn fetch_week(api: &WorkshopApi, monday: NaiveDate) -> anyhow::Result<Vec<tlx_workshop::models::Appointment>> {
    let from = Utc.from_utc_datetime(&monday.and_time(NaiveTime::default()));
    let range = AppointmentRange {
        from_ts: Some(to_iso(from)),
        to_ts: Some(to_iso(from + Duration::days(7))),
        status: None,
    };
    Ok(api.appointments(&range).await?)
}

fn clip(text: &str, width: usize) -> String {
    let mut out: String = text.chars().take(width).collect();
    while out.chars().count() < width {
        out.push(' ');
    }
    out
}

pub async fn print_week(api: &WorkshopApi, date: Option<NaiveDate>) -> anyhow::Result<()> {
    let monday = week_start(date.unwrap_or_else(today));
    let grid = CalendarGrid::default();
    let appointments = fetch_week(api, monday).await?;
    let view = WeekView::build(monday, &appointments, &grid);

    let mut header = clip("", 6);
    for day in &view.days {
        header.push_str(&clip(&format!("{} {:02}-{:02}", day.date.weekday(), day.date.month(), day.date.day()), CELL));
    }
    println!("{}", header.trim_end());

    for (slot, label) in view.slots.iter().enumerate() {
        let slot = slot as u32;
        let mut line = clip(label, 6);
        for day_index in 0..view.days.len() {
            let cell = match view.block_at(day_index, slot) {
                Some(block) if block.top_slot == slot => format!("#{} {}", block.appointment_id, block.title),
                Some(_) => "  |".to_string(),
                None => "  .".to_string(),
            };
            line.push_str(&clip(&cell, CELL));
        }
        println!("{}", line.trim_end());
    }

    println!("{} appointment(s) this week", view.block_count());
    if !view.off_grid.is_empty() {
        let ids: Vec<String> = view.off_grid.iter().map(|id| format!("#{id}")).collect();
        println!("Outside opening hours: {}", ids.join(", "));
    }
    Ok(())
}

async fn move_appointment(api: &WorkshopApi, id: i64, day: NaiveDate, at: NaiveTime) -> anyhow::Result<()> {
    let Some(appt) = api.appointment(id).await? else {
        bail!("appointment #{id} not found");
    };
    let grid = CalendarGrid::default();
    let open = grid.day_open(day);
    let pointer = i64::from(at.hour() * 60 + at.minute()) - i64::from(open.hour() * 60 + open.minute());
    let target = reschedule(&grid, &appt, day, pointer);
    let moved = api
        .move_appointment(id, &target)
        .await
        .with_context(|| format!("moving appointment #{id}"))?;
    println!("Moved #{} \"{}\" to {}", moved.id, moved.title, moved.scheduled_at);
    Ok(())
}
