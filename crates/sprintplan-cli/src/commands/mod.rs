pub mod affinity;
pub mod config;
pub mod evening;
pub mod item;
pub mod plan;
pub mod report;
pub mod ticket;

use chrono::NaiveDate;
use serde::Serialize;
use sprintplan_core::WorkItemStatus;

/// Parse a `YYYY-MM-DD` argument.
pub fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|e| format!("invalid date '{s}' (expected YYYY-MM-DD): {e}"))
}

pub fn parse_status(s: &str) -> Result<WorkItemStatus, String> {
    s.parse::<WorkItemStatus>().map_err(|e| e.to_string())
}

/// The given date, or today's local date.
pub fn date_or_today(date: Option<NaiveDate>) -> NaiveDate {
    date.unwrap_or_else(|| chrono::Local::now().date_naive())
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
