//! Workday calendar helpers.

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Longest horizon accepted by [`Workdays::horizon`], in workdays.
pub const MAX_HORIZON_DAYS: u32 = 1000;

/// The set of weekdays on which work is planned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Workdays(Vec<Weekday>);

impl Workdays {
    /// Build a workday set. Order and duplicates in `days` are irrelevant.
    pub fn new<I: IntoIterator<Item = Weekday>>(days: I) -> Self {
        let mut days: Vec<Weekday> = days.into_iter().collect();
        days.sort_by_key(|d| d.num_days_from_monday());
        days.dedup();
        Self(days)
    }

    /// Monday through Friday.
    pub fn mon_to_fri() -> Self {
        Self::new([
            Weekday::Mon,
            Weekday::Tue,
            Weekday::Wed,
            Weekday::Thu,
            Weekday::Fri,
        ])
    }

    pub fn days(&self) -> &[Weekday] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.0.contains(&date.weekday())
    }

    /// The first `count` workdays on or after `start`, ascending.
    pub fn horizon(&self, start: NaiveDate, count: u32) -> Result<Vec<NaiveDate>, ValidationError> {
        if count == 0 {
            return Err(ValidationError::EmptyHorizon(count));
        }
        if count > MAX_HORIZON_DAYS {
            return Err(ValidationError::invalid(
                "days",
                format!("must be at most {MAX_HORIZON_DAYS} (got {count})"),
            ));
        }
        if self.is_empty() {
            return Err(ValidationError::NoWorkdays);
        }

        let mut out = Vec::with_capacity(count as usize);
        let mut day = start;
        while out.len() < count as usize {
            if self.contains(day) {
                out.push(day);
            }
            day = succ(day)?;
        }
        Ok(out)
    }

    /// The first workday strictly after `date`.
    pub fn next_after(&self, date: NaiveDate) -> Result<NaiveDate, ValidationError> {
        if self.is_empty() {
            return Err(ValidationError::NoWorkdays);
        }
        let mut day = succ(date)?;
        while !self.contains(day) {
            day = succ(day)?;
        }
        Ok(day)
    }
}

impl Default for Workdays {
    fn default() -> Self {
        Self::mon_to_fri()
    }
}

fn succ(date: NaiveDate) -> Result<NaiveDate, ValidationError> {
    date.succ_opt()
        .ok_or_else(|| ValidationError::invalid("date", format!("no day after {date}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn horizon_skips_weekend() {
        // 2024-01-05 is a Friday
        let days = Workdays::default().horizon(d(2024, 1, 5), 3).unwrap();
        assert_eq!(days, vec![d(2024, 1, 5), d(2024, 1, 8), d(2024, 1, 9)]);
    }

    #[test]
    fn horizon_starting_on_weekend() {
        let days = Workdays::default().horizon(d(2024, 1, 6), 1).unwrap();
        assert_eq!(days, vec![d(2024, 1, 8)]);
    }

    #[test]
    fn zero_horizon_rejected() {
        let err = Workdays::default().horizon(d(2024, 1, 1), 0).unwrap_err();
        assert_eq!(err, ValidationError::EmptyHorizon(0));
    }

    #[test]
    fn oversized_horizon_rejected_before_allocating() {
        let err = Workdays::default().horizon(d(2024, 1, 1), 4_000_000_000).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidValue { ref field, .. } if field == "days"));
        let max = Workdays::default().horizon(d(2024, 1, 1), MAX_HORIZON_DAYS).unwrap();
        assert_eq!(max.len(), MAX_HORIZON_DAYS as usize);
    }

    #[test]
    fn empty_workday_set_rejected() {
        let wd = Workdays::new([]);
        assert_eq!(wd.horizon(d(2024, 1, 1), 2).unwrap_err(), ValidationError::NoWorkdays);
        assert_eq!(wd.next_after(d(2024, 1, 1)).unwrap_err(), ValidationError::NoWorkdays);
    }

    #[test]
    fn next_after_friday_is_monday() {
        assert_eq!(Workdays::default().next_after(d(2024, 1, 5)).unwrap(), d(2024, 1, 8));
        assert_eq!(Workdays::default().next_after(d(2024, 1, 1)).unwrap(), d(2024, 1, 2));
    }

    #[test]
    fn custom_set_is_normalized() {
        let wd = Workdays::new([Weekday::Sat, Weekday::Mon, Weekday::Sat]);
        assert_eq!(wd.days(), &[Weekday::Mon, Weekday::Sat]);
        assert_eq!(wd.next_after(d(2024, 1, 1)).unwrap(), d(2024, 1, 6));
    }
}
