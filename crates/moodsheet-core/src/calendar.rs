//! Calendar helpers for locating tracker cells.

use chrono::{Datelike, Month, NaiveDate};

/// The (day, month) pair used to find a cell in a tracker table.
///
/// `day` is the day of month without padding (`"7"`, not `"07"`); `month` is
/// the lowercase English month name (`"march"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DayKey {
    pub day: String,
    pub month: String,
}

impl DayKey {
    pub fn new(day: impl Into<String>, month: impl Into<String>) -> Self {
        Self {
            day: day.into(),
            month: month.into(),
        }
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            day: date.day().to_string(),
            month: month_name(date.month()).to_lowercase(),
        }
    }

    /// Human label, e.g. `march day 15`.
    pub fn label(&self) -> String {
        format!("{} day {}", self.month, self.day)
    }
}

/// English month name for a 1-based month number.
pub fn month_name(month: u32) -> &'static str {
    u8::try_from(month)
        .ok()
        .and_then(|m| Month::try_from(m).ok())
        .map(|m| m.name())
        .unwrap_or("Unknown")
}

/// Display label for a month, e.g. `March 2025`.
pub fn month_label(year: i32, month: u32) -> String {
    format!("{} {}", month_name(month), year)
}

/// Number of days in the given month.
pub fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month >= 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first_of_next| first_of_next.pred_opt())
        .map(|last| last.day())
        .unwrap_or(31)
}

/// The first day of the month before `date`'s month.
pub fn previous_month(date: NaiveDate) -> NaiveDate {
    let (year, month) = if date.month() == 1 {
        (date.year() - 1, 12)
    } else {
        (date.year(), date.month() - 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(date)
}
