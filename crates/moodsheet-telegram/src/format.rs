//! Message text for the bot. All output is Telegram HTML.

use chrono::{Datelike, NaiveDate};
use moodsheet_core::{DayStatus, Rating};
use moodsheet_notion::{DayEntry, MonthStatuses};

/// Escape text for Telegram's HTML parse mode.
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Colored square for a day's status.
pub fn status_square(status: Option<DayStatus>) -> &'static str {
    match status {
        Some(DayStatus::Rated(Rating::Good)) => "🟩",
        Some(DayStatus::Rated(Rating::Ok)) => "🟧",
        Some(DayStatus::Rated(Rating::Bad)) => "🟥",
        Some(DayStatus::Unknown) => "❓",
        None => "⬜️",
    }
}

pub fn rating_prompt() -> &'static str {
    "What's your rating for today?"
}

pub fn daily_reminder() -> &'static str {
    "🌙 <b>Don't forget to track today's status!</b>"
}

pub fn success_message(user_name: &str, rating: Rating) -> String {
    format!(
        "{} <b>{}</b> rated today as <b>{}</b>\n\n✓ Successfully updated in Notion!",
        rating.emoji(),
        html_escape(user_name),
        rating.as_str().to_uppercase()
    )
}

pub fn overwrite_prompt(rating: Rating) -> String {
    format!(
        "⚠️ Today is already filled in!\n\nDo you want to overwrite it with {} <b>{}</b>?",
        rating.emoji(),
        rating.as_str().to_uppercase()
    )
}

pub fn error_message(error: &str) -> String {
    format!("❌ Error: {}", html_escape(error))
}

/// One-line strip of the given days, oldest first.
pub fn format_last_days(entries: &[DayEntry]) -> String {
    let strip: String = entries.iter().map(|e| status_square(e.status)).collect();
    format!("🗓️ <b>Last {} days</b>\n\n{}", entries.len(), strip)
}

/// Monday-first calendar grid for a month.
///
/// When the month is the current one, days after `today` are drawn as ⬛
/// rather than as unfilled.
pub fn format_month_grid(month: &MonthStatuses, today: NaiveDate) -> String {
    let is_current = today.year() == month.year && today.month() == month.month;
    let today_day = if is_current { today.day() } else { 0 };

    let offset = NaiveDate::from_ymd_opt(month.year, month.month, 1)
        .map(|first| first.weekday().num_days_from_monday() as usize)
        .unwrap_or(0);

    let mut cells: Vec<&str> = vec!["▫️"; offset];
    for day in 1..=month.days_in_month {
        if is_current && day > today_day {
            cells.push("⬛");
            continue;
        }
        let status = month
            .statuses
            .iter()
            .find(|d| d.day == day)
            .and_then(|d| d.status);
        cells.push(status_square(status));
    }

    let rows: Vec<String> = cells.chunks(7).map(|week| week.join(" ")).collect();

    format!(
        "🗓️ <b>{}</b>\n M   T   W   Th   F   Sa  Su\n{}",
        html_escape(&month.label),
        rows.join("\n")
    )
}
