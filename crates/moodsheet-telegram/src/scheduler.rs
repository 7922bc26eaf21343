//! Daily reminder at a fixed local time.
//!
//! The "already prompted" marker lives in memory only, so a restart around
//! the prompt time can miss or repeat a reminder.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Days, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use moodsheet_core::{call_with_deadline, resolve_local};
use moodsheet_notion::TrackerSheet;
use teloxide::prelude::*;
use teloxide::types::{ChatId, ParseMode};
use tracing::{debug, error, info, warn};

use crate::conversation::{rating_choices, SHEET_CALL_BUDGET};
use crate::format::daily_reminder;
use crate::handlers::{bot_call, inline_keyboard};
use crate::state::BotState;

/// Fire-time bookkeeping for the daily prompt.
#[derive(Debug, Clone)]
pub struct DailyScheduler {
    prompt_time: NaiveTime,
    last_prompt_date: Option<NaiveDate>,
}

/// What to do when the prompt time arrives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptDecision {
    AlreadyPrompted,
    NoDestination,
    /// Today's cell is filled; the day is marked as prompted.
    AlreadyFilled,
    Send { chat_id: i64 },
    CheckFailed(String),
}

impl DailyScheduler {
    pub fn new(prompt_time: NaiveTime) -> Self {
        Self {
            prompt_time,
            last_prompt_date: None,
        }
    }

    pub fn prompt_time(&self) -> NaiveTime {
        self.prompt_time
    }

    pub fn has_already_prompted_today(&self, today: NaiveDate) -> bool {
        self.last_prompt_date == Some(today)
    }

    pub fn set_prompted_today(&mut self, today: NaiveDate) {
        self.last_prompt_date = Some(today);
    }

    /// Next occurrence of the prompt time; tomorrow's once today's has passed.
    pub fn next_fire_at(&self, now: NaiveDateTime) -> NaiveDateTime {
        let today = now.date().and_time(self.prompt_time);
        if now > today {
            today.checked_add_days(Days::new(1)).unwrap_or(today)
        } else {
            today
        }
    }

    /// Real time left until the next prompt, across any DST change in `now`'s
    /// timezone.
    pub fn delay_until_next<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Duration {
        let next = resolve_local(&now.timezone(), self.next_fire_at(now.naive_local()));
        next.signed_duration_since(now).to_std().unwrap_or_default()
    }

    /// Decide whether `today`'s reminder should go out.
    pub async fn decide(
        &mut self,
        sheet: &TrackerSheet,
        destination: Option<i64>,
        today: NaiveDate,
    ) -> PromptDecision {
        if self.has_already_prompted_today(today) {
            return PromptDecision::AlreadyPrompted;
        }
        let Some(chat_id) = destination else {
            return PromptDecision::NoDestination;
        };

        let check = call_with_deadline(
            "checkTodayFilled",
            SHEET_CALL_BUDGET,
            sheet.check_filled_on(today),
        )
        .await
        .into_result();

        match check {
            Ok(check) if check.filled => {
                self.set_prompted_today(today);
                PromptDecision::AlreadyFilled
            }
            Ok(_) => PromptDecision::Send { chat_id },
            Err(e) => PromptDecision::CheckFailed(e.to_string()),
        }
    }
}

/// Send the daily reminder at the configured time, forever.
pub async fn run_daily_prompts(bot: Bot, state: Arc<BotState>) {
    loop {
        let now = state.clock.now_zoned();
        let (next, delay) = {
            let scheduler = state.scheduler.lock().await;
            (
                scheduler.next_fire_at(now.naive_local()),
                scheduler.delay_until_next(&now),
            )
        };
        info!(next = %next, "Next daily status prompt scheduled");
        tokio::time::sleep(delay).await;

        fire_daily_prompt(&bot, &state).await;
    }
}

/// One reminder attempt. The day is marked prompted only once the message
/// was delivered.
pub async fn fire_daily_prompt(bot: &Bot, state: &BotState) {
    let today = state.clock.today();
    let mut scheduler = state.scheduler.lock().await;

    match scheduler
        .decide(&state.sheet, state.config.group_chat_id, today)
        .await
    {
        PromptDecision::AlreadyPrompted => debug!("Already prompted today, skipping"),
        PromptDecision::NoDestination => {
            warn!("TELEGRAM_GROUP_CHAT_ID not configured, skipping daily prompt")
        }
        PromptDecision::AlreadyFilled => info!("Today's status already filled, no prompt needed"),
        PromptDecision::CheckFailed(e) => {
            error!(operation = "checkTodayFilled", error = %e, "Failed to send daily prompt")
        }
        PromptDecision::Send { chat_id } => {
            let send = bot
                .send_message(ChatId(chat_id), daily_reminder())
                .parse_mode(ParseMode::Html)
                .reply_markup(inline_keyboard(&rating_choices()));
            match bot_call("sendMessage", send).await {
                Ok(_) => {
                    scheduler.set_prompted_today(today);
                    info!(chat_id, "Daily status prompt sent");
                }
                Err(e) => error!(operation = "sendMessage", error = %e, "Failed to send daily prompt"),
            }
        }
    }
}
