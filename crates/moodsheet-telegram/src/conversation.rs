//! Rating conversation.
//!
//! [`ConversationController::handle`] turns one inbound event into the
//! requester's new [`ConversationState`] and a list of [`OutboundAction`]s.
//! It never talks to Telegram itself; the handlers deliver the actions. This
//! keeps the flow testable against an in-memory sheet.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use chrono::NaiveDateTime;
use moodsheet_core::{call_with_deadline, Clock, Rating};
use moodsheet_notion::{FilledCheck, NotionError, TrackerSheet, UpdateReceipt};
use regex::Regex;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::format::{error_message, overwrite_prompt, rating_prompt, success_message};

/// Budget for a whole sheet operation started from the bot.
pub const SHEET_CALL_BUDGET: Duration = Duration::from_millis(10_000);

/// Default number of pending confirmations kept.
pub const DEFAULT_PENDING_CAPACITY: usize = 256;

pub const EXPIRED_NOTICE: &str = "This confirmation has expired";
pub const CANCELLED_NOTICE: &str = "Cancelled ✗";
pub const UPDATED_NOTICE: &str = "Updated successfully";

/// Where a requester is in the rating flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationState {
    Idle,
    AwaitingRatingChoice,
    AwaitingOverwriteConfirm,
    Done,
    Cancelled,
}

/// Parsed inline-button payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    /// `rating_<rating>`
    Rate(Rating),
    /// `confirm_<rating>_<yes|no>`
    Confirm { rating: Rating, accept: bool },
}

fn rating_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^rating_(good|ok|bad)$").expect("valid regex"))
}

fn confirm_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^confirm_(good|ok|bad)_(yes|no)$").expect("valid regex")
    })
}

impl CallbackAction {
    pub fn parse(data: &str) -> Option<Self> {
        if let Some(caps) = rating_pattern().captures(data) {
            return caps[1].parse().ok().map(CallbackAction::Rate);
        }
        let caps = confirm_pattern().captures(data)?;
        let rating = caps[1].parse().ok()?;
        Some(CallbackAction::Confirm {
            rating,
            accept: &caps[2] == "yes",
        })
    }

    pub fn encode(&self) -> String {
        match self {
            CallbackAction::Rate(rating) => format!("rating_{}", rating.as_str()),
            CallbackAction::Confirm { rating, accept } => format!(
                "confirm_{}_{}",
                rating.as_str(),
                if *accept { "yes" } else { "no" }
            ),
        }
    }
}

/// An inline button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    pub label: String,
    pub data: String,
}

impl Choice {
    fn new(label: &str, action: CallbackAction) -> Self {
        Self {
            label: label.to_string(),
            data: action.encode(),
        }
    }
}

/// The three rating buttons.
pub fn rating_choices() -> Vec<Choice> {
    Rating::ALL
        .iter()
        .map(|&rating| Choice::new(rating.button_label(), CallbackAction::Rate(rating)))
        .collect()
}

/// Yes/no buttons for overwriting with `rating`.
pub fn confirm_choices(rating: Rating) -> Vec<Choice> {
    vec![
        Choice::new(
            "✓ Yes, overwrite",
            CallbackAction::Confirm { rating, accept: true },
        ),
        Choice::new(
            "✗ No, cancel",
            CallbackAction::Confirm { rating, accept: false },
        ),
    ]
}

/// The person who pressed a button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rater {
    pub user_id: u64,
    /// Display name used in success messages.
    pub name: String,
}

impl Rater {
    pub fn new(user_id: u64, name: impl Into<String>) -> Self {
        Self {
            user_id,
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// `/rate` or the "Set Status" button.
    RateRequested,
    RatingChosen { requester: Rater, rating: Rating },
    ConfirmationAnswered {
        requester: Rater,
        rating: Rating,
        accept: bool,
    },
}

/// What the handlers should do on Telegram, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundAction {
    /// "typing..." chat action.
    Typing,
    /// New HTML message, with inline buttons when `choices` is not empty.
    SendMessage { text: String, choices: Vec<Choice> },
    /// Replace the text of the message the button belongs to.
    ///
    /// With `fallback_to_reply`, a failed edit is retried as a new message.
    EditMessage {
        text: String,
        choices: Vec<Choice>,
        fallback_to_reply: bool,
    },
    AnswerCallback { text: Option<String>, alert: bool },
}

impl OutboundAction {
    fn edit(text: impl Into<String>) -> Self {
        OutboundAction::EditMessage {
            text: text.into(),
            choices: Vec::new(),
            fallback_to_reply: false,
        }
    }

    fn answer() -> Self {
        OutboundAction::AnswerCallback {
            text: None,
            alert: false,
        }
    }

    fn alert(text: impl Into<String>) -> Self {
        OutboundAction::AnswerCallback {
            text: Some(text.into()),
            alert: true,
        }
    }
}

/// Outcome of handling one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reaction {
    pub state: ConversationState,
    pub actions: Vec<OutboundAction>,
}

impl Reaction {
    fn new(state: ConversationState, actions: Vec<OutboundAction>) -> Self {
        Self { state, actions }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEntry {
    pub rating: Rating,
    pub user_name: String,
    pub created_at: NaiveDateTime,
}

/// Ratings waiting for an overwrite confirmation, one per user.
///
/// Entries expire after `ttl`. When full, the oldest entry is evicted to make
/// room for a new user.
pub struct PendingConfirmations {
    entries: HashMap<u64, PendingEntry>,
    ttl: Duration,
    capacity: usize,
    clock: Arc<dyn Clock>,
}

impl PendingConfirmations {
    pub fn new(ttl: Duration, capacity: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
            capacity: capacity.max(1),
            clock,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn is_expired(&self, entry: &PendingEntry, now: NaiveDateTime) -> bool {
        let age = (now - entry.created_at).to_std().unwrap_or_default();
        age >= self.ttl
    }

    fn prune(&mut self) {
        let now = self.clock.now();
        let before = self.entries.len();
        let expired: Vec<u64> = self
            .entries
            .iter()
            .filter(|(_, entry)| self.is_expired(entry, now))
            .map(|(&user_id, _)| user_id)
            .collect();
        for user_id in expired {
            self.entries.remove(&user_id);
        }
        let pruned = before - self.entries.len();
        if pruned > 0 {
            debug!(pruned, "Expired pending confirmations removed");
        }
    }

    /// Stash `rating` for `user_id`, replacing any earlier entry.
    pub fn insert(&mut self, user_id: u64, rating: Rating, user_name: &str) {
        self.prune();

        if !self.entries.contains_key(&user_id) && self.entries.len() >= self.capacity {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.created_at)
                .map(|(&id, _)| id);
            if let Some(oldest) = oldest {
                warn!(user_id = oldest, "Pending confirmations full, evicting oldest");
                self.entries.remove(&oldest);
            }
        }

        self.entries.insert(
            user_id,
            PendingEntry {
                rating,
                user_name: user_name.to_string(),
                created_at: self.clock.now(),
            },
        );
    }

    /// Whether `user_id` has a live entry.
    pub fn contains(&mut self, user_id: u64) -> bool {
        self.prune();
        self.entries.contains_key(&user_id)
    }

    /// Remove and return the entry for `user_id` if it is live and holds
    /// `rating`. A mismatched entry is left in place.
    pub fn take_matching(&mut self, user_id: u64, rating: Rating) -> Option<PendingEntry> {
        self.prune();
        match self.entries.get(&user_id) {
            Some(entry) if entry.rating == rating => self.entries.remove(&user_id),
            _ => None,
        }
    }
}

/// Drives the rating flow against the tracker sheet.
pub struct ConversationController {
    sheet: Arc<TrackerSheet>,
    pending: Mutex<PendingConfirmations>,
}

impl ConversationController {
    pub fn new(sheet: Arc<TrackerSheet>, pending: PendingConfirmations) -> Self {
        Self {
            sheet,
            pending: Mutex::new(pending),
        }
    }

    pub fn sheet(&self) -> &Arc<TrackerSheet> {
        &self.sheet
    }

    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }

    pub async fn handle(&self, event: InboundEvent) -> Reaction {
        match event {
            InboundEvent::RateRequested => Reaction::new(
                ConversationState::AwaitingRatingChoice,
                vec![OutboundAction::SendMessage {
                    text: rating_prompt().to_string(),
                    choices: rating_choices(),
                }],
            ),
            InboundEvent::RatingChosen { requester, rating } => {
                self.on_rating_chosen(requester, rating).await
            }
            InboundEvent::ConfirmationAnswered {
                requester,
                rating,
                accept,
            } => self.on_confirmation(requester, rating, accept).await,
        }
    }

    async fn check_today(&self) -> Result<FilledCheck, NotionError> {
        call_with_deadline(
            "checkTodayFilled",
            SHEET_CALL_BUDGET,
            self.sheet.check_today_filled(),
        )
        .await
        .into_result()
    }

    async fn write_today(&self, rating: Rating) -> Result<UpdateReceipt, NotionError> {
        call_with_deadline(
            "updateSheet",
            SHEET_CALL_BUDGET,
            self.sheet.update_sheet(rating),
        )
        .await
        .into_result()
    }

    async fn on_rating_chosen(&self, requester: Rater, rating: Rating) -> Reaction {
        let mut actions = vec![OutboundAction::Typing];

        let check = match self.check_today().await {
            Ok(check) => check,
            Err(e) => return failure(actions, &requester, &e),
        };

        if check.filled {
            self.pending
                .lock()
                .await
                .insert(requester.user_id, rating, &requester.name);
            info!(user = %requester.name, rating = %rating, "Day already filled, asking to overwrite");

            actions.push(OutboundAction::EditMessage {
                text: overwrite_prompt(rating),
                choices: confirm_choices(rating),
                fallback_to_reply: false,
            });
            actions.push(OutboundAction::answer());
            return Reaction::new(ConversationState::AwaitingOverwriteConfirm, actions);
        }

        match self.write_today(rating).await {
            Ok(receipt) => {
                info!(user = %requester.name, rating = %rating, date = %receipt.date, "Rating recorded");
                actions.push(OutboundAction::EditMessage {
                    text: success_message(&requester.name, rating),
                    choices: Vec::new(),
                    fallback_to_reply: true,
                });
                actions.push(OutboundAction::answer());
                Reaction::new(ConversationState::Done, actions)
            }
            Err(e) => failure(actions, &requester, &e),
        }
    }

    async fn on_confirmation(&self, requester: Rater, rating: Rating, accept: bool) -> Reaction {
        let entry = {
            let mut pending = self.pending.lock().await;
            match pending.take_matching(requester.user_id, rating) {
                Some(entry) => entry,
                None => {
                    let state = if pending.contains(requester.user_id) {
                        ConversationState::AwaitingOverwriteConfirm
                    } else {
                        ConversationState::Idle
                    };
                    debug!(user_id = requester.user_id, rating = %rating, "Confirmation without matching entry");
                    return Reaction::new(state, vec![OutboundAction::alert(EXPIRED_NOTICE)]);
                }
            }
        };

        if !accept {
            info!(user = %entry.user_name, "Overwrite cancelled");
            return Reaction::new(
                ConversationState::Cancelled,
                vec![OutboundAction::edit(CANCELLED_NOTICE), OutboundAction::answer()],
            );
        }

        let mut actions = vec![OutboundAction::Typing];
        match self.write_today(entry.rating).await {
            Ok(receipt) => {
                info!(user = %entry.user_name, rating = %entry.rating, date = %receipt.date, "Rating overwritten");
                actions.push(OutboundAction::EditMessage {
                    text: success_message(&entry.user_name, entry.rating),
                    choices: Vec::new(),
                    fallback_to_reply: true,
                });
                actions.push(OutboundAction::AnswerCallback {
                    text: Some(UPDATED_NOTICE.to_string()),
                    alert: false,
                });
                Reaction::new(ConversationState::Done, actions)
            }
            Err(e) => {
                let requester = Rater::new(requester.user_id, entry.user_name);
                failure(actions, &requester, &e)
            }
        }
    }
}

fn failure(mut actions: Vec<OutboundAction>, requester: &Rater, e: &NotionError) -> Reaction {
    error!(user = %requester.name, error = %e, "Rating flow failed");
    actions.push(OutboundAction::alert(format!("❌ Error: {e}")));
    actions.push(OutboundAction::edit(error_message(&e.to_string())));
    Reaction::new(ConversationState::Idle, actions)
}
