//! Command, button and callback handlers for the Telegram bot.
//!
//! Every Telegram call runs under [`BOT_CALL_BUDGET`]. Delivery failures are
//! logged and swallowed so one failed reply never aborts the rest of a flow.

use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use moodsheet_core::{call_with_deadline, previous_month};
use teloxide::prelude::*;
use teloxide::types::{
    CallbackQuery, ChatAction, ChatId, InlineKeyboardButton, InlineKeyboardMarkup,
    KeyboardButton, KeyboardMarkup, MessageId, ParseMode, User,
};
use teloxide::utils::command::BotCommands;
use teloxide::RequestError;
use tracing::{debug, error, info};

use crate::conversation::{
    CallbackAction, Choice, InboundEvent, OutboundAction, Rater, SHEET_CALL_BUDGET,
};
use crate::error::{Result, TelegramError};
use crate::format::{error_message, format_last_days, format_month_grid};
use crate::state::BotState;

/// Budget for every Telegram API call.
pub const BOT_CALL_BUDGET: Duration = Duration::from_millis(5000);

pub const SET_STATUS_BUTTON: &str = "📊 Set Status";
pub const LAST_7_DAYS_BUTTON: &str = "🗓️ Last 7 Days";
pub const THIS_MONTH_BUTTON: &str = "🗓️ This Month";
pub const LAST_MONTH_BUTTON: &str = "🗓️ Last Month";

pub const UNKNOWN_INPUT_REPLY: &str =
    "I don't understand that command. Try /help to see what I can do!";

/// Bot commands that can be invoked with /.
#[derive(BotCommands, Clone, Debug)]
#[command(rename_rule = "lowercase", description = "Available commands:")]
pub enum Command {
    #[command(description = "Start the bot and show the keyboard")]
    Start,

    #[command(description = "Show available commands")]
    Help,

    #[command(description = "Rate your day")]
    Rate,
}

/// Persistent reply keyboard with the main actions.
pub fn main_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![
        vec![KeyboardButton::new(SET_STATUS_BUTTON)],
        vec![
            KeyboardButton::new(LAST_7_DAYS_BUTTON),
            KeyboardButton::new(THIS_MONTH_BUTTON),
            KeyboardButton::new(LAST_MONTH_BUTTON),
        ],
    ])
    .resize_keyboard()
}

/// One row of inline buttons.
pub fn inline_keyboard(choices: &[Choice]) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![choices
        .iter()
        .map(|c| InlineKeyboardButton::callback(c.label.clone(), c.data.clone()))
        .collect::<Vec<_>>()])
}

/// Run a Telegram request under [`BOT_CALL_BUDGET`].
pub async fn bot_call<T, R>(operation: &'static str, request: R) -> Result<T>
where
    R: IntoFuture<Output = std::result::Result<T, RequestError>>,
{
    call_with_deadline(operation, BOT_CALL_BUDGET, async move {
        request.await.map_err(TelegramError::from)
    })
    .await
    .into_result()
}

/// Like [`bot_call`], but failures are only logged.
pub(crate) async fn deliver<T, R>(operation: &'static str, request: R) -> Option<T>
where
    R: IntoFuture<Output = std::result::Result<T, RequestError>>,
{
    match bot_call(operation, request).await {
        Ok(value) => Some(value),
        Err(e) => {
            error!(operation, error = %e, "Telegram call failed");
            None
        }
    }
}

/// Display name for a Telegram user.
pub fn display_name(user: &User) -> String {
    if !user.first_name.trim().is_empty() {
        user.first_name.clone()
    } else {
        user.username.clone().unwrap_or_else(|| "Unknown".to_string())
    }
}

fn rater_from(user: &User) -> Rater {
    Rater::new(user.id.0, display_name(user))
}

/// Who sent a message, where, and what it said.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundSummary {
    pub user: String,
    pub chat_id: i64,
    pub text: String,
}

pub fn summarize_inbound(msg: &Message) -> InboundSummary {
    InboundSummary {
        user: msg
            .from
            .as_ref()
            .map(display_name)
            .unwrap_or_else(|| "Unknown".to_string()),
        chat_id: msg.chat.id.0,
        text: msg.text().unwrap_or("<non-text message>").to_string(),
    }
}

fn log_inbound(kind: &'static str, msg: &Message) {
    let inbound = summarize_inbound(msg);
    info!(
        kind,
        user = %inbound.user,
        chat_id = inbound.chat_id,
        text = %inbound.text,
        "Incoming update"
    );
}

/// Where outbound actions for one event go.
#[derive(Debug, Clone)]
pub struct ReplyTarget {
    pub chat_id: ChatId,
    /// Message that carried the pressed button.
    pub message_id: Option<MessageId>,
    pub callback_id: Option<String>,
}

impl ReplyTarget {
    fn chat(chat_id: ChatId) -> Self {
        Self {
            chat_id,
            message_id: None,
            callback_id: None,
        }
    }

    fn from_callback(q: &CallbackQuery) -> Self {
        let (chat_id, message_id) = match q.regular_message() {
            Some(msg) => (msg.chat.id, Some(msg.id)),
            None => (ChatId::from(q.from.id), None),
        };
        Self {
            chat_id,
            message_id,
            callback_id: Some(q.id.clone()),
        }
    }
}

async fn send_html(bot: &Bot, chat_id: ChatId, text: String, choices: &[Choice]) -> Option<Message> {
    let mut request = bot.send_message(chat_id, text).parse_mode(ParseMode::Html);
    if !choices.is_empty() {
        request = request.reply_markup(inline_keyboard(choices));
    }
    deliver("sendMessage", request).await
}

/// Perform outbound actions in order.
pub async fn apply_actions(bot: &Bot, target: &ReplyTarget, actions: Vec<OutboundAction>) {
    for action in actions {
        match action {
            OutboundAction::Typing => {
                deliver(
                    "sendChatAction",
                    bot.send_chat_action(target.chat_id, ChatAction::Typing),
                )
                .await;
            }
            OutboundAction::SendMessage { text, choices } => {
                send_html(bot, target.chat_id, text, &choices).await;
            }
            OutboundAction::EditMessage {
                text,
                choices,
                fallback_to_reply,
            } => {
                let edited = match target.message_id {
                    Some(message_id) => {
                        let mut request = bot
                            .edit_message_text(target.chat_id, message_id, text.clone())
                            .parse_mode(ParseMode::Html);
                        if !choices.is_empty() {
                            request = request.reply_markup(inline_keyboard(&choices));
                        }
                        deliver("editMessageText", request).await.is_some()
                    }
                    None => false,
                };
                if !edited && fallback_to_reply {
                    debug!("Edit failed, replying instead");
                    send_html(bot, target.chat_id, text, &choices).await;
                }
            }
            OutboundAction::AnswerCallback { text, alert } => {
                let Some(callback_id) = target.callback_id.clone() else {
                    continue;
                };
                let mut request = bot.answer_callback_query(callback_id);
                if let Some(text) = text {
                    request = request.text(text).show_alert(alert);
                }
                deliver("answerCallbackQuery", request).await;
            }
        }
    }
}

/// Handle the /start command.
pub async fn handle_start(bot: Bot, msg: Message) -> ResponseResult<()> {
    let welcome = "👋 Hello! I'm the Moodsheet bot.\n\n\
        Available commands:\n\
        /rate - Rate your day\n\
        /help - Show available commands";

    deliver(
        "sendMessage",
        bot.send_message(msg.chat.id, welcome)
            .reply_markup(main_keyboard()),
    )
    .await;

    info!(chat_id = %msg.chat.id, user = ?msg.from.as_ref().map(display_name), "User started bot");
    Ok(())
}

/// Handle the /help command.
pub async fn handle_help(bot: Bot, msg: Message) -> ResponseResult<()> {
    let help_text = Command::descriptions().to_string();
    deliver(
        "sendMessage",
        bot.send_message(msg.chat.id, help_text)
            .reply_markup(main_keyboard()),
    )
    .await;
    Ok(())
}

/// Handle /rate and the "Set Status" button.
pub async fn handle_rate(bot: Bot, msg: Message, state: Arc<BotState>) -> ResponseResult<()> {
    let reaction = state.controller.handle(InboundEvent::RateRequested).await;
    apply_actions(&bot, &ReplyTarget::chat(msg.chat.id), reaction.actions).await;
    Ok(())
}

async fn show_last_days(bot: &Bot, chat_id: ChatId, state: &BotState) {
    deliver(
        "sendChatAction",
        bot.send_chat_action(chat_id, ChatAction::Typing),
    )
    .await;

    let result = call_with_deadline(
        "getLastNDaysStatuses",
        SHEET_CALL_BUDGET,
        state.sheet.last_n_days_statuses(7),
    )
    .await
    .into_result();

    let text = match result {
        Ok(entries) if entries.is_empty() => "No recent entries found.".to_string(),
        Ok(entries) => format_last_days(&entries),
        Err(e) => {
            error!(operation = "getLastNDaysStatuses", error = %e, "Status query failed");
            error_message(&e.to_string())
        }
    };
    send_html(bot, chat_id, text, &[]).await;
}

async fn show_month(bot: &Bot, chat_id: ChatId, state: &BotState, date: NaiveDate, empty: &str) {
    deliver(
        "sendChatAction",
        bot.send_chat_action(chat_id, ChatAction::Typing),
    )
    .await;

    let result = call_with_deadline(
        "getMonthStatuses",
        SHEET_CALL_BUDGET,
        state.sheet.month_statuses(Some(date)),
    )
    .await
    .into_result();

    let text = match result {
        Ok(Some(month)) => format_month_grid(&month, state.clock.today()),
        Ok(None) => empty.to_string(),
        Err(e) => {
            error!(operation = "getMonthStatuses", error = %e, "Status query failed");
            error_message(&e.to_string())
        }
    };
    send_html(bot, chat_id, text, &[]).await;
}

/// Handle non-command messages: keyboard buttons, or a fallback reply.
pub async fn handle_message(bot: Bot, msg: Message, state: Arc<BotState>) -> ResponseResult<()> {
    let _busy = state.watchdog.begin("message");
    log_inbound("message", &msg);
    let chat_id = msg.chat.id;
    let today = state.clock.today();
    let text = msg.text().map(|t| t.trim().to_string());

    match text.as_deref() {
        Some(SET_STATUS_BUTTON) => return handle_rate(bot, msg, Arc::clone(&state)).await,
        Some(LAST_7_DAYS_BUTTON) => show_last_days(&bot, chat_id, &state).await,
        Some(THIS_MONTH_BUTTON) => {
            show_month(&bot, chat_id, &state, today, "No data found for the current month.").await
        }
        Some(LAST_MONTH_BUTTON) => {
            show_month(
                &bot,
                chat_id,
                &state,
                previous_month(today),
                "No data found for last month.",
            )
            .await
        }
        _ => {
            debug!(chat_id = %chat_id, text = ?text, "Unrecognized input");
            deliver("sendMessage", bot.send_message(chat_id, UNKNOWN_INPUT_REPLY)).await;
        }
    }
    Ok(())
}

/// Handle an inline button press.
pub async fn handle_callback(bot: Bot, q: CallbackQuery, state: Arc<BotState>) -> ResponseResult<()> {
    let _busy = state.watchdog.begin("callback");
    let target = ReplyTarget::from_callback(&q);
    let requester = rater_from(&q.from);

    let Some(action) = q.data.as_deref().and_then(CallbackAction::parse) else {
        debug!(data = ?q.data, "Ignoring unknown callback data");
        deliver("answerCallbackQuery", bot.answer_callback_query(q.id.clone())).await;
        return Ok(());
    };
    info!(user = %requester.name, action = %action.encode(), "Button pressed");

    let event = match action {
        CallbackAction::Rate(rating) => InboundEvent::RatingChosen { requester, rating },
        CallbackAction::Confirm { rating, accept } => InboundEvent::ConfirmationAnswered {
            requester,
            rating,
            accept,
        },
    };

    let reaction = state.controller.handle(event).await;
    debug!(state = ?reaction.state, actions = reaction.actions.len(), "Conversation step");
    apply_actions(&bot, &target, reaction.actions).await;
    Ok(())
}

/// Route a parsed command to its handler.
pub async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    state: Arc<BotState>,
) -> ResponseResult<()> {
    let _busy = state.watchdog.begin("command");
    log_inbound("command", &msg);
    match cmd {
        Command::Start => handle_start(bot, msg).await,
        Command::Help => handle_help(bot, msg).await,
        Command::Rate => handle_rate(bot, msg, Arc::clone(&state)).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::{confirm_choices, rating_choices};
    use moodsheet_core::Rating;
    use teloxide::requests::HasPayload;
    use teloxide::types::{InlineKeyboardButtonKind, Recipient};

    fn user(first_name: &str, username: Option<&str>) -> User {
        serde_json::from_value(serde_json::json!({
            "id": 42,
            "is_bot": false,
            "first_name": first_name,
            "username": username,
        }))
        .unwrap()
    }

    fn text_message(text: &str) -> Message {
        serde_json::from_value(serde_json::json!({
            "message_id": 10,
            "date": 1741996800,
            "chat": { "id": -100, "type": "group", "title": "Trackers" },
            "from": { "id": 42, "is_bot": false, "first_name": "Ann" },
            "text": text,
        }))
        .unwrap()
    }

    #[test]
    fn test_summarize_inbound() {
        let summary = summarize_inbound(&text_message("🗓️ Last 7 Days"));
        assert_eq!(
            summary,
            InboundSummary {
                user: "Ann".to_string(),
                chat_id: -100,
                text: "🗓️ Last 7 Days".to_string(),
            }
        );
    }

    #[test]
    fn test_bot_requests_build_in_handlers() {
        let bot = Bot::new("123:test-token");
        let request = bot
            .send_message(ChatId(-100), "<b>hi</b>")
            .parse_mode(ParseMode::Html)
            .reply_markup(main_keyboard());

        let payload = request.payload_ref();
        assert_eq!(payload.chat_id, Recipient::Id(ChatId(-100)));
        assert_eq!(payload.text, "<b>hi</b>");
        assert_eq!(payload.parse_mode, Some(ParseMode::Html));

        let answer = bot.answer_callback_query("cb-1").show_alert(true);
        assert_eq!(answer.payload_ref().show_alert, Some(true));
    }

    #[test]
    fn test_display_name() {
        assert_eq!(display_name(&user("Ann", Some("ann"))), "Ann");
        assert_eq!(display_name(&user("", Some("ann"))), "ann");
        assert_eq!(display_name(&user(" ", None)), "Unknown");
    }

    #[test]
    fn test_commands_parse() {
        assert!(matches!(Command::parse("/rate", "bot"), Ok(Command::Rate)));
        assert!(matches!(Command::parse("/start", "bot"), Ok(Command::Start)));
        assert!(Command::parse("/nope", "bot").is_err());
    }

    #[test]
    fn test_inline_keyboard_layout() {
        let markup = inline_keyboard(&rating_choices());
        assert_eq!(markup.inline_keyboard.len(), 1);
        let row = &markup.inline_keyboard[0];
        assert_eq!(row.len(), 3);
        assert_eq!(row[0].text, "😊 Good");
        assert!(matches!(
            &row[2].kind,
            InlineKeyboardButtonKind::CallbackData(data) if data == "rating_bad"
        ));

        let markup = inline_keyboard(&confirm_choices(Rating::Good));
        assert!(matches!(
            &markup.inline_keyboard[0][0].kind,
            InlineKeyboardButtonKind::CallbackData(data) if data == "confirm_good_yes"
        ));
    }

    #[test]
    fn test_main_keyboard() {
        let keyboard = main_keyboard();
        assert_eq!(keyboard.keyboard.len(), 2);
        assert_eq!(keyboard.keyboard[0][0].text, SET_STATUS_BUTTON);
        assert_eq!(keyboard.keyboard[1][2].text, LAST_MONTH_BUTTON);
    }
}
