//! Rating flow and daily prompt against the in-memory block store.

use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use moodsheet_core::{Clock, FixedClock, Rating, TrackerConfig};
use moodsheet_notion::codec::encode;
use moodsheet_notion::memory::text_cells;
use moodsheet_notion::{Block, BlockApi, MemoryBlocks};
use moodsheet_telegram::conversation::{CANCELLED_NOTICE, EXPIRED_NOTICE, UPDATED_NOTICE};
use moodsheet_telegram::{
    BotState, ConversationState, DailyScheduler, InboundEvent, OutboundAction, PromptDecision,
    Rater,
};

const PAGE: &str = "page";
const ROW: &str = "t-march";

fn march(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, day).unwrap()
}

fn config(group_chat_id: Option<&str>) -> TrackerConfig {
    TrackerConfig::from_lookup(|name| match name {
        "TELEGRAM_BOT_TOKEN" => Some("bot".to_string()),
        "NOTION_TOKEN" => Some("secret".to_string()),
        "NOTION_TRACKER_PAGE_ID" => Some(PAGE.to_string()),
        "TELEGRAM_GROUP_CHAT_ID" => group_chat_id.map(str::to_string),
        _ => None,
    })
    .unwrap()
}

/// Table with days 14 and 15 for march; day 15 optionally pre-filled.
fn store(filled: Option<Rating>) -> Arc<MemoryBlocks> {
    let store = Arc::new(MemoryBlocks::new());
    store.push_children(PAGE, vec![Block::table("t")]);
    let mut row = text_cells(&["march", "", ""]);
    if let Some(rating) = filled {
        row[2] = encode(rating);
    }
    store.push_children(
        "t",
        vec![
            Block::row("t-header", text_cells(&["", "14", "15"])),
            Block::row(ROW, row),
        ],
    );
    store
}

fn state(store: &Arc<MemoryBlocks>, clock: Arc<FixedClock>, group: Option<&str>) -> BotState {
    let api: Arc<dyn BlockApi> = store.clone();
    let clock: Arc<dyn Clock> = clock;
    BotState::with_api(config(group), api, clock)
}

fn ann() -> Rater {
    Rater::new(7, "Ann")
}

fn chosen(rating: Rating) -> InboundEvent {
    InboundEvent::RatingChosen {
        requester: ann(),
        rating,
    }
}

fn answered(requester: Rater, rating: Rating, accept: bool) -> InboundEvent {
    InboundEvent::ConfirmationAnswered {
        requester,
        rating,
        accept,
    }
}

fn alert_text(actions: &[OutboundAction]) -> Option<&str> {
    actions.iter().find_map(|a| match a {
        OutboundAction::AnswerCallback {
            text: Some(text),
            alert: true,
        } => Some(text.as_str()),
        _ => None,
    })
}

#[tokio::test]
async fn test_rate_request_shows_three_choices() {
    let store = store(None);
    let state = state(&store, Arc::new(FixedClock::on_date(march(15))), None);

    let reaction = state.controller.handle(InboundEvent::RateRequested).await;
    assert_eq!(reaction.state, ConversationState::AwaitingRatingChoice);
    match &reaction.actions[..] {
        [OutboundAction::SendMessage { text, choices }] => {
            assert_eq!(text, "What's your rating for today?");
            let data: Vec<_> = choices.iter().map(|c| c.data.as_str()).collect();
            assert_eq!(data, vec!["rating_good", "rating_ok", "rating_bad"]);
        }
        other => panic!("unexpected actions: {other:?}"),
    }
    assert!(store.list_calls().is_empty());
}

#[tokio::test]
async fn test_unfilled_day_is_written_immediately() {
    let store = store(None);
    let state = state(&store, Arc::new(FixedClock::on_date(march(15))), None);

    let reaction = state.controller.handle(chosen(Rating::Good)).await;

    assert_eq!(reaction.state, ConversationState::Done);
    assert_eq!(store.write_count(), 1);
    assert_eq!(store.row_cells(ROW).unwrap()[2], encode(Rating::Good));

    assert_eq!(reaction.actions[0], OutboundAction::Typing);
    match &reaction.actions[1] {
        OutboundAction::EditMessage {
            text,
            fallback_to_reply,
            ..
        } => {
            assert!(text.contains("<b>Ann</b> rated today as <b>GOOD</b>"));
            assert!(*fallback_to_reply);
        }
        other => panic!("unexpected action: {other:?}"),
    }
    assert_eq!(
        reaction.actions[2],
        OutboundAction::AnswerCallback {
            text: None,
            alert: false
        }
    );
    assert_eq!(state.controller.pending_count().await, 0);
}

#[tokio::test]
async fn test_filled_day_requires_confirmation() {
    let store = store(Some(Rating::Good));
    let state = state(&store, Arc::new(FixedClock::on_date(march(15))), None);

    let reaction = state.controller.handle(chosen(Rating::Bad)).await;
    assert_eq!(reaction.state, ConversationState::AwaitingOverwriteConfirm);
    assert_eq!(store.write_count(), 0);
    match &reaction.actions[1] {
        OutboundAction::EditMessage { text, choices, .. } => {
            assert!(text.starts_with("⚠️ Today is already filled in!"));
            assert_eq!(choices[0].data, "confirm_bad_yes");
            assert_eq!(choices[1].data, "confirm_bad_no");
        }
        other => panic!("unexpected action: {other:?}"),
    }

    let reaction = state
        .controller
        .handle(answered(Rater::new(7, "ignored"), Rating::Bad, true))
        .await;
    assert_eq!(reaction.state, ConversationState::Done);
    assert_eq!(store.write_count(), 1);
    assert_eq!(store.row_cells(ROW).unwrap()[2], encode(Rating::Bad));

    // name comes from the stashed entry
    assert!(reaction.actions.iter().any(|a| matches!(
        a,
        OutboundAction::EditMessage { text, .. } if text.contains("<b>Ann</b>")
    )));
    assert!(reaction.actions.contains(&OutboundAction::AnswerCallback {
        text: Some(UPDATED_NOTICE.to_string()),
        alert: false,
    }));
    assert_eq!(state.controller.pending_count().await, 0);
}

#[tokio::test]
async fn test_declined_confirmation_cancels() {
    let store = store(Some(Rating::Ok));
    let state = state(&store, Arc::new(FixedClock::on_date(march(15))), None);

    state.controller.handle(chosen(Rating::Good)).await;
    let reaction = state
        .controller
        .handle(answered(ann(), Rating::Good, false))
        .await;

    assert_eq!(reaction.state, ConversationState::Cancelled);
    assert!(reaction.actions.iter().any(|a| matches!(
        a,
        OutboundAction::EditMessage { text, .. } if text == CANCELLED_NOTICE
    )));
    assert_eq!(store.write_count(), 0);
    assert_eq!(state.controller.pending_count().await, 0);
}

#[tokio::test]
async fn test_mismatched_or_missing_confirmation_is_rejected() {
    let store = store(Some(Rating::Ok));
    let state = state(&store, Arc::new(FixedClock::on_date(march(15))), None);

    // nothing pending
    let reaction = state
        .controller
        .handle(answered(ann(), Rating::Good, true))
        .await;
    assert_eq!(reaction.state, ConversationState::Idle);
    assert_eq!(alert_text(&reaction.actions), Some(EXPIRED_NOTICE));

    state.controller.handle(chosen(Rating::Good)).await;

    // rating differs from the stashed one
    let reaction = state
        .controller
        .handle(answered(ann(), Rating::Bad, true))
        .await;
    assert_eq!(reaction.state, ConversationState::AwaitingOverwriteConfirm);
    assert_eq!(alert_text(&reaction.actions), Some(EXPIRED_NOTICE));

    // another user cannot answer Ann's confirmation
    let reaction = state
        .controller
        .handle(answered(Rater::new(8, "Bo"), Rating::Good, true))
        .await;
    assert_eq!(alert_text(&reaction.actions), Some(EXPIRED_NOTICE));

    assert_eq!(store.write_count(), 0);
    assert_eq!(state.controller.pending_count().await, 1);
}

#[tokio::test]
async fn test_confirmation_expires() {
    let store = store(Some(Rating::Ok));
    let clock = Arc::new(FixedClock::on_date(march(15)));
    let state = state(&store, clock.clone(), None);

    state.controller.handle(chosen(Rating::Bad)).await;
    clock.set(march(15).and_hms_opt(12, 16, 0).unwrap());

    let reaction = state
        .controller
        .handle(answered(ann(), Rating::Bad, true))
        .await;
    assert_eq!(reaction.state, ConversationState::Idle);
    assert_eq!(alert_text(&reaction.actions), Some(EXPIRED_NOTICE));
    assert_eq!(store.write_count(), 0);
}

#[tokio::test]
async fn test_missing_table_reports_error() {
    let store = store(None);
    let state = state(&store, Arc::new(FixedClock::on_date(march(20))), None);

    let reaction = state.controller.handle(chosen(Rating::Good)).await;
    assert_eq!(reaction.state, ConversationState::Idle);
    let alert = alert_text(&reaction.actions).unwrap();
    assert!(alert.starts_with("❌ Error: No table found that matches march day 20"));
    assert!(reaction.actions.iter().any(|a| matches!(
        a,
        OutboundAction::EditMessage { text, .. } if text.starts_with("❌ Error:")
    )));
    assert_eq!(store.write_count(), 0);
}

#[tokio::test]
async fn test_daily_prompt_decisions() {
    let nine_pm = NaiveTime::from_hms_opt(21, 0, 0).unwrap();

    let empty = store(None);
    let state_without_chat = state(&empty, Arc::new(FixedClock::on_date(march(15))), None);
    let mut scheduler = DailyScheduler::new(nine_pm);
    assert_eq!(
        scheduler
            .decide(&state_without_chat.sheet, state_without_chat.config.group_chat_id, march(15))
            .await,
        PromptDecision::NoDestination
    );

    let state_with_chat = state(&empty, Arc::new(FixedClock::on_date(march(15))), Some("-100"));
    assert_eq!(
        scheduler
            .decide(&state_with_chat.sheet, state_with_chat.config.group_chat_id, march(15))
            .await,
        PromptDecision::Send { chat_id: -100 }
    );
    // sending is what marks the day
    assert!(!scheduler.has_already_prompted_today(march(15)));

    let filled = store(Some(Rating::Good));
    let state_filled = state(&filled, Arc::new(FixedClock::on_date(march(15))), Some("-100"));
    let mut scheduler = DailyScheduler::new(nine_pm);
    assert_eq!(
        scheduler
            .decide(&state_filled.sheet, state_filled.config.group_chat_id, march(15))
            .await,
        PromptDecision::AlreadyFilled
    );
    assert!(scheduler.has_already_prompted_today(march(15)));
    assert_eq!(
        scheduler
            .decide(&state_filled.sheet, state_filled.config.group_chat_id, march(15))
            .await,
        PromptDecision::AlreadyPrompted
    );
    assert!(!scheduler.has_already_prompted_today(march(16)));
}
