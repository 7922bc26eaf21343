//! Telegram bot for the moodsheet tracker.
//!
//! Members of a chat rate each day as good, ok or bad; the bot writes the
//! rating into the Notion tracker page and can show recent days as emoji.
//!
//! # Features
//!
//! - Rate today with inline buttons, confirming before overwriting
//! - Last 7 days and month grids from the tracker
//! - A daily reminder in the group chat when today is still empty
//!
//! # Environment Variables
//!
//! Required:
//! - `TELEGRAM_BOT_TOKEN`: Bot token from @BotFather
//! - `NOTION_TOKEN`: Notion integration token
//!
//! Optional:
//! - `TELEGRAM_GROUP_CHAT_ID`: Chat for the daily reminder
//! - `NOTION_TRACKER_PAGE_ID`: Tracker page id
//! - `MOODSHEET_PROMPT_TIME`: Reminder time, `HH:MM` (default: 21:00)
//! - `MOODSHEET_CONFIRM_TTL_SECS`: Overwrite confirmation lifetime (default: 900)
//!
//! # Example
//!
//! ```no_run
//! use moodsheet_core::TrackerConfig;
//! use moodsheet_telegram::TelegramBot;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = TrackerConfig::from_env()?;
//!     let bot = TelegramBot::new(config);
//!
//!     bot.connect().await?;
//!     bot.start_polling().await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Commands
//!
//! - `/start` - Welcome message and keyboard
//! - `/help` - Show available commands
//! - `/rate` - Rate today

pub mod bot;
pub mod conversation;
pub mod error;
pub mod format;
pub mod handlers;
pub mod scheduler;
pub mod state;

pub use bot::TelegramBot;
pub use conversation::{
    CallbackAction, ConversationController, ConversationState, InboundEvent, OutboundAction,
    PendingConfirmations, Rater, Reaction,
};
pub use error::{Result, TelegramError};
pub use scheduler::{DailyScheduler, PromptDecision};
pub use state::{create_shared_state, BotState, Watchdog};
