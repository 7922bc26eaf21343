//! Error types for the Telegram bot.

use moodsheet_core::{ConfigError, DeadlineExceeded};
use moodsheet_notion::NotionError;
use thiserror::Error;

/// Errors that can occur in the Telegram bot.
#[derive(Debug, Error)]
pub enum TelegramError {
    /// Required configuration is missing or malformed.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The bot could not reach Telegram after all launch attempts.
    #[error("Failed to start bot after {attempts} attempts: {last_error}")]
    BotStartFailed {
        attempts: u32,
        last_error: String,
    },

    /// Telegram Bot API request failed.
    #[error("Telegram API error: {0}")]
    Api(#[from] teloxide::RequestError),

    /// A Telegram call exceeded its budget.
    #[error(transparent)]
    Timeout(#[from] DeadlineExceeded),

    /// Tracker sheet error.
    #[error("Notion error: {0}")]
    Notion(#[from] NotionError),

    /// JSON encoding error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Result type for Telegram operations.
pub type Result<T> = std::result::Result<T, TelegramError>;
