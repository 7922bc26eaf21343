//! Error types for the Notion adapter.

use moodsheet_core::{DeadlineExceeded, RatingError};
use thiserror::Error;

/// Errors that can occur while reading or writing the tracker page.
#[derive(Debug, Error)]
pub enum NotionError {
    /// Rating is not one of good/ok/bad.
    #[error(transparent)]
    InvalidRating(#[from] RatingError),

    /// The tracker page has no table blocks at all.
    #[error("No table blocks found on the page")]
    NoTables,

    /// No table has both the day column and the month row.
    #[error(
        "No table found that matches {month} day {day}; ensure header has day numbers and first column has month names"
    )]
    TableNotFound {
        /// Day number that was looked up.
        day: String,
        /// Lowercase month name that was looked up.
        month: String,
    },

    /// A Notion call exceeded its time budget.
    #[error(transparent)]
    Timeout(#[from] DeadlineExceeded),

    /// Notion answered with an error object.
    #[error("Notion API error {status} ({code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(String),

    /// Response body could not be decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl NotionError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, NotionError::Timeout(_))
    }
}

impl From<reqwest::Error> for NotionError {
    fn from(e: reqwest::Error) -> Self {
        NotionError::Http(e.to_string())
    }
}

/// Result type for Notion operations.
pub type Result<T> = std::result::Result<T, NotionError>;
