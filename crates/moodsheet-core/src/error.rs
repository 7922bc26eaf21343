//! Error types for the core crate.

use thiserror::Error;

/// A rating string that is not one of the known kinds.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid rating. Must be: good, ok, or bad")]
pub struct RatingError {
    /// The rejected input.
    pub input: String,
}

/// Errors raised while reading configuration from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required variable is missing or empty.
    #[error("{0} environment variable is not set")]
    MissingEnv(&'static str),

    /// A variable is present but cannot be parsed.
    #[error("invalid value for {name}: {value:?} ({reason})")]
    InvalidValue {
        /// Variable name.
        name: &'static str,
        /// Raw value found in the environment.
        value: String,
        /// Why it was rejected.
        reason: String,
    },
}
