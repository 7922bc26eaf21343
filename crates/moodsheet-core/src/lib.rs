//! Moodsheet Core - shared building blocks for the mood tracker.
//!
//! This crate holds everything that does not talk to the network:
//!
//! - **rating**: the three ratings and their fixed cell expressions
//! - **calendar**: day/month keys used to find a cell in the tracker table
//! - **clock**: injectable local wall-clock
//! - **deadline**: run an external call with a time budget
//! - **config**: environment configuration and config paths

pub mod calendar;
pub mod clock;
pub mod config;
pub mod deadline;
pub mod error;
pub mod rating;

pub use calendar::{days_in_month, month_label, previous_month, DayKey};
pub use clock::{resolve_local, Clock, FixedClock, SystemClock};
pub use config::{config_dir, env_file, load_env_files, TrackerConfig};
pub use deadline::{call_with_deadline, CallOutcome, DeadlineExceeded};
pub use error::{ConfigError, RatingError};
pub use rating::{DayStatus, Rating};
