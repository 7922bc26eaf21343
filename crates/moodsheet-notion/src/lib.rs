//! Notion adapter for the moodsheet tracker page.
//!
//! The tracker page holds one or more simple tables (possibly inside synced
//! blocks). Each table's header row lists day numbers and its first column
//! lists lowercase month names; a day's rating is an equation in the cell
//! where the two meet.
//!
//! - **client**: the [`BlockApi`] seam and its `reqwest` implementation
//! - **locator**: find tables, month rows and day columns
//! - **codec**: read and write rating cells
//! - **sheet**: [`TrackerSheet`], the operations the bot calls
//! - **memory**: an in-memory [`BlockApi`] for tests
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use moodsheet_core::{Rating, SystemClock};
//! use moodsheet_notion::{NotionClient, TrackerSheet};
//!
//! # async fn run() -> moodsheet_notion::Result<()> {
//! let client = NotionClient::new("secret_token");
//! let sheet = TrackerSheet::new(client, "page-id", Arc::new(SystemClock));
//!
//! if !sheet.check_today_filled().await?.filled {
//!     sheet.update_sheet(Rating::Good).await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod codec;
pub mod error;
pub mod locator;
pub mod memory;
pub mod sheet;
pub mod types;

pub use client::{BlockApi, NotionClient};
pub use error::{NotionError, Result};
pub use locator::{select_tracker_table, Selection, TrackerTable};
pub use memory::{MemoryBlocks, RowWrite};
pub use sheet::{DayEntry, FilledCheck, MonthDay, MonthStatuses, TrackerSheet, UpdateReceipt};
pub use types::{Block, Cell, RichText, Row};
