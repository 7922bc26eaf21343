//! Tracker sheet operations.
//!
//! Every operation re-reads the page; nothing is cached between calls. Each
//! network step runs under its own deadline (see the `*_BUDGET` constants).

use std::sync::Arc;
use std::time::Duration;

use chrono::{Datelike, Days, NaiveDate};
use moodsheet_core::calendar::{days_in_month, month_label};
use moodsheet_core::{call_with_deadline, Clock, DayKey, DayStatus, Rating};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::client::BlockApi;
use crate::codec::{cell_expression, decode, encode, replace_cell};
use crate::error::{NotionError, Result};
use crate::locator::{
    fetch_all_tables, find_tracker_table, list_tables_including_synced, select_month_table,
    select_tracker_table, TrackerTable,
};
use crate::types::Block;

/// Budget for listing the page's tables (including synced blocks).
pub const LIST_TABLES_BUDGET: Duration = Duration::from_millis(8000);
/// Budget for fetching rows until a matching table is found.
pub const SELECT_TABLE_BUDGET: Duration = Duration::from_millis(5000);
/// Budget for fetching the rows of every table.
pub const FETCH_ROWS_BUDGET: Duration = Duration::from_millis(8000);
/// Budget for writing a row back.
pub const WRITE_ROW_BUDGET: Duration = Duration::from_millis(5000);

/// Note attached to a [`FilledCheck`] when the lookup timed out.
pub const TIMEOUT_NOTE: &str = "Timeout checking status";

/// Whether a day's cell already holds a rating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilledCheck {
    pub filled: bool,
    /// Raw expression found in the cell.
    pub current: Option<String>,
    /// Diagnostic note when the answer is a degraded "not filled".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl FilledCheck {
    fn not_filled() -> Self {
        Self {
            filled: false,
            current: None,
            note: None,
        }
    }

    /// Decoded form of [`FilledCheck::current`].
    pub fn current_status(&self) -> Option<DayStatus> {
        self.current.as_deref().map(DayStatus::from_expression)
    }
}

/// Result of a successful write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateReceipt {
    pub rating: Rating,
    /// `"<month> day <day>"`.
    pub date: String,
}

/// Status of one calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DayEntry {
    pub date: NaiveDate,
    pub status: Option<DayStatus>,
}

/// Status of one day within a month grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MonthDay {
    pub day: u32,
    pub status: Option<DayStatus>,
}

/// Every day of one month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthStatuses {
    pub year: i32,
    /// 1-based month.
    pub month: u32,
    /// e.g. `March 2025`.
    pub label: String,
    pub days_in_month: u32,
    pub statuses: Vec<MonthDay>,
}

/// The tracker page and the operations on it.
pub struct TrackerSheet {
    api: Arc<dyn BlockApi>,
    page_id: String,
    clock: Arc<dyn Clock>,
}

impl TrackerSheet {
    pub fn new<A>(api: A, page_id: impl Into<String>, clock: Arc<dyn Clock>) -> Self
    where
        A: BlockApi + 'static,
    {
        Self::with_shared_api(Arc::new(api), page_id, clock)
    }

    pub fn with_shared_api(
        api: Arc<dyn BlockApi>,
        page_id: impl Into<String>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            api,
            page_id: page_id.into(),
            clock,
        }
    }

    pub fn page_id(&self) -> &str {
        &self.page_id
    }

    /// Today's date according to the sheet's clock.
    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    async fn list_tables(&self) -> Result<Vec<Block>> {
        call_with_deadline(
            "listTablesIncludingSynced",
            LIST_TABLES_BUDGET,
            list_tables_including_synced(self.api.as_ref(), &self.page_id),
        )
        .await
        .into_result()
    }

    async fn find_table(&self, tables: &[Block], key: &DayKey) -> Result<Option<TrackerTable>> {
        call_with_deadline(
            "selectTrackerTable",
            SELECT_TABLE_BUDGET,
            find_tracker_table(self.api.as_ref(), tables, key),
        )
        .await
        .into_result()
    }

    async fn fetch_all(&self, tables: &[Block]) -> Result<Vec<TrackerTable>> {
        call_with_deadline(
            "fetchTableRows",
            FETCH_ROWS_BUDGET,
            fetch_all_tables(self.api.as_ref(), tables),
        )
        .await
        .into_result()
    }

    /// Whether today's cell is filled.
    pub async fn check_today_filled(&self) -> Result<FilledCheck> {
        self.check_filled_on(self.today()).await
    }

    /// Whether the cell for `date` is filled.
    ///
    /// A missing table, row or column reads as "not filled". A timeout also
    /// reads as "not filled", with [`TIMEOUT_NOTE`] attached, so the caller
    /// can try again later. Other errors are returned.
    pub async fn check_filled_on(&self, date: NaiveDate) -> Result<FilledCheck> {
        let key = DayKey::from_date(date);

        match self.lookup_expression(&key).await {
            Ok(expression) => Ok(FilledCheck {
                filled: expression.is_some(),
                current: expression,
                note: None,
            }),
            Err(e) if e.is_timeout() => {
                warn!(operation = "checkTodayFilled", error = %e, "Lookup timed out, reporting not filled");
                Ok(FilledCheck {
                    note: Some(TIMEOUT_NOTE.to_string()),
                    ..FilledCheck::not_filled()
                })
            }
            Err(e) => {
                error!(operation = "checkTodayFilled", error = %e, "Lookup failed");
                Err(e)
            }
        }
    }

    async fn lookup_expression(&self, key: &DayKey) -> Result<Option<String>> {
        let tables = self.list_tables().await?;
        if tables.is_empty() {
            return Ok(None);
        }

        let table = self.find_table(&tables, key).await?;
        let expression = table
            .as_ref()
            .and_then(|t| t.select(key))
            .and_then(|selection| selection.cell())
            .and_then(|cell| cell_expression(cell))
            .map(str::to_string);
        Ok(expression)
    }

    /// Write `rating` into today's cell.
    pub async fn update_sheet(&self, rating: Rating) -> Result<UpdateReceipt> {
        self.update_sheet_on(rating, self.today()).await
    }

    /// Parse a rating name and write it into today's cell.
    ///
    /// An unknown name is rejected before any request is made.
    pub async fn update_sheet_by_name(&self, rating: &str) -> Result<UpdateReceipt> {
        let rating: Rating = rating.parse()?;
        self.update_sheet(rating).await
    }

    /// Write `rating` into the cell for `date`.
    ///
    /// The whole month row is written back with only the day's cell replaced.
    pub async fn update_sheet_on(&self, rating: Rating, date: NaiveDate) -> Result<UpdateReceipt> {
        let key = DayKey::from_date(date);

        let result = self.write_rating(rating, &key).await;
        match &result {
            Ok(receipt) => info!(rating = %rating, date = %receipt.date, "Tracker sheet updated"),
            Err(e) => error!(operation = "updateSheet", rating = %rating, error = %e, "Tracker sheet update failed"),
        }
        result
    }

    async fn write_rating(&self, rating: Rating, key: &DayKey) -> Result<UpdateReceipt> {
        let tables = self.list_tables().await?;
        if tables.is_empty() {
            return Err(NotionError::NoTables);
        }

        let table = self.find_table(&tables, key).await?;
        let Some(selection) = table.as_ref().and_then(|t| t.select(key)) else {
            return Err(NotionError::TableNotFound {
                day: key.day.clone(),
                month: key.month.clone(),
            });
        };

        let cells = replace_cell(&selection.month_row.cells, selection.day_column, encode(rating));
        debug!(
            row_id = %selection.month_row.id,
            column = selection.day_column,
            "Writing tracker row"
        );

        call_with_deadline(
            "writeRow",
            WRITE_ROW_BUDGET,
            self.api.update_table_row(&selection.month_row.id, &cells),
        )
        .await
        .into_result()?;

        Ok(UpdateReceipt {
            rating,
            date: key.label(),
        })
    }

    /// Statuses of the last `n` days up to and including today, oldest first.
    pub async fn last_n_days_statuses(&self, n: usize) -> Result<Vec<DayEntry>> {
        self.last_n_days_statuses_from(n, self.today()).await
    }

    /// Statuses of the `n` days ending at `end`, oldest first.
    ///
    /// Table rows are fetched once and reused for every day.
    pub async fn last_n_days_statuses_from(&self, n: usize, end: NaiveDate) -> Result<Vec<DayEntry>> {
        if n == 0 {
            return Ok(Vec::new());
        }

        let tables = self.list_tables().await?;
        if tables.is_empty() {
            return Ok(Vec::new());
        }
        let cached = self.fetch_all(&tables).await?;

        let entries = (0..n as u64)
            .rev()
            .filter_map(|offset| end.checked_sub_days(Days::new(offset)))
            .map(|date| {
                let key = DayKey::from_date(date);
                let status = select_tracker_table(&cached, &key)
                    .and_then(|selection| selection.cell().and_then(|cell| decode(cell)));
                DayEntry { date, status }
            })
            .collect();

        Ok(entries)
    }

    /// Every day of the month containing `date` (today's month by default).
    ///
    /// Returns `None` when no table has a row for that month. Days are always
    /// resolved for the full month; hiding future days is up to the caller.
    pub async fn month_statuses(&self, date: Option<NaiveDate>) -> Result<Option<MonthStatuses>> {
        let date = date.unwrap_or_else(|| self.today());
        let (year, month) = (date.year(), date.month());
        let month_name = DayKey::from_date(date).month;

        let tables = self.list_tables().await?;
        if tables.is_empty() {
            return Ok(None);
        }
        let cached = self.fetch_all(&tables).await?;

        let Some((table, row)) = select_month_table(&cached, &month_name) else {
            debug!(month = %month_name, "No month row found");
            return Ok(None);
        };

        let columns = table.day_columns();
        let days = days_in_month(year, month);
        let statuses = (1..=days)
            .map(|day| MonthDay {
                day,
                status: columns
                    .get(&day)
                    .and_then(|&column| row.cells.get(column))
                    .and_then(|cell| decode(cell)),
            })
            .collect();

        Ok(Some(MonthStatuses {
            year,
            month,
            label: month_label(year, month),
            days_in_month: days,
            statuses,
        }))
    }
}
