//! Locating tracker tables, month rows and day columns.
//!
//! Tables are scanned in the order the page lists them and the first table
//! that has both the day column and the month row wins. Tables are never
//! merged or cross-checked, and month names must match exactly (lowercase,
//! trimmed); abbreviations are not recognised.

use std::collections::HashMap;

use moodsheet_core::DayKey;
use tracing::debug;

use crate::client::BlockApi;
use crate::error::Result;
use crate::types::{Block, Cell, Row};

/// A table block with its rows. Row 0 is the header.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerTable {
    pub id: String,
    pub rows: Vec<Row>,
}

impl TrackerTable {
    pub fn new(id: impl Into<String>, rows: Vec<Row>) -> Self {
        Self {
            id: id.into(),
            rows,
        }
    }

    pub fn header(&self) -> Option<&Row> {
        self.rows.first()
    }

    /// Column whose header text equals `day`.
    pub fn day_column(&self, day: &str) -> Option<usize> {
        let header = self.header()?;
        (0..header.cells.len()).find(|&idx| header.cell_text(idx) == Some(day))
    }

    /// Map of day number to column for every header cell holding a positive
    /// integer.
    pub fn day_columns(&self) -> HashMap<u32, usize> {
        let Some(header) = self.header() else {
            return HashMap::new();
        };
        (0..header.cells.len())
            .filter_map(|idx| {
                let day = header.cell_text(idx)?.parse::<u32>().ok()?;
                (day > 0).then_some((day, idx))
            })
            .collect()
    }

    /// First non-header row whose first cell names `month`.
    pub fn month_row(&self, month: &str) -> Option<&Row> {
        self.rows.iter().skip(1).find(|row| {
            row.cell_text(0)
                .map(|text| text.to_lowercase() == month)
                .unwrap_or(false)
        })
    }

    /// Day column and month row, if this table has both.
    pub fn select(&self, key: &DayKey) -> Option<Selection<'_>> {
        if self.rows.is_empty() {
            return None;
        }
        let day_column = self.day_column(&key.day)?;
        let month_row = self.month_row(&key.month)?;
        Some(Selection {
            table: self,
            day_column,
            month_row,
        })
    }
}

/// The cell position for one day inside a table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Selection<'a> {
    pub table: &'a TrackerTable,
    pub day_column: usize,
    pub month_row: &'a Row,
}

impl<'a> Selection<'a> {
    /// The selected cell; `None` when the month row is shorter than the header.
    pub fn cell(&self) -> Option<&'a Cell> {
        self.month_row.cells.get(self.day_column)
    }
}

/// First table (in order) that has both the day column and the month row.
pub fn select_tracker_table<'a>(tables: &'a [TrackerTable], key: &DayKey) -> Option<Selection<'a>> {
    tables.iter().find_map(|table| table.select(key))
}

/// First table (in order) that has a row for `month`.
pub fn select_month_table<'a>(tables: &'a [TrackerTable], month: &str) -> Option<(&'a TrackerTable, &'a Row)> {
    tables
        .iter()
        .find_map(|table| table.month_row(month).map(|row| (table, row)))
}

/// Every table block on the page, looking one level into synced blocks.
///
/// A synced block's children are read from the block it mirrors, or from the
/// block itself when it is the original.
pub async fn list_tables_including_synced<A>(api: &A, page_id: &str) -> Result<Vec<Block>>
where
    A: BlockApi + ?Sized,
{
    let mut tables = Vec::new();

    for block in api.list_children(page_id).await? {
        if block.is_table() {
            tables.push(block);
        } else if block.is_synced_block() {
            let source = block.synced_source_id();
            let children = api.list_children(source).await?;
            tables.extend(children.into_iter().filter(Block::is_table));
        }
    }

    debug!(page_id = %page_id, count = tables.len(), "Listed tracker tables");
    Ok(tables)
}

/// Fetch the `table_row` children of a table block.
pub async fn fetch_table<A>(api: &A, table_id: &str) -> Result<TrackerTable>
where
    A: BlockApi + ?Sized,
{
    let rows = api
        .list_children(table_id)
        .await?
        .into_iter()
        .filter_map(Block::into_row)
        .collect();
    Ok(TrackerTable::new(table_id, rows))
}

/// Fetch rows table by table until one matches `key`.
///
/// Later tables are not fetched once a match is found.
pub async fn find_tracker_table<A>(api: &A, tables: &[Block], key: &DayKey) -> Result<Option<TrackerTable>>
where
    A: BlockApi + ?Sized,
{
    for block in tables {
        let table = fetch_table(api, &block.id).await?;
        if table.select(key).is_some() {
            debug!(table_id = %table.id, day = %key.day, month = %key.month, "Selected tracker table");
            return Ok(Some(table));
        }
    }
    Ok(None)
}

/// Fetch the rows of every table.
pub async fn fetch_all_tables<A>(api: &A, tables: &[Block]) -> Result<Vec<TrackerTable>>
where
    A: BlockApi + ?Sized,
{
    let mut fetched = Vec::with_capacity(tables.len());
    for block in tables {
        fetched.push(fetch_table(api, &block.id).await?);
    }
    Ok(fetched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RichText;

    fn text_row(id: &str, cells: &[&str]) -> Row {
        Row {
            id: id.to_string(),
            cells: cells
                .iter()
                .map(|c| {
                    if c.is_empty() {
                        Vec::new()
                    } else {
                        vec![RichText::text(c)]
                    }
                })
                .collect(),
        }
    }

    fn table(id: &str, header: &[&str], months: &[&str]) -> TrackerTable {
        let mut rows = vec![text_row(&format!("{id}-h"), header)];
        for month in months {
            let mut cells = vec![*month];
            cells.extend(std::iter::repeat("").take(header.len() - 1));
            rows.push(text_row(&format!("{id}-{month}"), &cells));
        }
        TrackerTable::new(id, rows)
    }

    #[test]
    fn test_select_matches_day_and_month() {
        let tables = vec![table("t1", &["", "14", "15", "16"], &["february", "march"])];
        let key = DayKey::new("15", "march");

        let selection = select_tracker_table(&tables, &key).unwrap();
        assert_eq!(selection.table.id, "t1");
        assert_eq!(selection.day_column, 2);
        assert_eq!(selection.month_row.id, "t1-march");
    }

    #[test]
    fn test_select_missing_day() {
        let tables = vec![table("t1", &["", "14", "16"], &["march"])];
        assert!(select_tracker_table(&tables, &DayKey::new("15", "march")).is_none());
    }

    #[test]
    fn test_select_tolerates_whitespace_and_case() {
        let tables = vec![table("t1", &["", " 15 "], &["  March "])];
        let selection = select_tracker_table(&tables, &DayKey::new("15", "march")).unwrap();
        assert_eq!(selection.day_column, 1);
    }

    #[test]
    fn test_no_fuzzy_month_match() {
        let tables = vec![table("t1", &["", "15"], &["mar", "march 2025"])];
        assert!(select_tracker_table(&tables, &DayKey::new("15", "march")).is_none());
    }

    #[test]
    fn test_header_row_is_not_a_month_row() {
        let tables = vec![table("t1", &["march", "15"], &[])];
        assert!(select_tracker_table(&tables, &DayKey::new("15", "march")).is_none());
    }

    #[test]
    fn test_first_match_wins() {
        let tables = vec![
            table("empty", &[], &[]),
            table("days-only", &["", "15"], &["april"]),
            table("first", &["", "15"], &["march"]),
            table("second", &["", "15"], &["march"]),
        ];
        let tables: Vec<_> = tables
            .into_iter()
            .map(|mut t| {
                if t.id == "empty" {
                    t.rows.clear();
                }
                t
            })
            .collect();

        let selection = select_tracker_table(&tables, &DayKey::new("15", "march")).unwrap();
        assert_eq!(selection.table.id, "first");
    }

    #[test]
    fn test_day_columns_map() {
        let t = table("t1", &["", "1", "2", " 3", "x", "0", "-4", "32"], &["march"]);
        let map = t.day_columns();
        assert_eq!(map.get(&1), Some(&1));
        assert_eq!(map.get(&2), Some(&2));
        assert_eq!(map.get(&3), Some(&3));
        assert_eq!(map.get(&32), Some(&7));
        assert!(!map.contains_key(&0));
        assert_eq!(map.len(), 4);
    }

    #[test]
    fn test_select_month_table() {
        let tables = vec![table("a", &["", "1"], &["january"]), table("b", &["", "1"], &["march"])];
        let (t, row) = select_month_table(&tables, "march").unwrap();
        assert_eq!(t.id, "b");
        assert_eq!(row.id, "b-march");
        assert!(select_month_table(&tables, "may").is_none());
    }

    #[test]
    fn test_selection_cell_short_row() {
        let mut t = table("t1", &["", "1", "2"], &["march"]);
        t.rows[1].cells.truncate(1);
        let tables = vec![t];
        let selection = select_tracker_table(&tables, &DayKey::new("2", "march")).unwrap();
        assert!(selection.cell().is_none());
    }
}
