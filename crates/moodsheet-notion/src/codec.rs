//! Rating cell encoding.

use moodsheet_core::{DayStatus, Rating};

use crate::types::{Cell, RichText};

/// Encode a rating as a single equation fragment.
pub fn encode(rating: Rating) -> Cell {
    vec![RichText::equation(rating.expression())]
}

/// Decode a cell.
///
/// Returns `None` for an empty cell, [`DayStatus::Unknown`] for content that
/// is not one of the rating expressions.
pub fn decode(cell: &[RichText]) -> Option<DayStatus> {
    let first = cell.first()?;
    Some(
        first
            .expression()
            .map(DayStatus::from_expression)
            .unwrap_or(DayStatus::Unknown),
    )
}

/// The expression stored in a cell, if its first fragment is an equation.
pub fn cell_expression(cell: &[RichText]) -> Option<&str> {
    cell.first()
        .and_then(RichText::expression)
        .filter(|e| !e.is_empty())
}

/// Copy of `cells` with the cell at `column` replaced.
///
/// Every other cell is kept as-is. A row shorter than `column` is padded with
/// empty cells.
pub fn replace_cell(cells: &[Cell], column: usize, replacement: Cell) -> Vec<Cell> {
    let mut updated = cells.to_vec();
    if updated.len() <= column {
        updated.resize(column + 1, Vec::new());
    }
    updated[column] = replacement;
    updated
}
