//! Notion block payloads used by the tracker.
//!
//! Only the fields the tracker reads are typed. Rich-text fragments keep every
//! other field in `extra` so cells that are not being changed can be written
//! back exactly as they were read.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Block type of a simple table.
pub const TABLE: &str = "table";
/// Block type of a table row.
pub const TABLE_ROW: &str = "table_row";
/// Block type of a synced block.
pub const SYNCED_BLOCK: &str = "synced_block";

/// A Notion block as returned by "retrieve block children".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: String,

    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synced_block: Option<SyncedBlock>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_row: Option<TableRowContent>,
}

impl Block {
    /// A `table` block.
    pub fn table(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: TABLE.to_string(),
            synced_block: None,
            table_row: None,
        }
    }

    /// A `table_row` block.
    pub fn row(id: impl Into<String>, cells: Vec<Cell>) -> Self {
        Self {
            id: id.into(),
            kind: TABLE_ROW.to_string(),
            synced_block: None,
            table_row: Some(TableRowContent { cells }),
        }
    }

    /// A `synced_block`; `source` is the mirrored block for a reference.
    pub fn synced(id: impl Into<String>, source: Option<&str>) -> Self {
        Self {
            id: id.into(),
            kind: SYNCED_BLOCK.to_string(),
            synced_block: Some(SyncedBlock {
                synced_from: source.map(|block_id| SyncedFrom {
                    block_id: block_id.to_string(),
                }),
            }),
            table_row: None,
        }
    }

    /// Any other block type.
    pub fn other(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            synced_block: None,
            table_row: None,
        }
    }

    pub fn is_table(&self) -> bool {
        self.kind == TABLE
    }

    pub fn is_table_row(&self) -> bool {
        self.kind == TABLE_ROW
    }

    pub fn is_synced_block(&self) -> bool {
        self.kind == SYNCED_BLOCK
    }

    /// Block whose children hold a synced block's content.
    ///
    /// An original synced block has no `synced_from` and owns its children; a
    /// reference points at the original.
    pub fn synced_source_id(&self) -> &str {
        self.synced_block
            .as_ref()
            .and_then(|s| s.synced_from.as_ref())
            .map(|from| from.block_id.as_str())
            .unwrap_or(&self.id)
    }

    /// Convert a `table_row` block into a [`Row`].
    pub fn into_row(self) -> Option<Row> {
        if !self.is_table_row() {
            return None;
        }
        let cells = self.table_row.map(|t| t.cells).unwrap_or_default();
        Some(Row { id: self.id, cells })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncedBlock {
    #[serde(default)]
    pub synced_from: Option<SyncedFrom>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncedFrom {
    pub block_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRowContent {
    #[serde(default)]
    pub cells: Vec<Cell>,
}

/// One table cell: a sequence of rich-text fragments.
pub type Cell = Vec<RichText>;

/// A rich-text fragment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RichText {
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plain_text: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equation: Option<Equation>,

    /// Fields the tracker does not interpret (`text`, `annotations`, `href`...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RichText {
    /// A plain text fragment.
    pub fn text(content: &str) -> Self {
        let mut extra = Map::new();
        extra.insert("text".to_string(), serde_json::json!({ "content": content }));
        Self {
            kind: "text".to_string(),
            plain_text: Some(content.to_string()),
            equation: None,
            extra,
        }
    }

    /// An inline equation fragment.
    pub fn equation(expression: &str) -> Self {
        Self {
            kind: "equation".to_string(),
            plain_text: None,
            equation: Some(Equation {
                expression: expression.to_string(),
            }),
            extra: Map::new(),
        }
    }

    /// The equation expression, if this is an equation fragment.
    pub fn expression(&self) -> Option<&str> {
        self.equation.as_ref().map(|e| e.expression.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Equation {
    pub expression: String,
}

/// A table row: its block id and its cells.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub id: String,
    pub cells: Vec<Cell>,
}

impl Row {
    /// Trimmed plain text of the first fragment of the cell at `index`.
    pub fn cell_text(&self, index: usize) -> Option<&str> {
        self.cells
            .get(index)
            .and_then(|cell| cell.first())
            .and_then(|fragment| fragment.plain_text.as_deref())
            .map(str::trim)
    }
}

/// One page of "retrieve block children".
#[derive(Debug, Clone, Deserialize)]
pub struct ListChildrenResponse {
    #[serde(default)]
    pub results: Vec<Block>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

/// Body of a Notion error response.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

/// Body of an "update block" request for a table row.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateTableRowRequest<'a> {
    pub table_row: UpdateTableRowCells<'a>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateTableRowCells<'a> {
    pub cells: &'a [Cell],
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rich_text_keeps_unknown_fields() {
        let raw = json!({
            "type": "text",
            "text": { "content": "march", "link": null },
            "annotations": { "bold": true, "color": "default" },
            "plain_text": "march",
            "href": null
        });

        let fragment: RichText = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(fragment.plain_text.as_deref(), Some("march"));
        assert!(fragment.expression().is_none());
        assert_eq!(serde_json::to_value(&fragment).unwrap(), raw);
    }

    #[test]
    fn test_equation_serialization() {
        let fragment = RichText::equation("x^2");
        assert_eq!(
            serde_json::to_value(&fragment).unwrap(),
            json!({ "type": "equation", "equation": { "expression": "x^2" } })
        );
    }

    #[test]
    fn test_synced_source_id() {
        let reference: Block = serde_json::from_value(json!({
            "id": "ref",
            "type": "synced_block",
            "synced_block": { "synced_from": { "type": "block_id", "block_id": "origin" } }
        }))
        .unwrap();
        assert!(reference.is_synced_block());
        assert_eq!(reference.synced_source_id(), "origin");

        let original: Block = serde_json::from_value(json!({
            "id": "origin",
            "type": "synced_block",
            "synced_block": { "synced_from": null }
        }))
        .unwrap();
        assert_eq!(original.synced_source_id(), "origin");
    }

    #[test]
    fn test_into_row() {
        let block: Block = serde_json::from_value(json!({
            "id": "row-1",
            "type": "table_row",
            "table_row": { "cells": [[{ "type": "text", "plain_text": " 15 " }], []] }
        }))
        .unwrap();

        let row = block.into_row().unwrap();
        assert_eq!(row.id, "row-1");
        assert_eq!(row.cells.len(), 2);
        assert_eq!(row.cell_text(0), Some("15"));
        assert_eq!(row.cell_text(1), None);
        assert_eq!(row.cell_text(5), None);
    }

    #[test]
    fn test_non_row_block() {
        let block: Block =
            serde_json::from_value(json!({ "id": "p", "type": "paragraph", "paragraph": {} }))
                .unwrap();
        assert!(block.into_row().is_none());
    }

    #[test]
    fn test_update_request_shape() {
        let cells = vec![vec![RichText::text("march")], vec![RichText::equation("e")]];
        let body = UpdateTableRowRequest {
            table_row: UpdateTableRowCells { cells: &cells },
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["table_row"]["cells"][1][0]["equation"]["expression"], "e");
        assert_eq!(value["table_row"]["cells"][0][0]["text"]["content"], "march");
    }
}
