//! In-memory block store.
//!
//! Implements [`BlockApi`] over a map of parent id to children. Row updates
//! are applied in place and recorded so tests can assert on what was written.

use std::collections::HashMap;
use std::sync::{Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;

use crate::client::BlockApi;
use crate::error::{NotionError, Result};
use crate::types::{Block, Cell, RichText};

/// A recorded `update_table_row` call.
#[derive(Debug, Clone, PartialEq)]
pub struct RowWrite {
    pub block_id: String,
    pub cells: Vec<Cell>,
}

#[derive(Debug, Default)]
pub struct MemoryBlocks {
    children: RwLock<HashMap<String, Vec<Block>>>,
    writes: Mutex<Vec<RowWrite>>,
    list_calls: Mutex<Vec<String>>,
    latency: RwLock<Option<Duration>>,
    write_error: RwLock<Option<String>>,
}

impl MemoryBlocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append children under `parent`.
    pub fn push_children(&self, parent: &str, blocks: Vec<Block>) {
        if let Ok(mut map) = self.children.write() {
            map.entry(parent.to_string()).or_default().extend(blocks);
        }
    }

    /// Add a table under `parent` built from text rows.
    ///
    /// Empty strings become empty cells.
    pub fn push_text_table(&self, parent: &str, table_id: &str, rows: &[Vec<&str>]) {
        self.push_children(parent, vec![Block::table(table_id)]);
        let rows = rows
            .iter()
            .enumerate()
            .map(|(idx, cells)| Block::row(format!("{table_id}-row{idx}"), text_cells(cells)))
            .collect();
        self.push_children(table_id, rows);
    }

    /// Delay every call by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        if let Ok(mut guard) = self.latency.write() {
            *guard = latency;
        }
    }

    /// Make every write fail with an API error carrying `message`.
    pub fn fail_writes(&self, message: Option<&str>) {
        if let Ok(mut guard) = self.write_error.write() {
            *guard = message.map(str::to_string);
        }
    }

    pub fn writes(&self) -> Vec<RowWrite> {
        self.writes.lock().map(|w| w.clone()).unwrap_or_default()
    }

    pub fn write_count(&self) -> usize {
        self.writes.lock().map(|w| w.len()).unwrap_or_default()
    }

    /// Block ids passed to `list_children`, in call order.
    pub fn list_calls(&self) -> Vec<String> {
        self.list_calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Current cells of a row block.
    pub fn row_cells(&self, row_id: &str) -> Option<Vec<Cell>> {
        let map = self.children.read().ok()?;
        map.values()
            .flatten()
            .find(|b| b.id == row_id)
            .and_then(|b| b.table_row.as_ref())
            .map(|t| t.cells.clone())
    }

    async fn delay(&self) {
        let latency = self.latency.read().ok().and_then(|l| *l);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

/// Text cells from strings; `""` becomes an empty cell.
pub fn text_cells(cells: &[&str]) -> Vec<Cell> {
    cells
        .iter()
        .map(|c| {
            if c.is_empty() {
                Vec::new()
            } else {
                vec![RichText::text(c)]
            }
        })
        .collect()
}

#[async_trait]
impl BlockApi for MemoryBlocks {
    async fn list_children(&self, block_id: &str) -> Result<Vec<Block>> {
        self.delay().await;
        if let Ok(mut calls) = self.list_calls.lock() {
            calls.push(block_id.to_string());
        }

        let map = self
            .children
            .read()
            .map_err(|e| NotionError::Http(e.to_string()))?;
        map.get(block_id).cloned().ok_or_else(|| NotionError::Api {
            status: 404,
            code: "object_not_found".to_string(),
            message: format!("Could not find block with ID: {block_id}."),
        })
    }

    async fn update_table_row(&self, block_id: &str, cells: &[Cell]) -> Result<()> {
        self.delay().await;

        let failure = self.write_error.read().ok().and_then(|e| e.clone());
        if let Some(message) = failure {
            return Err(NotionError::Api {
                status: 500,
                code: "internal_server_error".to_string(),
                message,
            });
        }

        {
            let mut map = self
                .children
                .write()
                .map_err(|e| NotionError::Http(e.to_string()))?;
            let row = map
                .values_mut()
                .flatten()
                .find(|b| b.id == block_id && b.is_table_row());
            match row {
                Some(row) => {
                    if let Some(content) = row.table_row.as_mut() {
                        content.cells = cells.to_vec();
                    }
                }
                None => {
                    return Err(NotionError::Api {
                        status: 404,
                        code: "object_not_found".to_string(),
                        message: format!("Could not find block with ID: {block_id}."),
                    })
                }
            }
        }

        if let Ok(mut writes) = self.writes.lock() {
            writes.push(RowWrite {
                block_id: block_id.to_string(),
                cells: cells.to_vec(),
            });
        }
        Ok(())
    }
}
