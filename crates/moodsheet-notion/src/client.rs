//! Notion API client.
//!
//! Only the two block endpoints the tracker needs are covered:
//! - retrieve block children (paginated)
//! - update a `table_row` block's cells

use async_trait::async_trait;
use tracing::{debug, trace};

use crate::error::{NotionError, Result};
use crate::types::{
    Block, Cell, ErrorBody, ListChildrenResponse, UpdateTableRowCells, UpdateTableRowRequest,
};

/// Notion REST base URL.
const NOTION_API_URL: &str = "https://api.notion.com/v1";

/// API version sent with every request.
pub const NOTION_VERSION: &str = "2022-06-28";

/// Children requested per page (the API maximum).
pub const PAGE_SIZE: u32 = 100;

/// Block operations the tracker depends on.
#[async_trait]
pub trait BlockApi: Send + Sync {
    /// List every child of a block, following pagination to the end.
    async fn list_children(&self, block_id: &str) -> Result<Vec<Block>>;

    /// Replace the cells of a `table_row` block.
    async fn update_table_row(&self, block_id: &str, cells: &[Cell]) -> Result<()>;
}

/// Notion API client backed by `reqwest`.
#[derive(Clone)]
pub struct NotionClient {
    client: reqwest::Client,
    token: String,
    base_url: String,
}

impl NotionClient {
    /// Create a new client with the given integration token.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            token: token.into(),
            base_url: NOTION_API_URL.to_string(),
        }
    }

    /// Point the client at a different API root.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn children_url(&self, block_id: &str) -> String {
        format!("{}/blocks/{}/children", self.base_url, block_id)
    }

    fn block_url(&self, block_id: &str) -> String {
        format!("{}/blocks/{}", self.base_url, block_id)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let body: ErrorBody = serde_json::from_str(&text).unwrap_or(ErrorBody {
            code: "unknown".to_string(),
            message: text,
        });
        Err(NotionError::Api {
            status: status.as_u16(),
            code: body.code,
            message: body.message,
        })
    }
}

#[async_trait]
impl BlockApi for NotionClient {
    async fn list_children(&self, block_id: &str) -> Result<Vec<Block>> {
        let url = self.children_url(block_id);
        let mut blocks = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut query = vec![("page_size", PAGE_SIZE.to_string())];
            if let Some(ref c) = cursor {
                query.push(("start_cursor", c.clone()));
            }

            trace!(block_id = %block_id, cursor = ?cursor, "Listing block children");

            let response = self
                .client
                .get(&url)
                .bearer_auth(&self.token)
                .header("Notion-Version", NOTION_VERSION)
                .query(&query)
                .send()
                .await?;

            let page: ListChildrenResponse = Self::check(response).await?.json().await?;
            blocks.extend(page.results);

            match (page.has_more, page.next_cursor) {
                (true, Some(next)) => cursor = Some(next),
                _ => break,
            }
        }

        debug!(block_id = %block_id, count = blocks.len(), "Listed block children");
        Ok(blocks)
    }

    async fn update_table_row(&self, block_id: &str, cells: &[Cell]) -> Result<()> {
        let body = UpdateTableRowRequest {
            table_row: UpdateTableRowCells { cells },
        };

        let response = self
            .client
            .patch(self.block_url(block_id))
            .bearer_auth(&self.token)
            .header("Notion-Version", NOTION_VERSION)
            .json(&body)
            .send()
            .await?;

        Self::check(response).await?;
        debug!(block_id = %block_id, cells = cells.len(), "Updated table row");
        Ok(())
    }
}
