//! Search client trait

use super::query::{SearchInput, SearchResult};
use anyhow::Result;
use async_trait::async_trait;

/// Batched access to the search index
///
/// One result is returned per input, in input order.
#[async_trait]
pub trait SearchClient: Send + Sync {
    /// Run a batch of searches, each capped at `limit` items
    async fn search(&self, inputs: &[SearchInput], limit: usize) -> Result<Vec<SearchResult>>;

    /// Get client type name
    fn client_type(&self) -> &'static str;
}
