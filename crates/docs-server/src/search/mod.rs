//! Web Search
//!
//! Abstraction over the search backend used to locate documentation pages.

mod mock;
mod serper;

pub use mock::MockSearchClient;
pub use serper::SerperClient;

use async_trait::async_trait;

use crate::error::Result;
use crate::model::SearchResult;

/// Search client trait (Strategy pattern)
#[async_trait]
pub trait SearchClient: Send + Sync {
    /// Organic results for `query`, best first
    ///
    /// A backend timeout yields an empty list rather than an error.
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>>;

    /// Backend name
    fn name(&self) -> &str;
}
