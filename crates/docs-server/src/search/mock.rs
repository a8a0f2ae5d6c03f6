//! Mock Search Client
//!
//! For testing and offline demos. Returns canned hits per site prefix.

use async_trait::async_trait;

use super::SearchClient;
use crate::error::Result;
use crate::model::{Library, SearchResult};

/// Search client with static results
#[derive(Default)]
pub struct MockSearchClient {
    /// Results per query; `None` uses the built-in table
    fixed: Option<Vec<SearchResult>>,
}

impl MockSearchClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Always return `results`
    pub fn with_results(results: Vec<SearchResult>) -> Self {
        Self {
            fixed: Some(results),
        }
    }

    /// Always return nothing, as a timed-out search does
    pub fn empty() -> Self {
        Self::with_results(Vec::new())
    }

    fn canned(query: &str) -> Vec<SearchResult> {
        Library::ALL
            .into_iter()
            .filter(|lib| query.starts_with(&format!("site:{} ", lib.docs_url())))
            .map(|lib| SearchResult {
                title: format!("{} documentation", lib.id()),
                link: format!("https://{}/", lib.docs_url()),
                snippet: String::new(),
            })
            .collect()
    }
}

#[async_trait]
impl SearchClient for MockSearchClient {
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>> {
        Ok(match &self.fixed {
            Some(results) => results.clone(),
            None => Self::canned(query),
        })
    }

    fn name(&self) -> &str {
        "MockSearch"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_canned_results_follow_site() {
        let search = MockSearchClient::new();

        let hits = search
            .search(&Library::OpenAi.site_query("embeddings"))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].link, "https://platform.openai.com/docs/");

        assert!(search.search("no site prefix").await.unwrap().is_empty());
    }
}
