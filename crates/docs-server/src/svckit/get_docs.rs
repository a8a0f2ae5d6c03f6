//! Documentation Lookup Tool
//!
//! Searches one library's documentation site and returns the text of the
//! top hits.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use agent_core::{
    message::Arguments, tool::ParameterSchema, AgentError, Result as CoreResult, Tool, ToolSchema,
};

use crate::error::Result;
use crate::fetch::PageFetcher;
use crate::model::Library;
use crate::search::SearchClient;

pub const NO_RESULTS_TEXT: &str = "no results found";

/// Tool for searching library documentation
pub struct GetDocsTool {
    search: Arc<dyn SearchClient>,
    fetcher: Arc<dyn PageFetcher>,
}

impl GetDocsTool {
    pub fn new(search: Arc<dyn SearchClient>, fetcher: Arc<dyn PageFetcher>) -> Self {
        Self { search, fetcher }
    }

    /// Search `library`'s docs for `query` and concatenate the page text
    pub async fn get_docs(&self, query: &str, library: &str) -> Result<String> {
        let library = Library::parse(library)?;
        let site_query = library.site_query(query);

        let results = self.search.search(&site_query).await?;
        tracing::info!(query = %site_query, hits = results.len(), "Search finished");

        if results.is_empty() {
            return Ok(NO_RESULTS_TEXT.to_string());
        }

        let mut text = String::new();
        for result in &results {
            let page = self.fetcher.fetch_text(&result.link).await?;
            if !text.is_empty() && !page.is_empty() {
                text.push('\n');
            }
            text.push_str(&page);
        }

        Ok(text)
    }
}

#[async_trait]
impl Tool for GetDocsTool {
    fn schema(&self) -> ToolSchema {
        let libraries = Library::ALL.iter().map(|lib| json!(lib.id())).collect();

        ToolSchema {
            name: "get_docs".into(),
            description: "Search the docs for a given query and library. \
                Supports langchain, openai and llama-index. Returns text from the documentation."
                .into(),
            parameters: vec![
                ParameterSchema::required_string(
                    "query",
                    "The query to search for (e.g. \"Chroma DB\")",
                ),
                ParameterSchema::required_string(
                    "library",
                    "The library to search in (e.g. \"langchain\")",
                )
                .with_enum(libraries),
            ],
        }
    }

    async fn execute(&self, arguments: &Arguments) -> CoreResult<Value> {
        let query = string_arg(arguments, "query")?;
        let library = string_arg(arguments, "library")?;

        let text = self.get_docs(query, library).await?;
        Ok(Value::String(text))
    }
}

fn string_arg<'a>(arguments: &'a Arguments, name: &str) -> CoreResult<&'a str> {
    arguments
        .get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| AgentError::ToolValidation(format!("'{}' must be a string", name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::error::DocsError;
    use crate::fetch::FETCH_TIMEOUT_TEXT;
    use crate::model::SearchResult;
    use crate::search::MockSearchClient;

    /// Records requested URLs and answers from a fixed table
    #[derive(Default)]
    struct StubFetcher {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl PageFetcher for StubFetcher {
        async fn fetch_text(&self, url: &str) -> Result<String> {
            self.seen.lock().unwrap().push(url.to_string());
            match url {
                "https://a.example/" => Ok("page a".into()),
                "https://slow.example/" => Ok(FETCH_TIMEOUT_TEXT.into()),
                _ => Err(DocsError::Fetch(format!("no route to {}", url))),
            }
        }
    }

    fn hit(link: &str) -> SearchResult {
        SearchResult {
            title: String::new(),
            link: link.into(),
            snippet: String::new(),
        }
    }

    fn args(query: &str, library: &str) -> Arguments {
        json!({"query": query, "library": library})
            .as_object()
            .cloned()
            .unwrap()
    }

    #[tokio::test]
    async fn test_unsupported_library() {
        let tool = GetDocsTool::new(
            Arc::new(MockSearchClient::new()),
            Arc::new(StubFetcher::default()),
        );

        let err = tool.execute(&args("x", "pandas")).await.unwrap_err();
        assert!(err.to_string().contains("Library not supported"));
    }

    #[tokio::test]
    async fn test_no_results() {
        let fetcher = Arc::new(StubFetcher::default());
        let tool = GetDocsTool::new(Arc::new(MockSearchClient::empty()), fetcher.clone());

        let value = tool.execute(&args("Chroma DB", "langchain")).await.unwrap();
        assert_eq!(value, json!("no results found"));
        assert!(fetcher.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_pages_are_concatenated_in_order() {
        let fetcher = Arc::new(StubFetcher::default());
        let search = MockSearchClient::with_results(vec![
            hit("https://a.example/"),
            hit("https://slow.example/"),
        ]);
        let tool = GetDocsTool::new(Arc::new(search), fetcher.clone());

        let text = tool.get_docs("agents", "openai").await.unwrap();
        assert_eq!(text, "page a\nTimeout error");
        assert_eq!(
            *fetcher.seen.lock().unwrap(),
            vec!["https://a.example/", "https://slow.example/"]
        );
    }

    #[tokio::test]
    async fn test_fetch_failure_is_an_error() {
        let search = MockSearchClient::with_results(vec![hit("https://broken.example/")]);
        let tool = GetDocsTool::new(Arc::new(search), Arc::new(StubFetcher::default()));

        let err = tool.execute(&args("agents", "openai")).await.unwrap_err();
        assert!(matches!(err, AgentError::Invocation(_)));
    }

    #[tokio::test]
    async fn test_site_scoped_query_reaches_search() {
        let fetcher = Arc::new(StubFetcher::default());
        let tool = GetDocsTool::new(Arc::new(MockSearchClient::new()), fetcher.clone());

        tool.get_docs("query engines", "llama-index").await.unwrap_err();
        assert_eq!(
            *fetcher.seen.lock().unwrap(),
            vec!["https://docs.llamaindex.ai/stable/"]
        );
    }

    #[test]
    fn test_schema_lists_libraries() {
        let tool = GetDocsTool::new(
            Arc::new(MockSearchClient::new()),
            Arc::new(StubFetcher::default()),
        );
        let schema = tool.schema().input_schema();
        assert_eq!(schema["required"], json!(["query", "library"]));
        assert_eq!(
            schema["properties"]["library"]["enum"],
            json!(["langchain", "llama-index", "openai"])
        );
    }
}
