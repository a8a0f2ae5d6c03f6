//! Serper (google.serper.dev) search backend

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::SearchClient;
use crate::config::DocsConfig;
use crate::error::{DocsError, Result};
use crate::model::SearchResult;

pub struct SerperClient {
    http: reqwest::Client,
    url: String,
    api_key: String,
    num_results: u32,
}

#[derive(Deserialize)]
struct SerperResponse {
    #[serde(default)]
    organic: Vec<SearchResult>,
}

impl SerperClient {
    pub fn new(config: &DocsConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            http,
            url: config.serper_url.clone(),
            api_key: config.serper_api_key.clone(),
            num_results: config.search_results,
        })
    }
}

#[async_trait]
impl SearchClient for SerperClient {
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>> {
        tracing::info!(query, "Searching");

        let response = self
            .http
            .post(&self.url)
            .header("X-API-KEY", &self.api_key)
            .json(&json!({ "q": query, "num": self.num_results }))
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                tracing::warn!(query, "Search timed out, treating as no results");
                return Ok(Vec::new());
            }
            Err(e) => return Err(DocsError::Search(e.to_string())),
        };

        let response = response
            .error_for_status()
            .map_err(|e| DocsError::Search(e.to_string()))?;

        match response.json::<SerperResponse>().await {
            Ok(body) => Ok(body.organic),
            Err(e) if e.is_timeout() => {
                tracing::warn!(query, "Search timed out, treating as no results");
                Ok(Vec::new())
            }
            Err(e) => Err(DocsError::Search(e.to_string())),
        }
    }

    fn name(&self) -> &str {
        "Serper"
    }
}
