//! Page fetching

use async_trait::async_trait;

use crate::config::DocsConfig;
use crate::error::{DocsError, Result};
use crate::html::html_to_text;

/// Text returned in place of a page that did not load in time
pub const FETCH_TIMEOUT_TEXT: &str = "Timeout error";

/// Retrieves the readable text of a page
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_text(&self, url: &str) -> Result<String>;
}

/// Fetches over HTTP and strips markup
pub struct HttpFetcher {
    http: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(config: &DocsConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { http })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String> {
        tracing::debug!(url, "Fetching page");

        let body = match self.http.get(url).send().await {
            Ok(response) => {
                if !response.status().is_success() {
                    tracing::warn!(url, status = %response.status(), "Page returned an error status");
                }
                response.text().await
            }
            Err(e) => Err(e),
        };

        match body {
            Ok(html) => Ok(html_to_text(&html)),
            Err(e) if e.is_timeout() => {
                tracing::warn!(url, "Page fetch timed out");
                Ok(FETCH_TIMEOUT_TEXT.to_string())
            }
            Err(e) => Err(DocsError::Fetch(e.to_string())),
        }
    }
}
