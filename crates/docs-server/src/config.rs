//! Docs server configuration

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{DocsError, Result};

pub const DEFAULT_SERPER_URL: &str = "https://google.serper.dev/search";
pub const DEFAULT_USER_AGENT: &str = "docs-app/1.0";

#[derive(Clone)]
pub struct DocsConfig {
    pub serper_api_key: String,
    pub serper_url: String,

    /// Organic results requested per search
    pub search_results: u32,

    /// Timeout for each search and page fetch
    pub http_timeout: Duration,

    pub user_agent: String,
}

impl fmt::Debug for DocsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocsConfig")
            .field("serper_api_key", &"[REDACTED]")
            .field("serper_url", &self.serper_url)
            .field("search_results", &self.search_results)
            .field("http_timeout", &self.http_timeout)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

impl DocsConfig {
    pub fn new(serper_api_key: impl Into<String>) -> Self {
        Self {
            serper_api_key: serper_api_key.into(),
            serper_url: DEFAULT_SERPER_URL.into(),
            search_results: 2,
            http_timeout: Duration::from_secs(30),
            user_agent: DEFAULT_USER_AGENT.into(),
        }
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_key = var("SERPER_API_KEY")
            .ok_or_else(|| DocsError::Config("SERPER_API_KEY is not set".into()))?;

        let mut config = Self::new(api_key);
        if let Some(url) = var("SERPER_URL") {
            config.serper_url = url;
        }
        if let Some(agent) = var("USER_AGENT") {
            config.user_agent = agent;
        }
        config.search_results = parse_var(&var, "SEARCH_RESULTS", config.search_results)?;
        config.http_timeout =
            Duration::from_secs(parse_var(&var, "HTTP_TIMEOUT_SECS", config.http_timeout.as_secs())?);

        Ok(config)
    }
}

fn parse_var<T, F>(var: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| DocsError::Config(format!("{} has an invalid value: '{}'", key, raw))),
    }
}
