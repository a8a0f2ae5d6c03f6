//! Error Types for the docs server

use thiserror::Error;

use agent_core::AgentError;

pub type Result<T> = std::result::Result<T, DocsError>;

#[derive(Error, Debug)]
pub enum DocsError {
    #[error("Library not supported: {0}")]
    UnsupportedLibrary(String),

    #[error("Unable to call search_web: {0}")]
    Search(String),

    #[error("Unable to call fetch_url: {0}")]
    Fetch(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<DocsError> for AgentError {
    fn from(err: DocsError) -> Self {
        match err {
            DocsError::Config(msg) => AgentError::Config(msg),
            other => AgentError::Invocation(other.to_string()),
        }
    }
}
