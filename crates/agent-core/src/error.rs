//! Error Types

use std::time::Duration;

use thiserror::Error;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Agent error types
#[derive(Error, Debug)]
pub enum AgentError {
    /// Content failed local validation (never sent to the reasoning engine)
    #[error("Malformed content: {0}")]
    MalformedContent(String),

    /// Tool provider handshake or transport failure
    #[error("Connection error: {0}")]
    Connection(String),

    /// `connect` called on a session that is already connected
    #[error("Session already connected")]
    AlreadyConnected,

    /// Session used before `connect` (or after `shutdown`)
    #[error("Session not connected")]
    NotConnected,

    /// Tool not present in the negotiated catalog
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// Provider advertised the same tool name twice
    #[error("Duplicate tool name: {0}")]
    DuplicateTool(String),

    /// Tool arguments rejected before execution
    #[error("Tool validation error: {0}")]
    ToolValidation(String),

    /// Remote tool invocation failed
    #[error("Tool invocation error: {0}")]
    Invocation(String),

    /// Reasoning engine failed (network, malformed response)
    #[error("Reasoning engine error: {0}")]
    ReasoningEngine(String),

    /// Reasoning engine quota exhausted
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Reasoning engine rejected our credentials
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Conversation exceeded the configured number of rounds
    #[error("Conversation round limit ({0}) exceeded")]
    RoundLimitExceeded(usize),

    /// Query did not finish within the configured timeout
    #[error("Query timed out after {0:?}")]
    QueryTimeout(Duration),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl AgentError {
    /// True for failures that originate outside this process.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            AgentError::Connection(_)
                | AgentError::Invocation(_)
                | AgentError::ReasoningEngine(_)
                | AgentError::RateLimited(_)
                | AgentError::Auth(_)
        )
    }

    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            AgentError::ReasoningEngine(msg) => {
                format!("The AI service encountered an error: {}", msg)
            }
            AgentError::Connection(_) | AgentError::NotConnected => {
                "The tool provider is currently unavailable.".into()
            }
            AgentError::UnknownTool(name) => format!("The tool '{}' is not available.", name),
            AgentError::Invocation(msg) => format!("Tool error: {}", msg),
            AgentError::MalformedContent(msg) => {
                format!("The conversation contained invalid content: {}", msg)
            }
            AgentError::RoundLimitExceeded(max) => format!(
                "The request needed more than {} reasoning rounds. Please try a simpler query.",
                max
            ),
            AgentError::QueryTimeout(_) => {
                "The request took too long to process. Please try again.".into()
            }
            AgentError::RateLimited(_) => {
                "The AI service is rate limiting requests. Please wait a moment.".into()
            }
            AgentError::Auth(_) => {
                "The AI service rejected the configured credentials.".into()
            }
            _ => "An unexpected error occurred.".into(),
        }
    }
}
