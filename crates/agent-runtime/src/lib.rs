//! # agent-runtime
//!
//! Concrete reasoning engines and tool transports for agent-core.
//!
//! ## Providers
//!
//! - **Anthropic**: Messages API with tool use
//!
//! ## Transports
//!
//! - **MCP over stdio**: tool provider running as a child process
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_runtime::{AnthropicProvider, McpStdioTransport};
//!
//! let session = Arc::new(ToolSession::new(McpStdioTransport::new()));
//! session.connect("target/release/docs-server").await?;
//!
//! let agent = AgentBuilder::new()
//!     .provider(Arc::new(AnthropicProvider::from_env()?))
//!     .session(session)
//!     .build()?;
//! ```

pub mod anthropic;
pub mod mcp;

pub use anthropic::{AnthropicConfig, AnthropicProvider};
pub use mcp::{McpStdioTransport, StdioConfig};

// Re-export core types for convenience
pub use agent_core::{
    Agent, AgentError, LlmProvider, Message, Result, Role, Tool, ToolRegistry, ToolSession,
};
