//! # docs-server
//!
//! MCP tool server that answers questions about library documentation.
//!
//! ## Flow
//!
//! ```text
//! tools/call get_docs(query, library)
//!        │
//!        ▼
//! site:<docs url> <query> ──▶ SearchClient ──▶ top hits
//!                                              │
//!                                              ▼
//!                               PageFetcher ──▶ page text (concatenated)
//! ```
//!
//! Supported libraries: `langchain`, `llama-index`, `openai`.

pub mod config;
pub mod error;
pub mod fetch;
pub mod html;
pub mod model;
pub mod search;
pub mod server;
pub mod svckit;

pub use config::DocsConfig;
pub use error::{DocsError, Result};
pub use model::{Library, SearchResult};
pub use server::McpServer;

/// Re-export tools for easy registration
pub mod tools {
    pub use crate::svckit::GetDocsTool;
}
