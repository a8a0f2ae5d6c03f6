//! Service Kit - Agent Tools
//!
//! Tools that implement `agent_core::Tool` for the docs server.

mod get_docs;

pub use get_docs::GetDocsTool;
