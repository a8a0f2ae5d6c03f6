//! Model Context Protocol plumbing
//!
//! `protocol` holds the wire types, `channel` the JSON-RPC framing, `client`
//! the MCP calls, and `stdio` the child-process `ToolTransport`.

pub mod channel;
pub mod client;
pub mod protocol;
pub mod stdio;

pub use channel::{JsonRpcChannel, RpcError};
pub use client::McpClient;
pub use stdio::{McpStdioTransport, StdioConfig};
