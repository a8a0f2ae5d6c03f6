//! # agent-core
//!
//! Conversation loop between a reasoning engine and a tool provider.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Agent                                 │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────┐  │
//! │  │  Reasoning  │  │ ToolSession │  │   LlmProvider       │  │
//! │  │    Loop     │──│ (Transport) │──│   (Strategy)        │  │
//! │  └─────────────┘  └─────────────┘  └─────────────────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The `LlmProvider` trait hides the reasoning engine; the `ToolTransport`
//! trait hides how the tool provider is reached (child process, in-process
//! registry, ...). The loop itself only sees `Message`s made of `ContentUnit`s.

pub mod provider;
pub mod tool;
pub mod reasoning;
pub mod message;
pub mod error;
pub mod session;

pub use error::{AgentError, Result};
pub use message::{Arguments, ContentUnit, Conversation, Message, Role};
pub use provider::{Completion, GenerationOptions, LlmProvider};
pub use reasoning::{Agent, AgentBuilder, AgentConfig};
pub use session::{LocalTransport, ToolSession, ToolTransport};
pub use tool::{
    ParameterSchema, Tool, ToolCatalog, ToolDescriptor, ToolOutcome, ToolRegistry, ToolSchema,
};
