//! Application State

use std::sync::Arc;

use agent_core::{AgentConfig, LlmProvider, ToolSession};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Reasoning engine
    pub provider: Arc<dyn LlmProvider>,

    /// Tool provider session, connected once at startup
    pub session: Arc<ToolSession>,

    /// Loop configuration applied to every query
    pub agent_config: AgentConfig,
}
