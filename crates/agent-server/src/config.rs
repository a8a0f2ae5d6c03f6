//! Server configuration from environment variables

use std::str::FromStr;
use std::time::Duration;

use agent_core::provider::{GenerationOptions, DEFAULT_MODEL};
use agent_core::{AgentConfig, AgentError, Result};

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_addr: String,

    /// Tool provider endpoint handed to the MCP transport
    pub mcp_server_script: String,

    pub model: String,
    pub max_tokens: u32,
    pub max_rounds: usize,
    pub query_timeout: Duration,
    pub parallel_tool_calls: bool,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mcp_server_script = var("MCP_SERVER_SCRIPT").ok_or_else(|| {
            AgentError::Config("MCP_SERVER_SCRIPT must name the tool provider to launch".into())
        })?;

        let config = Self {
            bind_addr: var("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8000".into()),
            mcp_server_script,
            model: var("ANTHROPIC_MODEL").unwrap_or_else(|| DEFAULT_MODEL.into()),
            max_tokens: parse_var(&var, "MAX_TOKENS", 1000)?,
            max_rounds: parse_var(&var, "MAX_ROUNDS", 25)?,
            query_timeout: Duration::from_secs(parse_var(&var, "QUERY_TIMEOUT_SECS", 120)?),
            parallel_tool_calls: parse_var(&var, "PARALLEL_TOOL_CALLS", true)?,
        };

        config.agent_config().validate()?;
        if config.max_tokens == 0 {
            return Err(AgentError::Config("MAX_TOKENS must be at least 1".into()));
        }
        Ok(config)
    }

    pub fn agent_config(&self) -> AgentConfig {
        AgentConfig {
            max_rounds: self.max_rounds,
            query_timeout: self.query_timeout,
            parallel_tool_calls: self.parallel_tool_calls,
            generation: GenerationOptions {
                model: self.model.clone(),
                max_tokens: self.max_tokens,
                ..GenerationOptions::default()
            },
        }
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
            .map_err(|_| AgentError::Config(format!("{} has an invalid value: '{}'", key, raw))),
    }
}
