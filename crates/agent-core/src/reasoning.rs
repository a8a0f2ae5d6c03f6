//! Reasoning Loop
//!
//! Drives one query through rounds of reasoning and tool execution:
//!
//! ```text
//! Seeded ─▶ Reasoning ─┬─▶ Completing ─▶ Done
//!              ▲       │
//!              │       └─▶ AwaitingToolResults
//!              └──────────────────┘
//! ```
//!
//! The conversation lives only for the duration of `process_query`; on error
//! or timeout it is dropped and never returned.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;

use crate::error::{AgentError, Result};
use crate::message::{ContentUnit, Conversation, Message, Role, ToolRequest};
use crate::provider::{GenerationOptions, LlmProvider};
use crate::session::ToolSession;

/// Agent configuration
#[derive(Clone, Debug)]
pub struct AgentConfig {
    /// Maximum reasoning calls per query
    pub max_rounds: usize,

    /// Wall-clock budget for a whole query
    pub query_timeout: Duration,

    /// Run the tool requests of one round concurrently
    pub parallel_tool_calls: bool,

    /// Generation options
    pub generation: GenerationOptions,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_rounds: 25,
            query_timeout: Duration::from_secs(120),
            parallel_tool_calls: true,
            generation: GenerationOptions::default(),
        }
    }
}

impl AgentConfig {
    /// Reject limits that would fail every query
    pub fn validate(&self) -> Result<()> {
        if self.max_rounds == 0 {
            return Err(AgentError::Config("max_rounds must be at least 1".into()));
        }
        if self.query_timeout.is_zero() {
            return Err(AgentError::Config("query_timeout must be non-zero".into()));
        }
        Ok(())
    }
}

/// How the loop proceeds after a reasoning call
#[derive(Debug, PartialEq, Eq)]
enum Turn {
    /// Terminal answer
    Final,
    /// Tool requests are waiting for results
    ToolRound,
}

fn classify(message: &Message) -> Turn {
    if message.is_final_answer() {
        return Turn::Final;
    }

    let mut requests = 0usize;
    for unit in &message.content {
        match unit {
            ContentUnit::ToolUse { .. } => requests += 1,
            ContentUnit::Text { .. } | ContentUnit::ToolResult { .. } => {}
        }
    }

    if requests == 0 {
        Turn::Final
    } else {
        Turn::ToolRound
    }
}

/// The main Agent struct
pub struct Agent {
    provider: Arc<dyn LlmProvider>,
    session: Arc<ToolSession>,
    config: AgentConfig,
}

impl Agent {
    /// Create a new agent
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        session: Arc<ToolSession>,
        config: AgentConfig,
    ) -> Self {
        Self {
            provider,
            session,
            config,
        }
    }

    /// Run a query to completion and return the whole conversation.
    ///
    /// Fails with `QueryTimeout` if the configured budget runs out; in-flight
    /// reasoning and tool calls are dropped at that point.
    pub async fn process_query(&self, query: &str) -> Result<Vec<Message>> {
        let budget = self.config.query_timeout;

        match tokio::time::timeout(budget, self.run(query)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(timeout = ?budget, "Query timed out");
                Err(AgentError::QueryTimeout(budget))
            }
        }
    }

    /// Run a query and return only the final answer text
    pub async fn ask(&self, query: &str) -> Result<String> {
        let messages = self.process_query(query).await?;
        Ok(messages.last().map(Message::text).unwrap_or_default())
    }

    async fn run(&self, query: &str) -> Result<Vec<Message>> {
        let mut conversation = Conversation::new();
        conversation.push(Message::user(query))?;

        let mut round = 0usize;

        loop {
            round += 1;
            if round > self.config.max_rounds {
                tracing::warn!(max_rounds = self.config.max_rounds, "Round limit exceeded");
                return Err(AgentError::RoundLimitExceeded(self.config.max_rounds));
            }

            let tools = self.session.list_tools().await;
            tracing::debug!(
                round,
                messages = conversation.len(),
                tokens = conversation.estimate_tokens(),
                tools = tools.len(),
                provider = self.provider.name(),
                "Calling reasoning engine"
            );

            let completion = self
                .provider
                .complete(conversation.messages(), &tools, &self.config.generation)
                .await?;

            if completion.truncated() {
                tracing::warn!(round, "Reasoning engine hit max_tokens");
            }

            let message = completion.message;
            if message.role != Role::Assistant {
                return Err(AgentError::ReasoningEngine(format!(
                    "expected an assistant message, got {}",
                    message.role
                )));
            }

            match classify(&message) {
                Turn::Final => {
                    conversation.push(message)?;
                    tracing::info!(round, messages = conversation.len(), "Query complete");
                    return Ok(conversation.into_messages());
                }
                Turn::ToolRound => {
                    conversation.push(message.clone())?;
                    let results = self.execute_tools(&message).await;
                    conversation.push(Message::tool_results(results))?;
                }
            }
        }
    }

    /// Resolve every tool request of one assistant turn, in request order
    async fn execute_tools(&self, message: &Message) -> Vec<ContentUnit> {
        let calls = message.tool_requests().map(|request| self.execute_tool(request));

        if self.config.parallel_tool_calls {
            join_all(calls).await
        } else {
            let mut results = Vec::new();
            for call in calls {
                results.push(call.await);
            }
            results
        }
    }

    /// Invoke one tool. Failures become error-carrying results.
    async fn execute_tool(&self, request: ToolRequest<'_>) -> ContentUnit {
        tracing::info!(tool = request.name, tool_use_id = request.id, "Calling tool");

        match self.session.invoke(request.name, request.arguments).await {
            Ok(outcome) => {
                if outcome.is_error {
                    tracing::warn!(tool = request.name, "Tool reported an error");
                }
                outcome.into_content(request.id)
            }
            Err(e) => {
                tracing::warn!(tool = request.name, error = %e, "Tool invocation failed");
                ContentUnit::tool_error(request.id, e.to_string())
            }
        }
    }

    /// Get the tool session
    pub fn session(&self) -> &ToolSession {
        &self.session
    }

    /// Get configuration
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }
}

/// Builder for Agent configuration
#[derive(Default)]
pub struct AgentBuilder {
    provider: Option<Arc<dyn LlmProvider>>,
    session: Option<Arc<ToolSession>>,
    config: AgentConfig,
}

impl AgentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn session(mut self, session: Arc<ToolSession>) -> Self {
        self.session = Some(session);
        self
    }

    pub fn config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.generation.system_prompt = Some(prompt.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.generation.model = model.into();
        self
    }

    pub fn max_tokens(mut self, max: u32) -> Self {
        self.config.generation.max_tokens = max;
        self
    }

    pub fn temperature(mut self, temp: f32) -> Self {
        self.config.generation.temperature = Some(temp);
        self
    }

    pub fn max_rounds(mut self, max: usize) -> Self {
        self.config.max_rounds = max;
        self
    }

    pub fn query_timeout(mut self, timeout: Duration) -> Self {
        self.config.query_timeout = timeout;
        self
    }

    pub fn parallel_tool_calls(mut self, parallel: bool) -> Self {
        self.config.parallel_tool_calls = parallel;
        self
    }

    pub fn build(self) -> Result<Agent> {
        let provider = self
            .provider
            .ok_or_else(|| AgentError::Config("Provider is required".into()))?;
        let session = self
            .session
            .ok_or_else(|| AgentError::Config("Tool session is required".into()))?;

        self.config.validate()?;

        Ok(Agent::new(provider, session, self.config))
    }
}
