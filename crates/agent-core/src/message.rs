//! Conversation Messages
//!
//! Content model shared by the reasoning loop, the reasoning engine and the
//! HTTP front door. The JSON form matches the Messages API content blocks so a
//! conversation can be sent to the engine without translation.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{AgentError, Result};

/// Tool arguments: always a JSON object
pub type Arguments = Map<String, Value>;

/// Role of a message sender
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// User input and tool results
    User,
    /// Reasoning engine output
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// One unit of conversational content
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentUnit {
    /// Plain text. May be empty.
    Text { text: String },

    /// The reasoning engine asks for a tool to be invoked
    ToolUse {
        id: String,
        name: String,
        input: Arguments,
    },

    /// Outcome of a tool invocation, answering the `ToolUse` with the same id
    ToolResult {
        tool_use_id: String,
        content: Value,
        #[serde(default, skip_serializing_if = "is_false")]
        is_error: bool,
    },
}

fn is_false(flag: &bool) -> bool {
    !*flag
}

impl ContentUnit {
    pub fn text(text: impl Into<String>) -> Self {
        ContentUnit::Text { text: text.into() }
    }

    pub fn tool_use(id: impl Into<String>, name: impl Into<String>, input: Arguments) -> Self {
        ContentUnit::ToolUse {
            id: id.into(),
            name: name.into(),
            input,
        }
    }

    pub fn tool_result(tool_use_id: impl Into<String>, content: Value) -> Self {
        ContentUnit::ToolResult {
            tool_use_id: tool_use_id.into(),
            content,
            is_error: false,
        }
    }

    /// Error-carrying result for a request that could not be served
    pub fn tool_error(tool_use_id: impl Into<String>, error: impl Into<String>) -> Self {
        ContentUnit::ToolResult {
            tool_use_id: tool_use_id.into(),
            content: Value::String(error.into()),
            is_error: true,
        }
    }
}

/// Borrowed view of a `ToolUse` unit
#[derive(Clone, Copy, Debug)]
pub struct ToolRequest<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub arguments: &'a Arguments,
}

/// A single message in a conversation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Message role
    pub role: Role,

    /// Ordered content units
    pub content: Vec<ContentUnit>,
}

impl Message {
    /// Create a new message
    pub fn new(role: Role, content: Vec<ContentUnit>) -> Self {
        Self { role, content }
    }

    /// Create a user message holding a single text unit
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, vec![ContentUnit::text(text)])
    }

    /// Create an assistant message holding a single text unit
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, vec![ContentUnit::text(text)])
    }

    /// Create the user message that carries one round of tool results
    pub fn tool_results(results: Vec<ContentUnit>) -> Self {
        Self::new(Role::User, results)
    }

    /// Decode a message from its JSON text form
    pub fn from_json(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| AgentError::MalformedContent(e.to_string()))?;
        Self::from_value(value)
    }

    /// Decode and validate a message from a JSON value
    pub fn from_value(value: Value) -> Result<Self> {
        let message: Message = serde_json::from_value(value)
            .map_err(|e| AgentError::MalformedContent(e.to_string()))?;
        message.validate()?;
        Ok(message)
    }

    /// Encode to a JSON value
    pub fn to_value(&self) -> Value {
        // Every field is a plain string, map or Value, so encoding cannot fail.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Check content rules that the type system does not enforce
    pub fn validate(&self) -> Result<()> {
        let mut request_ids = HashSet::new();

        for unit in &self.content {
            match unit {
                ContentUnit::Text { .. } => {}
                ContentUnit::ToolUse { id, name, .. } => {
                    if self.role != Role::Assistant {
                        return Err(AgentError::MalformedContent(format!(
                            "tool_use '{}' in a {} message",
                            id, self.role
                        )));
                    }
                    if id.is_empty() {
                        return Err(AgentError::MalformedContent("tool_use with empty id".into()));
                    }
                    if name.is_empty() {
                        return Err(AgentError::MalformedContent(format!(
                            "tool_use '{}' has an empty tool name",
                            id
                        )));
                    }
                    if !request_ids.insert(id.as_str()) {
                        return Err(AgentError::MalformedContent(format!(
                            "duplicate tool_use id '{}'",
                            id
                        )));
                    }
                }
                ContentUnit::ToolResult { tool_use_id, .. } => {
                    if self.role != Role::User {
                        return Err(AgentError::MalformedContent(format!(
                            "tool_result '{}' in a {} message",
                            tool_use_id, self.role
                        )));
                    }
                    if tool_use_id.is_empty() {
                        return Err(AgentError::MalformedContent(
                            "tool_result with empty tool_use_id".into(),
                        ));
                    }
                }
            }
        }

        Ok(())
    }

    /// Tool requests in the order they appear
    pub fn tool_requests(&self) -> impl Iterator<Item = ToolRequest<'_>> {
        self.content.iter().filter_map(|unit| match unit {
            ContentUnit::ToolUse { id, name, input } => Some(ToolRequest {
                id,
                name,
                arguments: input,
            }),
            ContentUnit::Text { .. } | ContentUnit::ToolResult { .. } => None,
        })
    }

    /// Ids of the tool results carried by this message
    pub fn result_ids(&self) -> impl Iterator<Item = &str> {
        self.content.iter().filter_map(|unit| match unit {
            ContentUnit::ToolResult { tool_use_id, .. } => Some(tool_use_id.as_str()),
            ContentUnit::Text { .. } | ContentUnit::ToolUse { .. } => None,
        })
    }

    /// Exactly one text unit and nothing else
    pub fn is_final_answer(&self) -> bool {
        matches!(self.content.as_slice(), [ContentUnit::Text { .. }])
    }

    /// Concatenated text of all text units
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|unit| match unit {
                ContentUnit::Text { text } => Some(text.as_str()),
                ContentUnit::ToolUse { .. } | ContentUnit::ToolResult { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Estimate token count (rough approximation)
    pub fn estimate_tokens(&self) -> u32 {
        // ~4 characters per token; +4 for role overhead
        let chars = serde_json::to_string(&self.content).map_or(0, |s| s.len());
        u32::try_from(chars / 4).unwrap_or(u32::MAX).saturating_add(4)
    }
}

/// Append-only conversation history for a single query
#[derive(Clone, Debug, Default, Serialize)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message.
    ///
    /// Rejects invalid content and tool results that do not answer a request
    /// in the immediately preceding assistant message.
    pub fn push(&mut self, message: Message) -> Result<()> {
        message.validate()?;
        self.check_results_paired(&message)?;

        self.messages.push(message);
        Ok(())
    }

    fn check_results_paired(&self, message: &Message) -> Result<()> {
        let mut result_ids = message.result_ids().peekable();
        if result_ids.peek().is_none() {
            return Ok(());
        }

        let previous = self
            .messages
            .last()
            .filter(|m| m.role == Role::Assistant)
            .ok_or_else(|| {
                AgentError::MalformedContent("tool results must follow an assistant message".into())
            })?;

        let requested: HashSet<&str> = previous.tool_requests().map(|r| r.id).collect();
        match result_ids.find(|id| !requested.contains(id)) {
            Some(orphan) => Err(AgentError::MalformedContent(format!(
                "tool_result '{}' has no matching tool_use",
                orphan
            ))),
            None => Ok(()),
        }
    }

    /// Get all messages
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Consume the conversation, yielding its messages
    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }

    /// Estimate total tokens in conversation
    pub fn estimate_tokens(&self) -> u32 {
        self.messages.iter().map(Message::estimate_tokens).sum()
    }

    /// Number of messages
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(value: Value) -> Arguments {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_message_creation() {
        let msg = Message::user("Hello");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.text(), "Hello");
        assert!(msg.is_final_answer());
    }

    #[test]
    fn test_wire_shape() {
        let msg = Message::new(
            Role::Assistant,
            vec![
                ContentUnit::text("checking"),
                ContentUnit::tool_use("t1", "echo", args(json!({"x": 1}))),
            ],
        );

        assert_eq!(
            msg.to_value(),
            json!({
                "role": "assistant",
                "content": [
                    {"type": "text", "text": "checking"},
                    {"type": "tool_use", "id": "t1", "name": "echo", "input": {"x": 1}}
                ]
            })
        );
    }

    #[test]
    fn test_round_trip_mixed_content() {
        let assistant = Message::new(
            Role::Assistant,
            vec![
                ContentUnit::text(""),
                ContentUnit::tool_use("a", "search", args(json!({"q": "rust", "n": [1, 2]}))),
                ContentUnit::text("and"),
                ContentUnit::tool_use("b", "fetch", Arguments::new()),
            ],
        );
        let results = Message::tool_results(vec![
            ContentUnit::tool_result("a", json!([{"type": "text", "text": "hit"}])),
            ContentUnit::tool_error("b", "boom"),
        ]);

        for original in [assistant, results] {
            let encoded = serde_json::to_string(&original).unwrap();
            let decoded = Message::from_json(&encoded).unwrap();
            assert_eq!(decoded, original);
            assert_eq!(decoded.to_value(), original.to_value());
        }
    }

    #[test]
    fn test_error_flag_omitted_when_false() {
        let value = serde_json::to_value(ContentUnit::tool_result("t1", json!("ok"))).unwrap();
        assert!(value.get("is_error").is_none());

        let value = serde_json::to_value(ContentUnit::tool_error("t1", "bad")).unwrap();
        assert_eq!(value["is_error"], json!(true));
    }

    #[test]
    fn test_rejects_non_object_arguments() {
        let raw = json!({
            "role": "assistant",
            "content": [{"type": "tool_use", "id": "t1", "name": "echo", "input": [1, 2]}]
        });
        let err = Message::from_value(raw).unwrap_err();
        assert!(matches!(err, AgentError::MalformedContent(_)));
    }

    #[test]
    fn test_rejects_empty_tool_name() {
        let raw = json!({
            "role": "assistant",
            "content": [{"type": "tool_use", "id": "t1", "name": "", "input": {}}]
        });
        assert!(matches!(
            Message::from_value(raw),
            Err(AgentError::MalformedContent(_))
        ));
    }

    #[test]
    fn test_rejects_unknown_content_type() {
        assert!(matches!(
            Message::from_json(r#"{"role":"user","content":[{"type":"image"}]}"#),
            Err(AgentError::MalformedContent(_))
        ));
    }

    #[test]
    fn test_rejects_duplicate_request_ids() {
        let msg = Message::new(
            Role::Assistant,
            vec![
                ContentUnit::tool_use("t1", "echo", Arguments::new()),
                ContentUnit::tool_use("t1", "echo", Arguments::new()),
            ],
        );
        assert!(msg.validate().is_err());
    }

    #[test]
    fn test_conversation_pairs_results_with_requests() {
        let mut conv = Conversation::new();
        conv.push(Message::user("hi")).unwrap();
        conv.push(Message::new(
            Role::Assistant,
            vec![ContentUnit::tool_use("t1", "echo", Arguments::new())],
        ))
        .unwrap();

        let orphan = Message::tool_results(vec![ContentUnit::tool_result("t2", json!(1))]);
        assert!(matches!(
            conv.push(orphan),
            Err(AgentError::MalformedContent(_))
        ));
        assert_eq!(conv.len(), 2);

        conv.push(Message::tool_results(vec![ContentUnit::tool_result("t1", json!(1))]))
            .unwrap();
        assert_eq!(conv.len(), 3);
    }

    #[test]
    fn test_conversation_rejects_result_without_assistant() {
        let mut conv = Conversation::new();
        let result = Message::tool_results(vec![ContentUnit::tool_result("t1", json!(1))]);
        assert!(conv.push(result).is_err());
        assert!(conv.is_empty());
    }

    #[test]
    fn test_final_answer_classification() {
        assert!(Message::assistant("done").is_final_answer());
        assert!(!Message::new(Role::Assistant, vec![]).is_final_answer());
        assert!(!Message::new(
            Role::Assistant,
            vec![ContentUnit::text("a"), ContentUnit::text("b")]
        )
        .is_final_answer());
    }
}
