//! Tool System
//!
//! Catalog types shared by every tool provider, plus the in-process tool
//! framework used by tool servers and tests. Tools are registered at startup
//! and listed in registration order.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{AgentError, Result};
use crate::message::{Arguments, ContentUnit};

/// Catalog entry describing an invocable tool
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Unique tool identifier
    pub name: String,

    /// Human-readable description (shown to the LLM)
    #[serde(default)]
    pub description: String,

    /// JSON schema of the argument object
    #[serde(alias = "inputSchema", default = "empty_object_schema")]
    pub input_schema: Value,
}

fn empty_object_schema() -> Value {
    json!({"type": "object", "properties": {}})
}

/// Ordered, name-unique set of tool descriptors
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ToolCatalog {
    tools: Vec<ToolDescriptor>,
}

impl ToolCatalog {
    /// Build a catalog, rejecting empty or duplicate names
    pub fn new(tools: Vec<ToolDescriptor>) -> Result<Self> {
        let mut seen = std::collections::HashSet::new();
        for tool in &tools {
            if tool.name.is_empty() {
                return Err(AgentError::Config("tool with an empty name".into()));
            }
            if !seen.insert(tool.name.as_str()) {
                return Err(AgentError::DuplicateTool(tool.name.clone()));
            }
        }
        Ok(Self { tools })
    }

    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.iter().find(|t| t.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn descriptors(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Raw result payload returned by a tool provider
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolOutcome {
    /// Provider payload, forwarded as-is to the reasoning engine
    pub content: Value,

    /// Provider reported the call as failed
    #[serde(default)]
    pub is_error: bool,
}

impl ToolOutcome {
    pub fn success(content: Value) -> Self {
        Self {
            content,
            is_error: false,
        }
    }

    pub fn failure(content: Value) -> Self {
        Self {
            content,
            is_error: true,
        }
    }

    /// Wrap as the result answering request `tool_use_id`
    pub fn into_content(self, tool_use_id: impl Into<String>) -> ContentUnit {
        ContentUnit::ToolResult {
            tool_use_id: tool_use_id.into(),
            content: self.content,
            is_error: self.is_error,
        }
    }
}

/// Parameter definition for tool schema
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParameterSchema {
    /// Parameter name
    pub name: String,

    /// JSON Schema type (string, number, boolean, object, array)
    #[serde(rename = "type")]
    pub param_type: String,

    /// Human-readable description
    pub description: String,

    /// Whether this parameter is required
    #[serde(default)]
    pub required: bool,

    /// Default value if not provided
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    /// Enum of allowed values
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,
}

impl ParameterSchema {
    /// Required string parameter
    pub fn required_string(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            param_type: "string".into(),
            description: description.into(),
            required: true,
            default: None,
            enum_values: None,
        }
    }

    pub fn with_enum(mut self, values: Vec<Value>) -> Self {
        self.enum_values = Some(values);
        self
    }

    fn matches_type(&self, value: &Value) -> bool {
        match self.param_type.as_str() {
            "string" => value.is_string(),
            "number" => value.is_number(),
            "integer" => value.is_i64() || value.is_u64(),
            "boolean" => value.is_boolean(),
            "object" => value.is_object(),
            "array" => value.is_array(),
            _ => true,
        }
    }
}

/// Tool definition for an in-process tool
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Unique tool identifier
    pub name: String,

    /// Human-readable description (shown to LLM)
    pub description: String,

    /// Parameter definitions
    pub parameters: Vec<ParameterSchema>,
}

impl ToolSchema {
    /// JSON schema for the argument object
    pub fn input_schema(&self) -> Value {
        let mut properties = Map::new();
        for param in &self.parameters {
            let mut prop = Map::new();
            prop.insert("type".into(), json!(param.param_type));
            prop.insert("description".into(), json!(param.description));
            if let Some(default) = &param.default {
                prop.insert("default".into(), default.clone());
            }
            if let Some(values) = &param.enum_values {
                prop.insert("enum".into(), Value::Array(values.clone()));
            }
            properties.insert(param.name.clone(), Value::Object(prop));
        }

        let required: Vec<&str> = self
            .parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    pub fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name.clone(),
            description: self.description.clone(),
            input_schema: self.input_schema(),
        }
    }
}

/// Tool trait - implement to add new capabilities
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool's schema
    fn schema(&self) -> ToolSchema;

    /// Execute the tool with given arguments
    async fn execute(&self, arguments: &Arguments) -> Result<Value>;

    /// Validate arguments before execution
    fn validate(&self, arguments: &Arguments) -> Result<()> {
        let schema = self.schema();

        for param in &schema.parameters {
            match arguments.get(&param.name) {
                None if param.required => {
                    return Err(AgentError::ToolValidation(format!(
                        "Missing required parameter: {}",
                        param.name
                    )));
                }
                Some(value) if !param.matches_type(value) => {
                    return Err(AgentError::ToolValidation(format!(
                        "Parameter '{}' must be of type {}",
                        param.name, param.param_type
                    )));
                }
                _ => {}
            }
        }

        Ok(())
    }
}

/// Registry for in-process tools, kept in registration order
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new tool
    pub fn register<T: Tool + 'static>(&mut self, tool: T) -> Result<()> {
        self.register_arc(Arc::new(tool))
    }

    /// Register a shared tool
    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) -> Result<()> {
        let name = tool.schema().name;
        if self.index.contains_key(&name) {
            return Err(AgentError::DuplicateTool(name));
        }
        self.index.insert(name, self.tools.len());
        self.tools.push(tool);
        Ok(())
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.index.get(name).map(|&i| Arc::clone(&self.tools[i]))
    }

    /// Validate and execute a tool
    pub async fn execute(&self, name: &str, arguments: &Arguments) -> Result<Value> {
        let tool = self
            .get(name)
            .ok_or_else(|| AgentError::UnknownTool(name.to_string()))?;

        tool.validate(arguments)?;
        tool.execute(arguments).await
    }

    /// Descriptors of all tools, in registration order
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools.iter().map(|t| t.schema().descriptor()).collect()
    }

    /// Get tool names
    pub fn names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.schema().name).collect()
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn schema(&self) -> ToolSchema {
            ToolSchema {
                name: "echo".into(),
                description: "Return the arguments".into(),
                parameters: vec![ParameterSchema {
                    name: "x".into(),
                    param_type: "number".into(),
                    description: "Value to echo".into(),
                    required: true,
                    default: None,
                    enum_values: None,
                }],
            }
        }

        async fn execute(&self, arguments: &Arguments) -> Result<Value> {
            Ok(Value::Object(arguments.clone()))
        }
    }

    struct NoopTool(&'static str);

    #[async_trait]
    impl Tool for NoopTool {
        fn schema(&self) -> ToolSchema {
            ToolSchema {
                name: self.0.into(),
                description: String::new(),
                parameters: vec![],
            }
        }

        async fn execute(&self, _arguments: &Arguments) -> Result<Value> {
            Ok(Value::Null)
        }
    }

    fn args(value: Value) -> Arguments {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_tool_registry_keeps_order() {
        let mut registry = ToolRegistry::new();
        registry.register(NoopTool("zeta")).unwrap();
        registry.register(EchoTool).unwrap();
        registry.register(NoopTool("alpha")).unwrap();

        assert_eq!(registry.len(), 3);
        assert_eq!(registry.names(), vec!["zeta", "echo", "alpha"]);
        assert!(registry.get("echo").is_some());
        assert!(registry.get("unknown").is_none());
    }

    #[test]
    fn test_registry_rejects_duplicates() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool).unwrap();
        assert!(matches!(
            registry.register(EchoTool),
            Err(AgentError::DuplicateTool(name)) if name == "echo"
        ));
    }

    #[test]
    fn test_input_schema_generation() {
        let schema = EchoTool.schema().input_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["x"]["type"], "number");
        assert_eq!(schema["required"], json!(["x"]));
    }

    #[tokio::test]
    async fn test_execute_validates_arguments() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool).unwrap();

        let out = registry.execute("echo", &args(json!({"x": 1}))).await.unwrap();
        assert_eq!(out, json!({"x": 1}));

        let missing = registry.execute("echo", &Arguments::new()).await;
        assert!(matches!(missing, Err(AgentError::ToolValidation(_))));

        let wrong_type = registry.execute("echo", &args(json!({"x": "one"}))).await;
        assert!(matches!(wrong_type, Err(AgentError::ToolValidation(_))));

        let unknown = registry.execute("nope", &Arguments::new()).await;
        assert!(matches!(unknown, Err(AgentError::UnknownTool(_))));
    }

    #[test]
    fn test_catalog_rejects_duplicates() {
        let tool = EchoTool.schema().descriptor();
        let err = ToolCatalog::new(vec![tool.clone(), tool]).unwrap_err();
        assert!(matches!(err, AgentError::DuplicateTool(_)));
    }

    #[test]
    fn test_descriptor_accepts_mcp_field_name() {
        let descriptor: ToolDescriptor = serde_json::from_value(json!({
            "name": "get_docs",
            "inputSchema": {"type": "object"}
        }))
        .unwrap();
        assert_eq!(descriptor.description, "");
        assert_eq!(descriptor.input_schema, json!({"type": "object"}));

        let encoded = serde_json::to_value(&descriptor).unwrap();
        assert!(encoded.get("input_schema").is_some());
    }

    #[test]
    fn test_outcome_into_content() {
        let unit = ToolOutcome::failure(json!("boom")).into_content("t9");
        assert_eq!(
            unit,
            ContentUnit::ToolResult {
                tool_use_id: "t9".into(),
                content: json!("boom"),
                is_error: true,
            }
        );
    }
}
