//! MCP stdio server
//!
//! Reads one JSON-RPC message per line and writes one response per request.
//! Requests are handled one at a time in arrival order.

use std::sync::Arc;

use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use agent_core::{AgentError, ToolRegistry};
use agent_runtime::mcp::protocol::{
    CallToolParams, CallToolResult, Implementation, InitializeResult, JsonRpcError,
    JsonRpcRequest, JsonRpcResponse, ListToolsResult, McpTool, ServerCapabilities,
    ToolContent, ToolsCapability, INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND,
    PARSE_ERROR, PROTOCOL_VERSION,
};

use crate::error::Result;

pub const SERVER_NAME: &str = "docs";

pub struct McpServer {
    registry: Arc<ToolRegistry>,
    info: Implementation,
}

impl McpServer {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            info: Implementation {
                name: SERVER_NAME.into(),
                version: env!("CARGO_PKG_VERSION").into(),
            },
        }
    }

    /// Serve until the reader reaches EOF
    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        tracing::info!(tools = self.registry.len(), "MCP server ready");
        let mut lines = reader.lines();

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }

            if let Some(response) = self.handle_line(&line).await {
                let mut out = serde_json::to_string(&response)?;
                out.push('\n');
                writer.write_all(out.as_bytes()).await?;
                writer.flush().await?;
            }
        }

        tracing::info!("Client closed the connection");
        Ok(())
    }

    /// Handle one raw line; `None` when no response is owed
    pub async fn handle_line(&self, line: &str) -> Option<JsonRpcResponse> {
        let value: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Unparseable message: {}", e);
                return Some(JsonRpcResponse::failure(
                    Value::Null,
                    JsonRpcError::new(PARSE_ERROR, format!("Parse error: {}", e)),
                ));
            }
        };

        // Responses from the client carry no method; nothing to do.
        if value.get("method").is_none() && value.get("id").is_some() {
            return None;
        }

        let request: JsonRpcRequest = match serde_json::from_value(value.clone()) {
            Ok(request) => request,
            Err(e) => {
                let id = value.get("id").cloned().unwrap_or(Value::Null);
                return Some(JsonRpcResponse::failure(
                    id,
                    JsonRpcError::new(INVALID_REQUEST, format!("Invalid request: {}", e)),
                ));
            }
        };

        let Some(id) = request.id.clone() else {
            tracing::debug!(method = %request.method, "Notification");
            return None;
        };

        let outcome = self.dispatch(&request.method, request.params).await;
        Some(match outcome {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(error) => {
                tracing::debug!(method = %request.method, %error, "Request failed");
                JsonRpcResponse::failure(id, error)
            }
        })
    }

    async fn dispatch(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> std::result::Result<Value, JsonRpcError> {
        match method {
            "initialize" => Ok(self.initialize(params.as_ref())),
            "ping" => Ok(json!({})),
            "tools/list" => to_result(&ListToolsResult {
                tools: self
                    .registry
                    .descriptors()
                    .into_iter()
                    .map(McpTool::from)
                    .collect(),
                next_cursor: None,
            }),
            "tools/call" => {
                let params: CallToolParams =
                    serde_json::from_value(params.unwrap_or(Value::Null)).map_err(|e| {
                        JsonRpcError::new(INVALID_PARAMS, format!("Invalid params: {}", e))
                    })?;
                let result = self.call_tool(&params).await?;
                to_result(&result)
            }
            other => Err(JsonRpcError::new(
                METHOD_NOT_FOUND,
                format!("Method not found: {}", other),
            )),
        }
    }

    fn initialize(&self, params: Option<&Value>) -> Value {
        let protocol_version = params
            .and_then(|p| p.get("protocolVersion"))
            .and_then(Value::as_str)
            .unwrap_or(PROTOCOL_VERSION);

        if let Some(client) = params.and_then(|p| p.get("clientInfo")) {
            tracing::info!(%client, protocol_version, "Client connected");
        }

        let result = InitializeResult {
            protocol_version: protocol_version.to_string(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability {
                    list_changed: Some(false),
                }),
            },
            server_info: self.info.clone(),
        };
        serde_json::to_value(result).unwrap_or(Value::Null)
    }

    async fn call_tool(
        &self,
        params: &CallToolParams,
    ) -> std::result::Result<CallToolResult, JsonRpcError> {
        if self.registry.get(&params.name).is_none() {
            return Err(JsonRpcError::new(
                INVALID_PARAMS,
                format!("Unknown tool: {}", params.name),
            ));
        }

        tracing::info!(tool = %params.name, "tools/call");

        match self.registry.execute(&params.name, &params.arguments).await {
            Ok(value) => Ok(CallToolResult {
                content: vec![ToolContent::text(render(value))],
                is_error: Some(false),
            }),
            Err(AgentError::UnknownTool(name)) => Err(JsonRpcError::new(
                INVALID_PARAMS,
                format!("Unknown tool: {}", name),
            )),
            Err(e) => {
                tracing::warn!(tool = %params.name, "Tool failed: {}", e);
                Ok(CallToolResult::error(e.to_string()))
            }
        }
    }
}

fn render(value: Value) -> String {
    match value {
        Value::String(text) => text,
        other => other.to_string(),
    }
}

fn to_result<T: serde::Serialize>(result: &T) -> std::result::Result<Value, JsonRpcError> {
    serde_json::to_value(result).map_err(|e| {
        JsonRpcError::new(
            agent_runtime::mcp::protocol::INTERNAL_ERROR,
            format!("Internal error: {}", e),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader;

    use crate::fetch::PageFetcher;
    use crate::model::SearchResult;
    use crate::search::MockSearchClient;
    use crate::svckit::GetDocsTool;

    struct StaticFetcher;

    #[async_trait::async_trait]
    impl PageFetcher for StaticFetcher {
        async fn fetch_text(&self, url: &str) -> Result<String> {
            Ok(format!("text of {}", url))
        }
    }

    fn server() -> McpServer {
        let search = MockSearchClient::with_results(vec![SearchResult {
            title: "Agents".into(),
            link: "https://platform.openai.com/docs/agents".into(),
            snippet: String::new(),
        }]);
        let mut registry = ToolRegistry::new();
        registry
            .register(GetDocsTool::new(Arc::new(search), Arc::new(StaticFetcher)))
            .unwrap();
        McpServer::new(Arc::new(registry))
    }

    async fn call(server: &McpServer, message: Value) -> Value {
        let response = server.handle_line(&message.to_string()).await.unwrap();
        serde_json::to_value(response).unwrap()
    }

    #[tokio::test]
    async fn test_initialize_echoes_protocol_version() {
        let response = call(
            &server(),
            json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {
                "protocolVersion": "2025-03-26",
                "capabilities": {},
                "clientInfo": {"name": "test", "version": "0"}
            }}),
        )
        .await;

        assert_eq!(response["id"], 1);
        assert_eq!(response["result"]["protocolVersion"], "2025-03-26");
        assert_eq!(response["result"]["serverInfo"]["name"], "docs");
        assert!(response["result"]["capabilities"]["tools"].is_object());
    }

    #[tokio::test]
    async fn test_notifications_get_no_response() {
        let server = server();
        let line = json!({"jsonrpc": "2.0", "method": "notifications/initialized"}).to_string();
        assert!(server.handle_line(&line).await.is_none());
    }

    #[tokio::test]
    async fn test_tools_list() {
        let response = call(&server(), json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"})).await;

        let tools = response["result"]["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0]["name"], "get_docs");
        assert_eq!(tools[0]["inputSchema"]["type"], "object");
        assert!(response["result"].get("nextCursor").is_none());
    }

    #[tokio::test]
    async fn test_tools_call_success() {
        let response = call(
            &server(),
            json!({"jsonrpc": "2.0", "id": 3, "method": "tools/call", "params": {
                "name": "get_docs",
                "arguments": {"query": "agents", "library": "openai"}
            }}),
        )
        .await;

        assert_eq!(
            response["result"],
            json!({
                "content": [{"type": "text", "text": "text of https://platform.openai.com/docs/agents"}],
                "isError": false
            })
        );
    }

    #[tokio::test]
    async fn test_tool_failure_is_flagged_result() {
        let response = call(
            &server(),
            json!({"jsonrpc": "2.0", "id": 4, "method": "tools/call", "params": {
                "name": "get_docs",
                "arguments": {"query": "agents", "library": "numpy"}
            }}),
        )
        .await;

        assert!(response.get("error").is_none());
        assert_eq!(response["result"]["isError"], true);
        let text = response["result"]["content"][0]["text"].as_str().unwrap();
        assert!(text.contains("Library not supported"));
    }

    #[tokio::test]
    async fn test_protocol_errors() {
        let server = server();

        let unknown_tool = call(
            &server,
            json!({"jsonrpc": "2.0", "id": 5, "method": "tools/call", "params": {"name": "nope"}}),
        )
        .await;
        assert_eq!(unknown_tool["error"]["code"], INVALID_PARAMS);

        let unknown_method = call(&server, json!({"jsonrpc": "2.0", "id": 6, "method": "resources/list"})).await;
        assert_eq!(unknown_method["error"]["code"], METHOD_NOT_FOUND);

        let garbage = server.handle_line("{not json").await.unwrap();
        assert_eq!(garbage.error.unwrap().code, PARSE_ERROR);
        assert_eq!(garbage.id, Value::Null);
    }

    #[tokio::test]
    async fn test_serve_over_duplex() {
        let (client, server_io) = tokio::io::duplex(64 * 1024);
        let (server_read, server_write) = tokio::io::split(server_io);

        let handle = tokio::spawn(async move {
            server()
                .serve(BufReader::new(server_read), server_write)
                .await
        });

        let (client_read, mut client_write) = tokio::io::split(client);
        let requests = [
            json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {"protocolVersion": PROTOCOL_VERSION, "capabilities": {}, "clientInfo": {"name": "t", "version": "0"}}}),
            json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
            json!({"jsonrpc": "2.0", "id": 2, "method": "ping"}),
        ];
        for request in &requests {
            let mut line = request.to_string();
            line.push('\n');
            client_write.write_all(line.as_bytes()).await.unwrap();
        }
        client_write.shutdown().await.unwrap();
        drop(client_write);

        let mut lines = BufReader::new(client_read).lines();
        let first: Value = serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
        let second: Value = serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();

        assert_eq!(first["id"], 1);
        assert_eq!(second["id"], 2);
        assert_eq!(second["result"], json!({}));

        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_mcp_client_round_trip() {
        use agent_runtime::mcp::McpClient;

        let (client_io, server_io) = tokio::io::duplex(64 * 1024);
        let (server_read, server_write) = tokio::io::split(server_io);
        let handle = tokio::spawn(async move {
            server()
                .serve(BufReader::new(server_read), server_write)
                .await
        });

        let (client_read, client_write) = tokio::io::split(client_io);
        let mut client = McpClient::new(BufReader::new(client_read), client_write);

        let init = client.initialize().await.unwrap();
        assert_eq!(init.protocol_version, PROTOCOL_VERSION);
        assert_eq!(client.server_info().unwrap().name, SERVER_NAME);

        let tools = client.list_tools().await.unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "get_docs");

        let arguments = json!({"query": "agents", "library": "openai"})
            .as_object()
            .cloned()
            .unwrap();
        let result = client.call_tool("get_docs", &arguments).await.unwrap();
        assert_eq!(result.is_error, Some(false));
        assert_eq!(
            result.content,
            vec![ToolContent::text("text of https://platform.openai.com/docs/agents")]
        );

        let bad = json!({"query": "agents", "library": "numpy"}).as_object().cloned().unwrap();
        let failed = client.call_tool("get_docs", &bad).await.unwrap();
        assert_eq!(failed.is_error, Some(true));

        drop(client);
        handle.await.unwrap().unwrap();
    }
}
