//! MCP client over any async byte stream

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncWrite};

use agent_core::message::Arguments;

use super::channel::{JsonRpcChannel, RpcError};
use super::protocol::{
    CallToolParams, CallToolResult, Implementation, InitializeParams, InitializeResult,
    ListToolsParams, ListToolsResult, McpTool, PROTOCOL_VERSION,
};

/// Upper bound on `tools/list` pages, guards against a server that keeps
/// handing back the same cursor
const MAX_LIST_PAGES: usize = 64;

pub struct McpClient<R, W> {
    channel: JsonRpcChannel<R, W>,
    server_info: Option<Implementation>,
}

impl<R, W> McpClient<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            channel: JsonRpcChannel::new(reader, writer),
            server_info: None,
        }
    }

    /// Run the initialize handshake and send `notifications/initialized`
    pub async fn initialize(&mut self) -> Result<InitializeResult, RpcError> {
        let params = InitializeParams {
            protocol_version: PROTOCOL_VERSION.into(),
            capabilities: serde_json::json!({}),
            client_info: Implementation {
                name: env!("CARGO_PKG_NAME").into(),
                version: env!("CARGO_PKG_VERSION").into(),
            },
        };

        let result: InitializeResult = self.call("initialize", Some(to_params(&params)?)).await?;

        if result.protocol_version != PROTOCOL_VERSION {
            tracing::warn!(
                server = %result.protocol_version,
                client = PROTOCOL_VERSION,
                "Protocol version mismatch"
            );
        }

        self.channel.notify("notifications/initialized", None).await?;
        self.server_info = Some(result.server_info.clone());

        tracing::info!(
            server = %result.server_info.name,
            version = %result.server_info.version,
            "MCP session initialized"
        );
        Ok(result)
    }

    /// Fetch every tool, following `nextCursor` until exhausted
    pub async fn list_tools(&mut self) -> Result<Vec<McpTool>, RpcError> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_LIST_PAGES {
            let params = ListToolsParams { cursor: cursor.take() };
            let page: ListToolsResult = self.call("tools/list", Some(to_params(&params)?)).await?;
            tools.extend(page.tools);

            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => return Ok(tools),
            }
        }

        Err(RpcError::Protocol(format!(
            "tools/list did not finish after {} pages",
            MAX_LIST_PAGES
        )))
    }

    pub async fn call_tool(
        &mut self,
        name: &str,
        arguments: &Arguments,
    ) -> Result<CallToolResult, RpcError> {
        let params = CallToolParams {
            name: name.to_string(),
            arguments: arguments.clone(),
        };
        self.call("tools/call", Some(to_params(&params)?)).await
    }

    pub fn server_info(&self) -> Option<&Implementation> {
        self.server_info.as_ref()
    }

    async fn call<T: DeserializeOwned>(
        &mut self,
        method: &str,
        params: Option<Value>,
    ) -> Result<T, RpcError> {
        let result = self.channel.request(method, params).await?;
        serde_json::from_value(result)
            .map_err(|e| RpcError::Protocol(format!("unexpected {} result: {}", method, e)))
    }
}

fn to_params<T: serde::Serialize>(params: &T) -> Result<Value, RpcError> {
    serde_json::to_value(params).map_err(|e| RpcError::Protocol(e.to_string()))
}
