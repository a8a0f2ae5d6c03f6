//! Child-process MCP transport
//!
//! Spawns the tool provider and speaks newline-delimited JSON-RPC over its
//! stdin/stdout. The child's stderr is inherited so its logs reach ours.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::BufReader;
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;

use agent_core::error::{AgentError, Result};
use agent_core::message::Arguments;
use agent_core::session::ToolTransport;
use agent_core::tool::{ToolDescriptor, ToolOutcome};

use super::channel::RpcError;
use super::client::McpClient;

type StdioClient = McpClient<BufReader<ChildStdout>, ChildStdin>;

/// Stdio transport configuration
#[derive(Clone, Debug)]
pub struct StdioConfig {
    /// Budget for spawn + initialize, and again for each catalog listing
    pub handshake_timeout: Duration,
}

impl Default for StdioConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: Duration::from_secs(30),
        }
    }
}

struct Connection {
    child: Child,
    client: StdioClient,
}

pub struct McpStdioTransport {
    config: StdioConfig,
    connection: Mutex<Option<Connection>>,
}

impl McpStdioTransport {
    pub fn new() -> Self {
        Self::with_config(StdioConfig::default())
    }

    pub fn with_config(config: StdioConfig) -> Self {
        Self {
            config,
            connection: Mutex::new(None),
        }
    }

    async fn handshake(&self, endpoint: &str) -> Result<Connection> {
        let mut child = server_command(endpoint)?
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| AgentError::Connection(format!("failed to start '{}': {}", endpoint, e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| AgentError::Connection("child stdin unavailable".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AgentError::Connection("child stdout unavailable".into()))?;

        let mut client = McpClient::new(BufReader::new(stdout), stdin);

        let handshake =
            tokio::time::timeout(self.config.handshake_timeout, client.initialize()).await;
        match handshake {
            Ok(Ok(_)) => Ok(Connection { child, client }),
            Ok(Err(e)) => {
                terminate(&mut child).await;
                Err(AgentError::Connection(format!("handshake failed: {}", e)))
            }
            Err(_) => {
                terminate(&mut child).await;
                Err(AgentError::Connection(format!(
                    "handshake timed out after {:?}",
                    self.config.handshake_timeout
                )))
            }
        }
    }
}

impl Default for McpStdioTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolTransport for McpStdioTransport {
    async fn open(&self, endpoint: &str) -> Result<()> {
        let mut guard = self.connection.lock().await;
        if guard.is_some() {
            return Err(AgentError::AlreadyConnected);
        }

        tracing::info!(endpoint, "Starting tool provider");
        *guard = Some(self.handshake(endpoint).await?);
        Ok(())
    }

    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
        let mut guard = self.connection.lock().await;
        let conn = guard.as_mut().ok_or(AgentError::NotConnected)?;

        let listed =
            tokio::time::timeout(self.config.handshake_timeout, conn.client.list_tools()).await;
        let tools = listed
            .map_err(|_| {
                AgentError::Connection(format!(
                    "tools/list timed out after {:?}",
                    self.config.handshake_timeout
                ))
            })?
            .map_err(map_rpc_error)?;
        Ok(tools.into_iter().map(ToolDescriptor::from).collect())
    }

    async fn call_tool(&self, name: &str, arguments: &Arguments) -> Result<ToolOutcome> {
        let mut guard = self.connection.lock().await;
        let conn = guard.as_mut().ok_or(AgentError::NotConnected)?;

        tracing::debug!(tool = name, "tools/call");
        let result = conn
            .client
            .call_tool(name, arguments)
            .await
            .map_err(map_rpc_error)?;
        Ok(ToolOutcome::from(result))
    }

    async fn close(&self) -> Result<()> {
        let mut guard = self.connection.lock().await;
        if let Some(mut conn) = guard.take() {
            // Closing stdin first lets a well-behaved server exit on EOF.
            drop(conn.client);
            terminate(&mut conn.child).await;
            tracing::info!("Tool provider stopped");
        }
        Ok(())
    }
}

fn map_rpc_error(err: RpcError) -> AgentError {
    match err {
        RpcError::Remote(e) => AgentError::Invocation(e.to_string()),
        RpcError::Transport(msg) => AgentError::Connection(msg),
        RpcError::Protocol(msg) => AgentError::Invocation(msg),
    }
}

async fn terminate(child: &mut Child) {
    if let Err(e) = child.start_kill() {
        tracing::debug!("Tool provider already exited: {}", e);
    }
    if let Err(e) = child.wait().await {
        tracing::warn!("Failed to reap tool provider: {}", e);
    }
}

/// Build the command for an endpoint
///
/// `*.py` runs under `python`, `*.js` under `node`; anything else is split
/// on whitespace and executed directly.
pub fn server_command(endpoint: &str) -> Result<Command> {
    let endpoint = endpoint.trim();
    if endpoint.is_empty() {
        return Err(AgentError::Config("tool provider endpoint is empty".into()));
    }

    let command = if endpoint.ends_with(".py") {
        let mut cmd = Command::new("python");
        cmd.arg(endpoint);
        cmd
    } else if endpoint.ends_with(".js") {
        let mut cmd = Command::new("node");
        cmd.arg(endpoint);
        cmd
    } else {
        let mut parts = endpoint.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| AgentError::Config("tool provider endpoint is empty".into()))?;
        let mut cmd = Command::new(program);
        cmd.args(parts);
        cmd
    };

    Ok(command)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn program_and_args(endpoint: &str) -> (String, Vec<String>) {
        let cmd = server_command(endpoint).unwrap();
        let std_cmd = cmd.as_std();
        (
            std_cmd.get_program().to_string_lossy().into_owned(),
            std_cmd
                .get_args()
                .map(|a| a.to_string_lossy().into_owned())
                .collect(),
        )
    }

    #[test]
    fn test_command_selection() {
        assert_eq!(
            program_and_args("server/main.py"),
            ("python".into(), vec!["server/main.py".into()])
        );
        assert_eq!(
            program_and_args("build/index.js"),
            ("node".into(), vec!["build/index.js".into()])
        );
        assert_eq!(
            program_and_args("target/release/docs-server --verbose"),
            (
                "target/release/docs-server".into(),
                vec!["--verbose".into()]
            )
        );
    }

    #[test]
    fn test_empty_endpoint_is_config_error() {
        assert!(matches!(server_command("   "), Err(AgentError::Config(_))));
    }

    #[test]
    fn test_rpc_error_mapping() {
        let remote = RpcError::Remote(super::super::protocol::JsonRpcError::new(-32602, "bad"));
        assert!(matches!(map_rpc_error(remote), AgentError::Invocation(_)));
        assert!(matches!(
            map_rpc_error(RpcError::Transport("eof".into())),
            AgentError::Connection(_)
        ));
    }

    #[tokio::test]
    async fn test_calls_before_open_fail() {
        let transport = McpStdioTransport::new();
        assert!(matches!(
            transport.list_tools().await,
            Err(AgentError::NotConnected)
        ));
        let args = json!({}).as_object().cloned().unwrap();
        assert!(matches!(
            transport.call_tool("x", &args).await,
            Err(AgentError::NotConnected)
        ));
        // Closing an unopened transport is a no-op.
        transport.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_program_is_connection_error() {
        let transport = McpStdioTransport::new();
        let err = transport
            .open("/definitely/not/a/real/program-xyz")
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Connection(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_handshake_with_echoing_child_fails() {
        let transport = McpStdioTransport::with_config(StdioConfig {
            handshake_timeout: Duration::from_millis(200),
        });
        // `cat` echoes every line, so initialize never gets a real result.
        let err = transport.open("cat").await.unwrap_err();
        assert!(matches!(err, AgentError::Connection(_)));
        assert!(matches!(
            transport.list_tools().await,
            Err(AgentError::NotConnected)
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_silent_tools_list_times_out() {
        // Answers initialize, then reads forever without replying.
        let script = std::env::temp_dir().join(format!("mcp-silent-{}.sh", std::process::id()));
        std::fs::write(
            &script,
            concat!(
                "read -r line\n",
                "echo '{\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{\"protocolVersion\":\"2024-11-05\",",
                "\"capabilities\":{},\"serverInfo\":{\"name\":\"silent\",\"version\":\"0\"}}}'\n",
                "while read -r line; do :; done\n",
            ),
        )
        .unwrap();

        let transport = McpStdioTransport::with_config(StdioConfig {
            handshake_timeout: Duration::from_millis(500),
        });
        transport
            .open(&format!("sh {}", script.display()))
            .await
            .unwrap();

        let err = tokio::time::timeout(Duration::from_secs(5), transport.list_tools())
            .await
            .expect("list_tools should give up on its own")
            .unwrap_err();
        assert!(matches!(err, AgentError::Connection(_)));

        transport.close().await.unwrap();
        let _ = std::fs::remove_file(&script);
    }
}
