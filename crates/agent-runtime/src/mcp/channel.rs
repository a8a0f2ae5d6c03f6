//! Newline-delimited JSON-RPC channel
//!
//! One request is outstanding at a time. While waiting for a response the
//! channel answers server pings, rejects other server-initiated requests,
//! and skips notifications and responses to requests that were abandoned.
//! An error response with a null id means the peer could not read our
//! request, so it fails the outstanding one.

use serde_json::{json, Value};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, Lines};

use super::protocol::{
    IncomingMessage, JsonRpcError, JsonRpcRequest, JsonRpcResponse, METHOD_NOT_FOUND,
};

#[derive(Error, Debug)]
pub enum RpcError {
    /// The byte stream failed or closed
    #[error("transport failure: {0}")]
    Transport(String),

    /// The peer answered with a JSON-RPC error
    #[error("remote error: {0}")]
    Remote(JsonRpcError),

    /// The peer sent something we could not decode
    #[error("protocol violation: {0}")]
    Protocol(String),
}

impl From<std::io::Error> for RpcError {
    fn from(err: std::io::Error) -> Self {
        RpcError::Transport(err.to_string())
    }
}

pub struct JsonRpcChannel<R, W> {
    lines: Lines<R>,
    writer: W,
    next_id: u64,
}

impl<R, W> JsonRpcChannel<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            lines: reader.lines(),
            writer,
            next_id: 1,
        }
    }

    /// Send a request and wait for its response
    pub async fn request(
        &mut self,
        method: &str,
        params: Option<Value>,
    ) -> Result<Value, RpcError> {
        let id = self.next_id;
        self.next_id += 1;

        self.send(&JsonRpcRequest::new(id, method, params)).await?;
        let expected = Value::from(id);

        loop {
            let line = self
                .lines
                .next_line()
                .await?
                .ok_or_else(|| RpcError::Transport("peer closed the stream".into()))?;

            if line.trim().is_empty() {
                continue;
            }

            let message: IncomingMessage = serde_json::from_str(&line)
                .map_err(|e| RpcError::Protocol(format!("invalid JSON-RPC message: {}", e)))?;

            if let Some(method) = message.method {
                self.answer_peer(message.id, &method).await?;
                continue;
            }

            if matches!(message.id, None | Some(Value::Null)) {
                if let Some(error) = message.error {
                    tracing::debug!(code = error.code, "Peer could not read the request");
                    return Err(RpcError::Remote(error));
                }
            }

            if message.id.as_ref() != Some(&expected) {
                tracing::debug!(id = ?message.id, expected = id, "Skipping stale response");
                continue;
            }

            if let Some(error) = message.error {
                return Err(RpcError::Remote(error));
            }

            return Ok(message.result.unwrap_or(Value::Null));
        }
    }

    /// Send a notification; no response is expected
    pub async fn notify(&mut self, method: &str, params: Option<Value>) -> Result<(), RpcError> {
        self.send(&JsonRpcRequest::notification(method, params)).await
    }

    async fn answer_peer(&mut self, id: Option<Value>, method: &str) -> Result<(), RpcError> {
        // Notifications need no answer.
        let Some(id) = id else {
            tracing::debug!(method, "Ignoring notification from peer");
            return Ok(());
        };

        let response = if method == "ping" {
            JsonRpcResponse::success(id, json!({}))
        } else {
            tracing::debug!(method, "Rejecting request from peer");
            JsonRpcResponse::failure(
                id,
                JsonRpcError::new(METHOD_NOT_FOUND, format!("Method not found: {}", method)),
            )
        };
        self.send(&response).await
    }

    async fn send<T: serde::Serialize>(&mut self, message: &T) -> Result<(), RpcError> {
        let mut line = serde_json::to_string(message)
            .map_err(|e| RpcError::Protocol(e.to_string()))?;
        line.push('\n');
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }
}
