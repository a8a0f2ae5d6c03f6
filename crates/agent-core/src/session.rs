//! Tool Session
//!
//! One live connection to a tool provider. The session owns the transport,
//! performs the capability handshake on `connect`, caches the negotiated
//! catalog and guards invocations against tools the provider never offered.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::{Mutex, RwLock};

use crate::error::{AgentError, Result};
use crate::message::Arguments;
use crate::tool::{ToolCatalog, ToolDescriptor, ToolOutcome, ToolRegistry};

/// Wire-level channel to a tool provider.
///
/// Implementations must tolerate concurrent `call_tool` calls and treat
/// `close` as idempotent.
#[async_trait]
pub trait ToolTransport: Send + Sync {
    /// Establish the channel and run the capability handshake
    async fn open(&self, endpoint: &str) -> Result<()>;

    /// Ask the provider for its tool catalog
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>>;

    /// Invoke a tool, forwarding `arguments` unchanged
    async fn call_tool(&self, name: &str, arguments: &Arguments) -> Result<ToolOutcome>;

    /// Release the channel
    async fn close(&self) -> Result<()>;
}

#[derive(Debug)]
enum SessionState {
    Idle,
    Connected {
        endpoint: String,
        catalog: Arc<ToolCatalog>,
    },
    Closed,
}

/// Session with a tool provider
pub struct ToolSession {
    transport: Arc<dyn ToolTransport>,
    lifecycle: Mutex<()>,
    state: RwLock<SessionState>,
}

impl ToolSession {
    pub fn new<T: ToolTransport + 'static>(transport: T) -> Self {
        Self::from_arc(Arc::new(transport))
    }

    pub fn from_arc(transport: Arc<dyn ToolTransport>) -> Self {
        Self {
            transport,
            lifecycle: Mutex::new(()),
            state: RwLock::new(SessionState::Idle),
        }
    }

    /// Handshake with the provider and cache its catalog.
    ///
    /// Fails with `AlreadyConnected` if the session is live. On failure the
    /// transport is closed before the error is returned.
    pub async fn connect(&self, endpoint: &str) -> Result<()> {
        let _guard = self.lifecycle.lock().await;

        if matches!(*self.state.read().await, SessionState::Connected { .. }) {
            return Err(AgentError::AlreadyConnected);
        }

        tracing::info!(endpoint, "Connecting tool session");

        let handshake: Result<ToolCatalog> = async {
            self.transport.open(endpoint).await?;
            let tools = self.transport.list_tools().await?;
            ToolCatalog::new(tools)
        }
        .await;

        match handshake {
            Ok(catalog) => {
                tracing::info!(tools = ?catalog.names(), "Tool session connected");
                *self.state.write().await = SessionState::Connected {
                    endpoint: endpoint.to_string(),
                    catalog: Arc::new(catalog),
                };
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "Tool session handshake failed");
                if let Err(close_err) = self.transport.close().await {
                    tracing::warn!(error = %close_err, "Failed to close transport after handshake error");
                }
                *self.state.write().await = SessionState::Idle;
                Err(e)
            }
        }
    }

    /// Cached catalog, or `None` when not connected
    pub async fn catalog(&self) -> Option<Arc<ToolCatalog>> {
        match &*self.state.read().await {
            SessionState::Connected { catalog, .. } => Some(Arc::clone(catalog)),
            SessionState::Idle | SessionState::Closed => None,
        }
    }

    /// Tools negotiated at connect time, in provider order.
    ///
    /// Never re-queries the provider. Empty when not connected.
    pub async fn list_tools(&self) -> Vec<ToolDescriptor> {
        self.catalog()
            .await
            .map(|c| c.descriptors().to_vec())
            .unwrap_or_default()
    }

    /// Endpoint of the live connection
    pub async fn endpoint(&self) -> Option<String> {
        match &*self.state.read().await {
            SessionState::Connected { endpoint, .. } => Some(endpoint.clone()),
            SessionState::Idle | SessionState::Closed => None,
        }
    }

    pub async fn is_connected(&self) -> bool {
        matches!(*self.state.read().await, SessionState::Connected { .. })
    }

    /// Invoke a tool from the catalog.
    ///
    /// Unknown names fail with `UnknownTool` before the transport is touched.
    pub async fn invoke(&self, name: &str, arguments: &Arguments) -> Result<ToolOutcome> {
        let catalog = self.catalog().await.ok_or(AgentError::NotConnected)?;

        if !catalog.contains(name) {
            return Err(AgentError::UnknownTool(name.to_string()));
        }

        tracing::debug!(tool = name, "Invoking tool");
        self.transport.call_tool(name, arguments).await
    }

    /// Release the transport. Idempotent.
    pub async fn shutdown(&self) -> Result<()> {
        let _guard = self.lifecycle.lock().await;

        let previous = std::mem::replace(&mut *self.state.write().await, SessionState::Closed);
        if matches!(previous, SessionState::Closed) {
            return Ok(());
        }

        tracing::info!("Shutting down tool session");
        self.transport.close().await
    }
}

/// Transport serving an in-process `ToolRegistry`
pub struct LocalTransport {
    registry: Arc<ToolRegistry>,
    open: AtomicBool,
}

impl LocalTransport {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            open: AtomicBool::new(false),
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.open.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(AgentError::NotConnected)
        }
    }
}

#[async_trait]
impl ToolTransport for LocalTransport {
    async fn open(&self, _endpoint: &str) -> Result<()> {
        self.open.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
        self.ensure_open()?;
        Ok(self.registry.descriptors())
    }

    async fn call_tool(&self, name: &str, arguments: &Arguments) -> Result<ToolOutcome> {
        self.ensure_open()?;
        match self.registry.execute(name, arguments).await {
            Ok(value) => Ok(ToolOutcome::success(value)),
            Err(AgentError::UnknownTool(name)) => Err(AgentError::UnknownTool(name)),
            // Tool-level failures are reported in-band, like a remote provider would.
            Err(e) => Ok(ToolOutcome::failure(json!(e.to_string()))),
        }
    }

    async fn close(&self) -> Result<()> {
        self.open.store(false, Ordering::SeqCst);
        Ok(())
    }
}
