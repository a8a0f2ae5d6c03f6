//! docs-agent HTTP Server
//!
//! Axum front door over the conversation loop. The tool provider is
//! launched and connected once at startup and shut down on exit.

mod config;
mod handlers;
mod state;

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agent_core::{LlmProvider, ToolSession};
use agent_runtime::{AnthropicProvider, McpStdioTransport};

use crate::config::ServerConfig;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env().context("invalid server configuration")?;
    tracing::info!(?config, "Configuration loaded");

    // Reasoning engine
    let provider: Arc<dyn LlmProvider> =
        Arc::new(AnthropicProvider::from_env().context("Anthropic provider is not configured")?);
    tracing::info!(model = %config.model, "✓ Reasoning engine: {}", provider.name());

    // Tool provider
    let session = Arc::new(ToolSession::new(McpStdioTransport::new()));
    session
        .connect(&config.mcp_server_script)
        .await
        .with_context(|| format!("failed to connect to tool provider '{}'", config.mcp_server_script))?;

    let tools = session.list_tools().await;
    tracing::info!("Tool provider offers {} tools:", tools.len());
    for tool in &tools {
        tracing::info!("  • {}", tool.name);
    }

    let state = AppState {
        provider,
        session: session.clone(),
        agent_config: config.agent_config(),
    };

    let served = serve(&config.bind_addr, state).await;

    // Release the tool provider on every exit path.
    if let Err(e) = session.shutdown().await {
        tracing::warn!("Tool session shutdown failed: {}", e);
    }

    served
}

async fn serve(addr: &str, state: AppState) -> anyhow::Result<()> {
    let app = handlers::router(state);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 docs-agent server running on http://{}", addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health - Health check");
    tracing::info!("  GET  /tools  - Tool catalog");
    tracing::info!("  POST /query  - Run a query");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server crashed")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
