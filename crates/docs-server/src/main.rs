//! docs-server binary
//!
//! Speaks MCP on stdin/stdout; all logging goes to stderr.

use std::sync::Arc;

use anyhow::Context;
use tokio::io::BufReader;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agent_core::ToolRegistry;
use docs_server::{
    fetch::HttpFetcher, search::SerperClient, tools::GetDocsTool, DocsConfig, McpServer,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // stdout carries the protocol
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = DocsConfig::from_env().context("invalid docs server configuration")?;
    tracing::debug!(?config, "Configuration loaded");

    let search = Arc::new(SerperClient::new(&config)?);
    let fetcher = Arc::new(HttpFetcher::new(&config)?);

    let mut registry = ToolRegistry::new();
    registry.register(GetDocsTool::new(search, fetcher))?;

    tracing::info!("Registered {} tools:", registry.len());
    for name in registry.names() {
        tracing::info!("  • {}", name);
    }

    McpServer::new(Arc::new(registry))
        .serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
        .await?;

    Ok(())
}
