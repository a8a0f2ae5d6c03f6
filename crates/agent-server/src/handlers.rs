//! HTTP Handlers

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::Instrument;

use agent_core::{reasoning::Agent, AgentError, Message, ToolDescriptor};

use crate::state::AppState;

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub tool_count: usize,
    pub reasoning_engine_configured: bool,
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: String,
}

#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
pub struct ToolsResponse {
    pub tools: Vec<ToolDescriptor>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub detail: String,
    pub code: &'static str,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

/// HTTP status and stable code for an agent error
fn classify(err: &AgentError) -> (StatusCode, &'static str) {
    match err {
        AgentError::QueryTimeout(_) => (StatusCode::GATEWAY_TIMEOUT, "QUERY_TIMEOUT"),
        AgentError::RateLimited(_) => (StatusCode::BAD_GATEWAY, "RATE_LIMITED"),
        AgentError::Auth(_) => (StatusCode::BAD_GATEWAY, "ENGINE_AUTH"),
        AgentError::ReasoningEngine(_) => (StatusCode::BAD_GATEWAY, "REASONING_ENGINE_ERROR"),
        AgentError::Connection(_) | AgentError::Invocation(_) => {
            (StatusCode::BAD_GATEWAY, "TOOL_PROVIDER_ERROR")
        }
        AgentError::RoundLimitExceeded(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "ROUND_LIMIT_EXCEEDED")
        }
        AgentError::MalformedContent(_) => (StatusCode::INTERNAL_SERVER_ERROR, "MALFORMED_CONTENT"),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "AGENT_ERROR"),
    }
}

fn api_error(err: &AgentError) -> ApiError {
    let (status, code) = classify(err);
    (
        status,
        Json(ErrorResponse {
            detail: err.user_message(),
            code,
        }),
    )
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let reasoning_engine_configured = state.provider.health_check().await.unwrap_or(false);

    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        tool_count: state.session.list_tools().await.len(),
        reasoning_engine_configured,
    })
}

/// Run one query through the conversation loop
pub async fn query_handler(
    State(state): State<AppState>,
    Json(payload): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    let query_id = uuid::Uuid::new_v4();
    let span = tracing::info_span!("query", %query_id);

    async move {
        tracing::info!(chars = payload.query.len(), "Query received");

        let agent = Agent::new(
            state.provider.clone(),
            state.session.clone(),
            state.agent_config.clone(),
        );

        match agent.process_query(&payload.query).await {
            Ok(messages) => {
                tracing::info!(messages = messages.len(), "Query completed");
                Ok(Json(QueryResponse { messages }))
            }
            Err(e) => {
                tracing::error!("Query failed: {}", e);
                Err(api_error(&e))
            }
        }
    }
    .instrument(span)
    .await
}

/// List the tool provider's catalog
pub async fn tools_handler(State(state): State<AppState>) -> Json<ToolsResponse> {
    Json(ToolsResponse {
        tools: state.session.list_tools().await,
    })
}

// ============================================================================
// Router
// ============================================================================

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/query", post(query_handler))
        .route("/tools", get(tools_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use agent_core::{
        provider::{Completion, GenerationOptions, LlmProvider},
        AgentConfig, Arguments, ContentUnit, LocalTransport, ParameterSchema, Tool,
        ToolRegistry, ToolSchema, ToolSession,
    };

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

        async fn execute(&self, arguments: &Arguments) -> agent_core::Result<Value> {
            Ok(Value::Object(arguments.clone()))
        }
    }

    /// Calls `echo` once, then answers "done"
    struct EchoThenDone;

    #[async_trait]
    impl LlmProvider for EchoThenDone {
        fn name(&self) -> &str {
            "stub"
        }

        async fn health_check(&self) -> agent_core::Result<bool> {
            Ok(true)
        }

        async fn complete(
            &self,
            messages: &[Message],
            _tools: &[ToolDescriptor],
            options: &GenerationOptions,
        ) -> agent_core::Result<Completion> {
            let message = if messages.len() == 1 {
                let input = json!({"x": 1}).as_object().cloned().unwrap();
                Message::new(
                    agent_core::Role::Assistant,
                    vec![ContentUnit::tool_use("t1", "echo", input)],
                )
            } else {
                Message::assistant("done")
            };
            Ok(Completion {
                message,
                model: options.model.clone(),
                usage: None,
                finish_reason: None,
            })
        }
    }

    struct FailingProvider(fn() -> AgentError);

    #[async_trait]
    impl LlmProvider for FailingProvider {
        fn name(&self) -> &str {
            "failing"
        }

        async fn health_check(&self) -> agent_core::Result<bool> {
            Ok(false)
        }

        async fn complete(
            &self,
            _messages: &[Message],
            _tools: &[ToolDescriptor],
            _options: &GenerationOptions,
        ) -> agent_core::Result<Completion> {
            Err((self.0)())
        }
    }

    async fn app_with(provider: Arc<dyn LlmProvider>) -> Router {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool).unwrap();
        let session = Arc::new(ToolSession::new(LocalTransport::new(Arc::new(registry))));
        session.connect("local").await.unwrap();

        router(AppState {
            provider,
            session,
            agent_config: AgentConfig::default(),
        })
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let resp = app.oneshot(request).await.unwrap();
        let status = resp.status();
        let body = to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    fn post_query(query: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/query")
            .header("content-type", "application/json")
            .body(Body::from(json!({"query": query}).to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_query_returns_full_conversation() {
        let app = app_with(Arc::new(EchoThenDone)).await;
        let (status, body) = send(app, post_query("echo one")).await;

        assert_eq!(status, StatusCode::OK);
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0], json!({"role": "user", "content": [{"type": "text", "text": "echo one"}]}));
        assert_eq!(messages[1]["content"][0]["type"], "tool_use");
        assert_eq!(messages[2]["role"], "user");
        assert_eq!(messages[2]["content"][0]["tool_use_id"], "t1");
        assert_eq!(messages[2]["content"][0]["content"], json!({"x": 1}));
        assert_eq!(messages[3]["content"][0]["text"], "done");
    }

    #[tokio::test]
    async fn test_tools_lists_catalog() {
        let app = app_with(Arc::new(EchoThenDone)).await;
        let (status, body) = send(app, get("/tools")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["tools"][0]["name"], "echo");
        assert_eq!(body["tools"][0]["input_schema"]["required"], json!(["x"]));
    }

    #[tokio::test]
    async fn test_health_reports_tools() {
        let app = app_with(Arc::new(EchoThenDone)).await;
        let (status, body) = send(app, get("/health")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["tool_count"], 1);
        assert_eq!(body["reasoning_engine_configured"], true);
    }

    #[tokio::test]
    async fn test_engine_failure_is_bad_gateway() {
        let provider = FailingProvider(|| AgentError::ReasoningEngine("HTTP 500".into()));
        let app = app_with(Arc::new(provider)).await;
        let (status, body) = send(app, post_query("anything")).await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["code"], "REASONING_ENGINE_ERROR");
        assert!(body["detail"].as_str().unwrap().contains("HTTP 500"));
        assert!(body.get("messages").is_none());
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            classify(&AgentError::QueryTimeout(Duration::from_secs(1))).0,
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            classify(&AgentError::RateLimited("slow down".into())).0,
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            classify(&AgentError::RoundLimitExceeded(25)).0,
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            classify(&AgentError::Config("x".into())).0,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
