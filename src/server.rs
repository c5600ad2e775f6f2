//! HTTP and MCP serving.
//!
//! All tools are registered in one [`ToolRegistry`] and dispatched through
//! the same code whichever transport a call arrives on.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/tools/list` | List all tools with schemas |
//! | `POST` | `/tools/{name}` | Call a tool by name |
//! | any    | `/mcp` | MCP over Streamable HTTP |
//!
//! `airflow-docs serve --stdio` speaks MCP over stdin/stdout instead.
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "missing required parameter: query" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404),
//! `store_unavailable` (503), `tool_error` (500).

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use rmcp::transport::streamable_http_server::{
    session::local::LocalSessionManager, StreamableHttpServerConfig, StreamableHttpService,
};
use rmcp::ServiceExt;
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::error::Error;
use crate::mcp::McpBridge;
use crate::tools::{invoke, InvalidParams, ToolContext, ToolInfo, ToolRegistry};

/// Shared state for the route handlers.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    tools: Arc<ToolRegistry>,
}

/// Build the full router: REST tool API, health and the `/mcp` endpoint.
pub fn router(config: Arc<Config>, tools: Arc<ToolRegistry>) -> Router {
    let bridge = McpBridge::new(config.clone(), tools.clone());
    let mcp_service = StreamableHttpService::new(
        move || Ok(bridge.clone()),
        LocalSessionManager::default().into(),
        StreamableHttpServerConfig::default(),
    );

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/tools/list", get(handle_list_tools))
        .route("/tools/{name}", post(handle_tool_call))
        .nest_service("/mcp", mcp_service)
        .layer(cors)
        .with_state(AppState { config, tools })
}

/// Serve HTTP on `[server].bind` until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let app = router(
        Arc::new(config.clone()),
        Arc::new(ToolRegistry::with_builtins()),
    );

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    println!("Serving on http://{} (MCP at /mcp)", bind_addr);
    tracing::info!(bind = %bind_addr, db = %config.db.path.display(), "server started");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Serve MCP over stdin/stdout until the client disconnects.
pub async fn run_stdio(config: &Config) -> anyhow::Result<()> {
    let bridge = McpBridge::new(
        Arc::new(config.clone()),
        Arc::new(ToolRegistry::with_builtins()),
    );
    tracing::info!(db = %config.db.path.display(), "MCP stdio server started");

    let service = bridge.serve(rmcp::transport::stdio()).await?;
    service.waiting().await?;

    tracing::info!("MCP stdio server stopped");
    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn app_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> AppError {
    AppError {
        status,
        code,
        message: message.into(),
    }
}

/// Map a tool failure to a status code by error type.
fn classify_tool_error(tool_name: &str, err: anyhow::Error) -> AppError {
    let message = format!("{}: {}", tool_name, err);

    if err.downcast_ref::<InvalidParams>().is_some() {
        return app_error(StatusCode::BAD_REQUEST, "bad_request", message);
    }
    match err.downcast_ref::<Error>() {
        Some(Error::UnknownSource(_)) => {
            app_error(StatusCode::BAD_REQUEST, "bad_request", message)
        }
        Some(Error::StoreMissing { .. } | Error::SchemaMismatch { .. } | Error::StoreOpen { .. }) => {
            app_error(StatusCode::SERVICE_UNAVAILABLE, "store_unavailable", message)
        }
        _ => {
            tracing::warn!(tool = tool_name, error = %err, "tool call failed");
            app_error(StatusCode::INTERNAL_SERVER_ERROR, "tool_error", message)
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ============ GET /tools/list ============

#[derive(Serialize)]
struct ToolListResponse {
    tools: Vec<ToolInfo>,
}

async fn handle_list_tools(State(state): State<AppState>) -> Json<ToolListResponse> {
    Json(ToolListResponse {
        tools: state
            .tools
            .tools()
            .iter()
            .map(|t| ToolInfo::of(t.as_ref()))
            .collect(),
    })
}

// ============ POST /tools/{name} ============

/// An empty body is treated as `{}`.
async fn handle_tool_call(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Bytes,
) -> Result<Json<serde_json::Value>, AppError> {
    let tool = state.tools.find(&name).ok_or_else(|| {
        app_error(
            StatusCode::NOT_FOUND,
            "not_found",
            format!("no tool registered with name: {}", name),
        )
    })?;

    let params = if body.iter().all(u8::is_ascii_whitespace) {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body).map_err(|e| {
            app_error(
                StatusCode::BAD_REQUEST,
                "bad_request",
                format!("invalid JSON body: {}", e),
            )
        })?
    };

    let ctx = ToolContext::new(state.config.clone());
    let result = invoke(tool, params, &ctx)
        .await
        .map_err(|e| classify_tool_error(&name, e))?;

    Ok(Json(serde_json::json!({ "result": result })))
}
