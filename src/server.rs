//! HTTP surface.
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/qa` | Retrieval: `{question, top_k}` → `{question, answers, top_k}` |
//! | `POST` | `/llm/chat` | Chat proxy passthrough (when enabled) |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! `/qa` never returns an error for backend degradation — the retrieval
//! service always produces a (possibly empty) ranked list. All origins are
//! permitted; the dashboard frontend calls from a different origin.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::embedding::Embedder;
use crate::error::PipelineError;
use crate::llm::{extract_response_text, LlmClient};
use crate::models::{QaRequest, QaResponse};
use crate::retrieve::Retriever;

#[derive(Clone)]
struct AppState {
    retriever: Arc<Retriever>,
    llm: Arc<LlmClient>,
}

/// Start the HTTP server on the configured bind address. Runs until the
/// process is terminated.
pub async fn run_server(config: &Config, embedder: Arc<Embedder>) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let config = Arc::new(config.clone());

    let state = AppState {
        retriever: Arc::new(Retriever::new(config.clone(), embedder)),
        llm: Arc::new(LlmClient::new(config.llm.clone())?),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/qa", post(handle_qa))
        .route("/llm/chat", post(handle_chat))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state);

    println!("opspulse listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

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
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn classify_llm_error(err: PipelineError) -> AppError {
    match err {
        PipelineError::Timeout(_) => AppError {
            status: StatusCode::REQUEST_TIMEOUT,
            code: "timeout".to_string(),
            message: err.to_string(),
        },
        PipelineError::Connection(ref message) if message.contains("disabled") => AppError {
            status: StatusCode::BAD_REQUEST,
            code: "llm_disabled".to_string(),
            message: err.to_string(),
        },
        PipelineError::Connection(_) => AppError {
            status: StatusCode::BAD_GATEWAY,
            code: "upstream_error".to_string(),
            message: err.to_string(),
        },
        _ => AppError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "internal".to_string(),
            message: err.to_string(),
        },
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /qa ============

async fn handle_qa(State(state): State<AppState>, Json(req): Json<QaRequest>) -> Json<QaResponse> {
    let response = state.retriever.retrieve(&req.question, req.top_k).await;
    Json(response)
}

// ============ POST /llm/chat ============

#[derive(Deserialize)]
struct ChatRequest {
    prompt: String,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Serialize)]
struct ChatResponse {
    response: String,
}

async fn handle_chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    let raw = state
        .llm
        .chat(&req.prompt, req.model.as_deref())
        .await
        .map_err(classify_llm_error)?;

    Ok(Json(ChatResponse {
        response: extract_response_text(&raw),
    }))
}
