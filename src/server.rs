//! HTTP surface over the question-answering service.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/rag/ask` | Answer `{"question": ".."}` |
//! | `GET`  | `/rag/history` | All retained history entries, oldest first |
//! | `GET`  | `/rag/history/last` | Most recent entry, or `{}` |
//! | `POST` | `/rag/reindex` | Reload the corpus and rebuild the index |
//! | `GET`  | `/health` | Version, backend reachability, queue saturation |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "gateway_busy", "message": "generation backend is busy, try again later" } }
//! ```
//!
//! | Code | Status |
//! |------|--------|
//! | `bad_request` | 400 |
//! | `gateway_busy` | 503 |
//! | `generation_timeout` | 504 |
//! | `backend_error` | 502 |
//! | `corpus_not_found`, `corpus_invalid`, `internal` | 500 |
//!
//! A question with no sufficiently similar document is not an error: it
//! returns 200 with `"status": "fail"`.

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

use crate::error::RagError;
use crate::models::{AskResponse, LogEntry};
use crate::rag::RagService;

/// Bind to `bind` and serve until the process is terminated.
pub async fn run_server(service: Arc<RagService>, bind: &str) -> anyhow::Result<()> {
    // Warm the index before taking traffic; a missing corpus is reported per request.
    if let Err(e) = service.load_corpus().await {
        tracing::warn!(error = %e, "corpus not loaded at startup");
    }
    let app = router(service);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!(addr = %bind, "server listening");
    axum::serve(listener, app).await?;

    Ok(())
}

/// The application router with CORS applied.
pub fn router(service: Arc<RagService>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/rag/ask", post(handle_ask))
        .route("/rag/history", get(handle_history))
        .route("/rag/history/last", get(handle_last))
        .route("/rag/reindex", post(handle_reindex))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(service)
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

impl From<RagError> for AppError {
    fn from(err: RagError) -> Self {
        let status = match &err {
            RagError::GatewayBusy => StatusCode::SERVICE_UNAVAILABLE,
            RagError::GenerationTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            RagError::Backend(_) => StatusCode::BAD_GATEWAY,
            RagError::CorpusNotFound(_) | RagError::CorpusInvalid(_) | RagError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        AppError {
            status,
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

// ============ POST /rag/ask ============

#[derive(Deserialize)]
struct AskRequest {
    question: String,
}

async fn handle_ask(
    State(service): State<Arc<RagService>>,
    Json(req): Json<AskRequest>,
) -> Result<Json<AskResponse>, AppError> {
    if req.question.trim().is_empty() {
        return Err(bad_request("question must not be empty"));
    }
    let response = service.ask(&req.question).await?;
    Ok(Json(response))
}

// ============ GET /rag/history ============

async fn handle_history(State(service): State<Arc<RagService>>) -> Json<Vec<LogEntry>> {
    Json(service.history())
}

/// Returns `{}` when the log is empty.
async fn handle_last(State(service): State<Arc<RagService>>) -> Json<serde_json::Value> {
    let last = service
        .last()
        .and_then(|entry| serde_json::to_value(entry).ok())
        .unwrap_or_else(|| serde_json::json!({}));
    Json(last)
}

// ============ POST /rag/reindex ============

#[derive(Serialize)]
struct ReindexResponse {
    documents: usize,
    features: usize,
}

async fn handle_reindex(
    State(service): State<Arc<RagService>>,
) -> Result<Json<ReindexResponse>, AppError> {
    let corpus = tokio::task::spawn_blocking(move || service.reload())
        .await
        .map_err(|e| RagError::Internal(e.into()))??;

    Ok(Json(ReindexResponse {
        documents: corpus.documents.len(),
        features: corpus.index.features(),
    }))
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    backend_reachable: bool,
    queue_saturated: bool,
}

async fn handle_health(State(service): State<Arc<RagService>>) -> Json<HealthResponse> {
    let gateway = service.gateway();
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        backend_reachable: gateway.backend_health().await.is_ok(),
        queue_saturated: gateway.is_saturated(),
    })
}
