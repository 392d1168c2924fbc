//! HTTP API over a shared [`Retriever`].
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/tables/search` | Rank tables for a natural-language query |
//! | `POST` | `/tables/context` | Schema context text for named tables |
//! | `POST` | `/refresh` | Run a full or stats-only refresh |
//! | `GET`  | `/snapshot` | Summary of the published snapshot |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! All error responses share one shape:
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `no_snapshot` (503),
//! `catalog_unavailable` (503).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support browser-based
//! clients.

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

use tablefinder_core::models::ScoredCandidate;
use tablefinder_core::snapshot::{SnapshotInfo, SnapshotStats};

use crate::config::Config;
use crate::refresher::Refresher;
use crate::retriever::{RetrievalError, Retriever};

/// Upper bound on `limit` for one search request.
const MAX_LIMIT: usize = 100;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
struct AppState {
    retriever: Arc<Retriever>,
}

/// Build the API router. Exposed separately from [`run_server`] so it can
/// be driven in-process.
pub fn router(retriever: Arc<Retriever>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/tables/search", post(handle_search))
        .route("/tables/context", post(handle_context))
        .route("/refresh", post(handle_refresh))
        .route("/snapshot", get(handle_snapshot))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(AppState { retriever })
}

/// Serve the API on `[server].bind` until Ctrl-C.
///
/// Starts the background refresher when `cache.refresh_interval_secs > 0`
/// and stops it on the way out.
pub async fn run_server(config: &Config, retriever: Arc<Retriever>) -> anyhow::Result<()> {
    let refresher = config.cache.refresh_interval().map(|interval| {
        Refresher::spawn(
            Arc::clone(&retriever),
            interval,
            config.cache.shutdown_timeout(),
        )
    });

    let app = router(retriever);
    let bind_addr = config.server.bind.clone();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    println!("tablefinder listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown requested");
        })
        .await?;

    if let Some(refresher) = refresher {
        refresher.shutdown().await;
    }
    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

/// Machine-readable code plus human-readable message.
#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
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

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn unavailable(code: &str, message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::SERVICE_UNAVAILABLE,
        code: code.to_string(),
        message: message.into(),
    }
}

impl From<RetrievalError> for AppError {
    fn from(err: RetrievalError) -> Self {
        let message = err.to_string();
        match err {
            RetrievalError::InvalidQuery => bad_request(message),
            RetrievalError::NoSnapshot => unavailable("no_snapshot", message),
            RetrievalError::CatalogUnavailable(_) => unavailable("catalog_unavailable", message),
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    /// Always `"ok"` when the server is running.
    status: String,
    /// The crate version from `Cargo.toml`.
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /tables/search ============

fn default_expand() -> bool {
    true
}

#[derive(Deserialize)]
struct SearchRequest {
    query: String,
    /// Defaults to `retrieval.top_k`.
    #[serde(default)]
    limit: Option<usize>,
    #[serde(default = "default_expand")]
    expand: bool,
}

#[derive(Serialize)]
struct SearchResponse {
    results: Vec<ScoredCandidate>,
    snapshot_version: Option<u64>,
    is_stale: bool,
}

async fn handle_search(
    State(state): State<AppState>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, AppError> {
    let limit = req.limit.unwrap_or(state.retriever.settings().top_k);
    if limit == 0 || limit > MAX_LIMIT {
        return Err(bad_request(format!(
            "limit must be between 1 and {}",
            MAX_LIMIT
        )));
    }

    let results = state
        .retriever
        .find_relevant(&req.query, limit, req.expand)
        .await?;
    let info = state.retriever.snapshot_info();

    Ok(Json(SearchResponse {
        results,
        snapshot_version: info.as_ref().map(|i| i.version),
        is_stale: info.is_some_and(|i| i.is_stale),
    }))
}

// ============ POST /tables/context ============

#[derive(Deserialize)]
struct ContextRequest {
    tables: Vec<String>,
}

#[derive(Serialize)]
struct ContextResponse {
    context: String,
}

async fn handle_context(
    State(state): State<AppState>,
    Json(req): Json<ContextRequest>,
) -> Result<Json<ContextResponse>, AppError> {
    if req.tables.is_empty() {
        return Err(bad_request("tables must not be empty"));
    }
    let context = state.retriever.table_context(&req.tables)?;
    Ok(Json(ContextResponse { context }))
}

// ============ POST /refresh ============

#[derive(Deserialize, Default)]
struct RefreshRequest {
    #[serde(default)]
    full: bool,
}

async fn handle_refresh(
    State(state): State<AppState>,
    body: Option<Json<RefreshRequest>>,
) -> Result<Json<SnapshotStats>, AppError> {
    let req = body.map(|Json(r)| r).unwrap_or_default();
    let stats = state.retriever.refresh(req.full).await?;
    Ok(Json(stats))
}

// ============ GET /snapshot ============

async fn handle_snapshot(State(state): State<AppState>) -> Result<Json<SnapshotInfo>, AppError> {
    state
        .retriever
        .snapshot_info()
        .map(Json)
        .ok_or_else(|| RetrievalError::NoSnapshot.into())
}
