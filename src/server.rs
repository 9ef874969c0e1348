//! HTTP server for the Teams messaging endpoint and a programmatic query API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/messages` | Bot Framework activity; replies with an adaptive card |
//! | `POST` | `/query` | `{ "query": "...", "user_id": "..." }` → answer JSON |
//! | `GET`  | `/health` | Status, version, and per-source enablement |
//! | `GET`  | `/sources` | Source status list |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query must not be empty" } }
//! ```
//!
//! Error code: `bad_request` (400). A malformed activity on
//! `/api/messages` gets a 400 whose body is an error card attachment, so
//! Teams still has something to render.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::bot::{handle_activity, Activity, BotConnector, ERROR_TEXT};
use crate::card::{attachment, error_card};
use crate::config::Config;
use crate::models::{Answer, Query};
use crate::processor::QueryProcessor;
use crate::sources::{get_sources, SourceStatus};

#[derive(Clone)]
struct AppState {
    processor: Arc<QueryProcessor>,
    connector: Option<Arc<BotConnector>>,
}

/// Build the processor from configuration and serve until the process exits.
///
/// Fails at startup when the LLM key is missing or the bind address is
/// unavailable.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let processor = QueryProcessor::from_config(config)?;
    run_server_with_processor(config, Arc::new(processor)).await
}

/// Serve with an already-built processor (custom sources or chat model).
pub async fn run_server_with_processor(
    config: &Config,
    processor: Arc<QueryProcessor>,
) -> anyhow::Result<()> {
    let connector = BotConnector::from_config(&config.bot)?.map(Arc::new);
    if connector.is_none() {
        info!("bot credentials not set; replies are returned in the response body only");
    }

    for source in processor.sources().sources() {
        info!(
            source = source.name(),
            enabled = source.is_enabled(),
            "knowledge source"
        );
    }

    if let Some(ttl) = processor.cache_ttl() {
        spawn_cache_sweeper(Arc::clone(&processor), ttl);
    }

    let app = router(processor, connector);
    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!(bind = %config.server.bind, "NAVO listening");
    axum::serve(listener, app).await?;
    Ok(())
}

/// Sweep expired answers once per TTL so idle keys do not pile up.
fn spawn_cache_sweeper(processor: Arc<QueryProcessor>, ttl: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(ttl.max(Duration::from_secs(1)));
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = processor.sweep_cache();
            if removed > 0 {
                debug!(removed, "expired answers swept");
            }
        }
    });
}

/// The application router, without binding a socket.
pub fn router(processor: Arc<QueryProcessor>, connector: Option<Arc<BotConnector>>) -> Router {
    let state = AppState {
        processor,
        connector,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/messages", post(handle_messages))
        .route("/query", post(handle_query))
        .route("/health", get(handle_health))
        .route("/sources", get(handle_sources))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
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

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    sources: BTreeMap<String, bool>,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    let sources = state
        .processor
        .sources()
        .sources()
        .iter()
        .map(|s| (s.name().to_string(), s.is_enabled()))
        .collect();
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        sources,
    })
}

// ============ GET /sources ============

#[derive(Serialize)]
struct SourcesResponse {
    sources: Vec<SourceStatus>,
}

async fn handle_sources(State(state): State<AppState>) -> Json<SourcesResponse> {
    Json(SourcesResponse {
        sources: get_sources(state.processor.sources()),
    })
}

// ============ POST /query ============

#[derive(Debug, Deserialize)]
struct QueryRequest {
    query: String,
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    filters: BTreeMap<String, String>,
}

async fn handle_query(
    State(state): State<AppState>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<Answer>, AppError> {
    let Json(req) = payload.map_err(|e| bad_request(e.body_text()))?;
    let text = req.query.trim();
    if text.is_empty() {
        return Err(bad_request("query must not be empty"));
    }

    let mut query = Query::new(text, req.user_id.unwrap_or_else(|| "api".to_string()));
    query.filters = req.filters;
    Ok(Json(state.processor.process(&query).await))
}

// ============ POST /api/messages ============

async fn handle_messages(
    State(state): State<AppState>,
    payload: Result<Json<Activity>, JsonRejection>,
) -> Response {
    let activity = match payload {
        Ok(Json(activity)) if !activity.activity_type.is_empty() => activity,
        Ok(_) => return malformed_activity("activity type missing"),
        Err(e) => return malformed_activity(&e.body_text()),
    };

    let Some(reply) = handle_activity(&state.processor, &activity).await else {
        return StatusCode::OK.into_response();
    };

    if let Some(connector) = state.connector.clone() {
        let outbound = reply.clone();
        tokio::spawn(async move {
            if let Err(e) = connector.send_reply(&outbound).await {
                warn!(error = %e, "failed to deliver reply to connector");
            }
        });
    }

    (StatusCode::OK, Json(reply)).into_response()
}

fn malformed_activity(detail: &str) -> Response {
    warn!(detail = %detail, "rejected malformed activity");
    let reply = Activity {
        activity_type: "message".to_string(),
        ..Default::default()
    }
    .with_attachment(attachment(error_card(ERROR_TEXT)));
    (StatusCode::BAD_REQUEST, Json(reply)).into_response()
}
