//! HTTP filter service
//!
//! Exposes the in-process filter collaborator so other runs (or the graph
//! editor) can reach it with `filter.endpoint`:
//! - `GET /api/health` -> `{"status": "ok"}`
//! - `POST /api/filter` with `{type, condition, data, context}` -> `{result}`
//!   or an error status with `{error}`

use crate::cli::CancellationToken;
use crate::filter::{FilterError, FilterKind, FilterRequest, FilterService};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum ServeError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Clone)]
struct ServerState {
    filter: Arc<dyn FilterService>,
}

/// Request body; `type` stays a string so unknown kinds get a 400
#[derive(Debug, Deserialize)]
struct FilterBody {
    #[serde(rename = "type", default)]
    kind: Option<String>,

    #[serde(default)]
    condition: Option<String>,

    #[serde(default)]
    data: Value,

    #[serde(default)]
    context: serde_json::Map<String, Value>,
}

pub fn router(filter: Arc<dyn FilterService>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/filter", post(filter_handler))
        .layer(CorsLayer::permissive())
        .with_state(ServerState { filter })
}

/// Serve on `bind` until `shutdown` is cancelled
pub async fn serve(
    bind: &str,
    filter: Arc<dyn FilterService>,
    shutdown: CancellationToken,
) -> Result<(), ServeError> {
    let listener = TcpListener::bind(bind).await.map_err(|source| ServeError::Bind {
        addr: bind.to_string(),
        source,
    })?;
    serve_on(listener, filter, shutdown).await
}

pub async fn serve_on(
    listener: TcpListener,
    filter: Arc<dyn FilterService>,
    shutdown: CancellationToken,
) -> Result<(), ServeError> {
    let addr = listener.local_addr()?;
    info!(%addr, service = filter.name(), "filter service listening");

    axum::serve(listener, router(filter))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    info!("filter service shut down");
    Ok(())
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

async fn filter_handler(State(state): State<ServerState>, Json(body): Json<FilterBody>) -> Response {
    let condition = body.condition.unwrap_or_default();
    if condition.is_empty() {
        return Json(json!({ "result": body.data })).into_response();
    }

    let Some(kind) = body.kind.as_deref().and_then(FilterKind::parse) else {
        return error_response(StatusCode::BAD_REQUEST, "Invalid filter type");
    };

    debug!(%kind, %condition, "filter request");
    let request = FilterRequest::new(kind, condition, body.data).with_context(body.context);
    match state.filter.filter(&request).await {
        Ok(result) => Json(json!({ "result": result })).into_response(),
        Err(e) => {
            warn!(error = %e, "filter request failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
        }
    }
}
