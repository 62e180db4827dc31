//! Local API proxy.
//!
//! Exposes the backend operations under `/api/*` for browser front-ends that
//! cannot reach the backend directly. Every request goes through the same
//! [`Transport`] the chat controller uses, so timeouts and failure handling
//! are identical.
//!
//! Endpoints:
//! - POST /api/chat - Forward a question (body passed through)
//! - POST /api/clear-memory - Reset backend conversation memory
//! - POST /api/clear-vector-store - Reset backend document index
//! - GET /api/health - Backend liveness

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;

use crate::config::Config;
use crate::transport::{Endpoint, HttpTransport, Transport, TransportError};

/// Shared proxy state.
pub struct ProxyState<T> {
    transport: T,
    config: Config,
}

impl<T> ProxyState<T> {
    pub const fn new(transport: T, config: Config) -> Self {
        Self { transport, config }
    }
}

/// Build the proxy router.
pub fn router<T: Transport + 'static>(state: Arc<ProxyState<T>>) -> Router {
    Router::new()
        .route(
            "/api/chat",
            post(chat::<T>).fallback(method_not_allowed),
        )
        .route(
            "/api/clear-memory",
            post(clear_memory::<T>).fallback(method_not_allowed),
        )
        .route(
            "/api/clear-vector-store",
            post(clear_vector_store::<T>).fallback(method_not_allowed),
        )
        .route(
            "/api/health",
            get(health::<T>).fallback(method_not_allowed),
        )
        .with_state(state)
}

/// Start the proxy and serve until the process is stopped.
///
/// With `open_browser`, the proxy address is handed to the system browser
/// once the listener is bound.
pub async fn start_server(config: Config, port: u16, open_browser: bool) -> Result<()> {
    let transport = HttpTransport::new(config.backend_url.clone());
    let backend = transport.base_url().to_string();
    let app = router(Arc::new(ProxyState::new(transport, config))).layer(CorsLayer::permissive());

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    tracing::info!(%addr, %backend, "proxy listening");
    println!("yeest proxy listening on http://{addr}");
    println!("Forwarding to {backend}");

    if open_browser {
        let url = format!("http://{addr}/api/health");
        if let Err(err) = open::that(&url) {
            tracing::warn!(%url, error = %err, "could not open browser");
        }
    }

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}

// === Handlers ===

async fn chat<T: Transport>(
    State(state): State<Arc<ProxyState<T>>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => {
            tracing::debug!(error = %rejection, "chat request body rejected");
            return (
                rejection.status(),
                Json(json!({"error": rejection.body_text()})),
            )
                .into_response();
        }
    };
    let timeout = state.config.chat_timeout;
    forward(&state, Endpoint::Chat, &body, timeout).await
}

async fn clear_memory<T: Transport>(State(state): State<Arc<ProxyState<T>>>) -> Response {
    let timeout = state.config.reset_timeout;
    forward(&state, Endpoint::ResetMemory, &json!({}), timeout).await
}

async fn clear_vector_store<T: Transport>(State(state): State<Arc<ProxyState<T>>>) -> Response {
    let timeout = state.config.reset_timeout;
    forward(&state, Endpoint::ResetIndex, &json!({}), timeout).await
}

async fn health<T: Transport>(State(state): State<Arc<ProxyState<T>>>) -> Response {
    let timeout = state.config.reset_timeout;
    forward(&state, Endpoint::Health, &Value::Null, timeout).await
}

async fn method_not_allowed() -> (StatusCode, Json<Value>) {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(json!({"error": "Method not allowed"})),
    )
}

async fn forward<T: Transport>(
    state: &ProxyState<T>,
    endpoint: Endpoint,
    payload: &Value,
    timeout: std::time::Duration,
) -> Response {
    match state.transport.call(endpoint, payload, timeout).await {
        Ok(body) => Json(body).into_response(),
        Err(err) => {
            tracing::warn!(%endpoint, kind = err.kind(), error = %err, "proxied call failed");
            error_response(endpoint, &err).into_response()
        }
    }
}

/// Map a transport failure onto the proxy's `{error}` convention.
fn error_response(endpoint: Endpoint, err: &TransportError) -> (StatusCode, Json<Value>) {
    let status = match err {
        TransportError::Rejected { status, .. } => {
            StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
        }
        TransportError::Unreachable(_) => StatusCode::SERVICE_UNAVAILABLE,
        TransportError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        TransportError::Malformed(_) => StatusCode::BAD_GATEWAY,
    };
    (status, Json(json!({"error": err.user_message(endpoint)})))
}
