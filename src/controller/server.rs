//! # HTTP Server
//!
//! Metrics and probe endpoints:
//! - `/metrics` - Prometheus text format
//! - `/healthz` - liveness, always 200 once the listener is up
//! - `/readyz` - 200 while the controller is ready, 503 otherwise; the body
//!   lists the watch loops that are currently running
//!
//! Listens on `METRICS_PORT` (default 5000).

use crate::observability::metrics::REGISTRY;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use serde_json::json;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::net::TcpListener;
use tracing::{error, info};

/// Shared between the watch loops and the probe handlers
#[derive(Debug, Default)]
pub struct ServerState {
    /// Controllers are running; flipped back on shutdown
    pub is_ready: Arc<AtomicBool>,
    /// Listener is bound
    pub is_listening: Arc<AtomicBool>,
    running: RwLock<BTreeSet<String>>,
}

impl ServerState {
    /// Record that the watch loop for `name` has (re)started
    pub fn mark_running(&self, name: &str) {
        self.running
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string());
    }

    /// Record that the watch loop for `name` is between restarts or stopped
    pub fn mark_stopped(&self, name: &str) {
        self.running
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name);
    }

    pub fn running_controllers(&self) -> Vec<String> {
        self.running
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }
}

pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(healthz_handler))
        .route("/readyz", get(readyz_handler))
        .with_state(state)
}

pub async fn start_server(port: u16, state: Arc<ServerState>) -> Result<(), anyhow::Error> {
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    state.is_listening.store(true, Ordering::Relaxed);
    info!(port = port, "HTTP server listening");

    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn metrics_handler() -> Response {
    let mut buffer = Vec::new();
    if let Err(e) = TextEncoder::new().encode(&REGISTRY.gather(), &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return (StatusCode::INTERNAL_SERVER_ERROR, format!("Failed to encode metrics: {e}"))
            .into_response();
    }

    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        buffer,
    )
        .into_response()
}

async fn healthz_handler() -> StatusCode {
    StatusCode::OK
}

async fn readyz_handler(State(state): State<Arc<ServerState>>) -> Response {
    let ready = state.is_ready.load(Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let body = json!({
        "ready": ready,
        "controllers": state.running_controllers(),
    });
    (status, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_readyz_follows_ready_flag() {
        let state = Arc::new(ServerState::default());
        let response = readyz_handler(State(Arc::clone(&state))).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        state.is_ready.store(true, Ordering::Relaxed);
        let response = readyz_handler(State(state)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_running_controllers_are_tracked_by_name() {
        let state = ServerState::default();
        state.mark_running("sonarr");
        state.mark_running("registration");
        state.mark_running("sonarr");
        assert_eq!(state.running_controllers(), vec!["registration", "sonarr"]);

        state.mark_stopped("sonarr");
        assert_eq!(state.running_controllers(), vec!["registration"]);
    }
}
