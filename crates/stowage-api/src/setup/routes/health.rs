//! Health check handlers and response types.

use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(5);

/// Run an async check with timeout; returns status string "healthy", "timeout", or "{prefix}: {error}".
async fn run_check<F, E>(timeout: Duration, f: F, error_prefix: &str) -> String
where
    F: Future<Output = Result<(), E>>,
    E: Display,
{
    match tokio::time::timeout(timeout, f).await {
        Ok(Ok(())) => "healthy".to_string(),
        Ok(Err(e)) => format!("{}: {}", error_prefix, e),
        Err(_) => "timeout".to_string(),
    }
}

#[derive(serde::Serialize)]
pub(super) struct HealthCheckResponse {
    pub status: String,
    pub database: String,
    pub storage: String,
    pub storage_backend: String,
}

/// Liveness probe - process is running.
pub async fn liveness_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({ "status": "alive" })),
    )
}

/// Database and storage reachability. Storage problems degrade, database problems fail.
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let store = state.store.clone();
    let database = run_check(TIMEOUT, async move { store.ping().await }, "unhealthy").await;

    let storage = state.storage.clone();
    let storage_status = run_check(
        TIMEOUT,
        async move {
            storage
                .exists("health-check-non-existent-key")
                .await
                .map(drop)
        },
        "degraded",
    )
    .await;

    let database_healthy = database == "healthy";
    let status = if !database_healthy {
        "unhealthy"
    } else if storage_status != "healthy" {
        "degraded"
    } else {
        "healthy"
    };

    let response = HealthCheckResponse {
        status: status.to_string(),
        database,
        storage: storage_status,
        storage_backend: state.storage.backend_type().to_string(),
    };

    let status_code = if database_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(response))
}
