use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use meetwalk_shared::{HealthCheck, HealthResponse, HealthStatus};
use std::sync::Arc;

use crate::AppState;

/// Health check that pings the backing store.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Response {
    let store = match state.store.ping() {
        Ok(()) => HealthCheck {
            name: state.store.backend().to_string(),
            status: HealthStatus::Healthy,
            message: None,
        },
        Err(e) => HealthCheck {
            name: state.store.backend().to_string(),
            status: HealthStatus::Unhealthy,
            message: Some(format!("{e}")),
        },
    };

    let response = HealthResponse::healthy("meetwalk-api", env!("CARGO_PKG_VERSION"))
        .with_checks(vec![store]);

    let status = match response.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status, Json(response)).into_response()
}

/// Returns Prometheus metrics.
pub async fn metrics(State(state): State<Arc<AppState>>) -> String {
    state
        .metrics_handle
        .as_ref()
        .map(|handle| handle.render())
        .unwrap_or_default()
}
