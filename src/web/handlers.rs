//! HTTP handlers for the metrics and control endpoints.

use crate::metrics::{MetricsSnapshot, Monitor, ServiceState};
use crate::web::exposition::MetricsExporter;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::error;

/// State shared by the metrics server handlers.
#[derive(Clone)]
pub struct MetricsState {
    pub monitor: Arc<Monitor>,
    pub exporter: Arc<Mutex<MetricsExporter>>,
}

impl MetricsState {
    pub fn new(monitor: Arc<Monitor>) -> crate::error::Result<Self> {
        Ok(Self {
            monitor,
            exporter: Arc::new(Mutex::new(MetricsExporter::new()?)),
        })
    }
}

/// Acknowledgement returned by the control endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceAck {
    pub service_enabled: bool,
    /// Whether this request changed the state
    pub changed: bool,
    pub state: String,
}

/// Prometheus text exposition of the current snapshot.
pub async fn metrics(State(state): State<MetricsState>) -> Response {
    let snapshot = state.monitor.snapshot().await;

    // The exporter lock covers update and encode so concurrent scrapes cannot interleave.
    let rendered = {
        let exporter = state.exporter.lock().unwrap_or_else(PoisonError::into_inner);
        exporter
            .render(&snapshot)
            .map(|body| (exporter.content_type(), body))
    };

    match rendered {
        Ok((content_type, body)) => {
            ([(header::CONTENT_TYPE, content_type)], body).into_response()
        }
        Err(e) => {
            error!("Failed to render metrics: {}", e);
            state.monitor.record_error().await;
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Current snapshot as JSON.
pub async fn get_snapshot(State(state): State<MetricsState>) -> Json<MetricsSnapshot> {
    Json(state.monitor.snapshot().await)
}

/// Health check endpoint.
pub async fn health_check(State(state): State<MetricsState>) -> Json<serde_json::Value> {
    let service_state = state.monitor.service_state().await;
    Json(json!({
        "status": "ok",
        "service": "pedal-pi",
        "version": env!("CARGO_PKG_VERSION"),
        "service_state": service_state,
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Disable the inactivity service until the rider pedals again.
pub async fn disable_service(State(monitor): State<Arc<Monitor>>) -> Json<ServiceAck> {
    let changed = monitor.disable().await;
    // Reported from the disable itself; a later pulse may already have re-enabled it.
    let state = ServiceState::Disabled;
    Json(ServiceAck {
        service_enabled: state.is_enabled(),
        changed,
        state: state.as_str().to_string(),
    })
}

/// Fallback for unknown routes.
pub async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "Not Found")
}
