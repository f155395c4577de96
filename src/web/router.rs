//! Routers for the metrics and control servers.

use crate::metrics::Monitor;
use crate::web::handlers::{self, MetricsState};
use axum::{routing::get, Router};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

/// Router for the metrics port: `/metrics`, `/api/snapshot`, `/api/health`.
pub fn create_metrics_app(state: MetricsState) -> Router {
    Router::new()
        .route("/metrics", get(handlers::metrics))
        .route("/api/snapshot", get(handlers::get_snapshot))
        .route("/api/health", get(handlers::health_check))
        .fallback(handlers::not_found)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

/// Router for the control port: `/service`.
pub fn create_control_app(monitor: Arc<Monitor>) -> Router {
    Router::new()
        .route("/service", get(handlers::disable_service))
        .fallback(handlers::not_found)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(monitor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MonitorConfig;
    use crate::sensor::PulseCounter;
    use crate::warning::{NullBuzzer, WarningDriver};
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    fn monitor() -> Arc<Monitor> {
        let warnings = WarningDriver::spawn(Box::new(NullBuzzer));
        let source = Arc::new(PulseCounter::default());
        Arc::new(Monitor::new(&MonitorConfig::default(), source, warnings).unwrap())
    }

    async fn get_body(app: Router, uri: &str) -> (StatusCode, String) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_metrics_route() {
        let app = create_metrics_app(MetricsState::new(monitor()).unwrap());
        let (status, body) = get_body(app, "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("bike_rpm 0"));
        assert!(body.contains("bike_service_enabled 1"));
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let app = create_metrics_app(MetricsState::new(monitor()).unwrap());
        let (status, body) = get_body(app, "/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, "Not Found");
    }

    #[tokio::test]
    async fn test_service_route_disables() {
        let monitor = monitor();
        let app = create_control_app(monitor.clone());

        let (status, body) = get_body(app.clone(), "/service").await;
        assert_eq!(status, StatusCode::OK);
        let ack: handlers::ServiceAck = serde_json::from_str(&body).unwrap();
        assert!(!ack.service_enabled);
        assert!(ack.changed);
        assert_eq!(ack.state, "disabled");

        let (_, body) = get_body(app, "/service").await;
        let ack: handlers::ServiceAck = serde_json::from_str(&body).unwrap();
        assert!(!ack.changed);
        assert_eq!(monitor.snapshot().await.disable_count, 1);
    }
}
