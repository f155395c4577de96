//! HTTP servers for the pedal_pi monitor.
//!
//! Two small axum servers share one [`Monitor`]: the metrics server exposes
//! Prometheus text and JSON views, the control server exposes the single
//! disable action.

pub mod config;
pub mod exposition;
pub mod handlers;
pub mod router;

// Re-export commonly used items
pub use config::WebConfig;
pub use exposition::MetricsExporter;
pub use handlers::{MetricsState, ServiceAck};
pub use router::{create_control_app, create_metrics_app};

use crate::error::{BikeError, Result};
use crate::metrics::Monitor;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

/// Start the metrics server and serve until it fails.
pub async fn start_metrics_server(config: &WebConfig, monitor: Arc<Monitor>) -> Result<()> {
    let app = create_metrics_app(MetricsState::new(monitor)?);
    let addr = parse_address(&config.metrics_address())?;

    info!("Metrics server running at http://{}/metrics", addr);
    serve(addr, app).await
}

/// Start the control server and serve until it fails.
pub async fn start_control_server(config: &WebConfig, monitor: Arc<Monitor>) -> Result<()> {
    let app = create_control_app(monitor);
    let addr = parse_address(&config.control_address())?;

    info!("Service server running at http://{}/service", addr);
    serve(addr, app).await
}

/// Run both servers; returns as soon as either one fails.
pub async fn start_web_servers(config: WebConfig, monitor: Arc<Monitor>) -> Result<()> {
    tokio::try_join!(
        start_metrics_server(&config, Arc::clone(&monitor)),
        start_control_server(&config, monitor),
    )?;
    Ok(())
}

fn parse_address(address: &str) -> Result<SocketAddr> {
    address
        .parse::<SocketAddr>()
        .map_err(|e| BikeError::config_error(format!("Invalid bind address {}: {}", address, e)))
}

async fn serve(addr: SocketAddr, app: Router) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| {
        BikeError::web_server_error(format!("Failed to bind to {}: {}", addr, e))
    })?;

    axum::serve(listener, app)
        .await
        .map_err(|e| BikeError::web_server_error(format!("Server error: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_address() {
        assert!(parse_address("127.0.0.1:8000").is_ok());
        assert!(matches!(
            parse_address("localhost:eight"),
            Err(BikeError::Config(_))
        ));
    }
}
