//! Web server configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the metrics and control servers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    /// Host both servers bind to
    pub host: String,
    /// Port serving `/metrics`
    pub metrics_port: u16,
    /// Port serving `/service`
    pub control_port: u16,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            metrics_port: crate::DEFAULT_METRICS_PORT,
            control_port: crate::DEFAULT_CONTROL_PORT,
        }
    }
}

impl WebConfig {
    /// Create a new web configuration with custom host and ports.
    pub fn new(host: impl Into<String>, metrics_port: u16, control_port: u16) -> Self {
        Self {
            host: host.into(),
            metrics_port,
            control_port,
        }
    }

    /// Set the host for both servers.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the metrics port.
    pub fn with_metrics_port(mut self, port: u16) -> Self {
        self.metrics_port = port;
        self
    }

    /// Set the control port.
    pub fn with_control_port(mut self, port: u16) -> Self {
        self.control_port = port;
        self
    }

    /// Bind address of the metrics server.
    pub fn metrics_address(&self) -> String {
        format!("{}:{}", self.host, self.metrics_port)
    }

    /// Bind address of the control server.
    pub fn control_address(&self) -> String {
        format!("{}:{}", self.host, self.control_port)
    }
}
