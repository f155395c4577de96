//! Error handling for the pedal_pi monitor crate.

/// A specialized `Result` type for pedal_pi operations.
pub type Result<T> = std::result::Result<T, BikeError>;

/// The main error type for pedal_pi operations.
#[derive(Debug, thiserror::Error)]
pub enum BikeError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Reading the pulse sensor failed
    #[error("Sensor error: {0}")]
    Sensor(String),

    /// GPIO setup or write failed (sensor input or buzzer output)
    #[error("GPIO error: {0}")]
    Gpio(String),

    /// Web server error
    #[error("Web server error: {0}")]
    WebServer(String),

    /// Rendering the metrics exposition failed
    #[error("Metrics error: {0}")]
    Metrics(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl BikeError {
    /// Create a new sensor error
    pub fn sensor_error(msg: impl Into<String>) -> Self {
        Self::Sensor(msg.into())
    }

    /// Create a new GPIO error
    pub fn gpio_error(msg: impl Into<String>) -> Self {
        Self::Gpio(msg.into())
    }

    /// Create a new web server error
    pub fn web_server_error(msg: impl Into<String>) -> Self {
        Self::WebServer(msg.into())
    }

    /// Create a new metrics error
    pub fn metrics_error(msg: impl Into<String>) -> Self {
        Self::Metrics(msg.into())
    }

    /// Create a new configuration error
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

impl From<prometheus::Error> for BikeError {
    fn from(err: prometheus::Error) -> Self {
        Self::Metrics(err.to_string())
    }
}

#[cfg(feature = "gpio")]
impl From<rppal::gpio::Error> for BikeError {
    fn from(err: rppal::gpio::Error) -> Self {
        Self::Gpio(err.to_string())
    }
}
