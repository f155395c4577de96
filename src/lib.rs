//! # Pedal Pi - Bicycle Ride Monitor for Raspberry Pi
//!
//! A small daemon crate that counts hall-sensor pulses from a bicycle wheel,
//! turns them into cadence, speed, distance and calorie metrics, and warns
//! the rider with a buzzer when they stop pedaling.
//!
//! ## Features
//!
//! - **Pulse aggregation**: RPM, km/h, distance and calories on a 1 s tick
//! - **Peak tracking**: peak RPM and speed over rolling 5 minute windows
//! - **Inactivity warnings**: buzzer patterns on pedal/idle transitions
//! - **Prometheus endpoint**: `/metrics` on port 8000
//! - **Remote disable**: `/service` on port 5000 silences warnings until the
//!   rider pedals again
//! - **Cross-compilation**: GPIO support is feature-gated; a simulated pedal
//!   works everywhere
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pedal_pi::{
//!     start_web_servers, Monitor, MonitorConfig, NullBuzzer, PulseCounter, SimulatedPedal,
//!     WarningDriver, WebConfig,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = MonitorConfig::default();
//!     let counter = Arc::new(PulseCounter::new(config.debounce));
//!     SimulatedPedal::new(counter.clone(), 75.0, config.pulses_per_revolution)?.spawn();
//!
//!     let warnings = WarningDriver::spawn(Box::new(NullBuzzer));
//!     let monitor = Arc::new(Monitor::new(&config, counter, warnings)?);
//!     monitor.clone().spawn();
//!
//!     start_web_servers(WebConfig::default(), monitor).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod gpio;
pub mod metrics;
pub mod sensor;
pub mod warning;
pub mod web;

// Re-export public API
pub use config::MonitorConfig;
pub use error::{BikeError, Result};
pub use metrics::{
    data::{MetricsSnapshot, PedalState, ServiceState},
    monitor::{Monitor, MonitorState},
    state::{StateMachine, Transition},
    MetricsAggregator,
};
pub use sensor::{PulseCounter, PulseEvent, PulseSource, SimulatedPedal};
pub use warning::{BeepPattern, Buzzer, NullBuzzer, WarningDriver};

pub use web::{start_web_servers, WebConfig};

/// The default port serving `/metrics`
pub const DEFAULT_METRICS_PORT: u16 = 8000;

/// The default port serving `/service`
pub const DEFAULT_CONTROL_PORT: u16 = 5000;

/// Tick interval while the service is active, in milliseconds
pub const DEFAULT_ACTIVE_INTERVAL_MS: u64 = 1000;

/// Tick interval while the service is disabled, in milliseconds
pub const DEFAULT_DISABLED_INTERVAL_MS: u64 = 5000;

/// Length of the peak RPM/speed window, in seconds
pub const DEFAULT_PEAK_RESET_SECS: u64 = 300;

/// Default wheel circumference in meters
pub const DEFAULT_WHEEL_CIRCUMFERENCE_M: f64 = 2.1;

/// Default number of sensor pulses per wheel revolution
pub const DEFAULT_PULSES_PER_REVOLUTION: u32 = 1;

/// Default sensor debounce window, in milliseconds
pub const DEFAULT_DEBOUNCE_MS: u64 = 5;

/// Default BCM pin for the hall sensor signal
pub const DEFAULT_SENSOR_PIN: u8 = 17;

/// Default BCM pin for the buzzer
pub const DEFAULT_BUZZER_PIN: u8 = 18;
