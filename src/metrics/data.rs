//! Data structures for ride metrics.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Whether the monitor is watching for inactivity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceState {
    /// Warnings are armed; ticks run on the active interval
    #[default]
    Active,
    /// Warnings are off until the rider pedals again; ticks run on the slow interval
    Disabled,
}

impl ServiceState {
    pub fn is_enabled(self) -> bool {
        matches!(self, ServiceState::Active)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ServiceState::Active => "active",
            ServiceState::Disabled => "disabled",
        }
    }
}

/// Whether the rider is currently pedaling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PedalState {
    Pedaling,
    #[default]
    Idle,
}

impl PedalState {
    pub fn is_pedaling(self) -> bool {
        matches!(self, PedalState::Pedaling)
    }
}

/// A consistent view of every ride metric at one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Timestamp of the last tick (Unix timestamp in milliseconds)
    pub timestamp: u64,
    /// Wheel revolutions per minute over the last tick
    pub rpm: f64,
    /// Speed over the last tick in km/h
    pub speed_kmh: f64,
    /// Total distance in meters
    pub distance_total: f64,
    /// Estimated calories, always `distance_total / 10`
    pub calories: f64,
    /// Highest RPM in the current peak window
    pub peak_rpm: f64,
    /// Highest speed in the current peak window, km/h
    pub peak_speed: f64,
    /// Pulses counted since startup
    pub pulses_total: u64,
    #[serde(with = "duration_secs")]
    pub uptime: Duration,
    #[serde(with = "duration_secs")]
    pub pedaling_time: Duration,
    #[serde(with = "duration_secs")]
    pub idle_time: Duration,
    /// Time spent with the inactivity alarm raised
    #[serde(with = "duration_secs")]
    pub warning_time: Duration,
    /// Number of inactivity alarms raised
    pub warning_count: u64,
    /// Number of times the service was disabled remotely
    pub disable_count: u64,
    /// Sensor, buzzer and handler failures
    pub error_count: u64,
    /// Interval until the next tick
    #[serde(with = "duration_secs")]
    pub update_interval: Duration,
    pub service_state: ServiceState,
    pub pedal_state: PedalState,
    /// Whether the inactivity alarm is raised
    pub alarm_active: bool,
}

impl MetricsSnapshot {
    /// Create an empty snapshot ticking at `update_interval`.
    pub fn new(update_interval: Duration) -> Self {
        Self {
            timestamp: chrono::Utc::now().timestamp_millis().max(0) as u64,
            rpm: 0.0,
            speed_kmh: 0.0,
            distance_total: 0.0,
            calories: 0.0,
            peak_rpm: 0.0,
            peak_speed: 0.0,
            pulses_total: 0,
            uptime: Duration::ZERO,
            pedaling_time: Duration::ZERO,
            idle_time: Duration::ZERO,
            warning_time: Duration::ZERO,
            warning_count: 0,
            disable_count: 0,
            error_count: 0,
            update_interval,
            service_state: ServiceState::default(),
            pedal_state: PedalState::default(),
            alarm_active: false,
        }
    }
}

impl Default for MetricsSnapshot {
    fn default() -> Self {
        Self::new(Duration::from_millis(crate::DEFAULT_ACTIVE_INTERVAL_MS))
    }
}

/// Durations as fractional seconds on the wire.
mod duration_secs {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(D::Error::custom)
    }
}
