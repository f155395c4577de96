//! Monitor configuration: wheel geometry, tick timing and pin assignment.

use crate::error::{BikeError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the pulse aggregation loop and the attached hardware.
///
/// Wheel circumference and pulses per revolution depend on the bike and on
/// how many magnets pass the sensor, so they are inputs rather than constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Distance covered by one wheel revolution, in meters
    pub wheel_circumference_m: f64,
    /// Sensor pulses produced by one wheel revolution
    pub pulses_per_revolution: u32,
    /// Tick interval while the service is active
    pub active_interval: Duration,
    /// Tick interval while the service is disabled
    pub disabled_interval: Duration,
    /// Length of the peak RPM/speed window
    pub peak_reset_interval: Duration,
    /// Edges closer together than this are treated as contact bounce
    pub debounce: Duration,
    /// BCM pin wired to the hall sensor signal
    pub sensor_pin: u8,
    /// BCM pin wired to the buzzer
    pub buzzer_pin: u8,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            wheel_circumference_m: crate::DEFAULT_WHEEL_CIRCUMFERENCE_M,
            pulses_per_revolution: crate::DEFAULT_PULSES_PER_REVOLUTION,
            active_interval: Duration::from_millis(crate::DEFAULT_ACTIVE_INTERVAL_MS),
            disabled_interval: Duration::from_millis(crate::DEFAULT_DISABLED_INTERVAL_MS),
            peak_reset_interval: Duration::from_secs(crate::DEFAULT_PEAK_RESET_SECS),
            debounce: Duration::from_millis(crate::DEFAULT_DEBOUNCE_MS),
            sensor_pin: crate::DEFAULT_SENSOR_PIN,
            buzzer_pin: crate::DEFAULT_BUZZER_PIN,
        }
    }
}

impl MonitorConfig {
    /// Set the wheel circumference in meters.
    pub fn with_wheel_circumference(mut self, meters: f64) -> Self {
        self.wheel_circumference_m = meters;
        self
    }

    /// Set how many pulses make up one revolution.
    pub fn with_pulses_per_revolution(mut self, pulses: u32) -> Self {
        self.pulses_per_revolution = pulses;
        self
    }

    /// Set the active and disabled tick intervals.
    pub fn with_intervals(mut self, active: Duration, disabled: Duration) -> Self {
        self.active_interval = active;
        self.disabled_interval = disabled;
        self
    }

    /// Set the peak window length.
    pub fn with_peak_reset_interval(mut self, interval: Duration) -> Self {
        self.peak_reset_interval = interval;
        self
    }

    /// Set the debounce window for sensor edges.
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Set the sensor and buzzer pins.
    pub fn with_pins(mut self, sensor_pin: u8, buzzer_pin: u8) -> Self {
        self.sensor_pin = sensor_pin;
        self.buzzer_pin = buzzer_pin;
        self
    }

    /// Check that the configuration describes a usable monitor.
    pub fn validate(&self) -> Result<()> {
        if !self.wheel_circumference_m.is_finite() || self.wheel_circumference_m <= 0.0 {
            return Err(BikeError::config_error(format!(
                "wheel circumference must be a positive number of meters, got {}",
                self.wheel_circumference_m
            )));
        }
        if self.pulses_per_revolution == 0 {
            return Err(BikeError::config_error(
                "pulses per revolution must be at least 1",
            ));
        }
        if self.active_interval.is_zero() || self.disabled_interval.is_zero() {
            return Err(BikeError::config_error("tick intervals must be non-zero"));
        }
        if self.peak_reset_interval.is_zero() {
            return Err(BikeError::config_error("peak reset interval must be non-zero"));
        }
        if self.sensor_pin == self.buzzer_pin {
            return Err(BikeError::config_error(format!(
                "sensor and buzzer cannot share GPIO pin {}",
                self.sensor_pin
            )));
        }
        Ok(())
    }
}
