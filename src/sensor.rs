//! Pulse counting for the hall-effect sensor.
//!
//! The GPIO edge interrupt (or the simulator) records pulses into a shared
//! [`PulseCounter`]; the aggregation loop reads the latest [`PulseEvent`]
//! through the [`PulseSource`] trait once per tick.

use crate::error::{BikeError, Result};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// The most recent pulse seen by the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PulseEvent {
    /// Total pulses recorded since startup
    pub count: u64,
    /// When the pulse was recorded
    pub timestamp: Instant,
}

/// Anything the aggregation loop can read pulses from.
pub trait PulseSource: Send + Sync {
    /// The latest recorded pulse, or `None` if the sensor has not fired yet.
    fn latest(&self) -> Result<Option<PulseEvent>>;
}

impl<T: PulseSource + ?Sized> PulseSource for Arc<T> {
    fn latest(&self) -> Result<Option<PulseEvent>> {
        (**self).latest()
    }
}

/// Monotonic pulse counter fed by edge callbacks.
#[derive(Debug)]
pub struct PulseCounter {
    debounce: Duration,
    latest: Mutex<Option<PulseEvent>>,
}

impl PulseCounter {
    /// Create a counter that ignores edges closer together than `debounce`.
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            latest: Mutex::new(None),
        }
    }

    /// Record a pulse at the current instant.
    pub fn record_pulse(&self) -> bool {
        self.record_pulse_at(Instant::now())
    }

    /// Record a pulse at `at`. Returns `false` when the edge was debounced.
    pub fn record_pulse_at(&self, at: Instant) -> bool {
        let mut latest = self.lock();
        let next = match *latest {
            Some(prev) => {
                if at.saturating_duration_since(prev.timestamp) < self.debounce {
                    return false;
                }
                PulseEvent {
                    count: prev.count + 1,
                    timestamp: at.max(prev.timestamp),
                }
            }
            None => PulseEvent {
                count: 1,
                timestamp: at,
            },
        };
        *latest = Some(next);
        true
    }

    /// Total pulses recorded so far.
    pub fn total(&self) -> u64 {
        self.lock().map_or(0, |event| event.count)
    }

    // The critical section is a plain copy, so a poisoned lock still holds valid data.
    fn lock(&self) -> MutexGuard<'_, Option<PulseEvent>> {
        self.latest.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for PulseCounter {
    fn default() -> Self {
        Self::new(Duration::from_millis(crate::DEFAULT_DEBOUNCE_MS))
    }
}

impl PulseSource for PulseCounter {
    fn latest(&self) -> Result<Option<PulseEvent>> {
        Ok(*self.lock())
    }
}

/// Feeds a [`PulseCounter`] at a steady cadence, for hosts without a sensor.
#[derive(Debug)]
pub struct SimulatedPedal {
    counter: Arc<PulseCounter>,
    period: Duration,
}

impl SimulatedPedal {
    /// Simulate pedaling at `rpm` with `pulses_per_revolution` magnets.
    pub fn new(counter: Arc<PulseCounter>, rpm: f64, pulses_per_revolution: u32) -> Result<Self> {
        if !rpm.is_finite() || rpm <= 0.0 {
            return Err(BikeError::config_error(format!(
                "simulated cadence must be a positive RPM, got {}",
                rpm
            )));
        }
        if pulses_per_revolution == 0 {
            return Err(BikeError::config_error(
                "pulses per revolution must be at least 1",
            ));
        }

        let pulses_per_second = rpm * f64::from(pulses_per_revolution) / 60.0;
        let period = Duration::try_from_secs_f64(1.0 / pulses_per_second).map_err(|e| {
            BikeError::config_error(format!(
                "simulated cadence of {} RPM is out of range: {}",
                rpm, e
            ))
        })?;
        if period.is_zero() {
            return Err(BikeError::config_error(format!(
                "simulated cadence of {} RPM is too fast to schedule",
                rpm
            )));
        }

        Ok(Self { counter, period })
    }

    /// Interval between simulated pulses.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Start emitting pulses on the tokio runtime.
    pub fn spawn(self) -> JoinHandle<()> {
        info!("Simulating pedal pulses every {:?}", self.period);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.period);
            // The first tick of a tokio interval completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if !self.counter.record_pulse() {
                    debug!("Simulated pulse debounced");
                }
            }
        })
    }
}
