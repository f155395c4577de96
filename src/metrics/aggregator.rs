//! Per-tick conversion of pulse counts into ride metrics.

use crate::config::MonitorConfig;
use crate::error::{BikeError, Result};
use crate::metrics::data::{MetricsSnapshot, ServiceState};
use crate::metrics::state::StateMachine;
use crate::sensor::PulseEvent;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Meters of riding per estimated calorie.
pub const METERS_PER_CALORIE: f64 = 10.0;

/// Owns the [`MetricsSnapshot`] and updates it once per tick.
#[derive(Debug, Clone)]
pub struct MetricsAggregator {
    wheel_circumference_m: f64,
    pulses_per_revolution: u32,
    active_interval: Duration,
    disabled_interval: Duration,
    peak_reset_interval: Duration,
    snapshot: MetricsSnapshot,
    started_at: Instant,
    last_tick: Instant,
    last_count: u64,
    peak_window_start: Instant,
    // Set while disabled; only pulses after this instant resume the service.
    disabled_at: Option<Instant>,
}

impl MetricsAggregator {
    pub fn new(config: &MonitorConfig, now: Instant) -> Self {
        Self {
            wheel_circumference_m: config.wheel_circumference_m,
            pulses_per_revolution: config.pulses_per_revolution.max(1),
            active_interval: config.active_interval,
            disabled_interval: config.disabled_interval,
            peak_reset_interval: config.peak_reset_interval,
            snapshot: MetricsSnapshot::new(config.active_interval),
            started_at: now,
            last_tick: now,
            last_count: 0,
            peak_window_start: now,
            disabled_at: None,
        }
    }

    /// Fold one sensor reading into the metrics.
    ///
    /// Time since the previous tick is credited to the states `machine` was in
    /// during that time. Returns whether a pulse arrived within the last
    /// active tick window, or `None` when the reading was unusable; in that
    /// case the error is counted and the previous values are kept.
    pub fn ingest(
        &mut self,
        now: Instant,
        reading: Result<Option<PulseEvent>>,
        machine: &StateMachine,
    ) -> Option<bool> {
        let elapsed = now.saturating_duration_since(self.last_tick);
        self.last_tick = now;
        self.snapshot.uptime = now.saturating_duration_since(self.started_at);
        self.accrue(elapsed, machine);

        let activity = match reading.and_then(|event| self.check_monotonic(event)) {
            Ok(event) => Some(self.apply(now, elapsed, event)),
            Err(err) => {
                warn!("Pulse read failed, keeping last values: {}", err);
                self.snapshot.error_count += 1;
                None
            }
        };

        self.roll_peak_window(now);
        activity
    }

    fn apply(&mut self, now: Instant, elapsed: Duration, event: Option<PulseEvent>) -> bool {
        let count = event.map_or(0, |e| e.count);
        let delta = count - self.last_count;
        self.last_count = count;

        let revolutions = delta as f64 / f64::from(self.pulses_per_revolution);
        let minutes = elapsed.as_secs_f64() / 60.0;
        let rpm = if minutes > 0.0 { revolutions / minutes } else { 0.0 };
        let speed_kmh = rpm * self.wheel_circumference_m * 60.0 / 1000.0;

        let snapshot = &mut self.snapshot;
        snapshot.rpm = rpm;
        snapshot.speed_kmh = speed_kmh;
        snapshot.distance_total += revolutions * self.wheel_circumference_m;
        snapshot.calories = snapshot.distance_total / METERS_PER_CALORIE;
        snapshot.pulses_total = count;
        snapshot.peak_rpm = snapshot.peak_rpm.max(rpm);
        snapshot.peak_speed = snapshot.peak_speed.max(speed_kmh);

        match self.disabled_at {
            Some(disabled_at) => event.map_or(false, |e| e.timestamp > disabled_at),
            None => {
                let recent = event.map_or(false, |e| {
                    now.saturating_duration_since(e.timestamp) <= self.active_interval
                });
                delta > 0 || recent
            }
        }
    }

    /// Count an inactivity alarm.
    pub fn record_warning(&mut self) {
        self.snapshot.warning_count += 1;
    }

    /// Count a remote disable made at `at`.
    ///
    /// Pulses recorded up to `at` still add distance but no longer count as
    /// pedaling, so they cannot undo the disable.
    pub fn record_disable(&mut self, at: Instant) {
        self.snapshot.disable_count += 1;
        self.disabled_at = Some(at);
    }

    /// Count failures that happened outside the tick (buzzer, HTTP handlers).
    pub fn record_errors(&mut self, count: u64) {
        self.snapshot.error_count += count;
    }

    /// Mirror the state machine into the snapshot and pick the next interval.
    pub fn sync_state(&mut self, machine: &StateMachine) {
        let update_interval = self.interval_for(machine.service_state());
        if machine.service_state().is_enabled() {
            self.disabled_at = None;
        }
        let snapshot = &mut self.snapshot;
        snapshot.service_state = machine.service_state();
        snapshot.pedal_state = machine.pedal_state();
        snapshot.alarm_active = machine.alarm_active();
        snapshot.update_interval = update_interval;
        snapshot.timestamp = chrono::Utc::now().timestamp_millis().max(0) as u64;
    }

    /// Tick interval for the given service state.
    pub fn interval_for(&self, service: ServiceState) -> Duration {
        match service {
            ServiceState::Active => self.active_interval,
            ServiceState::Disabled => self.disabled_interval,
        }
    }

    pub fn snapshot(&self) -> &MetricsSnapshot {
        &self.snapshot
    }

    fn check_monotonic(&self, event: Option<PulseEvent>) -> Result<Option<PulseEvent>> {
        let count = event.map_or(0, |e| e.count);
        if count < self.last_count {
            return Err(BikeError::sensor_error(format!(
                "pulse count went backwards ({} -> {})",
                self.last_count, count
            )));
        }
        Ok(event)
    }

    fn accrue(&mut self, elapsed: Duration, machine: &StateMachine) {
        let snapshot = &mut self.snapshot;
        if machine.pedal_state().is_pedaling() {
            snapshot.pedaling_time += elapsed;
        } else {
            snapshot.idle_time += elapsed;
        }
        if machine.alarm_active() {
            snapshot.warning_time += elapsed;
        }
    }

    // Windows are aligned to startup, not to activity.
    fn roll_peak_window(&mut self, now: Instant) {
        let open_for = now.saturating_duration_since(self.peak_window_start);
        if open_for < self.peak_reset_interval {
            return;
        }

        let into_window = open_for.as_nanos() % self.peak_reset_interval.as_nanos();
        self.peak_window_start = now - Duration::from_nanos(into_window as u64);
        self.snapshot.peak_rpm = 0.0;
        self.snapshot.peak_speed = 0.0;
        debug!("Peak window rolled over");
    }
}
