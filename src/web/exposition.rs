//! Prometheus text exposition of a [`MetricsSnapshot`].

use crate::error::Result;
use crate::metrics::MetricsSnapshot;
use prometheus::{Counter, Encoder, Gauge, IntCounter, IntGauge, Registry, TextEncoder};

/// Prometheus registry mirroring the ride metrics.
///
/// Counters only ever move forward by the difference to the snapshot, which
/// is fine because every counted field in the snapshot is monotonic.
pub struct MetricsExporter {
    registry: Registry,

    rpm: Gauge,
    speed_kmh: Gauge,
    distance_meters: Gauge,
    calories: Gauge,
    peak_rpm: Gauge,
    peak_speed_kmh: Gauge,
    uptime_seconds: Gauge,
    update_interval_seconds: Gauge,
    alarm_state: IntGauge,
    service_enabled: IntGauge,
    pedaling: IntGauge,

    pulses_total: IntCounter,
    warnings_total: IntCounter,
    disables_total: IntCounter,
    errors_total: IntCounter,
    pedaling_seconds_total: Counter,
    idle_seconds_total: Counter,
    warning_seconds_total: Counter,
}

impl MetricsExporter {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let rpm = Gauge::new("bike_rpm", "Revolutions per minute")?;
        let speed_kmh = Gauge::new("bike_speed_kmh", "Current speed (km/h)")?;
        let distance_meters = Gauge::new(
            "bike_distance_meters",
            "Total distance traveled (meters)",
        )?;
        let calories = Gauge::new("bike_calories", "Total estimated calories burned")?;
        let peak_rpm = Gauge::new("bike_peak_rpm", "Peak RPM in the current window")?;
        let peak_speed_kmh = Gauge::new(
            "bike_peak_speed_kmh",
            "Peak speed in the current window (km/h)",
        )?;
        let uptime_seconds = Gauge::new("bike_uptime_seconds", "Monitor uptime (seconds)")?;
        let update_interval_seconds = Gauge::new(
            "bike_update_interval_seconds",
            "Current tick interval (seconds)",
        )?;
        let alarm_state = IntGauge::new("bike_alarm_state", "Alarm state (0=off,1=on)")?;
        let service_enabled = IntGauge::new(
            "bike_service_enabled",
            "Service state (0=off,1=on)",
        )?;
        let pedaling = IntGauge::new("bike_pedaling", "Pedal state (0=idle,1=pedaling)")?;

        let pulses_total = IntCounter::new("bike_pulses_total", "Sensor pulses counted")?;
        let warnings_total = IntCounter::new(
            "bike_warnings_total",
            "Inactivity warnings raised",
        )?;
        let disables_total = IntCounter::new(
            "bike_disables_total",
            "Times the service was disabled remotely",
        )?;
        let errors_total = IntCounter::new(
            "bike_errors_total",
            "Sensor, buzzer and handler errors",
        )?;
        let pedaling_seconds_total = Counter::new(
            "bike_pedaling_seconds_total",
            "Time spent pedaling (seconds)",
        )?;
        let idle_seconds_total = Counter::new(
            "bike_idle_seconds_total",
            "Time spent idle (seconds)",
        )?;
        let warning_seconds_total = Counter::new(
            "bike_warning_seconds_total",
            "Time spent with the inactivity alarm raised (seconds)",
        )?;

        registry.register(Box::new(rpm.clone()))?;
        registry.register(Box::new(speed_kmh.clone()))?;
        registry.register(Box::new(distance_meters.clone()))?;
        registry.register(Box::new(calories.clone()))?;
        registry.register(Box::new(peak_rpm.clone()))?;
        registry.register(Box::new(peak_speed_kmh.clone()))?;
        registry.register(Box::new(uptime_seconds.clone()))?;
        registry.register(Box::new(update_interval_seconds.clone()))?;
        registry.register(Box::new(alarm_state.clone()))?;
        registry.register(Box::new(service_enabled.clone()))?;
        registry.register(Box::new(pedaling.clone()))?;
        registry.register(Box::new(pulses_total.clone()))?;
        registry.register(Box::new(warnings_total.clone()))?;
        registry.register(Box::new(disables_total.clone()))?;
        registry.register(Box::new(errors_total.clone()))?;
        registry.register(Box::new(pedaling_seconds_total.clone()))?;
        registry.register(Box::new(idle_seconds_total.clone()))?;
        registry.register(Box::new(warning_seconds_total.clone()))?;

        Ok(Self {
            registry,
            rpm,
            speed_kmh,
            distance_meters,
            calories,
            peak_rpm,
            peak_speed_kmh,
            uptime_seconds,
            update_interval_seconds,
            alarm_state,
            service_enabled,
            pedaling,
            pulses_total,
            warnings_total,
            disables_total,
            errors_total,
            pedaling_seconds_total,
            idle_seconds_total,
            warning_seconds_total,
        })
    }

    /// Content type of [`MetricsExporter::render`] output.
    pub fn content_type(&self) -> String {
        TextEncoder::new().format_type().to_string()
    }

    /// Load `snapshot` into the registry and encode it.
    pub fn render(&self, snapshot: &MetricsSnapshot) -> Result<String> {
        self.rpm.set(snapshot.rpm);
        self.speed_kmh.set(snapshot.speed_kmh);
        self.distance_meters.set(snapshot.distance_total);
        self.calories.set(snapshot.calories);
        self.peak_rpm.set(snapshot.peak_rpm);
        self.peak_speed_kmh.set(snapshot.peak_speed);
        self.uptime_seconds.set(snapshot.uptime.as_secs_f64());
        self.update_interval_seconds
            .set(snapshot.update_interval.as_secs_f64());
        self.alarm_state.set(i64::from(snapshot.alarm_active));
        self.service_enabled
            .set(i64::from(snapshot.service_state.is_enabled()));
        self.pedaling
            .set(i64::from(snapshot.pedal_state.is_pedaling()));

        advance_int(&self.pulses_total, snapshot.pulses_total);
        advance_int(&self.warnings_total, snapshot.warning_count);
        advance_int(&self.disables_total, snapshot.disable_count);
        advance_int(&self.errors_total, snapshot.error_count);
        advance(&self.pedaling_seconds_total, snapshot.pedaling_time.as_secs_f64());
        advance(&self.idle_seconds_total, snapshot.idle_time.as_secs_f64());
        advance(&self.warning_seconds_total, snapshot.warning_time.as_secs_f64());

        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer)
            .map_err(|e| crate::error::BikeError::metrics_error(e.to_string()))
    }
}

fn advance_int(counter: &IntCounter, value: u64) {
    let current = counter.get();
    if value > current {
        counter.inc_by(value - current);
    }
}

fn advance(counter: &Counter, value: f64) {
    let current = counter.get();
    if value > current {
        counter.inc_by(value - current);
    }
}
