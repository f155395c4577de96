use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use futures_util::future::join_all;
use pedal_pi::{
    error::BikeError,
    metrics::{MonitorState, PedalState, ServiceState, Transition},
    web::{create_control_app, create_metrics_app, MetricsState, ServiceAck},
    BeepPattern, Monitor, MonitorConfig, NullBuzzer, PulseCounter, PulseEvent, WarningDriver,
    WebConfig,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower::ServiceExt;

const SECOND: Duration = Duration::from_secs(1);

fn pulse(count: u64, timestamp: Instant) -> pedal_pi::Result<Option<PulseEvent>> {
    Ok(Some(PulseEvent { count, timestamp }))
}

fn metric(body: &str, name: &str) -> f64 {
    body.lines()
        .find_map(|line| line.strip_prefix(&format!("{} ", name)))
        .and_then(|value| value.parse().ok())
        .unwrap_or_else(|| panic!("metric {} missing from:\n{}", name, body))
}

async fn get(app: Router, uri: &str) -> (StatusCode, String) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

/// Distance never decreases and calories track it exactly, whatever the pulses do
#[test]
fn test_distance_monotonic_and_calories_ratio() {
    let start = Instant::now();
    let config = MonitorConfig::default().with_pulses_per_revolution(2);
    let mut state = MonitorState::new(&config, start);

    // Bursts, gaps and a failed read.
    let deltas = [0u64, 3, 7, 0, 0, 1, 12, 0, 5, 2, 0, 0, 0, 9];
    let mut count = 0;
    let mut last_pulse = None;
    let mut last_distance = 0.0;

    for (i, delta) in deltas.iter().enumerate() {
        let now = start + (i as u32 + 1) * SECOND;
        count += delta;
        if *delta > 0 {
            last_pulse = Some(now);
        }

        let reading = if i == 10 {
            Err(BikeError::sensor_error("transient read failure"))
        } else {
            Ok(last_pulse.map(|timestamp| PulseEvent { count, timestamp }))
        };
        state.tick(now, reading);

        let snapshot = state.snapshot();
        assert!(snapshot.distance_total >= last_distance);
        assert!((snapshot.calories - snapshot.distance_total / 10.0).abs() < 1e-9);
        last_distance = snapshot.distance_total;
    }

    let total_revolutions = deltas.iter().sum::<u64>() as f64 / 2.0;
    assert!((last_distance - total_revolutions * 2.1).abs() < 1e-9);
    assert_eq!(state.snapshot().error_count, 1);
}

/// Peaks drop to zero on every five minute boundary, even mid-ride
#[test]
fn test_peaks_reset_every_five_minutes() {
    let start = Instant::now();
    let mut state = MonitorState::new(&MonitorConfig::default(), start);

    for second in 1..=900u32 {
        let now = start + second * SECOND;
        state.tick(now, pulse(u64::from(second), now));

        let snapshot = state.snapshot();
        if second % 300 == 0 {
            assert_eq!(snapshot.peak_rpm, 0.0, "peak not reset at {}s", second);
            assert_eq!(snapshot.peak_speed, 0.0);
        } else {
            assert!(snapshot.peak_rpm > 0.0, "peak missing at {}s", second);
        }
    }
}

/// A single gap raises a single long beep
#[test]
fn test_gap_triggers_one_long_beep() {
    let start = Instant::now();
    let mut state = MonitorState::new(&MonitorConfig::default(), start);

    let mut beeps = Vec::new();
    let mut count = 0;
    for second in 1..=20u32 {
        let now = start + second * SECOND;
        // Pedal for 5 seconds, stop for 10, pedal again.
        if !(6..=15).contains(&second) {
            count += 1;
        }
        let reading = if count > 0 {
            let last = if (6..=15).contains(&second) {
                start + 5 * SECOND
            } else {
                now
            };
            pulse(count, last)
        } else {
            Ok(None)
        };
        if let Some(pattern) = state.tick(now, reading).and_then(|t| t.warning()) {
            beeps.push(pattern);
        }
    }

    assert_eq!(
        beeps,
        vec![BeepPattern::Short, BeepPattern::Long, BeepPattern::Short]
    );
    assert_eq!(state.snapshot().warning_count, 1);
    assert_eq!(state.snapshot().pedal_state, PedalState::Pedaling);
    assert!(state.snapshot().warning_time >= 8 * SECOND);
}

/// Disable slows the tick down; the next pulse restores it
#[test]
fn test_disable_then_resume_intervals() {
    let start = Instant::now();
    let mut state = MonitorState::new(&MonitorConfig::default(), start);

    assert_eq!(state.disable(start), Some(Transition::Disabled));
    assert_eq!(state.tick_interval(), 5 * SECOND);

    let quiet = start + 5 * SECOND;
    assert_eq!(state.tick(quiet, Ok(None)), None);
    assert_eq!(state.service_state(), ServiceState::Disabled);

    let now = start + 10 * SECOND;
    assert_eq!(
        state.tick(now, pulse(1, now)),
        Some(Transition::StartedPedaling {
            resumed_service: true
        })
    );
    assert_eq!(state.tick_interval(), SECOND);
    assert_eq!(state.snapshot().disable_count, 1);
}

/// A pulse that landed just before the disable does not undo it
#[test]
fn test_disable_mid_ride_holds_until_next_pulse() {
    let start = Instant::now();
    let mut state = MonitorState::new(&MonitorConfig::default(), start);

    let t1 = start + SECOND;
    state.tick(t1, pulse(1, t1));
    assert_eq!(state.service_state(), ServiceState::Active);

    // Rider keeps pedaling; the disable arrives mid-tick.
    let disabled_at = t1 + Duration::from_millis(500);
    assert_eq!(state.disable(disabled_at), Some(Transition::Disabled));

    let next = t1 + SECOND;
    let transition = state.tick(next, pulse(2, t1 + Duration::from_millis(400)));
    assert_eq!(transition, None);
    assert_eq!(state.service_state(), ServiceState::Disabled);
    assert_eq!(state.tick_interval(), 5 * SECOND);
    assert!((state.snapshot().distance_total - 2.0 * 2.1).abs() < 1e-9);

    // The first pulse after the disable brings the service back.
    let resumed = next + 5 * SECOND;
    assert_eq!(
        state.tick(resumed, pulse(3, resumed - Duration::from_millis(200))),
        Some(Transition::StartedPedaling {
            resumed_service: true
        })
    );
    assert_eq!(state.service_state(), ServiceState::Active);
    assert_eq!(state.tick_interval(), SECOND);
}

/// Scrapes racing the disable route always see a self-consistent snapshot
#[tokio::test]
async fn test_metrics_consistent_under_concurrent_disable() {
    let counter = Arc::new(PulseCounter::new(Duration::ZERO));
    let warnings = WarningDriver::spawn(Box::new(NullBuzzer));
    let monitor = Arc::new(
        Monitor::new(&MonitorConfig::default(), counter.clone(), warnings).unwrap(),
    );

    let metrics_app = create_metrics_app(MetricsState::new(monitor.clone()).unwrap());
    let control_app = create_control_app(monitor.clone());

    let mut scrapes = Vec::new();
    let mut disables = Vec::new();
    for _ in 0..20 {
        counter.record_pulse();
        monitor.tick().await;

        scrapes.push(tokio::spawn(get(metrics_app.clone(), "/metrics")));
        disables.push(tokio::spawn(get(control_app.clone(), "/service")));
    }

    for result in join_all(disables).await {
        let (status, body) = result.unwrap();
        assert_eq!(status, StatusCode::OK);
        let ack: ServiceAck = serde_json::from_str(&body).unwrap();
        assert!(!ack.service_enabled);
    }

    for result in join_all(scrapes).await {
        let (status, body) = result.unwrap();
        assert_eq!(status, StatusCode::OK);

        let distance = metric(&body, "bike_distance_meters");
        let calories = metric(&body, "bike_calories");
        assert!((calories - distance / 10.0).abs() < 1e-9);

        let enabled = metric(&body, "bike_service_enabled");
        let interval = metric(&body, "bike_update_interval_seconds");
        if enabled == 1.0 {
            assert_eq!(interval, 1.0);
        } else {
            assert_eq!(interval, 5.0);
        }
    }
}

/// Disable through HTTP counts once and the JSON snapshot reflects it
#[tokio::test]
async fn test_service_route_updates_snapshot() {
    let counter = Arc::new(PulseCounter::new(Duration::ZERO));
    let warnings = WarningDriver::spawn(Box::new(NullBuzzer));
    let monitor = Arc::new(
        Monitor::new(&MonitorConfig::default(), counter.clone(), warnings).unwrap(),
    );

    let (status, _) = get(create_control_app(monitor.clone()), "/service").await;
    assert_eq!(status, StatusCode::OK);

    let metrics_app = create_metrics_app(MetricsState::new(monitor.clone()).unwrap());
    let (status, body) = get(metrics_app.clone(), "/api/snapshot").await;
    assert_eq!(status, StatusCode::OK);
    let snapshot: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(snapshot["service_state"], "disabled");
    assert_eq!(snapshot["disable_count"], 1);
    assert_eq!(snapshot["update_interval"], 5.0);

    // Pedaling again re-enables the service.
    counter.record_pulse();
    assert!(monitor.tick().await.is_some());
    let (_, body) = get(metrics_app.clone(), "/metrics").await;
    assert_eq!(metric(&body, "bike_service_enabled"), 1.0);
    assert_eq!(metric(&body, "bike_pulses_total"), 1.0);

    let (status, body) = get(metrics_app, "/api/health").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("\"status\":\"ok\""));
}

/// The tick loop runs on its own and picks up pulses
#[tokio::test]
async fn test_tick_loop_detects_pedaling_and_idle() {
    let config = MonitorConfig::default().with_intervals(
        Duration::from_millis(20),
        Duration::from_millis(100),
    );
    let counter = Arc::new(PulseCounter::new(Duration::ZERO));
    let warnings = WarningDriver::spawn(Box::new(NullBuzzer));
    let monitor = Arc::new(Monitor::new(&config, counter.clone(), warnings).unwrap());
    let ticker = monitor.clone().spawn();

    for _ in 0..20 {
        counter.record_pulse();
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    tokio::time::sleep(Duration::from_millis(30)).await;
    let riding = monitor.snapshot().await;
    assert!(riding.pulses_total > 0);
    assert!(riding.distance_total > 0.0);

    tokio::time::sleep(Duration::from_millis(200)).await;
    let stopped = monitor.snapshot().await;
    assert_eq!(stopped.pedal_state, PedalState::Idle);
    assert_eq!(stopped.warning_count, 1);
    assert!(stopped.alarm_active);

    ticker.abort();
}

/// Test MonitorConfig validation
#[test]
fn test_monitor_config_validation() {
    tokio_test::assert_ok!(MonitorConfig::default().validate());
    tokio_test::assert_ok!(MonitorConfig::default()
        .with_wheel_circumference(0.7)
        .with_pulses_per_revolution(4)
        .validate());
    tokio_test::assert_err!(MonitorConfig::default()
        .with_intervals(Duration::ZERO, 5 * SECOND)
        .validate());
    tokio_test::assert_err!(MonitorConfig::default()
        .with_peak_reset_interval(Duration::ZERO)
        .validate());
}

/// Test WebConfig builder pattern
#[test]
fn test_web_config() {
    let config = WebConfig::default()
        .with_host("127.0.0.1")
        .with_metrics_port(9100)
        .with_control_port(9101);

    assert_eq!(config.metrics_address(), "127.0.0.1:9100");
    assert_eq!(config.control_address(), "127.0.0.1:9101");
    assert_eq!(WebConfig::default().metrics_port, 8000);
    assert_eq!(WebConfig::default().control_port, 5000);
}

/// Test BikeError creation and formatting
#[test]
fn test_bike_error_types() {
    let sensor = BikeError::sensor_error("no edges");
    assert!(format!("{}", sensor).contains("no edges"));

    let gpio = BikeError::gpio_error("pin busy");
    assert!(format!("{}", gpio).contains("pin busy"));

    let web = BikeError::web_server_error("bind failed");
    assert!(format!("{}", web).contains("bind failed"));

    let config = BikeError::config_error("bad wheel");
    assert!(format!("{}", config).contains("bad wheel"));

    let metrics = BikeError::metrics_error("encode failed");
    assert!(format!("{}", metrics).contains("encode failed"));
}
