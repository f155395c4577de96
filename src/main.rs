//! Pedal Pi - Bicycle Ride Monitor Binary
//!
//! A standalone daemon that counts hall-sensor pulses, serves Prometheus
//! metrics and drives a buzzer warning when the rider stops pedaling.

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use pedal_pi::{
    gpio::{self, HallSensor, PwmBuzzer},
    start_web_servers, BeepPattern, Buzzer, Monitor, MonitorConfig, NullBuzzer, PulseCounter,
    PulseSource, SimulatedPedal, WarningDriver, WebConfig, DEFAULT_ACTIVE_INTERVAL_MS,
    DEFAULT_BUZZER_PIN, DEFAULT_CONTROL_PORT, DEFAULT_DEBOUNCE_MS, DEFAULT_DISABLED_INTERVAL_MS,
    DEFAULT_METRICS_PORT, DEFAULT_PEAK_RESET_SECS, DEFAULT_PULSES_PER_REVOLUTION,
    DEFAULT_SENSOR_PIN, DEFAULT_WHEEL_CIRCUMFERENCE_M,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "pedal_pi")]
#[command(about = "🚲 Pedal Pi - Bicycle Ride Monitor")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = "Austin Couch")]
#[command(long_about = "Counts hall-sensor pulses, exports ride metrics to Prometheus and beeps when you stop pedaling")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Web server bind address
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Port serving /metrics
    #[arg(long, default_value_t = DEFAULT_METRICS_PORT)]
    metrics_port: u16,

    /// Port serving /service
    #[arg(long, default_value_t = DEFAULT_CONTROL_PORT)]
    control_port: u16,

    #[command(flatten)]
    hardware: HardwareArgs,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Args)]
struct HardwareArgs {
    /// BCM pin wired to the hall sensor
    #[arg(long, default_value_t = DEFAULT_SENSOR_PIN)]
    sensor_pin: u8,

    /// BCM pin wired to the buzzer
    #[arg(long, default_value_t = DEFAULT_BUZZER_PIN)]
    buzzer_pin: u8,

    /// Wheel circumference in meters
    #[arg(long, default_value_t = DEFAULT_WHEEL_CIRCUMFERENCE_M)]
    wheel_circumference: f64,

    /// Sensor pulses per wheel revolution
    #[arg(long, default_value_t = DEFAULT_PULSES_PER_REVOLUTION)]
    pulses_per_rev: u32,

    /// Tick interval while active, in milliseconds
    #[arg(long, default_value_t = DEFAULT_ACTIVE_INTERVAL_MS)]
    active_interval_ms: u64,

    /// Tick interval while disabled, in milliseconds
    #[arg(long, default_value_t = DEFAULT_DISABLED_INTERVAL_MS)]
    disabled_interval_ms: u64,

    /// Peak RPM/speed window in seconds
    #[arg(long, default_value_t = DEFAULT_PEAK_RESET_SECS)]
    peak_reset_secs: u64,

    /// Sensor debounce window in milliseconds
    #[arg(long, default_value_t = DEFAULT_DEBOUNCE_MS)]
    debounce_ms: u64,

    /// Generate pulses at this cadence instead of reading the sensor
    #[arg(long)]
    simulate_rpm: Option<f64>,

    /// Run without a buzzer
    #[arg(long)]
    no_buzzer: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the monitor and both HTTP servers (default)
    Serve,

    /// Sample the sensor for a while, print the metrics and exit
    Snapshot(SnapshotArgs),

    /// Play a buzzer pattern and exit
    Beep(BeepArgs),

    /// Show configuration and compiled features
    Info,
}

#[derive(Args)]
struct SnapshotArgs {
    /// How long to sample, in seconds
    #[arg(short, long, default_value_t = 5)]
    seconds: u64,

    /// Output format: json or pretty
    #[arg(short, long, default_value = "pretty")]
    format: String,
}

#[derive(Args)]
struct BeepArgs {
    /// Pattern to play
    #[arg(value_enum, default_value_t = PatternArg::Short)]
    pattern: PatternArg,

    /// Repeats for the multi pattern
    #[arg(short, long, default_value_t = 3)]
    repeat: u8,
}

#[derive(Clone, Copy, ValueEnum)]
enum PatternArg {
    Short,
    Long,
    Multi,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing/logging
    init_logging(&cli)?;

    match &cli.command {
        Some(Commands::Serve) | None => serve_command(&cli).await,
        Some(Commands::Snapshot(args)) => snapshot_command(&cli, args).await,
        Some(Commands::Beep(args)) => beep_command(&cli, args).await,
        Some(Commands::Info) => {
            info_command(&cli);
            Ok(())
        }
    }
}

fn init_logging(cli: &Cli) -> anyhow::Result<()> {
    let level = if cli.debug {
        Level::DEBUG
    } else if cli.verbose {
        Level::INFO
    } else {
        Level::WARN
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    Ok(())
}

fn monitor_config(args: &HardwareArgs) -> MonitorConfig {
    MonitorConfig::default()
        .with_wheel_circumference(args.wheel_circumference)
        .with_pulses_per_revolution(args.pulses_per_rev)
        .with_intervals(
            Duration::from_millis(args.active_interval_ms),
            Duration::from_millis(args.disabled_interval_ms),
        )
        .with_peak_reset_interval(Duration::from_secs(args.peak_reset_secs))
        .with_debounce(Duration::from_millis(args.debounce_ms))
        .with_pins(args.sensor_pin, args.buzzer_pin)
}

/// Open the hall sensor, or start the simulator when asked to.
fn open_pulse_source(
    args: &HardwareArgs,
    config: &MonitorConfig,
) -> anyhow::Result<Arc<dyn PulseSource>> {
    let counter = Arc::new(PulseCounter::new(config.debounce));

    if let Some(rpm) = args.simulate_rpm {
        SimulatedPedal::new(Arc::clone(&counter), rpm, config.pulses_per_revolution)?.spawn();
        return Ok(counter);
    }

    let sensor = HallSensor::new(config.sensor_pin, counter)
        .with_context(|| format!("failed to open hall sensor on GPIO {}", config.sensor_pin))?;
    Ok(Arc::new(sensor))
}

/// Open the buzzer. Only a simulated ride may run without one.
fn open_buzzer(args: &HardwareArgs, config: &MonitorConfig) -> anyhow::Result<Box<dyn Buzzer>> {
    if args.no_buzzer {
        info!("Buzzer disabled");
        return Ok(Box::new(NullBuzzer));
    }

    match PwmBuzzer::new(config.buzzer_pin) {
        Ok(buzzer) => Ok(Box::new(buzzer)),
        Err(e) if args.simulate_rpm.is_some() => {
            warn!("Buzzer unavailable ({}), continuing silently", e);
            Ok(Box::new(NullBuzzer))
        }
        Err(e) => Err(e)
            .with_context(|| format!("failed to open buzzer on GPIO {}", config.buzzer_pin)),
    }
}

fn build_monitor(args: &HardwareArgs) -> anyhow::Result<(MonitorConfig, Monitor)> {
    let config = monitor_config(args);
    config.validate()?;

    let source = open_pulse_source(args, &config)?;
    let warnings = WarningDriver::spawn(open_buzzer(args, &config)?);
    let monitor = Monitor::new(&config, source, warnings)?;
    Ok((config, monitor))
}

async fn serve_command(cli: &Cli) -> anyhow::Result<()> {
    info!("Starting Pedal Pi ride monitor...");

    let (config, monitor) = build_monitor(&cli.hardware)?;
    let monitor = Arc::new(monitor);

    info!("Monitor configuration:");
    info!("  - Wheel circumference: {} m", config.wheel_circumference_m);
    info!("  - Pulses per revolution: {}", config.pulses_per_revolution);
    info!(
        "  - Tick interval: {:?} active, {:?} disabled",
        config.active_interval, config.disabled_interval
    );
    info!("  - Peak window: {:?}", config.peak_reset_interval);

    let web_config = WebConfig::new(&cli.host, cli.metrics_port, cli.control_port);

    println!(
        "Monitoring pedal sensor... Metrics at :{}/metrics. Service at :{}/service. Press Ctrl+C to exit.",
        web_config.metrics_port, web_config.control_port
    );

    monitor.chime(BeepPattern::Multi(2));
    let ticker = Arc::clone(&monitor).spawn();

    let outcome = tokio::select! {
        result = start_web_servers(web_config, Arc::clone(&monitor)) => {
            result.context("web server stopped")
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for Ctrl+C")?;
            println!("Exiting...");
            Ok(())
        }
    };

    ticker.abort();
    monitor.silence();
    outcome
}

async fn snapshot_command(cli: &Cli, args: &SnapshotArgs) -> anyhow::Result<()> {
    let (_, monitor) = build_monitor(&cli.hardware)?;

    let deadline = tokio::time::Instant::now() + Duration::from_secs(args.seconds);
    while tokio::time::Instant::now() < deadline {
        let interval = monitor.tick_interval().await;
        tokio::time::sleep(interval).await;
        monitor.tick().await;
    }

    let snapshot = monitor.snapshot().await;
    monitor.shutdown().await;

    match args.format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&snapshot)?),
        "pretty" => print_pretty_snapshot(&snapshot),
        other => anyhow::bail!("unknown format '{}', expected json or pretty", other),
    }

    Ok(())
}

async fn beep_command(cli: &Cli, args: &BeepArgs) -> anyhow::Result<()> {
    let config = monitor_config(&cli.hardware);
    let buzzer = PwmBuzzer::new(config.buzzer_pin)
        .with_context(|| format!("failed to open buzzer on GPIO {}", config.buzzer_pin))?;

    let pattern = match args.pattern {
        PatternArg::Short => BeepPattern::Short,
        PatternArg::Long => BeepPattern::Long,
        PatternArg::Multi => BeepPattern::Multi(args.repeat),
    };

    println!("Playing {:?} beep ({:?})", pattern, pattern.duration());
    let driver = WarningDriver::spawn(Box::new(buzzer));
    driver.beep(pattern);
    // Let the pattern finish before shutdown silences the queue.
    tokio::time::sleep(pattern.duration() + Duration::from_millis(50)).await;
    driver.shutdown().await;
    Ok(())
}

fn info_command(cli: &Cli) {
    let config = monitor_config(&cli.hardware);

    println!("🚲 Pedal Pi Configuration");
    println!("========================");
    println!();
    println!("Hardware:");
    println!("  Sensor pin: GPIO {}", config.sensor_pin);
    println!("  Buzzer pin: GPIO {}", config.buzzer_pin);
    println!("  Wheel circumference: {} m", config.wheel_circumference_m);
    println!("  Pulses per revolution: {}", config.pulses_per_revolution);
    println!("  Debounce: {:?}", config.debounce);
    println!();
    println!("Timing:");
    println!("  Active tick: {:?}", config.active_interval);
    println!("  Disabled tick: {:?}", config.disabled_interval);
    println!("  Peak window: {:?}", config.peak_reset_interval);
    println!();
    println!("Endpoints:");
    println!("  Metrics: http://{}:{}/metrics", cli.host, cli.metrics_port);
    println!("  Service: http://{}:{}/service", cli.host, cli.control_port);
    println!();
    println!("Features compiled:");
    if gpio::gpio_available() {
        println!("  - GPIO support: ✓");
    } else {
        println!("  - GPIO support: ✗ (use --simulate-rpm)");
    }

    if let Err(e) = config.validate() {
        println!();
        println!("⚠️  {}", e);
    }
}

fn print_pretty_snapshot(snapshot: &pedal_pi::MetricsSnapshot) {
    println!(
        "🚲 Ride Snapshot ({})",
        chrono::DateTime::from_timestamp_millis(snapshot.timestamp as i64)
            .unwrap_or_default()
            .format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!("==========================================");
    println!();

    println!("⚡ Now:");
    println!("  RPM: {:.1}", snapshot.rpm);
    println!("  Speed: {:.1} km/h", snapshot.speed_kmh);
    println!("  State: {:?} / {}", snapshot.pedal_state, snapshot.service_state.as_str());
    println!();

    println!("📏 Totals:");
    println!("  Distance: {:.2} m", snapshot.distance_total);
    println!("  Calories: {:.1}", snapshot.calories);
    println!("  Pulses: {}", snapshot.pulses_total);
    println!();

    println!("🏔️  Peaks:");
    println!("  RPM: {:.1}", snapshot.peak_rpm);
    println!("  Speed: {:.1} km/h", snapshot.peak_speed);
    println!();

    println!("⏱️  Time:");
    println!("  Uptime: {:.0} s", snapshot.uptime.as_secs_f64());
    println!("  Pedaling: {:.0} s", snapshot.pedaling_time.as_secs_f64());
    println!("  Idle: {:.0} s", snapshot.idle_time.as_secs_f64());
    println!(
        "  Warnings: {} ({:.0} s)",
        snapshot.warning_count,
        snapshot.warning_time.as_secs_f64()
    );
    println!("  Errors: {}", snapshot.error_count);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        use clap::Parser;

        let cli = Cli::try_parse_from(["pedal_pi", "--metrics-port", "9100"]).unwrap();
        assert_eq!(cli.metrics_port, 9100);
    }

    #[test]
    fn test_default_values() {
        use clap::Parser;

        let cli = Cli::try_parse_from(["pedal_pi"]).unwrap();
        assert_eq!(cli.metrics_port, DEFAULT_METRICS_PORT);
        assert_eq!(cli.control_port, DEFAULT_CONTROL_PORT);
        assert_eq!(cli.host, "0.0.0.0");
        assert_eq!(monitor_config(&cli.hardware), MonitorConfig::default());
    }

    #[test]
    fn test_beep_subcommand() {
        use clap::Parser;

        let cli = Cli::try_parse_from(["pedal_pi", "beep", "multi", "--repeat", "4"]).unwrap();
        match cli.command {
            Some(Commands::Beep(args)) => {
                assert!(matches!(args.pattern, PatternArg::Multi));
                assert_eq!(args.repeat, 4);
            }
            _ => panic!("expected beep subcommand"),
        }
    }

    #[tokio::test]
    async fn test_simulated_source_needs_no_gpio() {
        use clap::Parser;

        let cli = Cli::try_parse_from(["pedal_pi", "--simulate-rpm", "90", "--no-buzzer"]).unwrap();
        let (_, monitor) = build_monitor(&cli.hardware).unwrap();
        monitor.shutdown().await;
    }
}
