//! The ride monitor: aggregation, state and warnings behind one lock.

use crate::config::MonitorConfig;
use crate::error::Result;
use crate::metrics::aggregator::MetricsAggregator;
use crate::metrics::data::{MetricsSnapshot, ServiceState};
use crate::metrics::state::{StateMachine, Transition};
use crate::sensor::{PulseEvent, PulseSource};
use crate::warning::{BeepPattern, WarningDriver};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Notify, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Aggregator and state machine, mutated together.
#[derive(Debug, Clone)]
pub struct MonitorState {
    aggregator: MetricsAggregator,
    machine: StateMachine,
}

impl MonitorState {
    pub fn new(config: &MonitorConfig, now: Instant) -> Self {
        let machine = StateMachine::new();
        let mut aggregator = MetricsAggregator::new(config, now);
        aggregator.sync_state(&machine);
        Self {
            aggregator,
            machine,
        }
    }

    /// Run one tick against a sensor reading.
    pub fn tick(
        &mut self,
        now: Instant,
        reading: Result<Option<PulseEvent>>,
    ) -> Option<Transition> {
        let transition = self
            .aggregator
            .ingest(now, reading, &self.machine)
            .and_then(|pulse_seen| self.machine.observe(pulse_seen));

        if transition == Some(Transition::WentIdle) {
            self.aggregator.record_warning();
        }
        self.aggregator.sync_state(&self.machine);
        transition
    }

    /// Disable the service at `now`. `None` if it was already disabled.
    pub fn disable(&mut self, now: Instant) -> Option<Transition> {
        let transition = self.machine.disable();
        if transition.is_some() {
            self.aggregator.record_disable(now);
        }
        self.aggregator.sync_state(&self.machine);
        transition
    }

    pub fn record_errors(&mut self, count: u64) {
        self.aggregator.record_errors(count);
    }

    pub fn snapshot(&self) -> &MetricsSnapshot {
        self.aggregator.snapshot()
    }

    pub fn service_state(&self) -> ServiceState {
        self.machine.service_state()
    }

    /// How long to wait before the next tick.
    pub fn tick_interval(&self) -> Duration {
        self.aggregator.interval_for(self.machine.service_state())
    }
}

/// Shared handle to the running monitor.
///
/// The tick loop and the control route take the write lock; readers clone
/// the snapshot under the read lock, so they never see a half-applied tick.
pub struct Monitor {
    state: RwLock<MonitorState>,
    source: Arc<dyn PulseSource>,
    warnings: WarningDriver,
    // Wakes the tick loop when the interval changes outside a tick.
    rearm: Notify,
}

impl Monitor {
    /// Build a monitor reading from `source` and beeping through `warnings`.
    pub fn new(
        config: &MonitorConfig,
        source: Arc<dyn PulseSource>,
        warnings: WarningDriver,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            state: RwLock::new(MonitorState::new(config, Instant::now())),
            source,
            warnings,
            rearm: Notify::new(),
        })
    }

    /// Copy of the current metrics.
    pub async fn snapshot(&self) -> MetricsSnapshot {
        self.state.read().await.snapshot().clone()
    }

    pub async fn service_state(&self) -> ServiceState {
        self.state.read().await.service_state()
    }

    pub async fn tick_interval(&self) -> Duration {
        self.state.read().await.tick_interval()
    }

    /// Read the sensor and advance the state by one tick.
    pub async fn tick(&self) -> Option<Transition> {
        let transition = {
            let mut state = self.state.write().await;
            let faults = self.warnings.take_faults();
            if faults > 0 {
                state.record_errors(faults);
            }
            let reading = self.source.latest();
            state.tick(Instant::now(), reading)
        };

        if let Some(transition) = transition {
            self.announce(transition);
        }
        transition
    }

    /// Disable the service. Returns `true` if this call changed the state.
    pub async fn disable(&self) -> bool {
        let transition = self.state.write().await.disable(Instant::now());
        match transition {
            Some(transition) => {
                self.announce(transition);
                self.rearm.notify_one();
                true
            }
            None => {
                debug!("Service already disabled");
                false
            }
        }
    }

    /// Count a failure that happened outside the tick loop.
    pub async fn record_error(&self) {
        self.state.write().await.record_errors(1);
    }

    /// Play a pattern that is not tied to a transition.
    pub fn chime(&self, pattern: BeepPattern) {
        self.warnings.beep(pattern);
    }

    /// Tick forever, re-reading the interval after every tick.
    ///
    /// A disable cuts the current sleep short and restarts it with the
    /// disabled interval.
    pub async fn run(&self) {
        info!("Pulse aggregation loop started");
        loop {
            let interval = self.tick_interval().await;
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    self.tick().await;
                }
                _ = self.rearm.notified() => {
                    debug!("Tick interval changed, re-arming");
                }
            }
        }
    }

    /// Run the tick loop on its own task.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }

    /// Drop queued warnings and cut the current one short.
    pub fn silence(&self) {
        self.warnings.silence();
    }

    /// Silence the buzzer and stop its worker.
    pub async fn shutdown(self) {
        self.warnings.shutdown().await;
    }

    fn announce(&self, transition: Transition) {
        match transition {
            Transition::StartedPedaling { resumed_service } => {
                if resumed_service {
                    info!("Pedaling resumed, service re-enabled");
                } else {
                    info!("Pedaling started");
                }
            }
            Transition::WentIdle => info!("Pedaling stopped, raising inactivity warning"),
            Transition::Disabled => {
                info!("Service disabled, warnings silenced");
                self.warnings.silence();
            }
        }
        if let Some(pattern) = transition.warning() {
            self.warnings.beep(pattern);
        }
    }
}
