//! Buzzer warning patterns played off the aggregation task.
//!
//! [`WarningDriver::beep`] only queues a pattern; a blocking worker owns the
//! buzzer and plays patterns one after another, so the tick loop never waits
//! on the `sleep` between tone changes.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// An audible warning pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BeepPattern {
    /// One 100 ms beep
    Short,
    /// One 500 ms beep
    Long,
    /// Repeated short beeps separated by 100 ms of silence
    Multi(u8),
}

impl BeepPattern {
    pub const SHORT_BEEP: Duration = Duration::from_millis(100);
    pub const LONG_BEEP: Duration = Duration::from_millis(500);
    pub const GAP: Duration = Duration::from_millis(100);

    /// Tone on/off schedule for this pattern.
    pub fn steps(&self) -> Vec<(bool, Duration)> {
        match *self {
            BeepPattern::Short => vec![(true, Self::SHORT_BEEP)],
            BeepPattern::Long => vec![(true, Self::LONG_BEEP)],
            BeepPattern::Multi(repeats) => {
                let mut steps = Vec::with_capacity(usize::from(repeats) * 2);
                for i in 0..repeats {
                    if i > 0 {
                        steps.push((false, Self::GAP));
                    }
                    steps.push((true, Self::SHORT_BEEP));
                }
                steps
            }
        }
    }

    /// How long the pattern takes to play.
    pub fn duration(&self) -> Duration {
        self.steps().iter().map(|(_, d)| *d).sum()
    }
}

/// A tone output the warning worker can switch on and off.
pub trait Buzzer: Send {
    /// Start (`true`) or stop (`false`) the tone.
    fn set_tone(&mut self, on: bool) -> Result<()>;
}

/// Buzzer used when no buzzer hardware is attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullBuzzer;

impl Buzzer for NullBuzzer {
    fn set_tone(&mut self, on: bool) -> Result<()> {
        debug!("Buzzer tone {}", if on { "on" } else { "off" });
        Ok(())
    }
}

/// Play `pattern` on `buzzer`, blocking the calling thread.
///
/// `keep_playing` is checked before every step; returning `false` cuts the
/// pattern short. The tone is always switched off afterwards.
pub fn play(
    buzzer: &mut dyn Buzzer,
    pattern: BeepPattern,
    keep_playing: impl Fn() -> bool,
) -> Result<()> {
    let mut outcome = Ok(());
    for (on, duration) in pattern.steps() {
        if !keep_playing() {
            break;
        }
        if let Err(err) = buzzer.set_tone(on) {
            outcome = Err(err);
            break;
        }
        thread::sleep(duration);
    }

    let silenced = buzzer.set_tone(false);
    outcome.and(silenced)
}

/// Queues beep patterns for a dedicated buzzer worker.
#[derive(Debug)]
pub struct WarningDriver {
    queue: mpsc::UnboundedSender<(u64, BeepPattern)>,
    generation: Arc<AtomicU64>,
    faults: Arc<AtomicU64>,
    worker: JoinHandle<()>,
}

impl WarningDriver {
    /// Move `buzzer` onto a blocking worker. Must be called inside a tokio runtime.
    pub fn spawn(mut buzzer: Box<dyn Buzzer>) -> Self {
        let (queue, mut patterns) = mpsc::unbounded_channel::<(u64, BeepPattern)>();
        let generation = Arc::new(AtomicU64::new(0));
        let faults = Arc::new(AtomicU64::new(0));

        let worker_generation = Arc::clone(&generation);
        let worker_faults = Arc::clone(&faults);
        let worker = tokio::task::spawn_blocking(move || {
            while let Some((queued_at, pattern)) = patterns.blocking_recv() {
                let current = || worker_generation.load(Ordering::Acquire) == queued_at;
                if !current() {
                    debug!("Dropping silenced {:?} beep", pattern);
                    continue;
                }
                if let Err(err) = play(buzzer.as_mut(), pattern, current) {
                    error!("Failed to play {:?} beep: {}", pattern, err);
                    worker_faults.fetch_add(1, Ordering::Relaxed);
                }
            }
            if let Err(err) = buzzer.set_tone(false) {
                warn!("Failed to switch buzzer off on shutdown: {}", err);
            }
            debug!("Warning worker stopped");
        });

        Self {
            queue,
            generation,
            faults,
            worker,
        }
    }

    /// Queue `pattern` without waiting for it to play.
    pub fn beep(&self, pattern: BeepPattern) {
        let generation = self.generation.load(Ordering::Acquire);
        if self.queue.send((generation, pattern)).is_err() {
            warn!("Warning worker is gone, dropping {:?} beep", pattern);
            self.faults.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Drop every queued pattern and cut the one playing short.
    pub fn silence(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    /// Buzzer failures since the last call.
    pub fn take_faults(&self) -> u64 {
        self.faults.swap(0, Ordering::Relaxed)
    }

    /// Stop accepting patterns and wait for the worker to switch the buzzer off.
    pub async fn shutdown(self) {
        self.silence();
        let WarningDriver { queue, worker, .. } = self;
        drop(queue);
        if let Err(err) = worker.await {
            warn!("Warning worker ended abnormally: {}", err);
        }
    }
}
