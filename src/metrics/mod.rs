//! Ride metrics: data structures, aggregation and the pedaling state machine.
//!
//! This module turns raw hall-sensor pulses into cadence, speed, distance
//! and calorie figures, tracks whether the rider is pedaling, and owns the
//! shared [`Monitor`] that the HTTP endpoints read from.

pub mod aggregator;
pub mod data;
pub mod monitor;
pub mod state;

// Re-export commonly used items
pub use aggregator::MetricsAggregator;
pub use data::{MetricsSnapshot, PedalState, ServiceState};
pub use monitor::{Monitor, MonitorState};
pub use state::{StateMachine, Transition};
