//! Pedaling / idle / disabled state machine.

use crate::metrics::data::{PedalState, ServiceState};
use crate::warning::BeepPattern;

/// A state change worth announcing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// A pulse arrived while idle or disabled
    StartedPedaling {
        /// The pulse also re-enabled a disabled service
        resumed_service: bool,
    },
    /// Active rider stopped pulsing for longer than one tick window
    WentIdle,
    /// Service was disabled remotely
    Disabled,
}

impl Transition {
    /// The buzzer pattern this transition should play, if any.
    pub fn warning(&self) -> Option<BeepPattern> {
        match self {
            Transition::StartedPedaling { .. } => Some(BeepPattern::Short),
            Transition::WentIdle => Some(BeepPattern::Long),
            Transition::Disabled => None,
        }
    }
}

/// Tracks service and pedal state across ticks.
///
/// Starts Active/Idle with the alarm lowered, so booting next to a parked
/// bike is silent.
#[derive(Debug, Clone, Default)]
pub struct StateMachine {
    service: ServiceState,
    pedal: PedalState,
    alarm: bool,
}

impl StateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one tick's pulse activity into the state.
    pub fn observe(&mut self, pulse_seen: bool) -> Option<Transition> {
        match (self.service, self.pedal, pulse_seen) {
            (ServiceState::Active, PedalState::Pedaling, true) => None,
            (service, _, true) => {
                self.service = ServiceState::Active;
                self.pedal = PedalState::Pedaling;
                self.alarm = false;
                Some(Transition::StartedPedaling {
                    resumed_service: service == ServiceState::Disabled,
                })
            }
            (ServiceState::Active, PedalState::Pedaling, false) => {
                self.pedal = PedalState::Idle;
                self.alarm = true;
                Some(Transition::WentIdle)
            }
            (_, _, false) => None,
        }
    }

    /// Handle a remote disable request. `None` if already disabled.
    pub fn disable(&mut self) -> Option<Transition> {
        match self.service {
            ServiceState::Active => {
                self.service = ServiceState::Disabled;
                self.pedal = PedalState::Idle;
                self.alarm = false;
                Some(Transition::Disabled)
            }
            ServiceState::Disabled => None,
        }
    }

    pub fn service_state(&self) -> ServiceState {
        self.service
    }

    pub fn pedal_state(&self) -> PedalState {
        self.pedal
    }

    /// Whether the inactivity alarm is raised.
    pub fn alarm_active(&self) -> bool {
        self.alarm
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boot_is_silent() {
        let mut machine = StateMachine::new();
        assert_eq!(machine.observe(false), None);
        assert_eq!(machine.service_state(), ServiceState::Active);
        assert_eq!(machine.pedal_state(), PedalState::Idle);
        assert!(!machine.alarm_active());
    }

    #[test]
    fn test_pedaling_then_idle_raises_one_alarm() {
        let mut machine = StateMachine::new();
        assert_eq!(
            machine.observe(true),
            Some(Transition::StartedPedaling {
                resumed_service: false
            })
        );
        assert_eq!(machine.observe(true), None);

        assert_eq!(machine.observe(false), Some(Transition::WentIdle));
        assert!(machine.alarm_active());

        // Staying idle does not re-trigger the alarm.
        assert_eq!(machine.observe(false), None);
        assert_eq!(machine.observe(false), None);
        assert!(machine.alarm_active());
    }

    #[test]
    fn test_disable_and_resume() {
        let mut machine = StateMachine::new();
        machine.observe(true);
        machine.observe(false);

        assert_eq!(machine.disable(), Some(Transition::Disabled));
        assert_eq!(machine.service_state(), ServiceState::Disabled);
        assert!(!machine.alarm_active());
        assert_eq!(machine.disable(), None);

        // Inactivity while disabled stays silent.
        assert_eq!(machine.observe(false), None);

        assert_eq!(
            machine.observe(true),
            Some(Transition::StartedPedaling {
                resumed_service: true
            })
        );
        assert_eq!(machine.service_state(), ServiceState::Active);
        assert_eq!(machine.pedal_state(), PedalState::Pedaling);
    }

    #[test]
    fn test_transition_warnings() {
        assert_eq!(Transition::WentIdle.warning(), Some(BeepPattern::Long));
        assert_eq!(
            Transition::StartedPedaling {
                resumed_service: true
            }
            .warning(),
            Some(BeepPattern::Short)
        );
        assert_eq!(Transition::Disabled.warning(), None);
    }
}
