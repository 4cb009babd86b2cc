//! Per-instance lifecycle
//!
//! ```text
//! Requested → Reserved → Materializing → Bound → Running ⇄ Stopped
//!                                          │        │         │
//!                                          └──► Terminating ◄─┘ → Gone
//! ```
//!
//! Transitions only happen through explicit provisioner calls.

use fleetyard_cloud::PowerState;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifecycle {
    Requested,
    Reserved,
    Materializing,
    Bound,
    Running,
    Stopped,
    Terminating,
    Gone,
}

impl Lifecycle {
    pub fn can_transition_to(self, next: Lifecycle) -> bool {
        use Lifecycle::*;
        matches!(
            (self, next),
            (Requested, Reserved)
                | (Reserved, Materializing)
                | (Materializing, Bound)
                | (Bound, Running)
                | (Bound, Stopped)
                | (Running, Stopped)
                | (Stopped, Running)
                | (Bound, Terminating)
                | (Running, Terminating)
                | (Stopped, Terminating)
                | (Terminating, Gone)
        )
    }

    /// Lifecycle state of a bound instance in the given provider power state
    pub fn from_power_state(state: PowerState) -> Lifecycle {
        match state {
            PowerState::Pending | PowerState::Running => Lifecycle::Running,
            PowerState::Stopping | PowerState::Stopped => Lifecycle::Stopped,
            PowerState::ShuttingDown => Lifecycle::Terminating,
            PowerState::Terminated => Lifecycle::Gone,
            PowerState::Unknown => Lifecycle::Bound,
        }
    }
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Lifecycle::Requested => "requested",
            Lifecycle::Reserved => "reserved",
            Lifecycle::Materializing => "materializing",
            Lifecycle::Bound => "bound",
            Lifecycle::Running => "running",
            Lifecycle::Stopped => "stopped",
            Lifecycle::Terminating => "terminating",
            Lifecycle::Gone => "gone",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_is_legal() {
        let path = [
            Lifecycle::Requested,
            Lifecycle::Reserved,
            Lifecycle::Materializing,
            Lifecycle::Bound,
            Lifecycle::Running,
            Lifecycle::Stopped,
            Lifecycle::Running,
            Lifecycle::Terminating,
            Lifecycle::Gone,
        ];
        for pair in path.windows(2) {
            assert!(
                pair[0].can_transition_to(pair[1]),
                "{} -> {}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn test_no_shortcuts() {
        assert!(!Lifecycle::Requested.can_transition_to(Lifecycle::Bound));
        assert!(!Lifecycle::Reserved.can_transition_to(Lifecycle::Bound));
        assert!(!Lifecycle::Gone.can_transition_to(Lifecycle::Running));
        assert!(!Lifecycle::Terminating.can_transition_to(Lifecycle::Running));
    }

    #[test]
    fn test_from_power_state() {
        assert_eq!(
            Lifecycle::from_power_state(PowerState::Pending),
            Lifecycle::Running
        );
        assert_eq!(
            Lifecycle::from_power_state(PowerState::Terminated),
            Lifecycle::Gone
        );
    }
}
