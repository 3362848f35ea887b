//! Pure lifecycle state machine for the publish controller
//!
//! `Terminated` is absorbing: once reached, every further event is refused.

use tracing::{error, info, warn};

/// Why the controller reached its terminal state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Initial connection failed
    StartupFailed,
    /// Reconnect attempts ran out
    ReconnectExhausted,
    /// Shutdown was requested
    Graceful,
}

/// Controller lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    /// Created, no connection yet
    Idle,
    /// Connected and cycling publish / wait
    Connected,
    /// Connection lost; holds the current attempt number (0 before the first attempt)
    Reconnecting(u32),
    Terminated(Termination),
}

impl ControllerState {
    pub fn is_terminated(&self) -> bool {
        matches!(self, ControllerState::Terminated(_))
    }
}

/// Events that drive state transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Started,
    StartFailed,
    ConnectionLost,
    ReconnectAttempt(u32),
    Reconnected,
    ReconnectFailed,
    ShutdownObserved,
}

pub struct StateMachine;

impl StateMachine {
    /// Next state for `event`, or `None` if the transition is not allowed (pure function)
    pub fn next_state(current: &ControllerState, event: LifecycleEvent) -> Option<ControllerState> {
        use ControllerState::*;
        use LifecycleEvent::*;

        match (current, event) {
            (Terminated(_), _) => None,
            (Idle, Started) => Some(Connected),
            (Idle, StartFailed) => Some(Terminated(Termination::StartupFailed)),
            (Connected, ConnectionLost) => Some(Reconnecting(0)),
            (Reconnecting(_), ReconnectAttempt(attempt)) => Some(Reconnecting(attempt)),
            (Reconnecting(_), Reconnected) => Some(Connected),
            (Reconnecting(_), ReconnectFailed) => Some(Terminated(Termination::ReconnectExhausted)),
            (_, ShutdownObserved) => Some(Terminated(Termination::Graceful)),
            _ => None,
        }
    }

    /// Log a state transition
    pub fn log_transition(from: &ControllerState, to: &ControllerState) {
        match (from, to) {
            (ControllerState::Idle, ControllerState::Connected) => {
                info!("Connected to broker");
            }
            (ControllerState::Connected, ControllerState::Reconnecting(_)) => {
                warn!("Connection to broker lost");
            }
            (ControllerState::Reconnecting(_), ControllerState::Reconnecting(attempt)) => {
                info!(attempt = *attempt, "Reconnecting to broker");
            }
            (ControllerState::Reconnecting(_), ControllerState::Connected) => {
                info!("Reconnected to broker");
            }
            (_, ControllerState::Terminated(Termination::Graceful)) => {
                info!("Controller stopped");
            }
            (_, ControllerState::Terminated(reason)) => {
                error!(reason = ?reason, "Controller terminated");
            }
            _ => {
                info!("Controller state: {:?} -> {:?}", from, to);
            }
        }
    }
}
