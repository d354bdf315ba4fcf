use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Mutex;

use crate::error::{Result, TunnelError};

/// Lifecycle state of a virtual interface (spec §3 "Virtual Interface").
///
/// Every transition from `Ready` must pass through `Stopping` before
/// `Stopped`. `Error` is reachable from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum InterfaceState {
    Uninitialized = 0,
    Initializing = 1,
    Ready = 2,
    Stopping = 3,
    Stopped = 4,
    Error = 5,
}

impl InterfaceState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Uninitialized,
            1 => Self::Initializing,
            2 => Self::Ready,
            3 => Self::Stopping,
            4 => Self::Stopped,
            _ => Self::Error,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Uninitialized => "Uninitialized",
            Self::Initializing => "Initializing",
            Self::Ready => "Ready",
            Self::Stopping => "Stopping",
            Self::Stopped => "Stopped",
            Self::Error => "Error",
        }
    }

    fn can_transition_to(self, to: InterfaceState) -> bool {
        use InterfaceState::*;
        match (self, to) {
            (Uninitialized, Initializing) => true,
            (Initializing, Ready) => true,
            (Initializing, Error) => true,
            (Ready, Stopping) => true,
            (Ready, Error) => true,
            (Stopping, Stopped) => true,
            (Stopping, Error) => true,
            // Error performs best-effort reclamation and may settle in Stopped.
            (Error, Stopped) => true,
            _ => false,
        }
    }
}

/// Guards the interface's lifecycle state behind a mutex for writers, while
/// keeping an atomic mirror so readers (e.g. the metrics/SNMP surface) never
/// block on the mutation path (spec §4.1 "the current state is readable
/// without locking").
pub struct StateMachine {
    state: Mutex<InterfaceState>,
    mirror: AtomicU8,
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(InterfaceState::Uninitialized),
            mirror: AtomicU8::new(InterfaceState::Uninitialized as u8),
        }
    }

    /// Lock-free read of the current state.
    pub fn current(&self) -> InterfaceState {
        InterfaceState::from_u8(self.mirror.load(Ordering::Acquire))
    }

    /// Attempt the transition `current -> to`. Invalid transitions leave the
    /// state untouched and return `InvalidStateTransition` without side
    /// effect, per spec §4.1.
    pub fn transition(&self, to: InterfaceState) -> Result<()> {
        let mut guard = self.state.lock().expect("interface state mutex poisoned");
        if !guard.can_transition_to(to) {
            return Err(TunnelError::InvalidStateTransition {
                from: guard.name(),
                to: to.name(),
            });
        }
        *guard = to;
        self.mirror.store(to as u8, Ordering::Release);
        Ok(())
    }

    /// Force the state to `Error` regardless of the current state; used when
    /// a fatal fault is detected mid-operation (e.g. a cleanup timeout).
    pub fn force_error(&self) {
        let mut guard = self.state.lock().expect("interface state mutex poisoned");
        *guard = InterfaceState::Error;
        self.mirror.store(InterfaceState::Error as u8, Ordering::Release);
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_transitions() {
        let sm = StateMachine::new();
        assert_eq!(sm.current(), InterfaceState::Uninitialized);
        sm.transition(InterfaceState::Initializing).unwrap();
        sm.transition(InterfaceState::Ready).unwrap();
        sm.transition(InterfaceState::Stopping).unwrap();
        sm.transition(InterfaceState::Stopped).unwrap();
        assert_eq!(sm.current(), InterfaceState::Stopped);
    }

    #[test]
    fn rejects_invalid_transition() {
        let sm = StateMachine::new();
        let err = sm.transition(InterfaceState::Ready).unwrap_err();
        assert!(matches!(err, TunnelError::InvalidStateTransition { .. }));
        assert_eq!(sm.current(), InterfaceState::Uninitialized);
    }

    #[test]
    fn error_reachable_from_ready() {
        let sm = StateMachine::new();
        sm.transition(InterfaceState::Initializing).unwrap();
        sm.transition(InterfaceState::Ready).unwrap();
        sm.transition(InterfaceState::Error).unwrap();
        assert_eq!(sm.current(), InterfaceState::Error);
    }

    #[test]
    fn force_error_from_any_state() {
        let sm = StateMachine::new();
        sm.force_error();
        assert_eq!(sm.current(), InterfaceState::Error);
    }
}
