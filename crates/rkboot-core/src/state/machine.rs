//! Boot session state machine.

use std::fmt;

use crate::protocol::Stage;

/// Where a boot session stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BootState {
    /// Nothing acquired yet.
    #[default]
    Idle,
    /// Device handle open.
    Opened,
    /// Boot interface claimed.
    Claimed,
    /// Stage-1 image accepted by the ROM.
    Stage1Sent,
    /// Stage-2 image accepted by the ROM.
    Stage2Sent,
    /// All resources released after a successful boot.
    Done,
    /// A step failed; acquired resources have been released.
    Error,
}

impl fmt::Display for BootState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BootState::Idle => write!(f, "IDLE"),
            BootState::Opened => write!(f, "OPENED"),
            BootState::Claimed => write!(f, "CLAIMED"),
            BootState::Stage1Sent => write!(f, "STAGE1_SENT"),
            BootState::Stage2Sent => write!(f, "STAGE2_SENT"),
            BootState::Done => write!(f, "DONE"),
            BootState::Error => write!(f, "ERROR"),
        }
    }
}

impl BootState {
    /// Successor on the happy path.
    pub fn next(self) -> Option<BootState> {
        match self {
            BootState::Idle => Some(BootState::Opened),
            BootState::Opened => Some(BootState::Claimed),
            BootState::Claimed => Some(BootState::Stage1Sent),
            BootState::Stage1Sent => Some(BootState::Stage2Sent),
            BootState::Stage2Sent => Some(BootState::Done),
            BootState::Done | BootState::Error => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, BootState::Done | BootState::Error)
    }

    /// Every non-terminal state may fail into `Error`.
    pub fn can_transition_to(self, to: BootState) -> bool {
        if to == BootState::Error {
            return !self.is_terminal();
        }
        self.next() == Some(to)
    }
}

/// The operation a session was performing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootStep {
    Enumerate,
    Select,
    Open,
    Claim,
    OpenImage(Stage),
    Allocate,
    Send(Stage),
}

impl fmt::Display for BootStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BootStep::Enumerate => write!(f, "enumerate"),
            BootStep::Select => write!(f, "select device"),
            BootStep::Open => write!(f, "open device"),
            BootStep::Claim => write!(f, "claim interface"),
            BootStep::OpenImage(stage) => write!(f, "open {} image", stage),
            BootStep::Allocate => write!(f, "allocate buffers"),
            BootStep::Send(stage) => write!(f, "send {} image", stage),
        }
    }
}

/// State of one boot session.
#[derive(Debug, Default)]
pub struct BootMachine {
    state: BootState,
    failed_step: Option<BootStep>,
}

impl BootMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> BootState {
        self.state
    }

    /// Step that moved the machine into `Error`, if any.
    pub fn failed_step(&self) -> Option<BootStep> {
        self.failed_step
    }

    pub fn is_done(&self) -> bool {
        self.state == BootState::Done
    }

    /// Transition to a new state; returns the previous one.
    pub fn goto_state(&mut self, new_state: BootState) -> BootState {
        debug_assert!(
            self.state.can_transition_to(new_state),
            "invalid transition {} -> {}",
            self.state,
            new_state
        );
        tracing::info!(from = %self.state, to = %new_state, "State transition");
        std::mem::replace(&mut self.state, new_state)
    }

    /// Enter `Error`, remembering the failed step. Returns the previous state.
    pub fn fail(&mut self, step: BootStep) -> BootState {
        tracing::warn!(from = %self.state, step = %step, "Boot step failed");
        self.failed_step = Some(step);
        std::mem::replace(&mut self.state, BootState::Error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_sequence() {
        let mut machine = BootMachine::new();
        let mut seen = vec![machine.state()];
        while let Some(next) = machine.state().next() {
            machine.goto_state(next);
            seen.push(next);
        }
        assert_eq!(
            seen,
            vec![
                BootState::Idle,
                BootState::Opened,
                BootState::Claimed,
                BootState::Stage1Sent,
                BootState::Stage2Sent,
                BootState::Done,
            ]
        );
        assert!(machine.is_done());
        assert!(machine.failed_step().is_none());
    }

    #[test]
    fn test_error_reachable_from_non_terminal() {
        for state in [
            BootState::Idle,
            BootState::Opened,
            BootState::Claimed,
            BootState::Stage1Sent,
            BootState::Stage2Sent,
        ] {
            assert!(state.can_transition_to(BootState::Error));
        }
        assert!(!BootState::Done.can_transition_to(BootState::Error));
        assert!(!BootState::Error.can_transition_to(BootState::Error));
        assert!(!BootState::Idle.can_transition_to(BootState::Claimed));
    }

    #[test]
    fn test_fail_records_step() {
        let mut machine = BootMachine::new();
        machine.goto_state(BootState::Opened);
        machine.goto_state(BootState::Claimed);
        let previous = machine.fail(BootStep::Send(Stage::One));
        assert_eq!(previous, BootState::Claimed);
        assert_eq!(machine.state(), BootState::Error);
        assert_eq!(machine.failed_step(), Some(BootStep::Send(Stage::One)));
    }
}
