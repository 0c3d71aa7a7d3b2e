//! Run state machine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    /// Run is recorded but has not started
    NotStarted,

    /// Run is executing
    Started,

    /// Every step succeeded
    Success,

    /// At least one step failed
    Failure,

    /// Run was canceled before finishing
    Canceled,
}

impl RunStatus {
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Success | Self::Failure | Self::Canceled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "NOT_STARTED",
            Self::Started => "STARTED",
            Self::Success => "SUCCESS",
            Self::Failure => "FAILURE",
            Self::Canceled => "CANCELED",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State machine for managing the run lifecycle
#[derive(Debug, Clone)]
pub struct StateMachine {
    current_state: RunStatus,
    state_history: Vec<(RunStatus, DateTime<Utc>)>,
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            current_state: RunStatus::NotStarted,
            state_history: vec![(RunStatus::NotStarted, Utc::now())],
        }
    }

    pub fn current_state(&self) -> RunStatus {
        self.current_state
    }

    /// Transition to a new state
    pub fn transition(&mut self, new_state: RunStatus) -> crate::Result<DateTime<Utc>> {
        if !self.is_valid_transition(new_state) {
            return Err(crate::Error::InvalidState(format!(
                "Invalid transition from {} to {}",
                self.current_state, new_state
            )));
        }

        let now = Utc::now();
        self.current_state = new_state;
        self.state_history.push((new_state, now));
        Ok(now)
    }

    fn is_valid_transition(&self, new_state: RunStatus) -> bool {
        use RunStatus::*;

        matches!(
            (self.current_state, new_state),
            (NotStarted, Started | Canceled) | (Started, Success | Failure | Canceled)
        )
    }

    pub fn history(&self) -> &[(RunStatus, DateTime<Utc>)] {
        &self.state_history
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
    fn test_initial_state() {
        let sm = StateMachine::new();
        assert_eq!(sm.current_state(), RunStatus::NotStarted);
        assert_eq!(sm.history().len(), 1);
    }

    #[test]
    fn test_valid_transitions() {
        let mut sm = StateMachine::new();
        assert!(sm.transition(RunStatus::Started).is_ok());
        assert!(sm.transition(RunStatus::Success).is_ok());
        assert!(sm.current_state().is_finished());
        assert_eq!(sm.history().len(), 3);
    }

    #[test]
    fn test_invalid_transition() {
        let mut sm = StateMachine::new();
        let err = sm.transition(RunStatus::Success).unwrap_err();
        assert_eq!(
            err,
            crate::Error::InvalidState("Invalid transition from NOT_STARTED to SUCCESS".into())
        );
    }

    #[test]
    fn test_finished_runs_do_not_restart() {
        let mut sm = StateMachine::new();
        sm.transition(RunStatus::Started).unwrap();
        sm.transition(RunStatus::Failure).unwrap();
        assert!(sm.transition(RunStatus::Started).is_err());
    }
}
