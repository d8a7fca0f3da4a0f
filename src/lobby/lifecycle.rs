use serde::{Deserialize, Serialize};
use std::fmt;

/// Match lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchState {
    /// Players gathering and readying up
    Lobby,
    /// Simulation running
    Running,
    /// Creator left; the match is gone for good
    Terminated,
}

impl MatchState {
    /// Whether `self -> next` is a legal transition
    pub const fn is_valid_next_state(self, next: MatchState) -> bool {
        use MatchState::*;
        matches!(
            (self, next),
            (Lobby, Running) | (Lobby, Terminated) | (Running, _)
        )
    }

    /// Check a transition without performing it
    pub fn check_transition(self, next: MatchState) -> Result<(), TransitionError> {
        if self.is_valid_next_state(next) {
            Ok(())
        } else {
            Err(TransitionError::Illegal { from: self, to: next })
        }
    }
}

impl fmt::Display for MatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MatchState::Lobby => "lobby",
            MatchState::Running => "running",
            MatchState::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// A transition outside the table. Always a logic bug in the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("illegal match transition {from} -> {to}")]
    Illegal { from: MatchState, to: MatchState },
}
