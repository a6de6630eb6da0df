//! Process-wide session exclusivity: at most one recording or replay at a time.

use crate::error::{RecordReplayError, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What the engine is currently doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Idle,
    Recording,
    Replaying,
    /// Short-lived: an import is writing the registry and the store.
    Importing,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Idle => "idle",
            SessionState::Recording => "recording in progress",
            SessionState::Replaying => "replay in progress",
            SessionState::Importing => "import in progress",
        };
        f.write_str(s)
    }
}

/// Single source of truth for the active session role.
///
/// Only moves from `Idle` to a role and back to `Idle` are legal.
/// A start request while not idle is rejected immediately, never queued.
pub struct SessionCoordinator {
    state: Mutex<SessionState>,
}

impl SessionCoordinator {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SessionState::Idle),
        }
    }

    /// Atomically move from `Idle` to `role`.
    pub fn try_acquire(&self, role: SessionState) -> Result<()> {
        if role == SessionState::Idle {
            return Err(RecordReplayError::Validation(
                "cannot acquire the idle role".to_string(),
            ));
        }

        let mut state = self.state.lock();
        if *state != SessionState::Idle {
            return Err(RecordReplayError::SessionBusy(*state));
        }
        *state = role;
        tracing::debug!("Session coordinator: idle -> {:?}", role);
        Ok(())
    }

    /// Return to `Idle` if `role` is the one currently held. Releasing a role
    /// that is not held (including on an idle coordinator) is a no-op.
    pub fn release(&self, role: SessionState) {
        let mut state = self.state.lock();
        if *state == role && role != SessionState::Idle {
            *state = SessionState::Idle;
            tracing::debug!("Session coordinator: {:?} -> idle", role);
        }
    }

    pub fn current_state(&self) -> SessionState {
        *self.state.lock()
    }

    pub fn is_idle(&self) -> bool {
        self.current_state() == SessionState::Idle
    }
}

impl Default for SessionCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
