use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SessionError;

/// Authoritative session status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Idle,
    Warmup,
    Running,
    Paused,
    Finished,
}

impl SessionStatus {
    pub const ALL: [SessionStatus; 5] = [
        SessionStatus::Idle,
        SessionStatus::Warmup,
        SessionStatus::Running,
        SessionStatus::Paused,
        SessionStatus::Finished,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Idle => "idle",
            SessionStatus::Warmup => "warmup",
            SessionStatus::Running => "running",
            SessionStatus::Paused => "paused",
            SessionStatus::Finished => "finished",
        }
    }

    /// Whether a request to move from `self` to `next` is accepted.
    ///
    /// Every status may return to `idle` and may re-assert itself.
    pub fn can_transition_to(&self, next: SessionStatus) -> bool {
        use SessionStatus::*;

        if next == Idle || next == *self {
            return true;
        }
        matches!(
            (self, next),
            (Idle, Warmup)
                | (Finished, Warmup)
                | (Warmup, Running)
                | (Warmup, Paused)
                | (Running, Paused)
                | (Running, Finished)
                | (Paused, Running)
        )
    }

    /// Target of the single play/pause control
    pub fn toggle_target(&self) -> SessionStatus {
        match self {
            SessionStatus::Idle | SessionStatus::Finished => SessionStatus::Warmup,
            SessionStatus::Warmup | SessionStatus::Running => SessionStatus::Paused,
            SessionStatus::Paused => SessionStatus::Running,
        }
    }

    /// Timers are counting down in this status
    pub fn is_active(&self) -> bool {
        matches!(self, SessionStatus::Warmup | SessionStatus::Running)
    }
}

impl Default for SessionStatus {
    fn default() -> Self {
        SessionStatus::Idle
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SessionStatus::ALL
            .iter()
            .copied()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| SessionError::ConfigInvalid {
                reason: format!("unknown session status '{}'", s),
            })
    }
}
