// Session error types and constants

use crate::error::ErrorCode;
use crate::session::SessionStatus;
use log::warn;
use std::fmt;

/// Session error code constants
///
/// Error code range: 2001-2005
pub struct SessionErrorCodes {}

impl SessionErrorCodes {
    /// Session or engine configuration rejected
    pub const CONFIG_INVALID: i32 = 2001;

    /// Tempo outside the supported range
    pub const TEMPO_OUT_OF_RANGE: i32 = 2002;

    /// Status change not permitted from the current status
    pub const INVALID_TRANSITION: i32 = 2003;

    /// Session worker is gone
    pub const DRIVER_CLOSED: i32 = 2004;

    /// Shared session state lock was poisoned
    pub const LOCK_POISONED: i32 = 2005;
}

/// Log a rejected session request
///
/// Rejections are expected during normal use (a stale button press, a bad
/// form value) so they are logged at warn rather than error.
pub fn log_session_error(err: &SessionError, context: &str) {
    warn!(
        "Session request rejected in {}: code={}, component=SessionMachine, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Session-related errors
///
/// A rejected request never changes session state.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionError {
    /// Non-positive duration or otherwise unusable configuration
    ConfigInvalid { reason: String },

    /// Tempo outside 40..=300 BPM
    TempoOutOfRange { bpm: u32 },

    /// Requested status is not reachable from the current one
    InvalidTransition {
        from: SessionStatus,
        to: SessionStatus,
    },

    /// The session worker thread has shut down
    DriverClosed,

    /// Lock was poisoned
    LockPoisoned,
}

impl ErrorCode for SessionError {
    fn code(&self) -> i32 {
        match self {
            SessionError::ConfigInvalid { .. } => SessionErrorCodes::CONFIG_INVALID,
            SessionError::TempoOutOfRange { .. } => SessionErrorCodes::TEMPO_OUT_OF_RANGE,
            SessionError::InvalidTransition { .. } => SessionErrorCodes::INVALID_TRANSITION,
            SessionError::DriverClosed => SessionErrorCodes::DRIVER_CLOSED,
            SessionError::LockPoisoned => SessionErrorCodes::LOCK_POISONED,
        }
    }

    fn message(&self) -> String {
        match self {
            SessionError::ConfigInvalid { reason } => {
                format!("Invalid configuration: {}", reason)
            }
            SessionError::TempoOutOfRange { bpm } => {
                format!("BPM must be between 40 and 300 (got {})", bpm)
            }
            SessionError::InvalidTransition { from, to } => {
                format!("Cannot change status from {} to {}", from, to)
            }
            SessionError::DriverClosed => "Session worker has shut down".to_string(),
            SessionError::LockPoisoned => "Session state lock poisoned".to_string(),
        }
    }
}

impl SessionError {
    /// True for the `ConfigInvalid` family (tempo errors included)
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SessionError::ConfigInvalid { .. } | SessionError::TempoOutOfRange { .. }
        )
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SessionError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for SessionError {}
