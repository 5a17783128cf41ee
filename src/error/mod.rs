// Error types for the practice session engine
//
// This module defines the error taxonomy for audio output and session control,
// with numeric codes so front ends can branch on them without string matching.

mod audio;
mod session;

pub use audio::{log_audio_error, AudioError, AudioErrorCodes};
pub use session::{log_session_error, SessionError, SessionErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent error handling across
/// the CLI and any embedding front end.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
