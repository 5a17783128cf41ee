// Audio error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Audio error code constants
///
/// Error code range: 1001-1007
pub struct AudioErrorCodes {}

impl AudioErrorCodes {
    /// Output device could not be acquired
    pub const UNAVAILABLE: i32 = 1001;

    /// Failed to open the output stream
    pub const STREAM_OPEN_FAILED: i32 = 1002;

    /// Hardware error occurred while the stream was running
    pub const HARDWARE_ERROR: i32 = 1003;

    /// Tone queue towards the audio callback is full
    pub const QUEUE_FULL: i32 = 1004;

    /// Mutex/RwLock was poisoned
    pub const LOCK_POISONED: i32 = 1005;

    /// Device only offers a sample format we cannot write
    pub const UNSUPPORTED_FORMAT: i32 = 1006;

    /// Offline render or WAV export failed
    pub const RENDER_FAILED: i32 = 1007;
}

/// Log an audio error with structured context
///
/// Audio failures never stop a session; they are logged here and the
/// session carries on silently.
pub fn log_audio_error(err: &AudioError, context: &str) {
    error!(
        "Audio error in {}: code={}, component=AudioSink, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Audio-related errors
///
/// These errors cover sink acquisition, stream management and tone delivery.
/// None of them is fatal to a practice session.
#[derive(Debug, Clone, PartialEq)]
pub enum AudioError {
    /// Output device could not be acquired
    Unavailable { reason: String },

    /// Failed to open audio stream
    StreamOpenFailed { reason: String },

    /// Hardware error occurred
    HardwareError { details: String },

    /// Tone queue is full; the tone was dropped
    QueueFull,

    /// Mutex/RwLock was poisoned
    LockPoisoned { component: String },

    /// Sample format not supported by the output path
    UnsupportedFormat { format: String },

    /// Offline render failed
    RenderFailed { reason: String },
}

impl ErrorCode for AudioError {
    fn code(&self) -> i32 {
        match self {
            AudioError::Unavailable { .. } => AudioErrorCodes::UNAVAILABLE,
            AudioError::StreamOpenFailed { .. } => AudioErrorCodes::STREAM_OPEN_FAILED,
            AudioError::HardwareError { .. } => AudioErrorCodes::HARDWARE_ERROR,
            AudioError::QueueFull => AudioErrorCodes::QUEUE_FULL,
            AudioError::LockPoisoned { .. } => AudioErrorCodes::LOCK_POISONED,
            AudioError::UnsupportedFormat { .. } => AudioErrorCodes::UNSUPPORTED_FORMAT,
            AudioError::RenderFailed { .. } => AudioErrorCodes::RENDER_FAILED,
        }
    }

    fn message(&self) -> String {
        match self {
            AudioError::Unavailable { reason } => {
                format!("Audio output unavailable: {}", reason)
            }
            AudioError::StreamOpenFailed { reason } => {
                format!("Failed to open audio stream: {}", reason)
            }
            AudioError::HardwareError { details } => {
                format!("Hardware error: {}", details)
            }
            AudioError::QueueFull => "Tone queue full, tone dropped".to_string(),
            AudioError::LockPoisoned { component } => {
                format!("Lock poisoned on {}", component)
            }
            AudioError::UnsupportedFormat { format } => {
                format!("Unsupported sample format: {}", format)
            }
            AudioError::RenderFailed { reason } => {
                format!("Render failed: {}", reason)
            }
        }
    }
}

impl fmt::Display for AudioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AudioError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for AudioError {}

impl From<std::io::Error> for AudioError {
    fn from(err: std::io::Error) -> Self {
        AudioError::HardwareError {
            details: err.to_string(),
        }
    }
}

impl From<hound::Error> for AudioError {
    fn from(err: hound::Error) -> Self {
        AudioError::RenderFailed {
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_error_codes() {
        assert_eq!(
            AudioError::Unavailable {
                reason: "test".to_string()
            }
            .code(),
            AudioErrorCodes::UNAVAILABLE
        );
        assert_eq!(
            AudioError::StreamOpenFailed {
                reason: "test".to_string()
            }
            .code(),
            AudioErrorCodes::STREAM_OPEN_FAILED
        );
        assert_eq!(AudioError::QueueFull.code(), AudioErrorCodes::QUEUE_FULL);
        assert_eq!(
            AudioError::LockPoisoned {
                component: "test".to_string()
            }
            .code(),
            AudioErrorCodes::LOCK_POISONED
        );
        assert_eq!(
            AudioError::RenderFailed {
                reason: "test".to_string()
            }
            .code(),
            1007
        );
    }

    #[test]
    fn test_audio_error_messages() {
        let err = AudioError::Unavailable {
            reason: "no device".to_string(),
        };
        assert_eq!(err.message(), "Audio output unavailable: no device");

        let err = AudioError::HardwareError {
            details: "test error".to_string(),
        };
        assert_eq!(err.message(), "Hardware error: test error");

        assert!(AudioError::QueueFull.message().contains("dropped"));
    }

    #[test]
    fn test_audio_error_display() {
        let err = AudioError::QueueFull;
        let display = format!("{}", err);
        assert!(display.contains("AudioError"));
        assert!(display.contains(&err.code().to_string()));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::other("test io error");
        let audio_err: AudioError = io_err.into();
        match audio_err {
            AudioError::HardwareError { details } => {
                assert!(details.contains("test io error"));
            }
            _ => panic!("Expected HardwareError"),
        }
    }
}
