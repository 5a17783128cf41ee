// Fretflow Core - practice session engine
// Warmup countdown, timed exercise and a look-ahead metronome driven by one clock

// Module declarations
pub mod audio;
pub mod config;
pub mod engine;
pub mod error;
pub mod metronome;
pub mod session;
pub mod simulation;

// Re-exports for convenience
pub use audio::{AudioSink, RecordingSink, SharedSink, ToneKind, ToneRequest};
pub use config::AppConfig;
pub use engine::{ClockSource, ManualClock, SessionHandle, SystemClock};
pub use error::{AudioError, ErrorCode, SessionError};
pub use metronome::TempoSetting;
pub use session::{SessionLoad, SessionMachine, SessionSnapshot, SessionStatus};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_module_structure() {
        let clock = Arc::new(ManualClock::new());
        let sink: SharedSink = Arc::new(RecordingSink::new(clock.clone()));
        let machine = SessionMachine::new(&AppConfig::default(), clock, sink);
        assert_eq!(machine.status(), SessionStatus::Idle);
    }
}
