// Session module - status, timers, cues and the state machine tying them together

pub mod config;
pub mod countdown;
pub mod cues;
pub mod display;
pub mod machine;
pub mod status;

pub use config::{SessionConfig, SessionLoad};
pub use countdown::{CountdownState, CountdownTick, CountdownTimer};
pub use cues::CountdownCues;
pub use display::{format_clock, SessionSnapshot};
pub use machine::SessionMachine;
pub use status::SessionStatus;
