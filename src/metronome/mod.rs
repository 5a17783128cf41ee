// Metronome - tempo model and look-ahead click scheduling

pub mod scheduler;
pub mod tempo;

pub use scheduler::{LookaheadScheduler, SchedulerCursor, SchedulerStats, TICKS_PER_BAR};
pub use tempo::{TempoSetting, DEFAULT_BPM, MAX_BPM, MIN_BPM, TICKS_PER_BEAT};
