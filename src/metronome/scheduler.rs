//! Look-ahead metronome scheduler
//!
//! The scheduler is woken on a coarse polling interval (25 ms by default)
//! but never plays anything "now". Each poll it hands the sink every tick
//! whose start time falls inside a short horizon (0.1 s) past the sink's
//! clock, stamped with the exact time it must sound. Polling jitter only
//! changes how early a tick is queued, never when it is heard.
//!
//! Ticks are sixteenth notes; only every fourth (a quarter note) is sounded,
//! and bar position 0 is the accented downbeat.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::audio::sink::SharedSink;
use crate::audio::tone::ToneRequest;
use crate::config::SchedulerConfig;
use crate::engine::interval::{MissedTicks, PeriodicTask};
use crate::error::{log_audio_error, AudioError};
use crate::metronome::tempo::{TempoSetting, TICKS_PER_BEAT};

/// Sixteenth-note positions per bar
pub const TICKS_PER_BAR: u8 = 16;

/// Timing cursor, owned exclusively by the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SchedulerCursor {
    /// Sink-clock time of the next undispatched tick
    pub next_tick_time: f64,
    /// Bar position of that tick, 0..16
    pub tick_index: u8,
    pub playing: bool,
}

/// Running totals, mostly for diagnostics and tests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerStats {
    pub polls: u64,
    pub ticks_advanced: u64,
    pub clicks_dispatched: u64,
    pub ticks_skipped: u64,
}

pub struct LookaheadScheduler {
    cursor: SchedulerCursor,
    tempo: TempoSetting,
    sink: SharedSink,
    poll: PeriodicTask,
    schedule_ahead: f64,
    start_delay: f64,
    max_catch_up: u32,
    stats: SchedulerStats,
}

impl LookaheadScheduler {
    pub fn new(config: &SchedulerConfig, tempo: TempoSetting, sink: SharedSink) -> Self {
        Self {
            cursor: SchedulerCursor {
                next_tick_time: 0.0,
                tick_index: 0,
                playing: false,
            },
            tempo,
            sink,
            poll: PeriodicTask::new(config.poll_interval(), MissedTicks::Skip),
            schedule_ahead: config.schedule_ahead_s,
            start_delay: config.start_delay_s,
            max_catch_up: config.max_catch_up_ticks,
            stats: SchedulerStats::default(),
        }
    }

    /// Start playing from the downbeat.
    ///
    /// No-op if already playing. If the sink cannot be acquired the cursor is
    /// left untouched, polling does not begin, and the error is returned so
    /// the caller can fall back to a silent session.
    pub fn start(&mut self, now: f64) -> Result<(), AudioError> {
        if self.cursor.playing {
            return Ok(());
        }

        if let Err(err) = self.sink.acquire() {
            log_audio_error(&err, "LookaheadScheduler::start");
            return Err(err);
        }

        self.cursor.tick_index = 0;
        self.cursor.next_tick_time = self.sink.current_time() + self.start_delay;
        self.cursor.playing = true;
        self.poll.arm(now);

        info!(
            "[Scheduler] Started at {} BPM, first tick at {:.3}s",
            self.tempo.bpm(),
            self.cursor.next_tick_time
        );
        Ok(())
    }

    /// Stop polling. Ticks already handed to the sink still play.
    pub fn stop(&mut self) {
        if self.cursor.playing {
            debug!("[Scheduler] Stopped at tick {}", self.cursor.tick_index);
        }
        self.cursor.playing = false;
        self.poll.cancel();
    }

    /// Change the tempo used for every future cursor advance.
    pub fn set_tempo(&mut self, tempo: TempoSetting) {
        self.tempo = tempo;
    }

    pub fn tempo(&self) -> TempoSetting {
        self.tempo
    }

    pub fn cursor(&self) -> SchedulerCursor {
        self.cursor
    }

    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }

    pub fn is_playing(&self) -> bool {
        self.cursor.playing
    }

    /// When the next poll is due on the engine clock, if polling
    pub fn next_poll_due(&self) -> Option<f64> {
        self.poll.next_due()
    }

    /// Run the poll registered for `now`, if one is due.
    ///
    /// Returns the number of ticks advanced.
    pub fn fire(&mut self, now: f64) -> u32 {
        if !self.poll.take_due(now) {
            return 0;
        }
        self.poll_once()
    }

    /// Queue every tick that starts before the look-ahead horizon.
    ///
    /// A late poll dispatches every tick it missed. The catch-up bound only
    /// matters after a long stall: once it is reached, ticks whose time has
    /// already passed are skipped and the cursor is realigned to the bar grid.
    pub fn poll_once(&mut self) -> u32 {
        if !self.cursor.playing {
            return 0;
        }
        self.stats.polls += 1;

        let audio_now = self.sink.current_time();
        let horizon = audio_now + self.schedule_ahead;
        let mut advanced = 0_u32;

        while self.cursor.next_tick_time < horizon {
            if self.max_catch_up > 0
                && advanced >= self.max_catch_up
                && self.cursor.next_tick_time < audio_now
            {
                self.skip_overdue(audio_now);
                continue;
            }
            self.dispatch_tick();
            self.advance_cursor();
            advanced += 1;
        }
        advanced
    }

    fn dispatch_tick(&mut self) {
        let index = self.cursor.tick_index;
        if index % TICKS_PER_BEAT != 0 {
            return;
        }
        let tone = ToneRequest::click(index, self.cursor.next_tick_time);
        match self.sink.schedule(tone) {
            Ok(()) => self.stats.clicks_dispatched += 1,
            Err(err) => warn!(
                "[Scheduler] Click at {:.3}s not scheduled: {}",
                tone.start_time, err
            ),
        }
    }

    fn advance_cursor(&mut self) {
        self.cursor.next_tick_time += self.tempo.tick_interval();
        self.cursor.tick_index = (self.cursor.tick_index + 1) % TICKS_PER_BAR;
        self.stats.ticks_advanced += 1;
    }

    fn skip_overdue(&mut self, audio_now: f64) {
        let mut skipped = 0_u64;
        while self.cursor.next_tick_time < audio_now {
            self.advance_cursor();
            skipped += 1;
        }
        self.stats.ticks_skipped += skipped;
        warn!(
            "[Scheduler] Stall detected, skipped {} overdue ticks; resuming at tick {} ({:.3}s)",
            skipped, self.cursor.tick_index, self.cursor.next_tick_time
        );
    }
}
