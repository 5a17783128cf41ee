//! SessionMachine: the session's orchestration brain.
//!
//! Owns the status, both countdown timers, the metronome scheduler and the
//! cue tracker. Every status change re-asserts the full combination of
//! timers and scheduler for the target status, so repeating a transition is
//! harmless. Time moves only through `advance_to`, which fires each due
//! periodic callback in order; the machine itself never sleeps or spawns.

use std::sync::Arc;

use log::{debug, info, warn};
use tokio::sync::broadcast;

use crate::audio::sink::SharedSink;
use crate::audio::tone::{ToneKind, ToneRequest};
use crate::config::AppConfig;
use crate::engine::clock::ClockSource;
use crate::error::{log_audio_error, log_session_error, SessionError};
use crate::metronome::{LookaheadScheduler, SchedulerCursor, TempoSetting};
use crate::session::config::{SessionConfig, SessionLoad};
use crate::session::countdown::{CountdownState, CountdownTick, CountdownTimer};
use crate::session::cues::CountdownCues;
use crate::session::display::{status_label, SessionSnapshot};
use crate::session::status::SessionStatus;

const SNAPSHOT_CHANNEL_CAPACITY: usize = 256;

/// Periodic sources, in the order they fire when due at the same instant
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Source {
    SchedulerPoll,
    WarmupTick,
    ExerciseTick,
}

pub struct SessionMachine {
    clock: Arc<dyn ClockSource>,
    sink: SharedSink,
    config: SessionConfig,
    status: SessionStatus,
    /// Time the current status was entered
    status_since: f64,
    warmup_seconds: u32,
    warmup: CountdownTimer,
    exercise: CountdownTimer,
    scheduler: LookaheadScheduler,
    cues: CountdownCues,
    snapshot_tx: broadcast::Sender<SessionSnapshot>,
}

impl SessionMachine {
    /// Build an idle machine with the quick-start session loaded.
    pub fn new(app: &AppConfig, clock: Arc<dyn ClockSource>, sink: SharedSink) -> Self {
        let warmup_seconds = app.countdown.warmup_seconds;
        let mut config = SessionConfig::quick_start();
        config.warmup_duration = warmup_seconds as f64;

        let tick = app.countdown.tick();
        let (snapshot_tx, _) = broadcast::channel(SNAPSHOT_CHANNEL_CAPACITY);

        Self {
            warmup: CountdownTimer::new("warmup", config.warmup_duration, tick),
            exercise: CountdownTimer::new("exercise", config.exercise_duration, tick),
            scheduler: LookaheadScheduler::new(&app.scheduler, config.tempo, Arc::clone(&sink)),
            cues: CountdownCues::new(warmup_seconds),
            clock,
            sink,
            config,
            status: SessionStatus::Idle,
            status_since: 0.0,
            warmup_seconds,
            snapshot_tx,
        }
    }

    // ========================================================================
    // INBOUND REQUESTS
    // ========================================================================

    /// Replace the session configuration and force `idle`.
    ///
    /// An invalid request leaves the previous configuration and status intact.
    pub fn load_session(&mut self, load: SessionLoad) -> Result<(), SessionError> {
        let config = SessionConfig::from_load(load, self.warmup_seconds).map_err(|err| {
            log_session_error(&err, "load_session");
            err
        })?;

        info!(
            "[Session] Loaded '{}' ({:.0}s at {} BPM)",
            config.title,
            config.exercise_duration,
            config.tempo.bpm()
        );
        self.exercise.reconfigure(config.exercise_duration);
        self.warmup.reconfigure(config.warmup_duration);
        self.scheduler.set_tempo(config.tempo);
        self.config = config;

        let now = self.clock.now();
        self.apply_status(SessionStatus::Idle, now);
        self.publish(now);
        Ok(())
    }

    /// Move to `next` if the transition table allows it.
    pub fn request_status(&mut self, next: SessionStatus) -> Result<(), SessionError> {
        if !self.status.can_transition_to(next) {
            let err = SessionError::InvalidTransition {
                from: self.status,
                to: next,
            };
            log_session_error(&err, "request_status");
            return Err(err);
        }

        let now = self.clock.now();
        self.apply_status(next, now);
        self.publish(now);
        Ok(())
    }

    /// Single play/pause control. Returns the status it moved to.
    pub fn toggle_play(&mut self) -> Result<SessionStatus, SessionError> {
        let target = self.status.toggle_target();
        self.request_status(target)?;
        Ok(target)
    }

    /// Change tempo immediately, whatever the status.
    pub fn set_tempo(&mut self, bpm: u32) -> Result<(), SessionError> {
        let tempo = TempoSetting::new(bpm).map_err(|err| {
            log_session_error(&err, "set_tempo");
            err
        })?;

        if tempo != self.config.tempo {
            debug!("[Session] Tempo {} -> {} BPM", self.config.tempo.bpm(), bpm);
        }
        self.config.tempo = tempo;
        self.scheduler.set_tempo(tempo);
        self.publish(self.clock.now());
        Ok(())
    }

    // ========================================================================
    // TIME
    // ========================================================================

    /// Earliest pending periodic callback, if any source is active
    pub fn next_due(&self) -> Option<f64> {
        self.next_source().map(|(due, _)| due)
    }

    /// Fire every callback due at or before the clock's current time.
    pub fn advance(&mut self) -> usize {
        let now = self.clock.now();
        self.advance_to(now)
    }

    /// Fire every callback due at or before `now`, earliest first.
    ///
    /// Returns how many callbacks fired. A snapshot is published after each.
    pub fn advance_to(&mut self, now: f64) -> usize {
        let mut fired = 0;
        while let Some((due, source)) = self.next_source() {
            if due > now {
                break;
            }
            match source {
                Source::SchedulerPoll => {
                    self.scheduler.fire(now);
                }
                Source::WarmupTick => self.on_warmup_tick(due),
                Source::ExerciseTick => self.on_exercise_tick(due),
            }
            fired += 1;
            self.publish(due);
        }
        fired
    }

    fn next_source(&self) -> Option<(f64, Source)> {
        [
            (self.scheduler.next_poll_due(), Source::SchedulerPoll),
            (self.warmup.next_due(), Source::WarmupTick),
            (self.exercise.next_due(), Source::ExerciseTick),
        ]
        .into_iter()
        .filter_map(|(due, source)| due.map(|due| (due, source)))
        .min_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)))
    }

    fn on_warmup_tick(&mut self, at: f64) {
        let tick = self.warmup.fire(at);
        if tick == CountdownTick::Idle || self.status != SessionStatus::Warmup {
            return;
        }

        if let Some(second) = self.cues.observe(self.warmup.remaining()) {
            debug!("[Session] Warmup cue at {}s remaining", second);
            self.emit(ToneKind::CountdownBeep);
        }

        if tick == CountdownTick::Completed {
            info!("[Session] Warmup complete");
            self.apply_status(SessionStatus::Running, at);
        }
    }

    fn on_exercise_tick(&mut self, at: f64) {
        if self.exercise.fire(at) != CountdownTick::Completed {
            return;
        }
        if self.status != SessionStatus::Running {
            return;
        }
        info!("[Session] Exercise '{}' complete", self.config.title);
        self.apply_status(SessionStatus::Finished, at);
        self.emit(ToneKind::CompletionChime);
    }

    // ========================================================================
    // STATUS APPLICATION
    // ========================================================================

    /// Drive timers and scheduler into the combination for `next`.
    fn apply_status(&mut self, next: SessionStatus, at: f64) {
        match next {
            SessionStatus::Idle | SessionStatus::Finished => {
                self.warmup.reset();
                self.exercise.reset();
                self.scheduler.stop();
                self.cues.reset();
            }
            SessionStatus::Warmup => {
                self.scheduler.stop();
                self.exercise.reset();
                self.warmup.start(at);
            }
            SessionStatus::Running => {
                self.warmup.pause();
                if self.scheduler.start(at).is_err() {
                    warn!("[Session] Audio unavailable, continuing without metronome");
                }
                self.exercise.start(at);
            }
            SessionStatus::Paused => {
                self.warmup.pause();
                self.exercise.pause();
                self.scheduler.stop();
            }
        }

        if next != self.status {
            info!("[Session] {} -> {} at {:.3}s", self.status, next, at);
            self.status_since = at;
        }
        self.status = next;
    }

    /// Fire-and-forget cue or chime at the sink's current time.
    fn emit(&self, kind: ToneKind) {
        let result = self
            .sink
            .acquire()
            .and_then(|_| self.sink.schedule(ToneRequest::new(kind, self.sink.current_time())));
        if let Err(err) = result {
            log_audio_error(&err, "SessionMachine::emit");
        }
    }

    // ========================================================================
    // OUTBOUND
    // ========================================================================

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot_at(self.clock.now())
    }

    fn snapshot_at(&self, at: f64) -> SessionSnapshot {
        let is_warmup = self.status == SessionStatus::Warmup;
        let shown = if is_warmup { &self.warmup } else { &self.exercise };
        SessionSnapshot {
            at,
            status: self.status,
            display_time: shown.remaining(),
            display_progress: shown.progress(),
            is_warmup,
            label: status_label(self.status),
            title: self.config.title.clone(),
            bpm: self.config.tempo.bpm(),
            tick_index: self.scheduler.cursor().tick_index,
        }
    }

    fn publish(&self, at: f64) {
        // No subscribers is fine
        let _ = self.snapshot_tx.send(self.snapshot_at(at));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Sender side of the snapshot channel, for drivers that need to hand out
    /// subscriptions after the machine has moved to another thread
    pub fn snapshot_sender(&self) -> broadcast::Sender<SessionSnapshot> {
        self.snapshot_tx.clone()
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// When the current status was entered. Automatic transitions report the
    /// due time of the tick that caused them, not when the host woke up.
    pub fn status_since(&self) -> f64 {
        self.status_since
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn warmup_state(&self) -> CountdownState {
        self.warmup.state()
    }

    pub fn exercise_state(&self) -> CountdownState {
        self.exercise.state()
    }

    pub fn scheduler_cursor(&self) -> SchedulerCursor {
        self.scheduler.cursor()
    }

    pub fn clock(&self) -> &Arc<dyn ClockSource> {
        &self.clock
    }

    /// No timer running and no metronome playing
    pub fn is_quiescent(&self) -> bool {
        !self.warmup.is_running() && !self.exercise.is_running() && !self.scheduler.is_playing()
    }
}
