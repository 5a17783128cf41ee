//! Recording sink for tests and offline simulation
//!
//! Keeps every scheduled tone in memory instead of playing it. Its clock is
//! borrowed from the engine's [ClockSource] so a `ManualClock` steps both
//! the polling cadence and the "audio" time together. Availability can be
//! toggled to exercise the silent-degradation path.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use crate::audio::sink::AudioSink;
use crate::audio::tone::{ToneKind, ToneRequest};
use crate::engine::clock::ClockSource;
use crate::error::AudioError;

pub struct RecordingSink {
    clock: Arc<dyn ClockSource>,
    available: AtomicBool,
    acquired: AtomicBool,
    acquire_attempts: AtomicU32,
    tones: Mutex<Vec<ToneRequest>>,
}

impl RecordingSink {
    /// Sink whose device can always be acquired
    pub fn new(clock: Arc<dyn ClockSource>) -> Self {
        Self {
            clock,
            available: AtomicBool::new(true),
            acquired: AtomicBool::new(false),
            acquire_attempts: AtomicU32::new(0),
            tones: Mutex::new(Vec::new()),
        }
    }

    /// Sink whose device refuses acquisition until `set_device_present(true)`
    pub fn unavailable(clock: Arc<dyn ClockSource>) -> Self {
        let sink = Self::new(clock);
        sink.available.store(false, Ordering::SeqCst);
        sink
    }

    /// Plug or unplug the simulated device. Unplugging also drops the
    /// current acquisition.
    pub fn set_device_present(&self, present: bool) {
        self.available.store(present, Ordering::SeqCst);
        if !present {
            self.acquired.store(false, Ordering::SeqCst);
        }
    }

    pub fn acquire_attempts(&self) -> u32 {
        self.acquire_attempts.load(Ordering::SeqCst)
    }

    /// Snapshot of every tone scheduled so far, in scheduling order
    pub fn tones(&self) -> Vec<ToneRequest> {
        self.tones
            .lock()
            .map(|tones| tones.clone())
            .unwrap_or_default()
    }

    pub fn count(&self, kind: ToneKind) -> usize {
        self.tones().iter().filter(|tone| tone.kind == kind).count()
    }

    /// Start times of the metronome clicks
    pub fn click_times(&self) -> Vec<f64> {
        self.tones()
            .iter()
            .filter(|tone| tone.is_metronome())
            .map(|tone| tone.start_time)
            .collect()
    }

    pub fn clear(&self) {
        if let Ok(mut tones) = self.tones.lock() {
            tones.clear();
        }
    }
}

impl AudioSink for RecordingSink {
    fn acquire(&self) -> Result<(), AudioError> {
        self.acquire_attempts.fetch_add(1, Ordering::SeqCst);
        if !self.available.load(Ordering::SeqCst) {
            return Err(AudioError::Unavailable {
                reason: "recording sink has no device".to_string(),
            });
        }
        self.acquired.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_available(&self) -> bool {
        self.acquired.load(Ordering::SeqCst)
    }

    fn current_time(&self) -> f64 {
        self.clock.now()
    }

    fn schedule(&self, tone: ToneRequest) -> Result<(), AudioError> {
        if !self.is_available() {
            return Err(AudioError::Unavailable {
                reason: "recording sink not acquired".to_string(),
            });
        }
        let mut tones = self.tones.lock().map_err(|_| AudioError::LockPoisoned {
            component: "RecordingSink".to_string(),
        })?;
        tones.push(tone);
        Ok(())
    }
}
