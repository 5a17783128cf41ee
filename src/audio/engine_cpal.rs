//! CPAL-based audio sink for desktop platforms (Linux, macOS, Windows)
//!
//! The output stream is opened lazily by `acquire()`. Because `cpal::Stream`
//! cannot leave the thread that built it, a small owner thread builds the
//! stream, reports success or failure back, and then parks until the sink is
//! dropped. Tone requests cross into the audio callback through an `rtrb`
//! ring buffer; the callback's frame counter is the sink's clock.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use rtrb::{Consumer, Producer, RingBuffer};
use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;

use crate::audio::sink::AudioSink;
use crate::audio::synth::Mixer;
use crate::audio::tone::ToneRequest;
use crate::config::AudioConfig;
use crate::error::{log_audio_error, AudioError};

/// How long `acquire()` waits for the device to come up
const OPEN_TIMEOUT: Duration = Duration::from_secs(2);
const OPEN_POLL: Duration = Duration::from_millis(5);

/// State shared with the audio callback
struct StreamClock {
    frames: AtomicU64,
    sample_rate: AtomicU32,
    failed: AtomicBool,
}

impl StreamClock {
    fn seconds(&self) -> f64 {
        let sample_rate = self.sample_rate.load(Ordering::Acquire);
        if sample_rate == 0 {
            return 0.0;
        }
        self.frames.load(Ordering::Acquire) as f64 / sample_rate as f64
    }
}

struct StreamOwner {
    stop_tx: oneshot::Sender<()>,
    thread: JoinHandle<()>,
}

pub struct CpalSink {
    config: AudioConfig,
    clock: Arc<StreamClock>,
    producer: Mutex<Option<Producer<ToneRequest>>>,
    owner: Mutex<Option<StreamOwner>>,
}

impl CpalSink {
    pub fn new(config: AudioConfig) -> Self {
        Self {
            config,
            clock: Arc::new(StreamClock {
                frames: AtomicU64::new(0),
                sample_rate: AtomicU32::new(0),
                failed: AtomicBool::new(false),
            }),
            producer: Mutex::new(None),
            owner: Mutex::new(None),
        }
    }

    fn open(&self) -> Result<(Producer<ToneRequest>, StreamOwner), AudioError> {
        let (producer, consumer) = RingBuffer::new(self.config.tone_queue_capacity);
        let (ready_tx, mut ready_rx) = oneshot::channel::<Result<u32, AudioError>>();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let clock = Arc::clone(&self.clock);
        let gain = self.config.master_gain;

        let thread = std::thread::Builder::new()
            .name("fretflow-audio".to_string())
            .spawn(move || match build_stream(consumer, clock, gain) {
                Ok((stream, sample_rate)) => {
                    let _ = ready_tx.send(Ok(sample_rate));
                    // Blocks until the sink is dropped or re-acquired.
                    let _ = stop_rx.blocking_recv();
                    drop(stream);
                }
                Err(err) => {
                    let _ = ready_tx.send(Err(err));
                }
            })
            .map_err(|e| AudioError::Unavailable {
                reason: format!("failed to spawn audio thread: {}", e),
            })?;

        match await_reply(&mut ready_rx, OPEN_TIMEOUT) {
            Ok(Ok(sample_rate)) => {
                log::info!("[CpalSink] Output stream running at {} Hz", sample_rate);
                Ok((producer, StreamOwner { stop_tx, thread }))
            }
            Ok(Err(err)) => {
                let _ = thread.join();
                Err(err)
            }
            Err(err) => {
                let _ = stop_tx.send(());
                Err(err)
            }
        }
    }

    fn shutdown_stream(&self) {
        let owner = self.owner.lock().ok().and_then(|mut guard| guard.take());
        if let Some(owner) = owner {
            let _ = owner.stop_tx.send(());
            let _ = owner.thread.join();
        }
    }
}

/// Wait for the owner thread's reply.
///
/// `acquire()` may run on the session worker's runtime, where a blocking
/// receive would panic, so the receiver is polled until `timeout`.
fn await_reply<T>(rx: &mut oneshot::Receiver<T>, timeout: Duration) -> Result<T, AudioError> {
    let deadline = Instant::now() + timeout;
    loop {
        match rx.try_recv() {
            Ok(value) => return Ok(value),
            Err(TryRecvError::Closed) => {
                return Err(AudioError::Unavailable {
                    reason: "audio thread exited before opening the device".to_string(),
                })
            }
            Err(TryRecvError::Empty) if Instant::now() < deadline => {
                std::thread::sleep(OPEN_POLL);
            }
            Err(TryRecvError::Empty) => {
                return Err(AudioError::Unavailable {
                    reason: "timed out opening output device".to_string(),
                })
            }
        }
    }
}

impl AudioSink for CpalSink {
    fn acquire(&self) -> Result<(), AudioError> {
        if self.is_available() {
            return Ok(());
        }
        // A stream that reported an error is torn down and rebuilt.
        self.shutdown_stream();
        self.clock.failed.store(false, Ordering::Release);

        let (producer, owner) = self.open().map_err(|err| {
            log_audio_error(&err, "CpalSink::acquire");
            err
        })?;

        *self.producer.lock().map_err(|_| AudioError::LockPoisoned {
            component: "CpalSink producer".to_string(),
        })? = Some(producer);
        *self.owner.lock().map_err(|_| AudioError::LockPoisoned {
            component: "CpalSink owner".to_string(),
        })? = Some(owner);
        Ok(())
    }

    fn is_available(&self) -> bool {
        let has_producer = self
            .producer
            .lock()
            .map(|guard| guard.is_some())
            .unwrap_or(false);
        has_producer && !self.clock.failed.load(Ordering::Acquire)
    }

    fn current_time(&self) -> f64 {
        self.clock.seconds()
    }

    fn schedule(&self, tone: ToneRequest) -> Result<(), AudioError> {
        let mut guard = self.producer.lock().map_err(|_| AudioError::LockPoisoned {
            component: "CpalSink producer".to_string(),
        })?;
        let producer = guard.as_mut().ok_or_else(|| AudioError::Unavailable {
            reason: "output stream not open".to_string(),
        })?;
        producer.push(tone).map_err(|_| AudioError::QueueFull)
    }
}

impl Drop for CpalSink {
    fn drop(&mut self) {
        self.shutdown_stream();
    }
}

fn build_stream(
    mut tones: Consumer<ToneRequest>,
    clock: Arc<StreamClock>,
    gain: f32,
) -> Result<(cpal::Stream, u32), AudioError> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| AudioError::Unavailable {
            reason: "No default output device found".to_string(),
        })?;

    let config = device
        .default_output_config()
        .map_err(|e| AudioError::StreamOpenFailed {
            reason: format!("Failed to get default output config: {:?}", e),
        })?;

    if config.sample_format() != cpal::SampleFormat::F32 {
        return Err(AudioError::UnsupportedFormat {
            format: format!("{:?}", config.sample_format()),
        });
    }

    let stream_config: cpal::StreamConfig = config.into();
    let channels_count = stream_config.channels as usize;
    let sample_rate = stream_config.sample_rate.0;
    clock.sample_rate.store(sample_rate, Ordering::Release);

    let callback_clock = Arc::clone(&clock);
    let error_clock = Arc::clone(&clock);
    let mut mixer = Mixer::new(gain);
    let sr = sample_rate as f64;

    let stream = device
        .build_output_stream(
            &stream_config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                while let Ok(tone) = tones.pop() {
                    let _ = mixer.push(tone);
                }

                let frame_count = data.len() / channels_count;
                let frame_start = callback_clock.frames.load(Ordering::Relaxed);

                for (i, frame) in data.chunks_mut(channels_count).enumerate() {
                    let t = (frame_start + i as u64) as f64 / sr;
                    let sample = mixer.next_sample(t);
                    for out in frame.iter_mut() {
                        *out = sample;
                    }
                }

                let frame_end = frame_start + frame_count as u64;
                mixer.prune(frame_end as f64 / sr);
                callback_clock.frames.store(frame_end, Ordering::Release);
            },
            move |err| {
                error_clock.failed.store(true, Ordering::Release);
                eprintln!("Output stream error: {}", err);
            },
            None,
        )
        .map_err(|e| AudioError::StreamOpenFailed {
            reason: format!("{:?}", e),
        })?;

    stream.play().map_err(|e| AudioError::HardwareError {
        details: format!("Output start failed: {}", e),
    })?;

    Ok((stream, sample_rate))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_from_owner_thread() {
        let (tx, mut rx) = oneshot::channel::<Result<u32, AudioError>>();
        let owner = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            let _ = tx.send(Ok(48_000));
        });

        let reply = await_reply(&mut rx, Duration::from_secs(2)).unwrap();
        assert_eq!(reply, Ok(48_000));
        owner.join().unwrap();
    }

    #[test]
    fn test_reply_inside_runtime_does_not_panic() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        let (tx, mut rx) = oneshot::channel::<u32>();
        tx.send(7).unwrap();

        let reply = runtime.block_on(async { await_reply(&mut rx, Duration::from_millis(50)) });
        assert_eq!(reply.unwrap(), 7);
    }

    #[test]
    fn test_owner_thread_gone_or_silent() {
        let (tx, mut rx) = oneshot::channel::<u32>();
        drop(tx);
        let err = await_reply(&mut rx, Duration::from_secs(2)).unwrap_err();
        assert!(matches!(err, AudioError::Unavailable { .. }));

        let (_tx, mut rx) = oneshot::channel::<u32>();
        let err = await_reply(&mut rx, Duration::from_millis(20)).unwrap_err();
        assert!(matches!(err, AudioError::Unavailable { .. }));
    }
}
