//! SessionHandle: real-time driver for a `SessionMachine`.
//!
//! The machine lives on a dedicated worker thread running a current-thread
//! Tokio runtime. The worker sleeps until the machine's next due callback or
//! the next command, whichever comes first, so every timer tick, scheduler
//! poll and status change runs on that one thread. Callers talk to it through
//! blocking request methods; snapshots fan out over a broadcast channel.

use std::sync::Mutex;
use std::thread::JoinHandle;
use std::time::Duration;

use futures::{Stream, StreamExt};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_stream::wrappers::BroadcastStream;

use crate::error::SessionError;
use crate::session::{SessionLoad, SessionMachine, SessionSnapshot, SessionStatus};

const COMMAND_CHANNEL_CAPACITY: usize = 32;

type Reply<T> = oneshot::Sender<Result<T, SessionError>>;

/// Command accepted by the session worker
#[derive(Debug)]
pub enum SessionCommand {
    Load { load: SessionLoad, reply: Reply<()> },
    RequestStatus { status: SessionStatus, reply: Reply<()> },
    TogglePlay { reply: Reply<SessionStatus> },
    SetTempo { bpm: u32, reply: Reply<()> },
    Snapshot { reply: oneshot::Sender<SessionSnapshot> },
    Shutdown,
}

pub struct SessionHandle {
    command_tx: mpsc::Sender<SessionCommand>,
    snapshot_tx: broadcast::Sender<SessionSnapshot>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl SessionHandle {
    /// Move `machine` onto a new worker thread.
    ///
    /// The machine's own clock decides when callbacks are due, so it should be
    /// a real-time clock such as `SystemClock`.
    pub fn spawn(machine: SessionMachine) -> Result<Self, SessionError> {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let snapshot_tx = machine.snapshot_sender();

        let worker = std::thread::Builder::new()
            .name("fretflow-session".to_string())
            .spawn(move || run_worker(machine, command_rx))
            .map_err(|err| {
                log::error!("[SessionHandle] Failed to spawn session worker: {}", err);
                SessionError::DriverClosed
            })?;

        Ok(Self {
            command_tx,
            snapshot_tx,
            worker: Mutex::new(Some(worker)),
        })
    }

    // ========================================================================
    // REQUESTS
    // ========================================================================
    //
    // These block the calling thread until the worker replies and must not be
    // called from inside an async runtime.

    pub fn load(&self, load: SessionLoad) -> Result<(), SessionError> {
        self.request(|reply| SessionCommand::Load { load, reply })?
    }

    pub fn request_status(&self, status: SessionStatus) -> Result<(), SessionError> {
        self.request(|reply| SessionCommand::RequestStatus { status, reply })?
    }

    pub fn toggle_play(&self) -> Result<SessionStatus, SessionError> {
        self.request(|reply| SessionCommand::TogglePlay { reply })?
    }

    pub fn set_tempo(&self, bpm: u32) -> Result<(), SessionError> {
        self.request(|reply| SessionCommand::SetTempo { bpm, reply })?
    }

    pub fn snapshot(&self) -> Result<SessionSnapshot, SessionError> {
        self.request(|reply| SessionCommand::Snapshot { reply })
    }

    fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> SessionCommand,
    ) -> Result<T, SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .blocking_send(build(reply_tx))
            .map_err(|_| SessionError::DriverClosed)?;
        reply_rx.blocking_recv().map_err(|_| SessionError::DriverClosed)
    }

    // ========================================================================
    // SUBSCRIPTIONS
    // ========================================================================

    pub fn subscribe(&self) -> broadcast::Receiver<SessionSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Snapshots as a `Stream`. Lagged gaps are skipped.
    pub fn snapshot_stream(&self) -> impl Stream<Item = SessionSnapshot> {
        BroadcastStream::new(self.snapshot_tx.subscribe())
            .filter_map(|result| futures::future::ready(result.ok()))
    }

    /// Stop the worker and wait for it. The session is left idle.
    pub fn shutdown(&self) {
        let worker = self.worker.lock().ok().and_then(|mut guard| guard.take());
        if let Some(worker) = worker {
            let _ = self.command_tx.blocking_send(SessionCommand::Shutdown);
            if worker.join().is_err() {
                log::error!("[SessionHandle] Session worker panicked");
            }
        }
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker(mut machine: SessionMachine, mut command_rx: mpsc::Receiver<SessionCommand>) {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .expect("Failed to create Tokio runtime for session worker");

    rt.block_on(async move {
        tracing::info!("session worker started");

        loop {
            let wait = machine
                .next_due()
                .map(|due| Duration::from_secs_f64((due - machine.clock().now()).max(0.0)));

            tokio::select! {
                command = command_rx.recv() => match command {
                    Some(SessionCommand::Shutdown) | None => break,
                    Some(command) => handle_command(&mut machine, command),
                },
                _ = sleep_until_due(wait) => {
                    machine.advance();
                }
            }
        }

        if machine.status() != SessionStatus::Idle {
            let _ = machine.request_status(SessionStatus::Idle);
        }
        tracing::info!("session worker stopped");
    });
}

async fn sleep_until_due(wait: Option<Duration>) {
    match wait {
        Some(wait) => tokio::time::sleep(wait).await,
        None => futures::future::pending::<()>().await,
    }
}

fn handle_command(machine: &mut SessionMachine, command: SessionCommand) {
    tracing::debug!(?command, "session command");

    // A dropped reply receiver just means the caller stopped waiting
    match command {
        SessionCommand::Load { load, reply } => {
            let _ = reply.send(machine.load_session(load));
        }
        SessionCommand::RequestStatus { status, reply } => {
            let _ = reply.send(machine.request_status(status));
        }
        SessionCommand::TogglePlay { reply } => {
            let _ = reply.send(machine.toggle_play());
        }
        SessionCommand::SetTempo { bpm, reply } => {
            let _ = reply.send(machine.set_tempo(bpm));
        }
        SessionCommand::Snapshot { reply } => {
            let _ = reply.send(machine.snapshot());
        }
        SessionCommand::Shutdown => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::recording::RecordingSink;
    use crate::audio::tone::ToneKind;
    use crate::config::AppConfig;
    use crate::engine::clock::SystemClock;
    use std::sync::Arc;
    use std::time::Instant;

    fn short_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.countdown.warmup_seconds = 1;
        config
    }

    fn spawn_recording() -> (SessionHandle, Arc<RecordingSink>) {
        let clock = Arc::new(SystemClock::new());
        let sink = Arc::new(RecordingSink::new(clock.clone()));
        let machine = SessionMachine::new(&short_config(), clock, sink.clone());
        (SessionHandle::spawn(machine).unwrap(), sink)
    }

    fn load(duration: f64) -> SessionLoad {
        SessionLoad {
            title: "Chromatic run".to_string(),
            duration,
            bpm: 240,
            notes: None,
        }
    }

    #[test]
    fn test_runs_to_finished_in_real_time() {
        let (handle, sink) = spawn_recording();
        let mut rx = handle.subscribe();

        handle.load(load(0.5)).unwrap();
        handle.request_status(SessionStatus::Warmup).unwrap();

        let deadline = Instant::now() + Duration::from_secs(10);
        let mut finished = false;
        while Instant::now() < deadline {
            match rx.try_recv() {
                Ok(snapshot) if snapshot.status == SessionStatus::Finished => {
                    finished = true;
                    break;
                }
                Ok(_) | Err(broadcast::error::TryRecvError::Lagged(_)) => {}
                Err(_) => std::thread::sleep(Duration::from_millis(5)),
            }
        }

        assert!(finished);
        assert_eq!(sink.count(ToneKind::CountdownBeep), 1);
        assert_eq!(sink.count(ToneKind::CompletionChime), 1);
        assert!(!sink.click_times().is_empty());
    }

    #[test]
    fn test_rejections_cross_the_channel() {
        let (handle, _sink) = spawn_recording();
        assert_eq!(
            handle.request_status(SessionStatus::Finished),
            Err(SessionError::InvalidTransition {
                from: SessionStatus::Idle,
                to: SessionStatus::Finished,
            })
        );
        assert_eq!(
            handle.set_tempo(999),
            Err(SessionError::TempoOutOfRange { bpm: 999 })
        );
        assert_eq!(handle.snapshot().unwrap().status, SessionStatus::Idle);
    }

    #[test]
    fn test_toggle_and_snapshot_stream() {
        let (handle, _sink) = spawn_recording();
        let mut stream = Box::pin(handle.snapshot_stream());

        assert_eq!(handle.toggle_play().unwrap(), SessionStatus::Warmup);
        let first = futures::executor::block_on(stream.next()).unwrap();
        assert_eq!(first.status, SessionStatus::Warmup);
        assert!(first.is_warmup);

        assert_eq!(handle.toggle_play().unwrap(), SessionStatus::Paused);
        assert_eq!(handle.snapshot().unwrap().status, SessionStatus::Paused);
    }

    #[test]
    fn test_requests_fail_after_shutdown() {
        let (handle, _sink) = spawn_recording();
        handle.request_status(SessionStatus::Warmup).unwrap();
        handle.shutdown();

        assert_eq!(handle.snapshot(), Err(SessionError::DriverClosed));
        assert_eq!(
            handle.request_status(SessionStatus::Idle),
            Err(SessionError::DriverClosed)
        );
    }
}
