//! Offline session simulation
//!
//! Runs a full session against a `ManualClock` and a `RecordingSink`, with
//! the host's wake-ups delayed by a seeded random jitter the way a busy UI
//! thread delays its timers. The report lists every status change, every
//! tone the engine asked for, and any rejected user action, so timing can be
//! inspected (or rendered to WAV) without audio hardware.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::audio::recording::RecordingSink;
use crate::audio::tone::{ToneKind, ToneRequest};
use crate::config::AppConfig;
use crate::engine::clock::{ClockSource, ManualClock};
use crate::error::{ErrorCode, SessionError};
use crate::session::{SessionLoad, SessionMachine, SessionSnapshot, SessionStatus};

/// A user action replayed during the simulation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SimAction {
    RequestStatus { status: SessionStatus },
    TogglePlay,
    SetTempo { bpm: u32 },
}

/// Action at an engine-clock time, written `<seconds>=<action>` on the
/// command line: `12.5=paused`, `20=toggle`, `30=bpm:60`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScheduledAction {
    pub at: f64,
    pub action: SimAction,
}

impl FromStr for ScheduledAction {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: String| SessionError::ConfigInvalid { reason };

        let (at, action) = s
            .split_once('=')
            .ok_or_else(|| invalid(format!("action '{}' is not <seconds>=<action>", s)))?;
        let at: f64 = at
            .trim()
            .parse()
            .map_err(|_| invalid(format!("bad action time '{}'", at)))?;
        if !at.is_finite() || at < 0.0 {
            return Err(invalid(format!("action time must be >= 0 (got {})", at)));
        }

        let action = action.trim();
        let action = if action.eq_ignore_ascii_case("toggle") {
            SimAction::TogglePlay
        } else if let Some(bpm) = action.strip_prefix("bpm:") {
            let bpm = bpm
                .trim()
                .parse()
                .map_err(|_| invalid(format!("bad tempo '{}'", bpm)))?;
            SimAction::SetTempo { bpm }
        } else {
            SimAction::RequestStatus {
                status: action.parse()?,
            }
        };
        Ok(Self { at, action })
    }
}

impl fmt::Display for SimAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimAction::RequestStatus { status } => write!(f, "{}", status),
            SimAction::TogglePlay => f.write_str("toggle"),
            SimAction::SetTempo { bpm } => write!(f, "bpm:{}", bpm),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationPlan {
    pub load: SessionLoad,
    /// Largest extra delay added to each host wake-up, in milliseconds
    pub jitter_ms: f64,
    pub seed: u64,
    /// Request `warmup` at time zero
    pub autostart: bool,
    pub actions: Vec<ScheduledAction>,
    /// Stop here even if the session has not finished
    pub until: Option<f64>,
}

impl SimulationPlan {
    pub fn new(load: SessionLoad) -> Self {
        Self {
            load,
            jitter_ms: 0.0,
            seed: 0,
            autostart: true,
            actions: Vec::new(),
            until: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusChange {
    pub at: f64,
    pub status: SessionStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedAction {
    pub at: f64,
    pub action: String,
    pub code: i32,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationReport {
    pub title: String,
    pub seed: u64,
    pub jitter_ms: f64,
    pub ended_at: f64,
    pub wakeups: u64,
    pub timeline: Vec<StatusChange>,
    pub rejected: Vec<RejectedAction>,
    pub tones: Vec<ToneRequest>,
    pub final_snapshot: SessionSnapshot,
}

impl SimulationReport {
    pub fn count(&self, kind: ToneKind) -> usize {
        self.tones.iter().filter(|tone| tone.kind == kind).count()
    }

    pub fn times_of(&self, kind: ToneKind) -> Vec<f64> {
        self.tones
            .iter()
            .filter(|tone| tone.kind == kind)
            .map(|tone| tone.start_time)
            .collect()
    }

    /// First time the session entered `status`
    pub fn entered(&self, status: SessionStatus) -> Option<f64> {
        self.timeline
            .iter()
            .find(|change| change.status == status)
            .map(|change| change.at)
    }
}

/// Run `plan` to completion (or to `plan.until`) under simulated time.
pub fn run_simulation(
    app: &AppConfig,
    plan: &SimulationPlan,
) -> Result<SimulationReport, SessionError> {
    app.validate()?;
    if !plan.jitter_ms.is_finite() || plan.jitter_ms < 0.0 {
        return Err(SessionError::ConfigInvalid {
            reason: format!("jitter must be >= 0 ms (got {})", plan.jitter_ms),
        });
    }

    let clock = Arc::new(ManualClock::new());
    let sink = Arc::new(RecordingSink::new(clock.clone()));
    let mut machine = SessionMachine::new(app, clock.clone(), sink.clone());
    machine.load_session(plan.load.clone())?;

    let mut actions = plan.actions.clone();
    actions.sort_by(|a, b| a.at.total_cmp(&b.at));
    let last_action = actions.last().map(|action| action.at).unwrap_or(0.0);
    let until = plan.until.unwrap_or_else(|| {
        let config = machine.config();
        last_action + config.warmup_duration + config.exercise_duration + 1.0
    });

    let mut rng = StdRng::seed_from_u64(plan.seed);
    let jitter = plan.jitter_ms / 1000.0;
    let mut timeline = vec![StatusChange {
        at: 0.0,
        status: machine.status(),
    }];
    let mut rejected = Vec::new();
    let mut wakeups = 0_u64;

    info!(
        "[Simulation] '{}' for up to {:.1}s, jitter {} ms, seed {}",
        machine.config().title,
        until,
        plan.jitter_ms,
        plan.seed
    );

    if plan.autostart {
        machine.request_status(SessionStatus::Warmup)?;
        record_change(&mut timeline, &machine);
    }

    let mut pending = actions.into_iter().peekable();
    loop {
        let due = machine.next_due();
        let next_action = pending.peek().map(|action| action.at);

        let take_action = match (due, next_action) {
            (_, None) => false,
            (None, Some(_)) => true,
            (Some(due), Some(at)) => at <= due,
        };

        if take_action {
            let Some(scheduled) = pending.next() else {
                break;
            };
            if scheduled.at > until {
                break;
            }
            clock.set(scheduled.at);
            // Anything due before the action fires first
            machine.advance_to(scheduled.at);
            let now = clock.now();
            if let Err(err) = apply_action(&mut machine, scheduled.action) {
                rejected.push(RejectedAction {
                    at: now,
                    action: scheduled.action.to_string(),
                    code: err.code(),
                    error: err.message(),
                });
            }
            record_change(&mut timeline, &machine);
            continue;
        }

        let Some(due) = due else {
            break;
        };
        let wake = due + if jitter > 0.0 { rng.gen_range(0.0..=jitter) } else { 0.0 };
        if wake > until {
            break;
        }
        clock.set(wake);
        machine.advance_to(wake);
        wakeups += 1;
        record_change(&mut timeline, &machine);
    }

    let report = SimulationReport {
        title: machine.config().title.clone(),
        seed: plan.seed,
        jitter_ms: plan.jitter_ms,
        ended_at: clock.now(),
        wakeups,
        timeline,
        rejected,
        tones: sink.tones(),
        final_snapshot: machine.snapshot(),
    };
    debug!(
        "[Simulation] Ended at {:.3}s after {} wake-ups, {} tones",
        report.ended_at,
        report.wakeups,
        report.tones.len()
    );
    Ok(report)
}

fn apply_action(machine: &mut SessionMachine, action: SimAction) -> Result<(), SessionError> {
    match action {
        SimAction::RequestStatus { status } => machine.request_status(status),
        SimAction::TogglePlay => machine.toggle_play().map(|_| ()),
        SimAction::SetTempo { bpm } => machine.set_tempo(bpm),
    }
}

fn record_change(timeline: &mut Vec<StatusChange>, machine: &SessionMachine) {
    let status = machine.status();
    if timeline.last().map(|change| change.status) != Some(status) {
        timeline.push(StatusChange {
            at: machine.status_since(),
            status,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(duration: f64, bpm: u32) -> SimulationPlan {
        SimulationPlan::new(SessionLoad {
            title: "Legato study".to_string(),
            duration,
            bpm,
            notes: None,
        })
    }

    #[test]
    fn test_parse_actions() {
        let action: ScheduledAction = "12.5=paused".parse().unwrap();
        assert_eq!(action.at, 12.5);
        assert_eq!(
            action.action,
            SimAction::RequestStatus {
                status: SessionStatus::Paused
            }
        );
        assert_eq!(
            "3=toggle".parse::<ScheduledAction>().unwrap().action,
            SimAction::TogglePlay
        );
        assert_eq!(
            "4=bpm:60".parse::<ScheduledAction>().unwrap().action,
            SimAction::SetTempo { bpm: 60 }
        );
        assert!("paused".parse::<ScheduledAction>().is_err());
        assert!("-1=paused".parse::<ScheduledAction>().is_err());
        assert!("1=sideways".parse::<ScheduledAction>().is_err());
    }

    #[test]
    fn test_plain_run_timeline() {
        let report = run_simulation(&AppConfig::default(), &plan(10.0, 120)).unwrap();

        let statuses: Vec<_> = report.timeline.iter().map(|change| change.status).collect();
        assert_eq!(
            statuses,
            vec![
                SessionStatus::Idle,
                SessionStatus::Warmup,
                SessionStatus::Running,
                SessionStatus::Finished,
            ]
        );
        assert!((report.entered(SessionStatus::Running).unwrap() - 3.0).abs() < 1e-9);
        assert!((report.entered(SessionStatus::Finished).unwrap() - 13.0).abs() < 1e-9);
        assert_eq!(report.count(ToneKind::CountdownBeep), 3);
        assert_eq!(report.count(ToneKind::CompletionChime), 1);
        assert_eq!(report.final_snapshot.status, SessionStatus::Finished);
    }

    #[test]
    fn test_rejected_actions_are_reported() {
        let mut plan = plan(10.0, 120);
        plan.autostart = false;
        plan.actions = vec![
            "1=running".parse().unwrap(),
            "2=warmup".parse().unwrap(),
            "4=bpm:900".parse().unwrap(),
        ];
        let report = run_simulation(&AppConfig::default(), &plan).unwrap();

        assert_eq!(report.rejected.len(), 2);
        assert_eq!(report.rejected[0].action, "running");
        assert_eq!(report.rejected[0].code, 2003);
        assert_eq!(report.rejected[1].code, 2002);
        assert_eq!(report.final_snapshot.status, SessionStatus::Finished);
    }

    #[test]
    fn test_pause_extends_session() {
        let mut plan = plan(10.0, 120);
        plan.actions = vec!["5=paused".parse().unwrap(), "15=running".parse().unwrap()];
        let report = run_simulation(&AppConfig::default(), &plan).unwrap();

        let finished = report.entered(SessionStatus::Finished).unwrap();
        assert!((finished - 23.0).abs() < 1e-9, "finished at {}", finished);
        assert!(report
            .times_of(ToneKind::Downbeat)
            .iter()
            .all(|t| *t < 5.1 || *t > 15.0));
    }

    #[test]
    fn test_same_seed_same_report() {
        let mut plan = plan(8.0, 97);
        plan.jitter_ms = 60.0;
        plan.seed = 42;
        let first = run_simulation(&AppConfig::default(), &plan).unwrap();
        let second = run_simulation(&AppConfig::default(), &plan).unwrap();
        assert_eq!(first.tones, second.tones);
        assert_eq!(first.timeline, second.timeline);
    }

    #[test]
    fn test_jitter_does_not_shift_automatic_transitions() {
        let mut plan = plan(10.0, 120);
        plan.jitter_ms = 40.0;
        plan.seed = 7;
        let report = run_simulation(&AppConfig::default(), &plan).unwrap();

        let running = report.entered(SessionStatus::Running).unwrap();
        let finished = report.entered(SessionStatus::Finished).unwrap();
        assert!((running - 3.0).abs() < 1e-9, "running at {}", running);
        assert!((finished - 13.0).abs() < 1e-9, "finished at {}", finished);
    }

    #[test]
    fn test_rejects_negative_jitter() {
        let mut plan = plan(8.0, 120);
        plan.jitter_ms = -1.0;
        assert!(run_simulation(&AppConfig::default(), &plan).is_err());
    }

    #[test]
    fn test_until_cuts_run_short() {
        let mut plan = plan(600.0, 120);
        plan.until = Some(20.0);
        let report = run_simulation(&AppConfig::default(), &plan).unwrap();
        assert_eq!(report.final_snapshot.status, SessionStatus::Running);
        assert!(report.ended_at <= 20.0);
        assert_eq!(report.count(ToneKind::CompletionChime), 0);
    }
}
