use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use fretflow::audio::wav::write_wav;
use fretflow::config::AppConfig;
use fretflow::engine::{ClockSource, SessionHandle, SystemClock};
use fretflow::session::{format_clock, SessionLoad, SessionMachine, SessionStatus};
use fretflow::simulation::{run_simulation, ScheduledAction, SimulationPlan};
use fretflow::{RecordingSink, SharedSink};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "fretflow_cli",
    about = "Practice session runner: warmup, timed exercise, metronome"
)]
struct Cli {
    /// Engine configuration JSON (defaults to assets/fretflow_config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone)]
struct SessionArgs {
    #[arg(long, default_value = "Quick Start")]
    title: String,
    /// Exercise length in seconds
    #[arg(long, default_value_t = 300.0)]
    duration: f64,
    #[arg(long, default_value_t = 120)]
    bpm: u32,
    #[arg(long)]
    notes: Option<String>,
}

impl SessionArgs {
    fn to_load(&self) -> SessionLoad {
        SessionLoad {
            title: self.title.clone(),
            duration: self.duration,
            bpm: self.bpm,
            notes: self.notes.clone(),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a session offline under simulated time and print a JSON report
    Simulate {
        #[command(flatten)]
        session: SessionArgs,
        /// Largest random delay added to each host wake-up (milliseconds)
        #[arg(long, default_value_t = 0.0)]
        jitter_ms: f64,
        #[arg(long, default_value_t = 0)]
        seed: u64,
        /// Timed user action, `<seconds>=<status|toggle|bpm:N>`; repeatable
        #[arg(long = "action")]
        actions: Vec<ScheduledAction>,
        /// Stop the simulation at this time (seconds)
        #[arg(long)]
        until: Option<f64>,
        /// Do not request warmup at time zero
        #[arg(long)]
        no_autostart: bool,
        /// Render the session's audio to a WAV file
        #[arg(long)]
        wav: Option<PathBuf>,
        /// Write the report here instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Run a session in real time
    Run {
        #[command(flatten)]
        session: SessionArgs,
        /// Do not open an audio device
        #[arg(long)]
        silent: bool,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => AppConfig::load_from_file(path),
        None => AppConfig::load(),
    };

    match cli.command {
        Commands::Simulate {
            session,
            jitter_ms,
            seed,
            actions,
            until,
            no_autostart,
            wav,
            output,
        } => {
            let plan = SimulationPlan {
                load: session.to_load(),
                jitter_ms,
                seed,
                autostart: !no_autostart,
                actions,
                until,
            };
            run_simulate(&config, &plan, wav, output)
        }
        Commands::Run { session, silent } => run_live(&config, &session, silent),
    }
}

fn run_simulate(
    config: &AppConfig,
    plan: &SimulationPlan,
    wav: Option<PathBuf>,
    output: Option<PathBuf>,
) -> Result<ExitCode> {
    let report = run_simulation(config, plan).context("running simulation")?;

    if let Some(path) = wav {
        write_wav(&path, &report.tones, config.audio.sample_rate, config.audio.master_gain)
            .with_context(|| format!("writing {}", path.display()))?;
    }

    let json = serde_json::to_string_pretty(&report)?;
    if let Some(path) = output {
        fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
    } else {
        println!("{json}");
    }
    Ok(ExitCode::from(0))
}

fn run_live(config: &AppConfig, session: &SessionArgs, silent: bool) -> Result<ExitCode> {
    let clock: Arc<dyn ClockSource> = Arc::new(SystemClock::new());
    let sink = output_sink(config, Arc::clone(&clock), silent);

    let machine = SessionMachine::new(config, clock, sink);
    let handle = SessionHandle::spawn(machine).context("starting session worker")?;
    let mut snapshots = handle.subscribe();

    handle.load(session.to_load()).context("loading session")?;
    handle
        .request_status(SessionStatus::Warmup)
        .context("starting warmup")?;

    let mut last_line = String::new();
    loop {
        let snapshot = match snapshots.blocking_recv() {
            Ok(snapshot) => snapshot,
            Err(RecvError::Lagged(_)) => continue,
            Err(RecvError::Closed) => break,
        };

        let line = format!(
            "{:>9}  {:>6}  {:>3}%  {} BPM",
            snapshot.label,
            format_clock(snapshot.display_time.ceil()),
            snapshot.display_progress.floor(),
            snapshot.bpm
        );
        if line != last_line {
            println!("{line}");
            last_line = line;
        }
        if snapshot.status == SessionStatus::Finished {
            break;
        }
    }

    handle.shutdown();
    Ok(ExitCode::from(0))
}

#[cfg(feature = "hardware_audio")]
fn output_sink(config: &AppConfig, clock: Arc<dyn ClockSource>, silent: bool) -> SharedSink {
    if silent {
        return Arc::new(RecordingSink::new(clock));
    }
    Arc::new(fretflow::audio::CpalSink::new(config.audio.clone()))
}

#[cfg(not(feature = "hardware_audio"))]
fn output_sink(_config: &AppConfig, clock: Arc<dyn ClockSource>, silent: bool) -> SharedSink {
    if !silent {
        eprintln!("Built without hardware_audio; running silently");
    }
    Arc::new(RecordingSink::new(clock))
}
