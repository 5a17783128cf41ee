use std::process::Command;

use serde_json::Value;

fn cli() -> Command {
    Command::new(env!("CARGO_BIN_EXE_fretflow_cli"))
}

fn simulate(args: &[&str]) -> Value {
    let output = cli()
        .arg("simulate")
        .args(args)
        .output()
        .expect("simulate command");
    assert!(
        output.status.success(),
        "simulate exited with {:?}: {}",
        output.status.code(),
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8(output.stdout).expect("stdout utf8");
    serde_json::from_str(&stdout).expect("report JSON")
}

fn count_kind(report: &Value, kind: &str) -> usize {
    report["tones"]
        .as_array()
        .expect("tones array")
        .iter()
        .filter(|tone| tone["kind"] == kind)
        .count()
}

#[test]
fn simulate_prints_full_timeline() {
    let report = simulate(&["--duration", "5", "--bpm", "120", "--title", "Arpeggios"]);

    let statuses: Vec<&str> = report["timeline"]
        .as_array()
        .unwrap()
        .iter()
        .map(|change| change["status"].as_str().unwrap())
        .collect();
    assert_eq!(statuses, ["idle", "warmup", "running", "finished"]);
    assert_eq!(report["title"], "Arpeggios");
    assert_eq!(count_kind(&report, "countdown_beep"), 3);
    assert_eq!(count_kind(&report, "completion_chime"), 1);
    assert!(count_kind(&report, "downbeat") >= 2);
    assert_eq!(report["final_snapshot"]["status"], "finished");
    assert_eq!(report["final_snapshot"]["displayTime"], 5.0);
}

#[test]
fn simulate_reports_rejected_actions() {
    let report = simulate(&[
        "--duration",
        "4",
        "--no-autostart",
        "--action",
        "1=running",
        "--action",
        "2=toggle",
    ]);

    let rejected = report["rejected"].as_array().unwrap();
    assert_eq!(rejected.len(), 1);
    assert_eq!(rejected[0]["action"], "running");
    assert_eq!(rejected[0]["code"], 2003);
    assert_eq!(report["final_snapshot"]["status"], "finished");
}

#[test]
fn simulate_writes_wav() {
    let path = std::env::temp_dir().join(format!("fretflow-cli-{}.wav", std::process::id()));
    simulate(&["--duration", "2", "--wav", path.to_str().unwrap()]);

    let reader = hound::WavReader::open(&path).expect("wav written");
    assert_eq!(reader.spec().channels, 1);
    assert_eq!(reader.spec().sample_rate, 48000);
    // two-second exercise plus the trailing chime
    assert!(reader.duration() > 48000 * 6);

    let _ = std::fs::remove_file(&path);
}

#[test]
fn simulate_rejects_out_of_range_tempo() {
    let output = cli()
        .args(["simulate", "--bpm", "500"])
        .output()
        .expect("simulate command");
    assert!(!output.status.success());
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn simulate_rejects_malformed_action() {
    let output = cli()
        .args(["simulate", "--action", "soon=paused"])
        .output()
        .expect("simulate command");
    assert!(!output.status.success());
}
