use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

// 10 ms ticks, five ticks of dead time, 1 pulse per tick = 1 mm/s.
fn write_valid_config(dir: &tempfile::TempDir) -> PathBuf {
    let toml = r#"
[timing]
period_ms = 10
dead_time_ms = 50

[model]
a = 5.0
nonlin_a = 1.0
nonlin_b = 0.0

[encoder]
table = [[0, 0.0], [10000, 10.0]]

[sim]
pulses_per_meter = 100000.0
"#;
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

#[rstest]
#[case(&["--help"], 0, "Usage:", "stdout")]
#[case(&["self-check"], 0, "OK", "stdout")]
#[case(&["simulate", "--speed", "0.4", "--duration-ms", "6000"], 0, "simulate complete", "stdout")]
#[case(&["simulate"], 2, "required", "stderr")]
#[case(&["simulate", "--speed=-1"], 1, "Invalid argument", "stderr")]
#[case(&["run", "--speed", "0.2", "--duration-ms", "100"], 0, "run complete", "stdout")]
fn cli_table_cases(
    #[case] args: &[&str],
    #[case] exit_code: i32,
    #[case] needle: &str,
    #[case] stream: &str,
) {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let mut cmd = Command::cargo_bin("erumby").unwrap();

    // Always include a valid config to avoid relying on default path
    cmd.arg("--config").arg(&cfg).arg("--log-level").arg("error");

    for a in args {
        cmd.arg(a);
    }

    let assert = cmd.assert().code(exit_code);

    match stream {
        "stdout" => {
            assert.stdout(predicate::str::contains(needle));
        }
        "stderr" => {
            assert.stderr(predicate::str::contains(needle));
        }
        other => panic!("unknown stream: {other}"),
    }
}

#[rstest]
fn cli_reports_bad_calibration_header() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    // Write a bad-header CSV
    let bad_csv = dir.path().join("calib.csv");
    let mut f = fs::File::create(&bad_csv).unwrap();
    writeln!(f, "raw,value").unwrap();
    writeln!(f, "0,0.0").unwrap();
    writeln!(f, "10000,10.0").unwrap();

    let mut cmd = Command::cargo_bin("erumby").unwrap();
    cmd.arg("--config")
        .arg(&cfg)
        .arg("--calibration")
        .arg(&bad_csv)
        .arg("self-check");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Invalid headers"));
}

#[rstest]
fn calibration_is_reported_by_self_check() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    let csv = dir.path().join("calib.csv");
    fs::write(&csv, "pulses,speed_mps\n0,0.0\n5000,5.1\n10000,10.0\n").unwrap();

    let mut cmd = Command::cargo_bin("erumby").unwrap();
    cmd.arg("--config")
        .arg(&cfg)
        .arg("--calibration")
        .arg(&csv)
        .arg("self-check");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("3 points (calibration)"));
}

#[rstest]
#[case("[timing]\nperiod_ms = 10\ndead_time_ms = 15\n", "multiple")]
#[case("[observer]\ngains = [1.0]\n", "observer.gains")]
#[case("[radio]\ntolerance_us = 600\n", "overlap")]
fn invalid_config_is_explained(#[case] toml: &str, #[case] needle: &str) {
    let dir = tempdir().unwrap();
    let cfg = dir.path().join("bad.toml");
    fs::write(&cfg, toml).unwrap();

    let mut cmd = Command::cargo_bin("erumby").unwrap();
    cmd.arg("--config").arg(&cfg).arg("self-check");
    cmd.assert()
        .code(1)
        .stderr(predicate::str::contains("What happened: Configuration is invalid"))
        .stderr(predicate::str::contains(needle));
}

#[rstest]
fn missing_config_file_fails() {
    let dir = tempdir().unwrap();
    let mut cmd = Command::cargo_bin("erumby").unwrap();
    cmd.arg("--config")
        .arg(dir.path().join("nope.toml"))
        .arg("self-check");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("read config"));
}

/// Per-tick JSON lines expose the compensated estimate and the setpoint,
/// followed by one summary line.
#[rstest]
fn simulate_json_lines() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let mut cmd = Command::cargo_bin("erumby").unwrap();
    cmd.arg("--json")
        .arg("--log-level")
        .arg("error")
        .arg("--config")
        .arg(&cfg)
        .arg("simulate")
        .arg("--speed")
        .arg("0.5")
        .arg("--duration-ms")
        .arg("6000");

    let out = cmd.assert().success().get_output().stdout.clone();
    let stdout = String::from_utf8_lossy(&out);
    let lines: Vec<serde_json::Value> = stdout
        .lines()
        .map(|l| serde_json::from_str(l).expect("every stdout line is JSON"))
        .collect();
    assert_eq!(lines.len(), 601, "600 ticks plus the summary");

    let first = &lines[0];
    assert_eq!(first["tick"], 0);
    assert_eq!(first["mode"], "auto");
    assert_eq!(first["transition"], "auto");
    assert_eq!(first["setpoint"].as_f64(), Some(0.5));
    assert!(first["compensated"].as_f64().is_some());
    assert!(first["esc_us"].as_u64().is_some());

    let summary = lines.last().unwrap();
    assert!(summary.get("timestamp").and_then(|x| x.as_u64()).is_some());
    assert_eq!(summary["ticks"], 600);
    assert_eq!(summary["faults"], 0);
    let speed = summary["final_speed_mps"].as_f64().unwrap();
    assert!((speed - 0.5).abs() < 0.02, "final speed {speed}");
}

#[rstest]
fn stats_go_to_stderr() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let mut cmd = Command::cargo_bin("erumby").unwrap();
    cmd.arg("--config")
        .arg(&cfg)
        .arg("--log-level")
        .arg("error")
        .arg("simulate")
        .arg("--speed")
        .arg("0.3")
        .arg("--duration-ms")
        .arg("1000")
        .arg("--stats");
    cmd.assert()
        .success()
        .stderr(predicate::str::contains("--- erumby Stats ---"))
        .stderr(predicate::str::contains("Ticks: 100 (auto 100)"));
}

#[rstest]
fn json_errors_are_structured() {
    let dir = tempdir().unwrap();
    let cfg = dir.path().join("bad.toml");
    fs::write(&cfg, "[encoder]\ntable = [[0, 0.0]]\n").unwrap();

    let mut cmd = Command::cargo_bin("erumby").unwrap();
    cmd.arg("--json").arg("--config").arg(&cfg).arg("self-check");
    let out = cmd.assert().failure().get_output().stdout.clone();
    let v: serde_json::Value =
        serde_json::from_str(String::from_utf8_lossy(&out).trim()).expect("valid JSON");
    assert_eq!(v["reason"], "Error");
    assert!(v["message"].as_str().unwrap().contains("encoder.table"));
}
