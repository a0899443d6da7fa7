use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::{TempDir, tempdir};

const COIN_YAML: &str = r#"
run_id: "coin_cli"
states: 2
transition:
  matrix:
    - [0.9, 0.1]
    - [0.1, 0.9]
likelihood:
  table:
    - [0.8, 0.2]
    - [0.0, 0.0]
steps:
  - { observation: 0 }
  - { observation: 0 }
outputs:
  jsonl: "JSONL_PATH"
"#;

fn write_scenario(dir: &TempDir, steps_override: Option<&str>) -> std::path::PathBuf {
    let jsonl = dir.path().join("{run_id}/posterior.jsonl");
    let mut yaml = COIN_YAML.replace("JSONL_PATH", &jsonl.display().to_string());
    if let Some(steps) = steps_override {
        yaml = yaml.replace(
            "  - { observation: 0 }\n  - { observation: 0 }\n",
            steps,
        );
    }
    let path = dir.path().join("scenario.yaml");
    fs::write(&path, yaml).expect("write scenario");
    path
}

fn bench() -> Command {
    Command::cargo_bin("histogram-bench").expect("binary built")
}

#[test]
fn validate_only_skips_the_run() {
    let dir = tempdir().expect("temp dir");
    let scenario = write_scenario(&dir, None);

    bench()
        .arg("--config")
        .arg(&scenario)
        .arg("--validate-only")
        .assert()
        .success()
        .stdout(predicate::str::contains("Loaded scenario 'coin_cli'"))
        .stdout(predicate::str::contains("Validation-only mode"));

    assert!(!dir.path().join("coin_cli").exists());
}

#[test]
fn overrides_apply_to_the_run() {
    let dir = tempdir().expect("temp dir");
    let scenario = write_scenario(&dir, None);

    bench()
        .arg("--config")
        .arg(&scenario)
        .args(["--run-id", "renamed", "--samples", "5", "--method", "ripley"])
        .args(["--seed", "11"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Run complete for 'renamed'"));

    let jsonl = dir.path().join("renamed/posterior.jsonl");
    let text = fs::read_to_string(&jsonl).expect("posterior log written");
    let rows: Vec<serde_json::Value> = text
        .lines()
        .map(|line| serde_json::from_str(line).expect("row is JSON"))
        .collect();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1]["run_id"], "renamed");
    assert_eq!(rows[1]["samples"].as_array().map(Vec::len), Some(5));
}

#[test]
fn unknown_method_is_rejected() {
    let dir = tempdir().expect("temp dir");
    let scenario = write_scenario(&dir, None);

    bench()
        .arg("--config")
        .arg(&scenario)
        .args(["--method", "stratified"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not supported"));
}

#[test]
fn collapsed_posterior_fails_the_run() {
    let dir = tempdir().expect("temp dir");
    let scenario = write_scenario(
        &dir,
        Some("  - { observation: 0 }\n  - { observation: 1 }\n"),
    );

    bench()
        .arg("--config")
        .arg(&scenario)
        .assert()
        .failure()
        .stdout(predicate::str::contains("1 of 2 steps"))
        .stderr(predicate::str::contains("posterior collapsed at step 1"));

    let rows = fs::read_to_string(dir.path().join("coin_cli/posterior.jsonl"))
        .expect("partial log kept");
    assert_eq!(rows.lines().count(), 1);
}

#[test]
fn missing_config_reports_path() {
    let dir = tempdir().expect("temp dir");
    let missing = dir.path().join("absent.yaml");

    bench()
        .arg("--config")
        .arg(&missing)
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read config"));

    assert!(!Path::new(&missing).exists());
}
