#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn seed(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("seed").unwrap();
    cmd.current_dir(dir.path()).env("SEED_ROOT", dir.path());
    cmd
}

/// `seed` with an executable search path that contains nothing.
fn seed_without_tools(dir: &TempDir) -> Command {
    let empty = dir.path().join("empty-bin");
    std::fs::create_dir_all(&empty).unwrap();
    let mut cmd = seed(dir);
    cmd.env("PATH", &empty);
    cmd
}

fn artifacts(dir: &TempDir, category: &str) -> Vec<PathBuf> {
    let path = dir.path().join(".seed/artifacts").join(category);
    if !path.is_dir() {
        return Vec::new();
    }
    let mut files: Vec<PathBuf> = std::fs::read_dir(path)
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    files.sort();
    files
}

fn read_json(path: &Path) -> Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

fn only_workflow_record(dir: &TempDir) -> Value {
    let records = artifacts(dir, "workflow");
    assert_eq!(records.len(), 1, "expected one workflow record");
    read_json(&records[0])
}

fn write_config(dir: &TempDir, config: &Value) {
    let path = dir.path().join(".seed/config.json");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, serde_json::to_string_pretty(config).unwrap()).unwrap();
}

// ---------------------------------------------------------------------------
// routing
// ---------------------------------------------------------------------------

#[test]
fn unknown_command_lists_every_command() {
    let dir = TempDir::new().unwrap();
    seed(&dir)
        .args(["mine", "frobnicate"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("unknown command 'frobnicate'"))
        .stderr(predicate::str::contains("Usage: mine <scan|analyze|export|all|help>"))
        .stderr(predicate::str::contains("Write the latest analysis as Markdown"));
}

#[test]
fn unknown_bootstrap_command_fails() {
    let dir = TempDir::new().unwrap();
    seed(&dir)
        .args(["bootstrap", "deploy"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("install"))
        .stderr(predicate::str::contains("verify"));
}

#[test]
fn mine_without_command_prints_help() {
    let dir = TempDir::new().unwrap();
    seed(&dir)
        .arg("mine")
        .assert()
        .success()
        .stdout(predicate::str::contains("Default command: help"));
    assert!(artifacts(&dir, "scan").is_empty());
}

#[test]
fn ci_help_goes_to_stdout() {
    let dir = TempDir::new().unwrap();
    seed(&dir)
        .args(["ci", "help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("baseline"))
        .stdout(predicate::str::contains("benchmark"));
}

// ---------------------------------------------------------------------------
// mine
// ---------------------------------------------------------------------------

#[test]
fn mine_all_writes_every_artifact() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("log.md"),
        "build error\nTODO: retry\ntests passed\n",
    )
    .unwrap();

    seed(&dir)
        .args(["mine", "all"])
        .assert()
        .success()
        .stdout(predicate::str::contains("mine all: completed"));

    assert_eq!(artifacts(&dir, "scan").len(), 1);
    assert_eq!(artifacts(&dir, "analysis").len(), 1);
    let export = artifacts(&dir, "export");
    assert_eq!(export.len(), 1);
    assert!(export[0].to_string_lossy().ends_with(".md"));

    let record = only_workflow_record(&dir);
    assert_eq!(record["category"], "workflow");
    assert_eq!(record["payload"]["outcome"], "completed");
    assert_eq!(
        record["payload"]["steps"],
        serde_json::json!(["scan", "analyze", "export"])
    );
}

#[test]
fn mine_all_json_prints_one_document() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("notes.txt"), "an error\n").unwrap();

    let out = seed(&dir)
        .args(["--json", "mine", "all"])
        .output()
        .unwrap();
    assert!(out.status.success());
    let report: Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(report["outcome"], "completed");
    assert_eq!(report["steps"].as_array().unwrap().len(), 3);
}

#[test]
fn mine_analyze_without_scan_fails() {
    let dir = TempDir::new().unwrap();
    seed(&dir)
        .args(["mine", "analyze"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("run 'seed mine scan' first"));
}

#[test]
fn repeated_scans_never_overwrite() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("a.md"), "error\n").unwrap();
    for _ in 0..3 {
        seed(&dir).args(["mine", "scan"]).assert().success();
    }
    assert_eq!(artifacts(&dir, "scan").len(), 3);
}

// ---------------------------------------------------------------------------
// bootstrap
// ---------------------------------------------------------------------------

#[test]
fn bootstrap_all_without_tools_completes_with_warnings() {
    let dir = TempDir::new().unwrap();
    seed_without_tools(&dir)
        .args(["bootstrap", "all"])
        .assert()
        .success()
        .stdout(predicate::str::contains("completed with warnings"));

    assert!(dir.path().join(".seed/config.json").is_file());

    let record = only_workflow_record(&dir);
    let payload = &record["payload"];
    assert_eq!(payload["outcome"], "completed_with_warnings");
    let missing: Vec<&str> = payload["collaborator_unavailable"]
        .as_array()
        .unwrap()
        .iter()
        .map(|w| w["tool"].as_str().unwrap())
        .collect();
    assert_eq!(missing, vec!["one-engine", "git", "node", "npm"]);

    // No engine ran, so nothing was measured or reported as such.
    let start = read_json(&artifacts(&dir, "start")[0]);
    assert_eq!(start["payload"]["skipped"], true);
    assert!(start["payload"].get("exit_code").is_none());
}

#[test]
fn bootstrap_defaults_to_all() {
    let dir = TempDir::new().unwrap();
    seed_without_tools(&dir).arg("bootstrap").assert().success();
    assert_eq!(artifacts(&dir, "workflow").len(), 1);
    assert_eq!(artifacts(&dir, "verify").len(), 1);
}

#[test]
fn bootstrap_strict_fails_on_missing_tool() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, &serde_json::json!({ "strict_collaborators": true }));

    seed_without_tools(&dir)
        .args(["bootstrap", "all"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("aborted at step 0 (install)"));

    let record = only_workflow_record(&dir);
    assert_eq!(record["payload"]["outcome"], "aborted");
    assert_eq!(
        record["payload"]["failed_step"]["kind"],
        "collaborator_unavailable"
    );
    assert!(artifacts(&dir, "configure").is_empty());
}

#[test]
fn configure_keeps_existing_config() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, &serde_json::json!({ "ci": { "iterations": 9 } }));

    seed_without_tools(&dir)
        .args(["bootstrap", "configure"])
        .assert()
        .success();

    let config = read_json(&dir.path().join(".seed/config.json"));
    assert_eq!(config["ci"]["iterations"], 9);
}

// ---------------------------------------------------------------------------
// ci
// ---------------------------------------------------------------------------

#[test]
fn ci_all_without_engine_records_skips() {
    let dir = TempDir::new().unwrap();
    seed_without_tools(&dir).args(["ci", "all"]).assert().success();

    for category in ["baseline", "improve", "benchmark"] {
        let records = artifacts(&dir, category);
        assert_eq!(records.len(), 1, "{category}");
        let record = read_json(&records[0]);
        assert_eq!(record["payload"]["status"], "skipped");
        assert!(record["payload"].get("measurement").is_none());
    }

    let report = artifacts(&dir, "report");
    let md = std::fs::read_to_string(&report[0]).unwrap();
    assert!(md.contains("| baseline | skipped |"));
}

#[cfg(unix)]
#[test]
fn ci_failing_engine_passes_exit_code_through() {
    let dir = TempDir::new().unwrap();
    write_config(
        &dir,
        &serde_json::json!({
            "tool_paths": { "one-engine": "/bin/sh" },
            "engine": { "benchmark_args": ["-c", "echo broken >&2; exit 4"] }
        }),
    );

    seed(&dir)
        .args(["ci", "all"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("broken"));

    let record = only_workflow_record(&dir);
    assert_eq!(record["payload"]["failed_step"]["name"], "baseline");
    assert_eq!(record["payload"]["failed_step"]["exit_code"], 4);
    assert!(artifacts(&dir, "improve").is_empty(), "later steps must not run");

    let baseline = read_json(&artifacts(&dir, "baseline")[0]);
    assert_eq!(baseline["payload"]["status"], "failed");
    assert_eq!(baseline["payload"]["stderr"], "broken");
}

#[cfg(unix)]
#[test]
fn ci_benchmark_measures_real_runs() {
    let dir = TempDir::new().unwrap();
    write_config(
        &dir,
        &serde_json::json!({
            "tool_paths": { "one-engine": "/bin/sh" },
            "engine": { "benchmark_args": ["-c", "exit 0"] },
            "ci": { "iterations": 2 }
        }),
    );

    seed(&dir).args(["ci", "baseline"]).assert().success();
    let out = seed(&dir)
        .args(["--json", "ci", "benchmark"])
        .output()
        .unwrap();
    assert!(out.status.success());
    let step: Value = serde_json::from_slice(&out.stdout).unwrap();
    let record = read_json(Path::new(step["artifacts"][0].as_str().unwrap()));
    assert_eq!(record["payload"]["measurement"]["iterations"], 2);
    assert!(record["payload"]["comparison"]["baseline_mean_ms"].is_number());
}

#[cfg(unix)]
#[test]
fn timeout_flag_kills_slow_engine() {
    let dir = TempDir::new().unwrap();
    write_config(
        &dir,
        &serde_json::json!({
            "tool_paths": { "one-engine": "/bin/sh" },
            "engine": { "improve_args": ["-c", "sleep 5"] }
        }),
    );

    seed(&dir)
        .args(["--timeout", "1", "ci", "improve"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("timed out"));

    let record = read_json(&artifacts(&dir, "improve")[0]);
    assert_eq!(record["payload"]["timed_out"], true);
}

// ---------------------------------------------------------------------------
// history / status
// ---------------------------------------------------------------------------

#[test]
fn history_lists_artifacts_oldest_first() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("a.md"), "error\n").unwrap();
    seed(&dir).args(["mine", "scan"]).assert().success();
    seed(&dir).args(["mine", "scan"]).assert().success();

    let out = seed(&dir)
        .args(["--json", "history", "scan"])
        .output()
        .unwrap();
    assert!(out.status.success());
    let items: Value = serde_json::from_slice(&out.stdout).unwrap();
    let items = items.as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert!(items[0]["timestamp"].as_str().unwrap() <= items[1]["timestamp"].as_str().unwrap());

    let out = seed(&dir)
        .args(["--json", "history", "scan", "--limit", "1"])
        .output()
        .unwrap();
    let limited: Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(limited.as_array().unwrap().len(), 1);
    assert_eq!(limited[0]["path"], items[1]["path"]);
}

#[test]
fn history_of_empty_category() {
    let dir = TempDir::new().unwrap();
    seed(&dir)
        .args(["history", "baseline"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No 'baseline' artifacts recorded."));
}

#[test]
fn history_rejects_invalid_category() {
    let dir = TempDir::new().unwrap();
    seed(&dir)
        .args(["history", "../etc"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("invalid category"));
}

#[test]
fn status_reports_key_presence_not_values() {
    let dir = TempDir::new().unwrap();
    let out = seed_without_tools(&dir)
        .env("OPENROUTER_API_KEY", "sk-test-secret")
        .env_remove("OPENAI_API_KEY")
        .args(["--json", "status"])
        .output()
        .unwrap();
    assert!(out.status.success());
    let stdout = String::from_utf8(out.stdout).unwrap();
    assert!(!stdout.contains("sk-test-secret"));

    let status: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(status["api_keys"]["OPENROUTER_API_KEY"], true);
    assert_eq!(status["api_keys"]["OPENAI_API_KEY"], false);
    assert_eq!(status["config_file"], Value::Null);
    assert_eq!(status["tools"][0]["tool"], "one-engine");
    assert_eq!(status["tools"][0]["present"], false);
}

#[test]
fn malformed_config_is_reported() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join(".seed")).unwrap();
    std::fs::write(dir.path().join(".seed/config.json"), "{ not json").unwrap();

    seed(&dir)
        .arg("status")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("invalid config"));
}
