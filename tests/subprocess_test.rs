//! End-to-end runs through a real subprocess standing in for kubectl

#![cfg(unix)]

use kubeseq::models::{ApplyStatus, KubectlConfig, PhaseConfig, SequencerConfig};
use kubeseq::sequencer::build_plan;
use kubeseq::Sequencer;
use std::fs;
use tempfile::TempDir;

/// `sh -c <script> sh <file>`: the manifest path arrives as `$1`
fn shell_config(dir: &TempDir, script: &str, apply_timeout_secs: u64) -> SequencerConfig {
    SequencerConfig {
        directory: dir.path().to_path_buf(),
        kubectl: KubectlConfig {
            command: "sh".to_string(),
            apply_args: vec!["-c".to_string(), script.to_string(), "sh".to_string()],
            apply_timeout_secs,
            ..KubectlConfig::default()
        },
        phases: vec![PhaseConfig::new("Database", ["bad-db.yaml"], 0)],
        ..SequencerConfig::default()
    }
}

fn write_manifests(dir: &TempDir, names: &[&str]) {
    for name in names {
        fs::write(dir.path().join(name), "kind: Deployment\n").unwrap();
    }
}

#[tokio::test]
async fn test_subprocess_failures_are_captured_and_run_continues() {
    let temp = TempDir::new().unwrap();
    write_manifests(&temp, &["bad-db.yaml", "api.yaml", "web.yaml"]);

    let config = shell_config(
        &temp,
        r#"case "$1" in *bad*) echo "error: unable to connect to the server" >&2; exit 1;; esac; echo "applied $1""#,
        0,
    );
    let plan = build_plan(&config).unwrap();
    let report = Sequencer::from_config(&config).run_plan(&plan).await;

    let results: Vec<_> = report.results().collect();
    assert_eq!(results.len(), 3);
    assert_eq!(results[0].status, ApplyStatus::Failed);
    assert_eq!(
        results[0].error_output.as_deref(),
        Some("error: unable to connect to the server")
    );
    assert!(results[1].success && results[2].success);
    assert!(results[1].file.ends_with("api.yaml"));
    assert_eq!(report.exit_code(false), 1);
}

#[tokio::test]
async fn test_apply_timeout_is_reported_and_run_continues() {
    let temp = TempDir::new().unwrap();
    write_manifests(&temp, &["bad-db.yaml", "api.yaml"]);

    let config = shell_config(&temp, r#"case "$1" in *bad*) sleep 30;; esac"#, 1);
    let plan = build_plan(&config).unwrap();
    let report = Sequencer::from_config(&config).run_plan(&plan).await;

    let results: Vec<_> = report.results().collect();
    assert_eq!(results[0].status, ApplyStatus::TimedOut);
    assert_eq!(results[0].error_output.as_deref(), Some("timed out after 1s"));
    assert_eq!(results[1].status, ApplyStatus::Applied);
}
