//! CLI integration tests for commands that work without network access.

use assert_cmd::Command;
use tempfile::TempDir;

#[test]
fn status_on_missing_state_reports_never_synced() {
    let dir = TempDir::new().unwrap();
    let state = dir.path().join("sync-state.json");

    let mut cmd = Command::cargo_bin("ngs").unwrap();
    cmd.arg("status")
        .arg("--state")
        .arg(&state)
        .env_remove("STATE_FILE_PATH")
        .assert()
        .success()
        .stdout(predicates::str::contains("never"))
        .stdout(predicates::str::contains("Tracked pairings: 0"));
}

#[test]
fn status_json_is_machine_readable() {
    let dir = TempDir::new().unwrap();
    let state = dir.path().join("sync-state.json");
    std::fs::write(
        &state,
        r#"{"lastSync": "2026-08-20T10:30:00Z", "syncedTasks": [
            {"notionId": "n1", "githubIssueId": 70, "githubIssueNumber": 7,
             "githubProjectItemId": null, "lastNotionEdit": null,
             "lastGithubEdit": null, "contentHash": "abc"}
        ]}"#,
    )
    .unwrap();

    let mut cmd = Command::cargo_bin("ngs").unwrap();
    let output = cmd
        .arg("status")
        .arg("--json")
        .arg("--state")
        .arg(&state)
        .env_remove("STATE_FILE_PATH")
        .assert()
        .success();

    let stdout = String::from_utf8(output.get_output().stdout.clone()).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(parsed["trackedPairings"], 1);
    assert!(parsed["lastSync"].as_str().unwrap().starts_with("2026-08-20"));
}

#[test]
fn once_without_configuration_fails_with_config_exit_code() {
    let mut cmd = Command::cargo_bin("ngs").unwrap();
    cmd.arg("once")
        .env_remove("NOTION_API_KEY")
        .env_remove("NOTION_DATABASE_ID")
        .env_remove("GITHUB_TOKEN")
        .current_dir(TempDir::new().unwrap().path())
        .assert()
        .code(2);
}

#[test]
fn corrupt_state_file_fails_with_state_exit_code() {
    let dir = TempDir::new().unwrap();
    let state = dir.path().join("sync-state.json");
    std::fs::write(&state, "not json").unwrap();

    let mut cmd = Command::cargo_bin("ngs").unwrap();
    cmd.arg("status")
        .arg("--state")
        .arg(&state)
        .env_remove("STATE_FILE_PATH")
        .assert()
        .code(5);
}
