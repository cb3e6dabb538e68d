mod common;

use common::HostProcess;

fn fixture(name: &str) -> String {
    HostProcess::fixture_path(name)
        .to_str()
        .expect("non-UTF-8 fixture path")
        .to_string()
}

#[test]
fn validate_valid_config() {
    let output = HostProcess::spawn_command(&["host", "validate", &fixture("boot_games.yaml")]);
    assert!(
        output.status.success(),
        "validate should succeed for valid config: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(String::from_utf8_lossy(&output.stdout).contains(": ok"));
}

#[test]
fn validate_invalid_config_reports_every_issue() {
    let output = HostProcess::spawn_command(&["host", "validate", &fixture("invalid.yaml")]);
    assert_eq!(output.status.code(), Some(2));

    let stdout = String::from_utf8_lossy(&output.stdout);
    let errors = stdout.lines().filter(|l| l.contains("error:")).count();
    // sweep interval, duplicate participant, segments, positions
    assert!(errors >= 4, "expected every issue to be listed:\n{stdout}");
}

#[test]
fn validate_json_output() {
    let output = HostProcess::spawn_command(&[
        "host",
        "validate",
        "--format",
        "json",
        &fixture("host.yaml"),
        &fixture("missing_questions.yaml"),
    ]);
    assert!(!output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    let parsed: serde_json::Value =
        serde_json::from_str(&stdout).expect("output should be valid JSON");
    let files = parsed.as_array().expect("array of file reports");
    assert_eq!(files.len(), 2);
    assert_eq!(files[0]["valid"], true);
    assert_eq!(files[1]["valid"], false);
    assert!(
        files[1]["errors"][0]
            .as_str()
            .unwrap()
            .contains("questions")
    );
}

#[test]
fn validate_missing_file() {
    let output = HostProcess::spawn_command(&[
        "host",
        "validate",
        "/tmp/nonexistent_minigames_test_file.yaml",
    ]);
    assert!(!output.status.success());
}

#[test]
fn validate_strict_fails_on_warnings() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("no_mods.yaml");
    std::fs::write(&path, "games: []\n").unwrap();
    let path = path.to_str().unwrap();

    let relaxed = HostProcess::spawn_command(&["host", "validate", path]);
    assert!(relaxed.status.success());
    let strict = HostProcess::spawn_command(&["host", "validate", "--strict", path]);
    assert!(!strict.status.success());
}

#[test]
fn questions_command_dedupes() {
    let output = HostProcess::spawn_command(&[
        "questions",
        "--format",
        "json",
        &fixture("questions.txt"),
    ]);
    assert!(output.status.success());

    let questions: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("valid JSON");
    let questions = questions.as_array().unwrap();
    assert_eq!(questions.len(), 3);
    // later duplicate replaces the first entry in place
    assert_eq!(questions[0]["answer"], "Paris");
    assert_eq!(questions[2]["prompt"], "Pick one - any one");
}

#[test]
fn questions_command_rejects_bad_line() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.txt");
    std::fs::write(&path, "fine?-yes\nno answer here\n").unwrap();

    let output = HostProcess::spawn_command(&["questions", path.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("line 2"));
}

#[test]
fn version_json() {
    let output = HostProcess::spawn_command(&["version", "--format", "json"]);
    assert!(output.status.success());
    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(parsed["name"], "minigames");
    assert_eq!(parsed["games"], serde_json::json!(["bridge", "reaction"]));
}

#[test]
fn completions_bash() {
    let output = HostProcess::spawn_command(&["completions", "bash"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("minigames"));
}

#[test]
fn run_with_invalid_config_exits_with_config_error() {
    let output = HostProcess::spawn_command(&[
        "--quiet",
        "host",
        "run",
        "--config",
        &fixture("invalid.yaml"),
    ]);
    assert_eq!(output.status.code(), Some(2));
}
