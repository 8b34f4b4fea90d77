// Integration tests for the `iter8` binary.
// Run with: cargo test -p iter8-cli --test cli_tests -- --nocapture

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use httpmock::prelude::*;
use serde_json::json;

/// `iter8` with a private HOME/config dir and no ambient credentials.
fn iter8(home: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_iter8"));
    cmd.env_remove("ITER8_GOOGLE_TOKEN")
        .env_remove("ITER8_GOOGLE_CREDENTIALS")
        .env_remove("OPENAI_API_KEY")
        .env_remove("ITER8_OPENAI_KEY")
        .env_remove("RUST_LOG")
        .env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join(".config"))
        .env("ITER8_SETTINGS", home.join("settings.json"));
    cmd
}

fn run(cmd: &mut Command) -> Output {
    cmd.output().expect("failed to run iter8")
}

fn stdout_json(output: &Output) -> serde_json::Value {
    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str(&stdout).unwrap_or_else(|e| panic!("stdout is not JSON ({}): {}", e, stdout))
}

fn write_credentials(home: &Path, server: &MockServer) -> PathBuf {
    let path = home.join("google_auth.json");
    let creds = json!({
        "token": "test_token",
        "sheets_api_base": server.base_url(),
        "drive_api_base": server.base_url(),
    });
    std::fs::write(&path, creds.to_string()).unwrap();
    path
}

fn mock_sheet(server: &MockServer) {
    server.mock(|when, then| {
        when.method(GET)
            .path("/v4/spreadsheets/key123")
            .header("Authorization", "Bearer test_token");
        then.status(200).json_body(json!({
            "spreadsheetId": "key123",
            "properties": { "title": "Vocab" },
            "sheets": [ { "properties": { "sheetId": 0, "title": "step-00", "index": 0 } } ]
        }));
    });
    server.mock(|when, then| {
        when.method(GET)
            .path_includes("/v4/spreadsheets/key123/values/")
            .query_param("valueRenderOption", "UNFORMATTED_VALUE");
        then.status(200).json_body(json!({
            "range": "'step-00'!A1:C3",
            "majorDimension": "ROWS",
            "values": [
                ["id", "en", "ch"],
                [1, "nest"],
                [2, "bird", "鸟"]
            ]
        }));
    });
}

// ---------------------------------------------------------------------------
// usage / config
// ---------------------------------------------------------------------------

#[test]
fn no_subcommand_is_usage_error() {
    let home = tempfile::tempdir().unwrap();
    let output = run(&mut iter8(home.path()));
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn config_path_prints_settings_location() {
    let home = tempfile::tempdir().unwrap();
    let output = run(iter8(home.path()).args(["config", "path"]));

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim(), home.path().join("settings.json").display().to_string());
}

#[test]
fn config_show_reports_effective_settings() {
    let home = tempfile::tempdir().unwrap();
    std::fs::write(
        home.path().join("settings.json"),
        r#"{
    // fewer workers on this machine
    "pipeline": { "workers": 3 }
}"#,
    )
    .unwrap();

    let output = run(iter8(home.path()).args(["config", "show"]).env("OPENAI_API_KEY", "sk-test"));

    assert!(output.status.success());
    let shown = stdout_json(&output);
    assert_eq!(shown["settings"]["pipeline"]["workers"], 3);
    assert_eq!(shown["settings"]["pipeline"]["update_batch_size"], 20);
    assert_eq!(shown["llm"]["model"], "gpt-4o");
    assert_eq!(shown["llm"]["key_present"], true);
    assert_eq!(shown["llm"]["key_source"], "environment");
    assert!(!String::from_utf8_lossy(&output.stdout).contains("sk-test"));
}

// ---------------------------------------------------------------------------
// show
// ---------------------------------------------------------------------------

#[test]
fn show_without_credentials_exits_3() {
    let home = tempfile::tempdir().unwrap();
    let output = run(iter8(home.path()).args(["show", "--spreadsheet", "key123", "--sheet", "step-00"]));

    assert_eq!(output.status.code(), Some(3));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("hint:"), "stderr: {}", stderr);
}

#[test]
fn show_prints_records() {
    let home = tempfile::tempdir().unwrap();
    let server = MockServer::start();
    mock_sheet(&server);
    let creds = write_credentials(home.path(), &server);

    let output = run(iter8(home.path())
        .args(["show", "--spreadsheet", "key123", "--sheet", "step-00", "--credentials"])
        .arg(&creds));

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let records = stdout_json(&output);
    assert_eq!(records.as_array().unwrap().len(), 2);
    assert_eq!(records[0]["id"], 1);
    assert_eq!(records[0]["en"], "nest");
    assert_eq!(records[0]["ch"], "");
    assert_eq!(records[1]["ch"], "鸟");
}

#[test]
fn show_limit() {
    let home = tempfile::tempdir().unwrap();
    let server = MockServer::start();
    mock_sheet(&server);
    let creds = write_credentials(home.path(), &server);

    let output = run(iter8(home.path())
        .args(["show", "--spreadsheet", "key123", "--sheet", "step-00", "--limit", "1"])
        .env("ITER8_GOOGLE_CREDENTIALS", &creds));

    assert!(output.status.success());
    assert_eq!(stdout_json(&output).as_array().unwrap().len(), 1);
}

#[test]
fn show_read_failure_exits_4() {
    let home = tempfile::tempdir().unwrap();
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/v4/spreadsheets/key123");
        then.status(500).body("backend error");
    });
    let creds = write_credentials(home.path(), &server);

    let output = run(iter8(home.path())
        .args(["show", "--spreadsheet", "key123", "--sheet", "step-00", "--credentials"])
        .arg(&creds));

    assert_eq!(output.status.code(), Some(4));
}

#[test]
fn show_forbidden_exits_3() {
    let home = tempfile::tempdir().unwrap();
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/v4/spreadsheets/key123");
        then.status(403).json_body(json!({
            "error": { "code": 403, "message": "The caller does not have permission" }
        }));
    });
    let creds = write_credentials(home.path(), &server);

    let output = run(iter8(home.path())
        .args(["show", "--spreadsheet", "key123", "--sheet", "step-00", "--credentials"])
        .arg(&creds));

    assert_eq!(output.status.code(), Some(3));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("does not have permission"), "stderr: {}", stderr);
    assert!(stderr.contains("hint:"), "stderr: {}", stderr);
}

// ---------------------------------------------------------------------------
// set
// ---------------------------------------------------------------------------

#[test]
fn set_writes_header_and_cell() {
    let home = tempfile::tempdir().unwrap();
    let server = MockServer::start();
    mock_sheet(&server);
    let write = server.mock(|when, then| {
        when.method(POST)
            .path("/v4/spreadsheets/key123/values:batchUpdate")
            .json_body(json!({
                "valueInputOption": "USER_ENTERED",
                "data": [
                    { "range": "'step-00'!D1", "values": [["verse"]] },
                    { "range": "'step-00'!D3", "values": [["something funny"]] }
                ]
            }));
        then.status(200).json_body(json!({ "totalUpdatedCells": 2 }));
    });
    let creds = write_credentials(home.path(), &server);

    let output = run(iter8(home.path())
        .args([
            "set", "--spreadsheet", "key123", "--sheet", "step-00",
            "--row", "1", "--column", "verse", "--value", "something funny",
            "--credentials",
        ])
        .arg(&creds));

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    write.assert();
    let outcome = stdout_json(&output);
    assert_eq!(outcome["status"], "applied");
    assert_eq!(outcome["headers"], 1);
    assert_eq!(outcome["cells"], 1);
}

#[test]
fn set_same_value_makes_no_write() {
    let home = tempfile::tempdir().unwrap();
    let server = MockServer::start();
    mock_sheet(&server);
    let creds = write_credentials(home.path(), &server);

    // no batchUpdate mock: a write would 404 and exit 5
    let output = run(iter8(home.path())
        .args([
            "set", "--spreadsheet", "key123", "--sheet", "step-00",
            "--row", "0", "--column", "id", "--value", "1",
            "--credentials",
        ])
        .arg(&creds));

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(stdout_json(&output)["status"], "no_changes");
}

#[test]
fn set_row_out_of_range_is_usage_error() {
    let home = tempfile::tempdir().unwrap();
    let server = MockServer::start();
    mock_sheet(&server);
    let creds = write_credentials(home.path(), &server);

    let output = run(iter8(home.path())
        .args([
            "set", "--spreadsheet", "key123", "--sheet", "step-00",
            "--row", "9", "--column", "en", "--value", "x",
            "--credentials",
        ])
        .arg(&creds));

    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn set_write_failure_exits_5() {
    let home = tempfile::tempdir().unwrap();
    let server = MockServer::start();
    mock_sheet(&server);
    server.mock(|when, then| {
        when.method(POST).path_includes("values:batchUpdate");
        then.status(429).json_body(json!({ "error": { "code": 429, "message": "Quota exceeded" } }));
    });
    let creds = write_credentials(home.path(), &server);

    let output = run(iter8(home.path())
        .args([
            "set", "--spreadsheet", "key123", "--sheet", "step-00",
            "--row", "0", "--column", "en", "--value", "robin",
            "--credentials",
        ])
        .arg(&creds));

    assert_eq!(output.status.code(), Some(5));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Quota exceeded"), "stderr: {}", stderr);
}

// ---------------------------------------------------------------------------
// enrich
// ---------------------------------------------------------------------------

fn write_job(home: &Path) -> PathBuf {
    let path = home.join("job.toml");
    std::fs::write(
        &path,
        r#"
prompt = """Translate the English word into Chinese. Reply as {"ch": "..."}.
Word: {en}"""
skip_when_filled = ["ch"]
"#,
    )
    .unwrap();
    path
}

fn write_llm_settings(home: &Path, server: &MockServer) {
    let settings = json!({ "llm": { "endpoint": server.url("/v1/chat/completions") } });
    std::fs::write(home.join("settings.json"), settings.to_string()).unwrap();
}

fn mock_llm(server: &MockServer) -> httpmock::Mock<'_> {
    server.mock(|when, then| {
        when.method(POST)
            .path("/v1/chat/completions")
            .header("Authorization", "Bearer sk-test")
            .body_includes("Word: nest");
        then.status(200).json_body(json!({
            "choices": [ { "message": { "role": "assistant", "content": "{\"ch\": \"巢\"}" } } ]
        }));
    })
}

#[test]
fn enrich_missing_job_is_usage_error() {
    let home = tempfile::tempdir().unwrap();
    let output = run(iter8(home.path())
        .args(["enrich", "--spreadsheet", "key123", "--sheet", "step-00", "--job"])
        .arg(home.path().join("absent.toml"))
        .env("OPENAI_API_KEY", "sk-test"));

    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn enrich_without_api_key_exits_3() {
    let home = tempfile::tempdir().unwrap();
    let job = write_job(home.path());

    let output = run(iter8(home.path())
        .args(["enrich", "--spreadsheet", "key123", "--sheet", "step-00", "--job"])
        .arg(&job));

    assert_eq!(output.status.code(), Some(3));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("OPENAI_API_KEY"), "stderr: {}", stderr);
}

#[test]
fn enrich_fills_empty_rows() {
    let home = tempfile::tempdir().unwrap();
    let server = MockServer::start();
    mock_sheet(&server);
    let llm = mock_llm(&server);
    let write = server.mock(|when, then| {
        when.method(POST)
            .path("/v4/spreadsheets/key123/values:batchUpdate")
            .json_body(json!({
                "valueInputOption": "USER_ENTERED",
                "data": [ { "range": "'step-00'!C2", "values": [["巢"]] } ]
            }));
        then.status(200).json_body(json!({ "totalUpdatedCells": 1 }));
    });
    let creds = write_credentials(home.path(), &server);
    write_llm_settings(home.path(), &server);
    let job = write_job(home.path());

    let output = run(iter8(home.path())
        .args(["enrich", "--spreadsheet", "key123", "--sheet", "step-00", "--workers", "2", "--job"])
        .arg(&job)
        .arg("--credentials")
        .arg(&creds)
        .env("OPENAI_API_KEY", "sk-test"));

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    llm.assert();
    write.assert();
    let report = stdout_json(&output);
    assert_eq!(report["submitted"], 1);
    assert_eq!(report["skipped"], 1);
    assert_eq!(report["succeeded"], 1);
    assert_eq!(report["failed"], 0);
    assert_eq!(report["flushes"], 1);
    assert_eq!(report["cells_written"], 1);
}

#[test]
fn enrich_dry_run_prints_updates_without_writing() {
    let home = tempfile::tempdir().unwrap();
    let server = MockServer::start();
    mock_sheet(&server);
    mock_llm(&server);
    let creds = write_credentials(home.path(), &server);
    write_llm_settings(home.path(), &server);
    let job = write_job(home.path());

    let output = run(iter8(home.path())
        .args(["enrich", "--spreadsheet", "key123", "--sheet", "step-00", "--dry-run", "--job"])
        .arg(&job)
        .arg("--credentials")
        .arg(&creds)
        .env("OPENAI_API_KEY", "sk-test"));

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let preview = stdout_json(&output);
    assert_eq!(preview["dry_run"], true);
    assert_eq!(preview["updates"], json!([ { "range": "C2", "values": [["巢"]] } ]));
}
