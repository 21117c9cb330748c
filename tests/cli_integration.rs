// CLI integration tests for offline flows (csv conversion, fixture export, error envelopes).
use std::io::Write;
use std::process::{Command, Stdio};

use ratewire::api::{Record, encode};
use serde_json::Value;

fn cmd() -> Command {
    let exe = env!("CARGO_BIN_EXE_ratewire");
    let mut command = Command::new(exe);
    command.env_remove("POSTGRES_URL").env_remove("FRED_API_KEY");
    command
}

fn parse_json(value: &str) -> Value {
    serde_json::from_str(value).expect("valid json")
}

fn write_fixture(dir: &std::path::Path) -> std::path::PathBuf {
    let path = dir.join("rates.json");
    std::fs::write(
        &path,
        r#"{
            "fx_rates": [
                {"date": "2024-01-03", "currency": "EUR", "rate_to_usd": 1.0921},
                {"date": "2024-01-02", "currency": "JPY", "rate_to_usd": null}
            ],
            "interest_rates": [
                {"date": "2024-01-03", "series_id": "DGS10", "series_name": "10-Year, Constant", "rate": 3.91}
            ]
        }"#,
    )
    .expect("write fixture");
    path
}

#[test]
fn csv_command_reads_stdin() {
    let mut child = cmd()
        .arg("csv")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .expect("spawn");
    child
        .stdin
        .take()
        .expect("stdin")
        .write_all(br#"[{"note": "a,b"}, {"note": "he said \"hi\""}]"#)
        .expect("write stdin");
    let output = child.wait_with_output().expect("wait");
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).expect("utf8");
    let expected = encode(&[
        Record::new().with("note", "a,b"),
        Record::new().with("note", "he said \"hi\""),
    ]);
    assert_eq!(stdout, expected);
    assert_eq!(stdout, "note\n\"a,b\"\n\"he said \"\"hi\"\"\"");
}

#[test]
fn csv_command_empty_array_prints_nothing() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("rows.json");
    std::fs::write(&path, "[]").expect("write");
    let output = cmd()
        .args(["csv", path.to_str().unwrap()])
        .output()
        .expect("csv");
    assert!(output.status.success());
    assert!(output.stdout.is_empty());
}

#[test]
fn csv_command_rejects_non_array_with_usage_exit() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("rows.json");
    std::fs::write(&path, r#"{"note": "x"}"#).expect("write");
    let output = cmd()
        .args(["csv", path.to_str().unwrap()])
        .output()
        .expect("csv");
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    let err = parse_json(stderr.lines().next().expect("error line"));
    assert_eq!(err["error"]["kind"], "Usage");
}

#[test]
fn export_all_from_fixture_renders_sections() {
    let temp = tempfile::tempdir().expect("tempdir");
    let fixture = write_fixture(temp.path());
    let output = cmd()
        .args(["export", "all", "--fixture", fixture.to_str().unwrap()])
        .output()
        .expect("export");
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).expect("utf8");
    assert_eq!(
        stdout,
        concat!(
            "FX_Rates\n",
            "date,currency,rate_to_usd\n",
            "2024-01-03,EUR,1.0921\n",
            "2024-01-02,JPY,\n",
            "\n",
            "Interest_Rates\n",
            "date,series_id,series_name,rate\n",
            "2024-01-03,DGS10,\"10-Year, Constant\",3.91",
        )
    );
}

#[test]
fn export_single_dataset_as_json() {
    let temp = tempfile::tempdir().expect("tempdir");
    let fixture = write_fixture(temp.path());
    let output = cmd()
        .args([
            "export",
            "fx",
            "--format",
            "json",
            "--fixture",
            fixture.to_str().unwrap(),
        ])
        .output()
        .expect("export");
    assert!(output.status.success());
    let rows = parse_json(std::str::from_utf8(&output.stdout).expect("utf8"));
    let rows = rows.as_array().expect("array");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["currency"], "EUR");
    assert!(rows[1]["rate_to_usd"].is_null());
}

#[test]
fn export_without_source_reports_missing_config() {
    let output = cmd().args(["export", "fx"]).output().expect("export");
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    let err = parse_json(stderr.lines().next().expect("error line"));
    assert_eq!(err["error"]["message"], "POSTGRES_URL not configured");
}

#[test]
fn missing_fixture_is_not_found() {
    let temp = tempfile::tempdir().expect("tempdir");
    let absent = temp.path().join("absent.json");
    let output = cmd()
        .args(["export", "interest", "--fixture", absent.to_str().unwrap()])
        .output()
        .expect("export");
    assert_eq!(output.status.code(), Some(3));
}
