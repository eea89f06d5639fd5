use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_gradebookd");
    let mut child = Command::new(exe)
        .env_remove("GRADEBOOKD_CONFIG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn gradebookd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn error_code(value: &serde_json::Value) -> &str {
    assert_eq!(value.get("ok").and_then(|v| v.as_bool()), Some(false));
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .expect("error.code")
}

fn spawn_sidecar_with_config(path: &PathBuf) -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_gradebookd");
    let mut child = Command::new(exe)
        .env("GRADEBOOKD_CONFIG", path)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn gradebookd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn one_student_with_missing_work() -> serde_json::Value {
    json!({
        "periods": [
            { "id": "q1", "name": "Quarter 1", "weight": 100.0,
              "startDate": "2026-09-01", "endDate": "2026-11-15" }
        ],
        "categories": [ { "id": "hw", "name": "Homework", "weight": 100.0 } ],
        "tasks": [
            { "id": "a1", "categoryId": "hw", "periodId": "q1", "maxPoints": 10.0, "dueDate": "2026-09-10" },
            { "id": "a2", "categoryId": "hw", "periodId": "q1", "maxPoints": 10.0, "dueDate": "2026-09-20" },
            { "id": "a3", "categoryId": "hw", "periodId": "q1", "maxPoints": 10.0, "dueDate": "2026-11-01" }
        ],
        "scores": [ { "studentId": "s1", "taskId": "a1", "earned": 9.0 } ]
    })
}

fn final_avg(summary: &serde_json::Value) -> f64 {
    summary["finalAverage"].as_f64().expect("finalAverage")
}

#[test]
fn missing_as_zero_override_changes_results_and_can_be_cleared() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "gradebook.set",
        json!({ "gradebook": one_student_with_missing_work() }),
    );

    // Missing work is left out by default: 9 / 10.
    let base = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "calc.studentSummary",
        json!({ "studentId": "s1" }),
    );
    assert!((final_avg(&base) - 90.0).abs() < 1e-9);

    let updated = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "calc.config.update",
        json!({ "treatMissingAsZero": true }),
    );
    assert_eq!(updated["hasOverride"], json!(true));
    assert_eq!(updated["config"]["treatMissingAsZero"], json!(true));

    let forced = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "calc.studentSummary",
        json!({ "studentId": "s1" }),
    );
    assert!((final_avg(&forced) - 30.0).abs() < 1e-9);

    // Per-request layer: a3 is not due yet on this date.
    let as_of = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "calc.studentSummary",
        json!({ "studentId": "s1", "config": { "asOf": "2026-10-01" } }),
    );
    assert!((final_avg(&as_of) - 45.0).abs() < 1e-9);

    let cleared = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "calc.config.clearOverride",
        json!({}),
    );
    assert_eq!(cleared["hasOverride"], json!(false));
    let reverted = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "calc.studentSummary",
        json!({ "studentId": "s1" }),
    );
    assert!((final_avg(&reverted) - 90.0).abs() < 1e-9);

    let bad = request(
        &mut stdin,
        &mut reader,
        "8",
        "calc.config.update",
        json!({ "weightTolerance": "wide" }),
    );
    assert_eq!(error_code(&bad), "bad_params");

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn request_null_as_of_clears_session_date() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "gradebook.set",
        json!({ "gradebook": one_student_with_missing_work() }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "calc.config.update",
        json!({ "treatMissingAsZero": true, "asOf": "2026-10-01" }),
    );

    let session = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "calc.studentSummary",
        json!({ "studentId": "s1" }),
    );
    assert!((final_avg(&session) - 45.0).abs() < 1e-9);

    // null drops the date for this request, so a3 counts as zero again.
    let cleared = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "calc.studentSummary",
        json!({ "studentId": "s1", "config": { "asOf": null } }),
    );
    assert!((final_avg(&cleared) - 30.0).abs() < 1e-9);

    let updated = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "calc.config.update",
        json!({ "asOf": null }),
    );
    assert!(updated["config"].get("asOf").is_none());
    assert_eq!(updated["config"]["treatMissingAsZero"], json!(true));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn startup_config_file_sets_base_layer() {
    let dir = temp_dir("gradebookd-config-file");
    let cfg_path = dir.join("calc.json");
    std::fs::write(&cfg_path, r#"{ "roff": true, "weightTolerance": 0.5 }"#).expect("write cfg");

    let (mut child, mut stdin, mut reader) = spawn_sidecar_with_config(&cfg_path);
    let cfg = request_ok(&mut stdin, &mut reader, "1", "calc.config.get", json!({}));
    assert_eq!(cfg["config"]["roff"], json!(true));
    assert_eq!(cfg["config"]["weightTolerance"], json!(0.5));
    assert_eq!(cfg["config"]["treatMissingAsZero"], json!(false));
    assert_eq!(cfg["hasOverride"], json!(false));

    let mut gb = one_student_with_missing_work();
    gb["scores"] = json!([
        { "studentId": "s1", "taskId": "a1", "earned": 1.0 },
        { "studentId": "s1", "taskId": "a2", "earned": 1.0 },
        { "studentId": "s1", "taskId": "a3", "earned": 0.0 }
    ]);
    let _ = request_ok(&mut stdin, &mut reader, "2", "gradebook.set", json!({ "gradebook": gb }));
    let summary = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "calc.studentSummary",
        json!({ "studentId": "s1" }),
    );
    // 2 / 30 = 6.666..., rounded for display.
    assert_eq!(summary["finalAverage"], json!(6.7));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(dir);
}
