use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn opspulse_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("opspulse");
    path
}

fn today() -> String {
    chrono::Local::now().date_naive().format("%Y%m%d").to_string()
}

/// Offline environment: CSV mock source, hash embeddings, vector store off.
fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    fs::create_dir_all(root.join("config")).unwrap();
    fs::create_dir_all(root.join("mock_data")).unwrap();

    let config_content = format!(
        r#"[mock_db]
enabled = true
dir = "{root}/mock_data"

[vector]
enabled = false

[embedding]
provider = "hash"
dims = 64
batch_size = 8

[etl]
days = 2
offline_dir = "{root}/offline"

[retrieval]
default_top_k = 5

[server]
bind = "127.0.0.1:7399"
"#,
        root = root.display()
    );

    let config_path = root.join("config/opspulse.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_opspulse(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = opspulse_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run opspulse binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_etl_empty_window_skips_every_date() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_opspulse(&config_path, &["etl"]);
    assert!(success, "etl failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("2 skipped"));
    assert!(stdout.contains("total: 0 documents"));
    assert!(stdout.contains("ok"));

    // No sidecar output for skipped dates.
    assert!(!tmp.path().join("offline").exists()
        || fs::read_dir(tmp.path().join("offline")).unwrap().count() == 0);
}

#[test]
fn test_etl_offline_run_writes_sidecar() {
    let (tmp, config_path) = setup_test_env();
    let date = today();

    fs::write(
        tmp.path().join(format!("mock_data/history_{}.csv", date)),
        "CPU_Usage,Hostname\n95,svc1\n40,svc2\n",
    )
    .unwrap();

    let (stdout, stderr, success) = run_opspulse(&config_path, &["etl"]);
    assert!(success, "etl failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains(&format!("{}: 2 documents", date)));
    assert!(stdout.contains("1 skipped")); // yesterday has no data

    let sidecar = fs::read_to_string(
        tmp.path().join(format!("offline/documents_{}.jsonl", date)),
    )
    .unwrap();
    assert_eq!(sidecar.lines().count(), 2);
    assert!(sidecar.contains("\"embedding\":null"));
    assert!(sidecar.contains("type=history CPU_Usage=95 Hostname=svc1"));
}

#[test]
fn test_etl_rerun_appends_fresh_sidecar() {
    let (tmp, config_path) = setup_test_env();
    let date = today();

    fs::write(
        tmp.path().join(format!("mock_data/event_history_{}.csv", date)),
        "event,severity\ndeadlock,HIGH\n",
    )
    .unwrap();

    let (_, _, success1) = run_opspulse(&config_path, &["etl"]);
    let (_, _, success2) = run_opspulse(&config_path, &["etl"]);
    assert!(success1 && success2, "re-run must not fail");
}

#[test]
fn test_ask_answers_from_keyword_tier() {
    let (tmp, config_path) = setup_test_env();

    fs::write(
        tmp.path().join("mock_data/history_20250101.csv"),
        "CPU_Usage=95 Hostname=svc1\nMemory=12 Hostname=svc2\n",
    )
    .unwrap();

    let (stdout, stderr, success) =
        run_opspulse(&config_path, &["ask", "CPU usage high", "--top-k", "5"]);
    assert!(success, "ask failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("CPU_Usage=95"));
    assert!(!stdout.contains("Memory=12"), "zero-score lines must be excluded");
}

#[test]
fn test_ask_top_k_zero_clamps_to_one() {
    let (tmp, config_path) = setup_test_env();

    fs::write(
        tmp.path().join("mock_data/history_20250101.txt"),
        "cpu spike on svc1\ncpu spike on svc2\n",
    )
    .unwrap();

    let (stdout, _, success) = run_opspulse(&config_path, &["ask", "cpu spike", "--top-k", "0"]);
    assert!(success);
    assert!(stdout.contains("1. "));
    assert!(!stdout.contains("2. "), "top_k=0 must clamp to a single result");
}

#[test]
fn test_ask_without_matches_prints_no_results() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_opspulse(&config_path, &["ask", "nothing matches this"]);
    assert!(success, "retrieval must not fail on an empty corpus");
    assert!(stdout.contains("No results."));
}

#[test]
fn test_sources_lists_configuration() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_opspulse(&config_path, &["sources"]);
    assert!(success, "sources failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("mock_db"));
    assert!(stdout.contains("provider=hash"));
    assert!(stdout.contains("scheduler"));
}

#[test]
fn test_invalid_config_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("bad.toml");
    fs::write(&config_path, "[embedding]\nprovider = \"nonexistent\"\n").unwrap();

    let (_, stderr, success) = run_opspulse(&config_path, &["sources"]);
    assert!(!success);
    assert!(stderr.contains("Unknown embedding provider"));
}
