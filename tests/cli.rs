//! Runs the compiled `studyflow` binary against the mock backend.

mod common;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use common::MockBackend;
use tempfile::TempDir;

fn studyflow_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_studyflow"))
}

fn setup_test_env(base_url: &str) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("studyflow.toml");
    fs::write(
        &config_path,
        format!(
            r#"[backend]
base_url = "{}"
timeout_secs = 5

[retry]
max_retries = 0

[polling]
interval_ms = 20
timeout_secs = 5

[session]
email = "student@example.com"
"#,
            base_url
        ),
    )
    .unwrap();
    fs::write(tmp.path().join("notes.txt"), "Photosynthesis turns light into sugar.").unwrap();
    (tmp, config_path)
}

async fn run_studyflow(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = studyflow_binary();
    let config_path = config_path.to_path_buf();
    let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
    let output = tokio::task::spawn_blocking(move || {
        Command::new(&binary)
            .arg("--config")
            .arg(&config_path)
            .arg("--progress")
            .arg("off")
            .args(&args)
            .output()
            .unwrap_or_else(|e| panic!("Failed to run studyflow binary at {:?}: {}", binary, e))
    })
    .await
    .unwrap();

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_summaries_marks_newest() {
    let mock = MockBackend::new();
    mock.add_summary(7, "2026-04-01T09:00:00Z", "Older summary");
    mock.add_summary(8, "2026-04-02T09:00:00Z", "Newer summary");
    let base_url = common::serve(mock).await;
    let (_tmp, config_path) = setup_test_env(&base_url);

    let (stdout, stderr, success) = run_studyflow(&config_path, &["summaries"]).await;
    assert!(success, "summaries failed: stdout={}, stderr={}", stdout, stderr);

    let lines: Vec<&str> = stdout.lines().collect();
    assert!(lines[0].contains("GENERATED"));
    assert!(lines[1].starts_with("* 8"), "got: {}", stdout);
    assert!(lines[2].starts_with("  7"), "got: {}", stdout);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_summaries_empty_state() {
    let base_url = common::serve(MockBackend::new()).await;
    let (_tmp, config_path) = setup_test_env(&base_url);

    let (stdout, _, success) = run_studyflow(&config_path, &["summaries"]).await;
    assert!(success);
    assert!(stdout.contains("No summaries yet"), "got: {}", stdout);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_generate_without_summaries_fails() {
    let mock = MockBackend::new();
    let base_url = common::serve(mock.clone()).await;
    let (_tmp, config_path) = setup_test_env(&base_url);

    let (_, stderr, success) = run_studyflow(&config_path, &["generate", "quiz"]).await;
    assert!(!success);
    assert!(stderr.contains("no summary available"), "got: {}", stderr);
    assert!(mock.uploads.lock().unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_run_video_end_to_end() {
    let mock = MockBackend::new();
    mock.script_statuses(&["queued", "processing", "done"], "/v/42.mp4");
    let base_url = common::serve(mock.clone()).await;
    let (tmp, config_path) = setup_test_env(&base_url);
    let notes = tmp.path().join("notes.txt");

    let (stdout, stderr, success) = run_studyflow(
        &config_path,
        &["run", notes.to_str().unwrap(), "video", "--theme", "minecraft"],
    )
    .await;
    assert!(success, "run failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("summary:  42"), "got: {}", stdout);
    assert!(stdout.contains("points:   +10 (total 10)"), "got: {}", stdout);
    assert!(
        stdout.contains(&format!("video: {}/v/42.mp4", base_url)),
        "got: {}",
        stdout
    );
    assert_eq!(mock.status_calls(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_generate_flashcards_for_given_summary() {
    let base_url = common::serve(MockBackend::new()).await;
    let (_tmp, config_path) = setup_test_env(&base_url);

    let (stdout, stderr, success) = run_studyflow(
        &config_path,
        &["generate", "flashcards", "--summary", "5", "--count", "2"],
    )
    .await;
    assert!(success, "generate failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("[1] Q: Term 1"));
    assert!(stdout.contains("[2] Q: Term 2"));
    assert!(!stdout.contains("[3]"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unsupported_file_is_rejected_locally() {
    let mock = MockBackend::new();
    let base_url = common::serve(mock.clone()).await;
    let (tmp, config_path) = setup_test_env(&base_url);
    let slides = tmp.path().join("slides.pptx");
    fs::write(&slides, "not really slides").unwrap();

    let (_, stderr, success) =
        run_studyflow(&config_path, &["upload", slides.to_str().unwrap()]).await;
    assert!(!success);
    assert!(stderr.contains("upload rejected"), "got: {}", stderr);
    assert!(mock.uploads.lock().unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_status_probe() {
    let mock = MockBackend::new();
    mock.script_statuses(&["processing"], "");
    let base_url = common::serve(mock).await;
    let (_tmp, config_path) = setup_test_env(&base_url);

    let (stdout, _, success) = run_studyflow(&config_path, &["status", "42"]).await;
    assert!(success);
    assert!(stdout.contains("status:   processing"), "got: {}", stdout);
}

#[tokio::test]
async fn test_missing_config_fails() {
    let (stdout, stderr, success) =
        run_studyflow(Path::new("/nonexistent/studyflow.toml"), &["summaries"]).await;
    assert!(!success, "expected failure: stdout={}", stdout);
    assert!(stderr.contains("Failed to read config file"), "got: {}", stderr);
}
