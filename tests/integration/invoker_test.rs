// Runs TrivyInvoker against shell scripts that stand in for the scanner

#![cfg(unix)]

use kdash::core::scanner::{parse_output, ScanInvoker, TrivyInvoker};
use kdash::core::ScanKey;
use kdash::KdashError;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tempfile::TempDir;

use super::support::trivy_json;

/// Write an executable `trivy` that answers `--version` with `version_exit`
/// and runs `scan_body` for everything else.
fn fake_scanner(dir: &Path, version_exit: i32, scan_body: &str) -> PathBuf {
    let path = dir.join("trivy");
    let script = format!(
        "#!/bin/sh\nif [ \"$1\" = \"--version\" ]; then\n  echo 'Version: 0.50.1'\n  exit {}\nfi\n{}\n",
        version_exit, scan_body
    );
    fs::write(&path, script).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn invoker(path: &Path) -> TrivyInvoker {
    TrivyInvoker::new(path.to_string_lossy().into_owned(), Duration::from_secs(5))
}

fn key() -> ScanKey {
    ScanKey::parse("nginx:1.25").unwrap()
}

#[tokio::test]
async fn test_successful_scan_returns_stdout() {
    let dir = TempDir::new().unwrap();
    let body = trivy_json(1, 1, 1, 0);
    let fixture = dir.path().join("report.json");
    fs::write(&fixture, &body).unwrap();
    let scanner = fake_scanner(dir.path(), 0, &format!("cat '{}'", fixture.display()));

    let output = invoker(&scanner)
        .invoke(&key(), Duration::from_secs(10))
        .await
        .unwrap();

    let report = parse_output(output.as_bytes()).unwrap();
    assert_eq!(report.counts.critical, 1);
    assert_eq!(report.counts.high, 1);
    assert_eq!(report.counts.medium, 1);
    assert_eq!(report.counts.total(), 3);
}

#[tokio::test]
async fn test_scanner_receives_expected_arguments() {
    let dir = TempDir::new().unwrap();
    let args_file = dir.path().join("args");
    let scanner = fake_scanner(
        dir.path(),
        0,
        &format!("echo \"$@\" > '{}'\necho '[]'", args_file.display()),
    );

    invoker(&scanner)
        .invoke(&key(), Duration::from_secs(10))
        .await
        .unwrap();

    let args = fs::read_to_string(&args_file).unwrap();
    assert_eq!(args.trim(), "image --format json --quiet nginx:1.25");
}

#[tokio::test]
async fn test_failed_preflight_reports_unavailable() {
    let dir = TempDir::new().unwrap();
    let marker = dir.path().join("scanned");
    let scanner = fake_scanner(dir.path(), 1, &format!("touch '{}'", marker.display()));

    let err = invoker(&scanner)
        .invoke(&key(), Duration::from_secs(10))
        .await
        .unwrap_err();

    assert!(matches!(err, KdashError::ScannerUnavailable(_)));
    assert_eq!(err.http_status(), 503);
    assert!(!marker.exists(), "scan must not run after a failed preflight");
}

#[tokio::test]
async fn test_missing_scanner_reports_unavailable() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("no-such-trivy");

    let err = invoker(&missing)
        .invoke(&key(), Duration::from_secs(10))
        .await
        .unwrap_err();

    assert!(matches!(err, KdashError::ScannerUnavailable(_)));
}

#[tokio::test]
async fn test_timeout_kills_scanner() {
    let dir = TempDir::new().unwrap();
    let marker = dir.path().join("finished");
    let scanner = fake_scanner(
        dir.path(),
        0,
        &format!("sleep 2\ntouch '{}'\necho '[]'", marker.display()),
    );

    let started = Instant::now();
    let err = invoker(&scanner)
        .invoke(&key(), Duration::from_millis(300))
        .await
        .unwrap_err();

    assert!(matches!(err, KdashError::ScanTimedOut(_)));
    assert!(started.elapsed() < Duration::from_millis(1500));

    // Had the process survived it would have created the marker by now
    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert!(!marker.exists());
}

#[tokio::test]
async fn test_unknown_image_maps_to_not_found() {
    let dir = TempDir::new().unwrap();
    let scanner = fake_scanner(
        dir.path(),
        0,
        "echo 'FATAL image scan error: MANIFEST_UNKNOWN: manifest unknown' >&2\nexit 1",
    );

    let err = invoker(&scanner)
        .invoke(&key(), Duration::from_secs(10))
        .await
        .unwrap_err();

    assert!(matches!(err, KdashError::SubjectNotFound(_)));
    assert_eq!(err.http_status(), 500);
}

#[tokio::test]
async fn test_other_failure_maps_to_unknown() {
    let dir = TempDir::new().unwrap();
    let scanner = fake_scanner(dir.path(), 0, "echo 'database download failed' >&2\nexit 2");

    let err = invoker(&scanner)
        .invoke(&key(), Duration::from_secs(10))
        .await
        .unwrap_err();

    assert!(matches!(err, KdashError::Unknown(_)));
    assert!(err.to_string().contains("database download failed"));
}
