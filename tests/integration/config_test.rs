use kdash::core::scanner::CoordinatorSettings;
use kdash::core::system_monitor::MetricsCacheSettings;
use kdash::core::Config;
use kdash::KdashError;
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn test_config_save_and_load() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nested").join("config.json");

    let config = Config {
        scanner_path: "/usr/local/bin/trivy".to_string(),
        scan_timeout_secs: 120,
        history_limit: 25,
        ..Default::default()
    };
    config.save(&path).unwrap();

    let loaded = Config::load(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_config_partial_file_keeps_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.json");
    fs::write(&path, r#"{ "scan_cache_ttl_secs": 60, "log_level": "debug" }"#).unwrap();

    let config = Config::load(&path).unwrap();
    assert_eq!(config.scan_cache_ttl(), Duration::from_secs(60));
    assert_eq!(config.log_level, "debug");
    assert_eq!(config.scanner_path, "trivy");
    assert_eq!(config.scan_timeout_secs, 300);
    assert_eq!(config.history_limit, 100);
}

#[test]
fn test_config_empty_file_is_default() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.json");
    fs::write(&path, "\n").unwrap();

    assert_eq!(Config::load(&path).unwrap(), Config::default());
}

#[test]
fn test_config_invalid_json_is_an_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.json");
    fs::write(&path, "{ scanner_path = trivy }").unwrap();

    let err = Config::load(&path).unwrap_err();
    assert!(matches!(err, KdashError::Config(_)));
}

#[test]
fn test_config_missing_file_is_an_error() {
    let temp_dir = TempDir::new().unwrap();
    let err = Config::load(&temp_dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, KdashError::Config(_)));
}

#[test]
fn test_settings_follow_config() {
    let config = Config {
        scan_cache_ttl_secs: 30,
        scan_timeout_secs: 90,
        wait_timeout_secs: 15,
        poll_interval_ms: 250,
        metrics_ttl_secs: 2,
        history_limit: 12,
        ..Default::default()
    };

    let scan = CoordinatorSettings::from(&config);
    assert_eq!(scan.ttl, Duration::from_secs(30));
    assert_eq!(scan.scan_timeout, Duration::from_secs(90));
    assert_eq!(scan.wait_timeout, Duration::from_secs(15));
    assert_eq!(scan.poll_interval, Duration::from_millis(250));

    let metrics = MetricsCacheSettings::from(&config);
    assert_eq!(metrics.ttl, Duration::from_secs(2));
    assert_eq!(metrics.history_limit, 12);
}
