//! Config file loading and resolution

use std::fs;
use std::time::Duration;

use staleguard_config::{ConfigError, ResolvedConfig, StaleguardConfig};

fn write_config(contents: &str) -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, contents).unwrap();
    (dir, path)
}

#[test]
fn full_file_resolves_to_durations() {
    let (_dir, path) = write_config(
        r#"
[features]
chunk_recovery = false

[activity]
idle_threshold_secs = 120
check_interval_secs = 5

[version]
endpoint = "https://conf.example.org/version.json"
min_interval_secs = 30
check_interval_secs = 300
request_timeout_secs = 4

[recovery]
max_retries = 5
base_delay_ms = 250
cache_namespaces = ["assets"]
"#,
    );

    let resolved = StaleguardConfig::load_from(path)
        .unwrap()
        .unwrap()
        .resolve()
        .unwrap();

    assert!(resolved.features.version_check);
    assert!(resolved.features.activity_monitor);
    assert!(!resolved.features.chunk_recovery);
    assert_eq!(resolved.activity.idle_threshold, Duration::from_secs(120));
    assert_eq!(resolved.activity.check_interval, Duration::from_secs(5));
    assert_eq!(
        resolved.version.endpoint.as_ref().map(url::Url::as_str),
        Some("https://conf.example.org/version.json")
    );
    assert_eq!(resolved.version.min_interval, Duration::from_secs(30));
    assert_eq!(resolved.version.check_interval, Duration::from_secs(300));
    assert_eq!(resolved.version.request_timeout, Duration::from_secs(4));
    assert_eq!(resolved.recovery.max_retries, 5);
    assert_eq!(resolved.recovery.base_delay, Duration::from_millis(250));
    assert_eq!(resolved.recovery.cache_namespaces, vec!["assets".to_string()]);
}

#[test]
fn empty_file_uses_defaults() {
    let (_dir, path) = write_config("");
    let resolved = StaleguardConfig::load_from(path)
        .unwrap()
        .unwrap()
        .resolve()
        .unwrap();
    assert_eq!(resolved, ResolvedConfig::default());
}

#[test]
fn timeout_must_stay_below_min_interval() {
    let (_dir, path) = write_config(
        r"
[version]
min_interval_secs = 10
request_timeout_secs = 10
",
    );
    let err = StaleguardConfig::load_from(path)
        .unwrap()
        .unwrap()
        .resolve()
        .unwrap_err();
    assert!(matches!(
        err,
        ConfigError::Invalid {
            field: "version.request_timeout_secs",
            ..
        }
    ));
}

#[test]
fn bad_toml_reports_the_path() {
    let (_dir, path) = write_config("[version\nendpoint = ");
    let err = StaleguardConfig::load_from(path.clone()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
    assert_eq!(err.path(), Some(&path));
}

#[test]
fn invalid_endpoint_is_rejected() {
    let (_dir, path) = write_config(
        r#"
[version]
endpoint = "not a url"
"#,
    );
    let err = StaleguardConfig::load_from(path)
        .unwrap()
        .unwrap()
        .resolve()
        .unwrap_err();
    assert!(matches!(
        err,
        ConfigError::Invalid {
            field: "version.endpoint",
            ..
        }
    ));
}
