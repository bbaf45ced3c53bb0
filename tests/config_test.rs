//! Loading configuration files from disk.
//!
//! Run with: `cargo test --test config_test`

use std::io::Write;

use tempfile::NamedTempFile;

use nvrclip::config::{Config, QueryTime, RawFallback};
use nvrclip::error::NvrError;
use nvrclip::retriever::RetryPolicy;

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create temp file");
    file.write_all(content.as_bytes()).expect("write config");
    file
}

#[test]
fn test_full_config_from_file() {
    let file = write_config(
        r#"
        [server]
        base_url = "https://nvr.example.com/api"
        vod_url = "https://media.example.com"
        api_key = "k"
        timezone_offset_hours = 5.5
        request_timeout_secs = 30

        [retrieval]
        direct_attempts = 5
        direct_retry_delay_ms = 250
        raw_fallback = "disabled"

        [availability]
        skew_tolerance_secs = 30
        query_time = "server"

        [export]
        max_wait_ms = 60000
        poll_interval_ms = 500
        "#,
    );

    let cfg = Config::from_file(file.path()).expect("load");

    assert_eq!(cfg.server.timezone_offset_hours, 5.5);
    assert_eq!(cfg.server.vod_root().unwrap().as_str(), "https://media.example.com/");
    assert_eq!(cfg.retrieval.raw_fallback, RawFallback::Disabled);
    assert_eq!(cfg.availability.query_time, QueryTime::Server);
    assert_eq!(cfg.export.poll_interval_ms, 500);

    let policy = RetryPolicy::from_config(&cfg.retrieval);
    assert_eq!(policy.max_attempts, 5);
    assert_eq!(policy.delay.as_millis(), 250);
}

#[test]
fn test_missing_file_is_config_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let err = Config::from_file(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, NvrError::Config(_)));
}

#[test]
fn test_missing_server_section_is_rejected() {
    let file = write_config("[retrieval]\ndirect_attempts = 2\n");
    assert!(matches!(Config::from_file(file.path()), Err(NvrError::Config(_))));
}

#[test]
fn test_unknown_fallback_mode_is_rejected() {
    let file = write_config("[server]\nbase_url = \"http://nvr\"\n[retrieval]\nraw_fallback = \"ftp\"\n");
    assert!(matches!(Config::from_file(file.path()), Err(NvrError::Config(_))));
}
