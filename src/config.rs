// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::error::{NvrError, Result};

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Connection to the NVR.
    pub server: ServerConfig,
    /// Clip retrieval tuning (optional).
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    /// Availability pre-check tuning (optional).
    #[serde(default)]
    pub availability: AvailabilityConfig,
    /// Export job polling (optional).
    #[serde(default)]
    pub export: ExportConfig,
}

/// Where and how to reach the NVR.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// API root, e.g. `http://nvr.local:5000/api`.
    pub base_url: String,
    /// Root for VOD playlists and static recordings.
    /// Defaults to `base_url` with a trailing `/api` removed.
    #[serde(default)]
    pub vod_url: Option<String>,
    /// Sent as `X-Frigate-API-Key` when present.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Extra headers attached to every request (auth tokens, cookies).
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Fixed offset between operator wall-clock and server time, in hours.
    #[serde(default)]
    pub timezone_offset_hours: f64,
    /// Per-request timeout.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

/// Tier tuning for [`crate::retriever::ClipRetriever`].
#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Attempts against the direct clip endpoint before falling back.
    #[serde(default = "default_direct_attempts")]
    pub direct_attempts: u32,
    /// Fixed delay between direct attempts.
    #[serde(default = "default_direct_retry_delay")]
    pub direct_retry_delay_ms: u64,
    /// Last-resort strategy once the manifest tier fails.
    #[serde(default)]
    pub raw_fallback: RawFallback,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            direct_attempts: default_direct_attempts(),
            direct_retry_delay_ms: default_direct_retry_delay(),
            raw_fallback: RawFallback::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RawFallback {
    /// Fetch the recording files backing the range from static storage.
    #[default]
    Recordings,
    /// Fail the tier straight away with guidance.
    Disabled,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AvailabilityConfig {
    /// Allowed clock skew when deciding whether a start time is in the future.
    #[serde(default = "default_skew_tolerance")]
    pub skew_tolerance_secs: i64,
    /// Time flavor sent to the recordings summary endpoint.
    #[serde(default)]
    pub query_time: QueryTime,
}

impl Default for AvailabilityConfig {
    fn default() -> Self {
        Self {
            skew_tolerance_secs: default_skew_tolerance(),
            query_time: QueryTime::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum QueryTime {
    #[default]
    Local,
    Server,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExportConfig {
    #[serde(default = "default_max_wait")]
    pub max_wait_ms: u64,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self { max_wait_ms: default_max_wait(), poll_interval_ms: default_poll_interval() }
    }
}

fn default_request_timeout() -> u64 { 60 }
fn default_direct_attempts() -> u32 { 3 }
fn default_direct_retry_delay() -> u64 { 2000 }
fn default_skew_tolerance() -> i64 { 120 }
fn default_max_wait() -> u64 { 300_000 }
fn default_poll_interval() -> u64 { 2000 }

impl Config {
    /// Load configuration from a TOML file at `path`.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| NvrError::Config(format!("Cannot read config file: {e}")))?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| NvrError::Config(format!("Invalid TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        self.server.api_url()?;
        self.server.vod_root()?;
        if !(-14.0..=14.0).contains(&self.server.timezone_offset_hours) {
            return Err(NvrError::Config(
                "timezone_offset_hours must be within -14..=14".into(),
            ));
        }
        if self.server.request_timeout_secs == 0 {
            return Err(NvrError::Config("request_timeout_secs must be > 0".into()));
        }
        if self.retrieval.direct_attempts == 0 {
            return Err(NvrError::Config("direct_attempts must be > 0".into()));
        }
        if self.availability.skew_tolerance_secs < 0 {
            return Err(NvrError::Config("skew_tolerance_secs must be >= 0".into()));
        }
        if self.export.poll_interval_ms == 0 {
            return Err(NvrError::Config("poll_interval_ms must be > 0".into()));
        }
        Ok(())
    }
}

impl ServerConfig {
    /// API root as a directory URL (always ends in `/` so joins append).
    pub fn api_url(&self) -> Result<Url> {
        parse_dir_url(&self.base_url)
    }

    /// Root for `/vod/...` and `/recordings/...`.
    pub fn vod_root(&self) -> Result<Url> {
        match &self.vod_url {
            Some(url) => parse_dir_url(url),
            None => {
                let trimmed = self.base_url.trim_end_matches('/');
                let root = trimmed.strip_suffix("/api").unwrap_or(trimmed);
                parse_dir_url(root)
            }
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Headers attached to every request: the API key plus configured extras.
    pub fn auth_headers(&self) -> BTreeMap<String, String> {
        let mut headers = self.headers.clone();
        if let Some(key) = &self.api_key {
            headers.insert("X-Frigate-API-Key".into(), key.clone());
        }
        headers
    }
}

fn parse_dir_url(raw: &str) -> Result<Url> {
    let mut text = raw.trim().to_string();
    if !text.ends_with('/') {
        text.push('/');
    }
    let url = Url::parse(&text)
        .map_err(|e| NvrError::Config(format!("Invalid URL '{raw}': {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(NvrError::Config(format!("Unsupported URL scheme in '{raw}'")));
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_sections() {
        let cfg = Config::from_toml(
            r#"
            [server]
            base_url = "http://nvr.local:5000/api"
            timezone_offset_hours = -3
            "#,
        )
        .unwrap();
        assert_eq!(cfg.retrieval.direct_attempts, 3);
        assert_eq!(cfg.retrieval.direct_retry_delay_ms, 2000);
        assert_eq!(cfg.retrieval.raw_fallback, RawFallback::Recordings);
        assert_eq!(cfg.availability.skew_tolerance_secs, 120);
        assert_eq!(cfg.availability.query_time, QueryTime::Local);
        assert_eq!(cfg.export.max_wait_ms, 300_000);
        assert_eq!(cfg.export.poll_interval_ms, 2000);
        assert_eq!(cfg.server.timezone_offset_hours, -3.0);
    }

    #[test]
    fn vod_root_strips_api_suffix() {
        let cfg = Config::from_toml(
            r#"
            [server]
            base_url = "http://nvr.local:5000/api/"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.server.api_url().unwrap().as_str(), "http://nvr.local:5000/api/");
        assert_eq!(cfg.server.vod_root().unwrap().as_str(), "http://nvr.local:5000/");
    }

    #[test]
    fn api_key_becomes_header() {
        let cfg = Config::from_toml(
            r#"
            [server]
            base_url = "http://nvr.local:5000/api"
            api_key = "s3cret"
            headers = { Authorization = "Bearer abc" }
            "#,
        )
        .unwrap();
        let headers = cfg.server.auth_headers();
        assert_eq!(headers.get("X-Frigate-API-Key").map(String::as_str), Some("s3cret"));
        assert_eq!(headers.get("Authorization").map(String::as_str), Some("Bearer abc"));
    }

    #[test]
    fn rejects_bad_values() {
        let bad_scheme = Config::from_toml("[server]\nbase_url = \"ftp://nvr\"\n");
        assert!(matches!(bad_scheme, Err(NvrError::Config(_))));

        let zero_attempts = Config::from_toml(
            "[server]\nbase_url = \"http://nvr\"\n[retrieval]\ndirect_attempts = 0\n",
        );
        assert!(matches!(zero_attempts, Err(NvrError::Config(_))));

        let offset = Config::from_toml(
            "[server]\nbase_url = \"http://nvr\"\ntimezone_offset_hours = 30\n",
        );
        assert!(matches!(offset, Err(NvrError::Config(_))));
    }
}
