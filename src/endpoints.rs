// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

//! NVR routes consumed by this client.
//!
//! Relative to the API root (`[server] base_url`):
//!   GET    /{camera}/start/{start}/end/{end}/clip.mp4       → direct clip (server time)
//!   GET    /{camera}/recordings/summary?after=..&before=..  → recording presence
//!   GET    /{camera}/recordings?after=..&before=..          → recording files (server time)
//!   GET    /config                                          → camera list (connectivity probe)
//!   POST   /export/{camera}/start/{start}/end/{end}         → create export job
//!   GET    /export/{id}      (fallback /exports/{id})       → export status
//!   DELETE /export/{id}                                     → cancel / delete export
//!   GET    /export/{id}/download                            → exported file
//!
//! Relative to the VOD root (`[server] vod_url`):
//!   GET    /vod/{camera}/start/{start}/end/{end}/master.m3u8 → master manifest
//!   GET    /recordings/{YYYY-MM-DD}/{HH}/{camera}/{MM}.{SS}.mp4 → raw recording file

use chrono::{DateTime, Utc};
use url::Url;

use crate::config::ServerConfig;
use crate::error::{NvrError, Result};
use crate::time::{Flavor, Server, TimeRange};

#[derive(Debug, Clone)]
pub struct Endpoints {
    api: Url,
    vod: Url,
}

impl Endpoints {
    /// Both roots must be directory URLs (ending in `/`).
    pub fn new(api: Url, vod: Url) -> Self {
        Self { api, vod }
    }

    pub fn from_config(server: &ServerConfig) -> Result<Self> {
        Ok(Self::new(server.api_url()?, server.vod_root()?))
    }

    pub fn api_root(&self) -> &Url {
        &self.api
    }

    pub fn direct_clip(&self, camera: &str, range: TimeRange<Server>) -> Result<Url> {
        let (start, end) = (range.start().to_string(), range.end().to_string());
        with_segments(&self.api, &[camera, "start", &start, "end", &end, "clip.mp4"])
    }

    pub fn vod_master(&self, camera: &str, range: TimeRange<Server>) -> Result<Url> {
        let (start, end) = (range.start().to_string(), range.end().to_string());
        with_segments(&self.vod, &["vod", camera, "start", &start, "end", &end, "master.m3u8"])
    }

    /// Presence summary. The flavor of `range` is the caller's decision.
    pub fn recordings_summary<F: Flavor>(&self, camera: &str, range: TimeRange<F>) -> Result<Url> {
        let mut url = with_segments(&self.api, &[camera, "recordings", "summary"])?;
        set_window(&mut url, range);
        Ok(url)
    }

    pub fn recordings(&self, camera: &str, range: TimeRange<Server>) -> Result<Url> {
        let mut url = with_segments(&self.api, &[camera, "recordings"])?;
        set_window(&mut url, range);
        Ok(url)
    }

    /// Static path of the recording file that starts at `start_time` (UTC).
    pub fn raw_recording_file(&self, camera: &str, start_time: f64) -> Result<Url> {
        let secs = start_time.floor() as i64;
        let start = DateTime::<Utc>::from_timestamp(secs, 0).ok_or_else(|| {
            NvrError::decode(&self.api, format!("recording start {start_time} out of range"))
        })?;
        let date = start.format("%Y-%m-%d").to_string();
        let hour = start.format("%H").to_string();
        let file = start.format("%M.%S.mp4").to_string();
        with_segments(&self.vod, &["recordings", &date, &hour, camera, &file])
    }

    pub fn config(&self) -> Result<Url> {
        with_segments(&self.api, &["config"])
    }

    pub fn export_start(&self, camera: &str, range: TimeRange<Server>) -> Result<Url> {
        let (start, end) = (range.start().to_string(), range.end().to_string());
        with_segments(&self.api, &["export", camera, "start", &start, "end", &end])
    }

    pub fn export_status(&self, id: &str) -> Result<Url> {
        with_segments(&self.api, &["export", id])
    }

    pub fn export_status_alt(&self, id: &str) -> Result<Url> {
        with_segments(&self.api, &["exports", id])
    }

    pub fn export_download(&self, id: &str) -> Result<Url> {
        with_segments(&self.api, &["export", id, "download"])
    }

    /// Resolve a server-reported download path (absolute URL or root-relative).
    pub fn resolve_download_path(&self, path: &str) -> Result<Url> {
        if let Ok(url) = Url::parse(path) {
            return Ok(url);
        }
        self.vod
            .join(path.trim_start_matches('/'))
            .map_err(|e| NvrError::decode(&self.vod, format!("download path '{path}': {e}")))
    }
}

fn with_segments(base: &Url, segments: &[&str]) -> Result<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| NvrError::Config(format!("URL cannot be a base: {base}")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

fn set_window<F: Flavor>(url: &mut Url, range: TimeRange<F>) {
    url.query_pairs_mut()
        .append_pair("after", &range.start().to_string())
        .append_pair("before", &range.end().to_string());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::Local;

    fn endpoints() -> Endpoints {
        Endpoints::new(
            Url::parse("http://nvr:5000/api/").unwrap(),
            Url::parse("http://nvr:5000/").unwrap(),
        )
    }

    #[test]
    fn builds_clip_and_vod_paths() {
        let e = endpoints();
        let range = TimeRange::<Server>::new(1_700_010_800, 1_700_014_400).unwrap();
        assert_eq!(
            e.direct_clip("front-door", range).unwrap().as_str(),
            "http://nvr:5000/api/front-door/start/1700010800/end/1700014400/clip.mp4"
        );
        assert_eq!(
            e.vod_master("front-door", range).unwrap().as_str(),
            "http://nvr:5000/vod/front-door/start/1700010800/end/1700014400/master.m3u8"
        );
    }

    #[test]
    fn camera_names_are_escaped() {
        let e = endpoints();
        let range = TimeRange::<Local>::new(10, 20).unwrap();
        assert_eq!(
            e.recordings_summary("back yard", range).unwrap().as_str(),
            "http://nvr:5000/api/back%20yard/recordings/summary?after=10&before=20"
        );
    }

    #[test]
    fn raw_file_path_uses_utc_start() {
        let e = endpoints();
        // 2023-11-14T22:13:20Z
        let url = e.raw_recording_file("cam1", 1_700_000_000.4).unwrap();
        assert_eq!(url.as_str(), "http://nvr:5000/recordings/2023-11-14/22/cam1/13.20.mp4");
    }

    #[test]
    fn download_path_resolves_against_root() {
        let e = endpoints();
        assert_eq!(
            e.resolve_download_path("/exports/cam1_abc.mp4").unwrap().as_str(),
            "http://nvr:5000/exports/cam1_abc.mp4"
        );
        assert_eq!(
            e.resolve_download_path("http://cdn/x.mp4").unwrap().as_str(),
            "http://cdn/x.mp4"
        );
    }
}
