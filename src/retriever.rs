// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

//! Tiered clip retrieval.
//!
//! ```text
//!   Tier 1  direct clip.mp4 ──(empty × N)──▶ Tier 2  master → variant → segments
//!      │ bad status: abort                     │ any failure
//!      ▼                                       ▼
//!   artifact                              Tier 3  raw recording files ──▶ AllTiersExhausted
//! ```
//!
//! Tiers run strictly in sequence. Errors inside a tier are recorded and the
//! next tier is tried; only exhaustion of all tiers reaches the caller, with
//! the exception of a non-success status on the direct endpoint, which ends
//! the retrieval at once.

use std::path::Path;
use std::time::Duration;

use bytes::Bytes;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::assembler::SegmentAssembler;
use crate::availability::RecordingSegment;
use crate::config::{RawFallback, RetrievalConfig};
use crate::endpoints::Endpoints;
use crate::error::{NvrError, Result, Tier, TierFailure};
use crate::manifest::{self, Variant};
use crate::time::{Server, TimeNormalizer, TimeRange};
use crate::transport::{Request, SharedTransport};
use crate::validator::{self, ContainerCheck};

pub const MP4_MEDIA_TYPE: &str = "video/mp4";
pub const TS_MEDIA_TYPE: &str = "video/mp2t";

/// Attempt budget for the direct endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Fixed pause between attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3, delay: Duration::from_secs(2) }
    }
}

impl RetryPolicy {
    pub fn from_config(cfg: &RetrievalConfig) -> Self {
        Self {
            max_attempts: cfg.direct_attempts.max(1),
            delay: Duration::from_millis(cfg.direct_retry_delay_ms),
        }
    }
}

/// A retrieved clip. Never empty.
#[derive(Debug, Clone)]
pub struct ClipArtifact {
    pub bytes: Bytes,
    pub media_type: String,
    /// Which strategy produced the bytes.
    pub tier: Tier,
    pub check: ContainerCheck,
}

impl ClipArtifact {
    pub fn new(bytes: Bytes, media_type: impl Into<String>, tier: Tier, check: ContainerCheck) -> Result<Self> {
        if bytes.is_empty() {
            return Err(NvrError::EmptyPayload { url: format!("{tier} result") });
        }
        Ok(Self { bytes, media_type: media_type.into(), tier, check })
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Write the clip to `path`, replacing any existing file.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        std::fs::write(path, &self.bytes)?;
        info!(
            output = ?path,
            bytes = self.bytes.len(),
            tier = %self.tier,
            "Clip written"
        );
        Ok(())
    }
}

enum DirectOutcome {
    Clip { body: Bytes, media_type: Option<String> },
    Exhausted(String),
}

pub struct ClipRetriever {
    transport: SharedTransport,
    endpoints: Endpoints,
    normalizer: TimeNormalizer,
    assembler: SegmentAssembler,
    policy: RetryPolicy,
    raw_fallback: RawFallback,
}

impl ClipRetriever {
    pub fn new(transport: SharedTransport, endpoints: Endpoints, normalizer: TimeNormalizer) -> Self {
        Self {
            assembler: SegmentAssembler::new(transport.clone()),
            transport,
            endpoints,
            normalizer,
            policy: RetryPolicy::default(),
            raw_fallback: RawFallback::default(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_raw_fallback(mut self, raw_fallback: RawFallback) -> Self {
        self.raw_fallback = raw_fallback;
        self
    }

    /// Retrieve from raw server-time bounds. `end <= start` fails before any I/O.
    pub async fn retrieve_between(&self, camera: &str, server_start: i64, server_end: i64) -> Result<ClipArtifact> {
        let range = TimeRange::<Server>::new(server_start, server_end)?;
        self.retrieve(camera, range).await
    }

    pub async fn retrieve(&self, camera: &str, range: TimeRange<Server>) -> Result<ClipArtifact> {
        let mut attempts = Vec::new();

        match self.try_direct(camera, range).await? {
            DirectOutcome::Clip { body, media_type } => {
                let check = validator::flag_suspect(camera, "direct", &body);
                let media_type = media_type.unwrap_or_else(|| MP4_MEDIA_TYPE.to_string());
                info!(camera, range = %range, bytes = body.len(), "Clip retrieved from direct endpoint");
                return ClipArtifact::new(body, media_type, Tier::Direct, check);
            }
            DirectOutcome::Exhausted(reason) => {
                warn!(camera, range = %range, reason = %reason, "Direct endpoint exhausted, trying manifest");
                attempts.push(TierFailure { tier: Tier::Direct, reason });
            }
        }

        match self.try_manifest(camera, range).await {
            Ok(artifact) => return Ok(artifact),
            Err(e) => {
                warn!(camera, range = %range, error = %e, "Manifest reassembly failed, trying raw files");
                attempts.push(TierFailure { tier: Tier::Manifest, reason: e.to_string() });
            }
        }

        match self.try_raw_files(camera, range).await {
            Ok(artifact) => return Ok(artifact),
            Err(e) => {
                warn!(camera, range = %range, error = %e, "Raw recording fallback failed");
                attempts.push(TierFailure { tier: Tier::RawFiles, reason: e.to_string() });
            }
        }

        Err(NvrError::AllTiersExhausted {
            camera: camera.to_string(),
            range: self.normalizer.describe(range),
            attempts,
        })
    }

    // ──────────────── tier 1 ──────────────────────────────────────────────

    async fn try_direct(&self, camera: &str, range: TimeRange<Server>) -> Result<DirectOutcome> {
        let url = self.endpoints.direct_clip(camera, range)?;
        let mut last_failure = String::new();

        for attempt in 1..=self.policy.max_attempts {
            match self.transport.send(Request::get(url.clone())).await {
                Ok(response) if !response.is_success() => {
                    warn!(camera, attempt, status = response.status, "Direct clip rejected by server");
                    return Err(NvrError::DirectRejected {
                        camera: camera.to_string(),
                        range: self.normalizer.describe(range),
                        status: response.status,
                        url: response.url,
                    });
                }
                Ok(response) if response.body.is_empty() => {
                    last_failure = NvrError::EmptyPayload { url: response.url }.to_string();
                }
                Ok(response) => {
                    return Ok(DirectOutcome::Clip {
                        body: response.body,
                        media_type: response.content_type,
                    });
                }
                Err(e) => last_failure = e.to_string(),
            }

            warn!(
                camera,
                attempt,
                max_attempts = self.policy.max_attempts,
                reason = %last_failure,
                "Direct clip attempt failed"
            );
            if attempt < self.policy.max_attempts {
                sleep(self.policy.delay).await;
            }
        }

        Ok(DirectOutcome::Exhausted(format!(
            "{} attempts, last: {last_failure}",
            self.policy.max_attempts
        )))
    }

    // ──────────────── tier 2 ──────────────────────────────────────────────

    async fn try_manifest(&self, camera: &str, range: TimeRange<Server>) -> Result<ClipArtifact> {
        let master_url = self.endpoints.vod_master(camera, range)?;
        let master = self.fetch_text(master_url.clone()).await?;

        let doc = match manifest::select_variant(&master, &master_url)? {
            Variant::Playlist(variant_url) => {
                let variant = self.fetch_text(variant_url.clone()).await?;
                manifest::parse(&variant, &variant_url)?
            }
            Variant::Inline => manifest::parse(&master, &master_url)?,
        };

        let body = self.assembler.assemble(&doc).await?;
        if body.is_empty() {
            return Err(NvrError::EmptyPayload { url: master_url.to_string() });
        }

        let check = validator::flag_suspect(camera, "manifest", &body);
        let media_type = if doc.init_uri.is_some() { MP4_MEDIA_TYPE } else { TS_MEDIA_TYPE };
        info!(
            camera,
            range = %range,
            segments = doc.segment_uris.len(),
            bytes = body.len(),
            "Clip reassembled from manifest"
        );
        ClipArtifact::new(body, media_type, Tier::Manifest, check)
    }

    async fn fetch_text(&self, url: url::Url) -> Result<String> {
        self.transport.send(Request::get(url)).await?.error_for_status()?.text()
    }

    // ──────────────── tier 3 ──────────────────────────────────────────────

    async fn try_raw_files(&self, camera: &str, range: TimeRange<Server>) -> Result<ClipArtifact> {
        if self.raw_fallback == RawFallback::Disabled {
            return Err(NvrError::FallbackUnavailable(
                "raw recording access is disabled; enable VOD on the server or set \
                 retrieval.raw_fallback = \"recordings\""
                    .into(),
            ));
        }

        let list_url = self.endpoints.recordings(camera, range)?;
        let response = self.transport.send(Request::get(list_url.clone())).await?.error_for_status()?;
        let mut files: Vec<RecordingSegment> = response.json()?;
        files.retain(|f| f.end_time > range.start() as f64 && f.start_time < range.end() as f64);
        files.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));

        if files.is_empty() {
            return Err(NvrError::FallbackUnavailable(format!(
                "no recording files listed by {list_url}; the server may not expose recordings \
                 for this camera, upgrade or reconfigure it"
            )));
        }

        let urls = files
            .iter()
            .map(|f| self.endpoints.raw_recording_file(camera, f.start_time))
            .collect::<Result<Vec<_>>>()?;
        let body = self.assembler.assemble_files(&urls).await?;
        if body.is_empty() {
            return Err(NvrError::EmptyPayload { url: list_url.to_string() });
        }

        let check = validator::flag_suspect(camera, "raw-files", &body);
        info!(camera, range = %range, files = urls.len(), bytes = body.len(), "Clip built from raw recording files");
        ClipArtifact::new(body, MP4_MEDIA_TYPE, Tier::RawFiles, check)
    }
}
