// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

//! Clip pipeline: wires normalisation, availability, tiered retrieval and
//! export jobs around one shared transport.
//!
//! ```text
//! (camera, local range) ─▶ TimeNormalizer ─▶ AvailabilityChecker ─▶ ClipRetriever ─▶ ClipArtifact
//!                                                      └──────────▶ ExportClient + ExportJobPoller
//! ```
//!
//! Holds no mutable state; independent fetches may run concurrently on the
//! same pipeline.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::de::IgnoredAny;
use serde::Deserialize;
use tracing::info;

use crate::availability::{AvailabilityChecker, AvailabilityResult};
use crate::config::Config;
use crate::endpoints::Endpoints;
use crate::error::{NvrError, Result};
use crate::export::{ExportClient, ExportJob, ExportJobPoller, ExportStatus, WaitOptions};
use crate::retriever::{ClipArtifact, ClipRetriever, RetryPolicy};
use crate::time::{format_epoch, Clock, Local, TimeNormalizer, TimeRange};
use crate::transport::{ReqwestTransport, Request, SharedTransport};

#[derive(Deserialize)]
struct CameraList {
    cameras: BTreeMap<String, IgnoredAny>,
}

pub struct ClipPipeline {
    transport: SharedTransport,
    endpoints: Endpoints,
    normalizer: TimeNormalizer,
    availability: AvailabilityChecker,
    retriever: ClipRetriever,
    exports: ExportClient,
    poller: ExportJobPoller,
}

impl ClipPipeline {
    /// Build from a validated [`Config`] with the `reqwest` transport.
    pub fn from_config(config: &Config) -> Result<Self> {
        let transport = ReqwestTransport::shared(&config.server)?;
        Self::with_transport(config, transport)
    }

    pub fn with_transport(config: &Config, transport: SharedTransport) -> Result<Self> {
        let endpoints = Endpoints::from_config(&config.server)?;
        let normalizer = TimeNormalizer::new(config.server.timezone_offset_hours);

        let availability = AvailabilityChecker::new(transport.clone(), endpoints.clone(), normalizer)
            .with_tolerance(config.availability.skew_tolerance_secs)
            .with_query_time(config.availability.query_time);
        let retriever = ClipRetriever::new(transport.clone(), endpoints.clone(), normalizer)
            .with_policy(RetryPolicy::from_config(&config.retrieval))
            .with_raw_fallback(config.retrieval.raw_fallback);
        let exports = ExportClient::new(transport.clone(), endpoints.clone());
        let poller = ExportJobPoller::new(exports.clone(), WaitOptions::from_config(&config.export));

        Ok(Self { transport, endpoints, normalizer, availability, retriever, exports, poller })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.availability = self.availability.with_clock(clock);
        self
    }

    pub fn normalizer(&self) -> TimeNormalizer {
        self.normalizer
    }

    pub fn exports(&self) -> &ExportClient {
        &self.exports
    }

    pub fn poller(&self) -> &ExportJobPoller {
        &self.poller
    }

    /// Connectivity probe: list the cameras the server knows about.
    pub async fn probe(&self) -> Result<Vec<String>> {
        let url = self.endpoints.config()?;
        let response = self.transport.send(Request::get(url)).await?.error_for_status()?;
        let list: CameraList = response.json()?;
        if list.cameras.is_empty() {
            return Err(NvrError::decode(&response.url, "server has no cameras configured"));
        }
        Ok(list.cameras.into_keys().collect())
    }

    pub async fn check(&self, camera: &str, range: TimeRange<Local>) -> AvailabilityResult {
        self.availability.check(camera, range).await
    }

    /// Availability check followed by tiered retrieval.
    pub async fn fetch(&self, camera: &str, range: TimeRange<Local>) -> Result<ClipArtifact> {
        let server = self.normalizer.to_server(range);
        self.availability.ensure_not_future(camera, server)?;

        let availability = self.availability.check(camera, range).await;
        if !availability.available {
            return Err(NvrError::NotAvailable {
                camera: camera.to_string(),
                range: self.normalizer.describe(server),
                reason: availability.message.unwrap_or_else(|| "no recordings".into()),
            });
        }

        self.retrieve(camera, range).await
    }

    /// Tiered retrieval without the availability pre-check.
    pub async fn retrieve(&self, camera: &str, range: TimeRange<Local>) -> Result<ClipArtifact> {
        let server = self.normalizer.to_server(range);
        info!(camera, local = %range, server = %server, "Retrieving clip");
        self.retriever.retrieve(camera, server).await
    }

    /// Render `range` through a server-side export job and download it.
    pub async fn export_clip<F>(&self, camera: &str, range: TimeRange<Local>, on_progress: F) -> Result<ClipArtifact>
    where
        F: FnMut(u8, ExportStatus),
    {
        let server = self.normalizer.to_server(range);
        self.availability.ensure_not_future(camera, server)?;

        let id = self.exports.start(camera, server).await?;
        let outcome = self.poller.wait_for_ready(&id, on_progress).await;
        let outcome = outcome.into_result(&id, self.poller.options().max_wait)?;

        let job = ExportJob {
            id,
            status: outcome.status,
            progress: 100,
            download_path: outcome.download_path,
        };
        self.exports.download(&job).await
    }
}

/// `{camera}_{start}_to_{end}.mp4`, wall-clock times with `:` replaced.
pub fn attachment_filename(camera: &str, range: TimeRange<Local>) -> String {
    let safe_camera: String = camera
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!(
        "{}_{}_to_{}.mp4",
        safe_camera,
        format_epoch(range.start()).replace(':', "-"),
        format_epoch(range.end()).replace(':', "-")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filename_is_filesystem_safe() {
        let range = TimeRange::<Local>::new(1_700_000_000, 1_700_003_600).unwrap();
        assert_eq!(
            attachment_filename("front door", range),
            "front_door_2023-11-14T22-13-20_to_2023-11-14T23-13-20.mp4"
        );
    }
}
