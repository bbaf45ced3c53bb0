// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

//! Availability pre-check: is there anything recorded for this camera and
//! range, and is the range not in the future?
//!
//! The future check runs locally against server-normalised time and never
//! touches the network. The presence query is sent in the flavor configured
//! by `[availability] query_time` (local by default, which is what the server
//! documents for this endpoint). Any error answers "unavailable".

use std::sync::Arc;

use serde::Deserialize;
use tracing::{info, warn};

use crate::config::QueryTime;
use crate::endpoints::Endpoints;
use crate::error::{NvrError, Result};
use crate::time::{Clock, Local, Server, SystemClock, TimeNormalizer, TimeRange};
use crate::transport::{Request, SharedTransport};

pub const DEFAULT_SKEW_TOLERANCE_SECS: i64 = 120;

#[derive(Debug, Clone, PartialEq)]
pub struct AvailabilityResult {
    pub available: bool,
    /// Total recorded seconds in the range, when the server answered.
    pub duration: Option<f64>,
    pub message: Option<String>,
}

impl AvailabilityResult {
    fn unavailable(message: impl Into<String>) -> Self {
        Self { available: false, duration: None, message: Some(message.into()) }
    }

    fn from_duration(duration: f64) -> Self {
        if duration > 0.0 {
            Self { available: true, duration: Some(duration), message: None }
        } else {
            Self {
                available: false,
                duration: Some(duration),
                message: Some("No recorded footage in the requested range".into()),
            }
        }
    }
}

/// One recording file as listed by the server (server time).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RecordingSegment {
    #[serde(alias = "start")]
    pub start_time: f64,
    #[serde(alias = "end")]
    pub end_time: f64,
    pub duration: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HourSummary {
    pub hour: String,
    pub duration: f64,
}

/// Entries the summary endpoint is known to return.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum SummaryEntry {
    Segment(RecordingSegment),
    Day { day: String, hours: Vec<HourSummary> },
    Bare { duration: f64 },
}

impl SummaryEntry {
    pub fn duration(&self) -> f64 {
        match self {
            SummaryEntry::Segment(seg) => seg.duration,
            SummaryEntry::Day { hours, .. } => hours.iter().map(|h| h.duration).sum(),
            SummaryEntry::Bare { duration } => *duration,
        }
    }
}

pub struct AvailabilityChecker {
    transport: SharedTransport,
    endpoints: Endpoints,
    normalizer: TimeNormalizer,
    clock: Arc<dyn Clock>,
    tolerance_secs: i64,
    query_time: QueryTime,
}

impl AvailabilityChecker {
    pub fn new(transport: SharedTransport, endpoints: Endpoints, normalizer: TimeNormalizer) -> Self {
        Self {
            transport,
            endpoints,
            normalizer,
            clock: Arc::new(SystemClock),
            tolerance_secs: DEFAULT_SKEW_TOLERANCE_SECS,
            query_time: QueryTime::Local,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_tolerance(mut self, tolerance_secs: i64) -> Self {
        self.tolerance_secs = tolerance_secs;
        self
    }

    pub fn with_query_time(mut self, query_time: QueryTime) -> Self {
        self.query_time = query_time;
        self
    }

    /// Fail with [`NvrError::FutureTimestamp`] when the range starts beyond
    /// `now + tolerance` on the server clock.
    pub fn ensure_not_future(&self, camera: &str, range: TimeRange<Server>) -> Result<()> {
        let now = self.clock.now_epoch();
        if range.start() > now.saturating_add(self.tolerance_secs) {
            return Err(NvrError::FutureTimestamp {
                camera: camera.to_string(),
                start: range.start(),
                local_start: self.normalizer.to_local(range).start(),
                range: self.normalizer.describe(range),
                now,
                tolerance_secs: self.tolerance_secs,
            });
        }
        Ok(())
    }

    /// Check raw local bounds; an inverted range is reported as unavailable.
    pub async fn check_between(&self, camera: &str, local_start: i64, local_end: i64) -> AvailabilityResult {
        match TimeRange::<Local>::new(local_start, local_end) {
            Ok(range) => self.check(camera, range).await,
            Err(e) => AvailabilityResult::unavailable(e.to_string()),
        }
    }

    pub async fn check(&self, camera: &str, range: TimeRange<Local>) -> AvailabilityResult {
        let server = self.normalizer.to_server(range);
        if let Err(e) = self.ensure_not_future(camera, server) {
            info!(camera, range = %server, "Range is in the future, skipping server query");
            return AvailabilityResult::unavailable(e.to_string());
        }

        match self.query(camera, range, server).await {
            Ok(duration) => {
                let result = AvailabilityResult::from_duration(duration);
                info!(camera, duration, available = result.available, "Availability checked");
                result
            }
            Err(e) => {
                warn!(camera, error = %e, "Availability query failed, reporting unavailable");
                AvailabilityResult::unavailable(e.to_string())
            }
        }
    }

    async fn query(&self, camera: &str, local: TimeRange<Local>, server: TimeRange<Server>) -> Result<f64> {
        let url = match self.query_time {
            QueryTime::Local => self.endpoints.recordings_summary(camera, local)?,
            QueryTime::Server => self.endpoints.recordings_summary(camera, server)?,
        };
        let response = self.transport.send(Request::get(url)).await?.error_for_status()?;
        let entries: Vec<SummaryEntry> = response.json()?;
        Ok(entries.iter().map(SummaryEntry::duration).sum())
    }
}
