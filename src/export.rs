// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

//! Server-side export jobs: creation, status, cancellation, download, and the
//! polling loop that waits for a job to reach a terminal state.
//!
//! ```text
//!   pending ──▶ processing ──▶ complete
//!      │            │     └──▶ failed
//!      └────────────┴────────▶ timeout   (server-reported, or local deadline)
//! ```
//!
//! Transitions are driven only by what the server reports on each poll.

use std::fmt;
use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::config::ExportConfig;
use crate::endpoints::Endpoints;
use crate::error::{NvrError, Result, Tier};
use crate::retriever::{ClipArtifact, MP4_MEDIA_TYPE};
use crate::time::{Server, TimeRange};
use crate::transport::{Request, SharedTransport};
use crate::validator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportStatus {
    Pending,
    Processing,
    Complete,
    Failed,
    Timeout,
    Unknown,
}

impl ExportStatus {
    /// Map a server status string, accepting the synonyms seen in the wild.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" | "queued" | "waiting" | "created" => ExportStatus::Pending,
            "processing" | "in_progress" | "running" | "exporting" | "started" => ExportStatus::Processing,
            "complete" | "completed" | "done" | "success" | "succeeded" | "finished" | "ready" => {
                ExportStatus::Complete
            }
            "failed" | "failure" | "error" | "errored" | "cancelled" | "canceled" => ExportStatus::Failed,
            "timeout" | "timed_out" | "expired" => ExportStatus::Timeout,
            _ => ExportStatus::Unknown,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ExportStatus::Complete | ExportStatus::Failed | ExportStatus::Timeout)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ExportStatus::Pending => "pending",
            ExportStatus::Processing => "processing",
            ExportStatus::Complete => "complete",
            ExportStatus::Failed => "failed",
            ExportStatus::Timeout => "timeout",
            ExportStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ExportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of an export job as last reported by the server.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportJob {
    pub id: String,
    pub status: ExportStatus,
    /// 0–100.
    pub progress: u8,
    pub download_path: Option<String>,
}

/// Status payload shapes the server is known to send.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ExportStatusBody {
    Reported {
        status: String,
        #[serde(default)]
        progress: Option<f64>,
        #[serde(default, alias = "video_path")]
        download_path: Option<String>,
    },
    Flagged {
        in_progress: bool,
        #[serde(default)]
        video_path: Option<String>,
    },
}

impl ExportStatusBody {
    fn into_job(self, id: &str) -> ExportJob {
        let (status, progress, download_path) = match self {
            ExportStatusBody::Reported { status, progress, download_path } => {
                (ExportStatus::parse(&status), progress, download_path)
            }
            ExportStatusBody::Flagged { in_progress: true, video_path } => {
                (ExportStatus::Processing, None, video_path)
            }
            ExportStatusBody::Flagged { in_progress: false, video_path } => {
                (ExportStatus::Complete, None, video_path)
            }
        };
        let progress = match progress {
            Some(p) if p.is_finite() => p.round().clamp(0.0, 100.0) as u8,
            _ if status == ExportStatus::Complete => 100,
            _ => 0,
        };
        ExportJob { id: id.to_string(), status, progress, download_path }
    }
}

#[derive(Debug, Deserialize)]
struct StartExportBody {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    export_id: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

// ──────────────── client ──────────────────────────────────────────────────

#[derive(Clone)]
pub struct ExportClient {
    transport: SharedTransport,
    endpoints: Endpoints,
}

impl ExportClient {
    pub fn new(transport: SharedTransport, endpoints: Endpoints) -> Self {
        Self { transport, endpoints }
    }

    /// Ask the server to render `range` into a downloadable file.
    pub async fn start(&self, camera: &str, range: TimeRange<Server>) -> Result<String> {
        let url = self.endpoints.export_start(camera, range)?;
        let response = self
            .transport
            .send(Request::post_json(url, json!({ "playback": "realtime" })))
            .await?
            .error_for_status()?;
        let body: StartExportBody = response.json()?;
        match body.export_id {
            Some(id) if body.success && !id.is_empty() => {
                info!(camera, export_id = %id, range = %range, "Export started");
                Ok(id)
            }
            _ => Err(NvrError::decode(
                &response.url,
                format!(
                    "export not accepted: {}",
                    body.message.as_deref().unwrap_or("no export id returned")
                ),
            )),
        }
    }

    /// Current status. A `405` on the primary route retries `/exports/{id}` once.
    pub async fn status(&self, id: &str) -> Result<ExportJob> {
        let url = self.endpoints.export_status(id)?;
        let mut response = self.transport.send(Request::get(url)).await?;
        if response.status == 405 {
            debug!(export_id = id, "Status route not allowed, trying alternative");
            let alt = self.endpoints.export_status_alt(id)?;
            response = self.transport.send(Request::get(alt)).await?;
        }
        let body: ExportStatusBody = response.error_for_status()?.json()?;
        Ok(body.into_job(id))
    }

    pub async fn cancel(&self, id: &str) -> Result<()> {
        let url = self.endpoints.export_status(id)?;
        self.transport.send(Request::delete(url)).await?.error_for_status()?;
        info!(export_id = id, "Export deleted");
        Ok(())
    }

    /// Download a finished export.
    pub async fn download(&self, job: &ExportJob) -> Result<ClipArtifact> {
        let url = match &job.download_path {
            Some(path) => self.endpoints.resolve_download_path(path)?,
            None => self.endpoints.export_download(&job.id)?,
        };
        let response = self.transport.send(Request::get(url)).await?.error_for_status()?;
        let check = validator::flag_suspect(&job.id, "export", &response.body);
        let media_type = response.content_type.unwrap_or_else(|| MP4_MEDIA_TYPE.to_string());
        ClipArtifact::new(response.body, media_type, Tier::Export, check)
    }
}

// ──────────────── poller ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    pub max_wait: Duration,
    pub poll_interval: Duration,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self { max_wait: Duration::from_millis(300_000), poll_interval: Duration::from_millis(2000) }
    }
}

impl WaitOptions {
    pub fn from_millis(max_wait_ms: u64, poll_interval_ms: u64) -> Self {
        Self {
            max_wait: Duration::from_millis(max_wait_ms),
            poll_interval: Duration::from_millis(poll_interval_ms),
        }
    }

    pub fn from_config(cfg: &ExportConfig) -> Self {
        Self::from_millis(cfg.max_wait_ms, cfg.poll_interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WaitOutcome {
    pub ready: bool,
    pub status: ExportStatus,
    pub download_path: Option<String>,
    pub error: Option<String>,
}

impl WaitOutcome {
    /// `Ok` only when the job is ready.
    pub fn into_result(self, id: &str, waited: Duration) -> Result<Self> {
        match self.status {
            ExportStatus::Complete if self.ready => Ok(self),
            ExportStatus::Failed => Err(NvrError::ExportFailed {
                id: id.to_string(),
                reason: self.error.unwrap_or_else(|| "server reported failure".into()),
            }),
            _ => Err(NvrError::ExportTimeout { id: id.to_string(), waited_ms: waited.as_millis() as u64 }),
        }
    }
}

pub struct ExportJobPoller {
    client: ExportClient,
    options: WaitOptions,
}

impl ExportJobPoller {
    pub fn new(client: ExportClient, options: WaitOptions) -> Self {
        Self { client, options }
    }

    pub fn options(&self) -> WaitOptions {
        self.options
    }

    /// Poll without a progress callback.
    pub async fn wait(&self, job_id: &str) -> WaitOutcome {
        self.wait_for_ready(job_id, |_, _| {}).await
    }

    /// Poll until the job reaches a terminal state or `max_wait` elapses.
    ///
    /// Transport and decode errors are swallowed and retried after the poll
    /// interval. `on_progress` is called once per successful poll.
    pub async fn wait_for_ready<F>(&self, job_id: &str, mut on_progress: F) -> WaitOutcome
    where
        F: FnMut(u8, ExportStatus),
    {
        let started = Instant::now();
        let mut last_error: Option<String> = None;
        let mut download_path = None;

        while started.elapsed() < self.options.max_wait {
            match self.client.status(job_id).await {
                Ok(job) => {
                    on_progress(job.progress, job.status);
                    debug!(export_id = job_id, status = %job.status, progress = job.progress, "Export polled");
                    if job.download_path.is_some() {
                        download_path = job.download_path.clone();
                    }

                    match job.status {
                        ExportStatus::Complete => {
                            info!(export_id = job_id, elapsed = ?started.elapsed(), "Export ready");
                            return WaitOutcome {
                                ready: true,
                                status: ExportStatus::Complete,
                                download_path,
                                error: None,
                            };
                        }
                        ExportStatus::Failed => {
                            warn!(export_id = job_id, "Export failed on server");
                            return WaitOutcome {
                                ready: false,
                                status: ExportStatus::Failed,
                                download_path,
                                error: Some(format!("export '{job_id}' reported failed")),
                            };
                        }
                        ExportStatus::Timeout => {
                            warn!(export_id = job_id, "Export timed out on server");
                            return WaitOutcome {
                                ready: false,
                                status: ExportStatus::Timeout,
                                download_path,
                                error: Some(format!("export '{job_id}' reported timeout")),
                            };
                        }
                        ExportStatus::Pending | ExportStatus::Processing | ExportStatus::Unknown => {}
                    }
                }
                Err(e) => {
                    warn!(export_id = job_id, error = %e, "Export status poll failed, retrying");
                    last_error = Some(e.to_string());
                }
            }

            let remaining = self.options.max_wait.saturating_sub(started.elapsed());
            sleep(self.options.poll_interval.min(remaining)).await;
        }

        warn!(export_id = job_id, waited = ?started.elapsed(), "Export wait timed out");
        let timeout = NvrError::ExportTimeout {
            id: job_id.to_string(),
            waited_ms: self.options.max_wait.as_millis() as u64,
        };
        WaitOutcome {
            ready: false,
            status: ExportStatus::Timeout,
            download_path,
            error: Some(match last_error {
                Some(last) => format!("{timeout}; last poll error: {last}"),
                None => timeout.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("pending", ExportStatus::Pending)]
    #[case("QUEUED", ExportStatus::Pending)]
    #[case("in_progress", ExportStatus::Processing)]
    #[case("processing", ExportStatus::Processing)]
    #[case("completed", ExportStatus::Complete)]
    #[case(" done ", ExportStatus::Complete)]
    #[case("success", ExportStatus::Complete)]
    #[case("error", ExportStatus::Failed)]
    #[case("cancelled", ExportStatus::Failed)]
    #[case("timed_out", ExportStatus::Timeout)]
    #[case("rendering-ish", ExportStatus::Unknown)]
    fn status_synonyms(#[case] raw: &str, #[case] expected: ExportStatus) {
        assert_eq!(ExportStatus::parse(raw), expected);
    }

    #[test]
    fn terminal_states() {
        assert!(ExportStatus::Complete.is_terminal());
        assert!(ExportStatus::Failed.is_terminal());
        assert!(ExportStatus::Timeout.is_terminal());
        assert!(!ExportStatus::Unknown.is_terminal());
        assert!(!ExportStatus::Processing.is_terminal());
    }

    #[test]
    fn status_bodies() {
        let reported: ExportStatusBody =
            serde_json::from_str(r#"{"status":"processing","progress":62.6}"#).unwrap();
        let job = reported.into_job("a");
        assert_eq!((job.status, job.progress), (ExportStatus::Processing, 63));

        let done: ExportStatusBody =
            serde_json::from_str(r#"{"id":"a","in_progress":false,"video_path":"/exports/a.mp4"}"#).unwrap();
        let job = done.into_job("a");
        assert_eq!(job.status, ExportStatus::Complete);
        assert_eq!(job.progress, 100);
        assert_eq!(job.download_path.as_deref(), Some("/exports/a.mp4"));

        let clamped: ExportStatusBody =
            serde_json::from_str(r#"{"status":"processing","progress":250}"#).unwrap();
        assert_eq!(clamped.into_job("a").progress, 100);

        let unknown: std::result::Result<ExportStatusBody, _> = serde_json::from_str(r#"{"state":1}"#);
        assert!(unknown.is_err());
    }

    #[test]
    fn outcome_into_result() {
        let failed = WaitOutcome {
            ready: false,
            status: ExportStatus::Failed,
            download_path: None,
            error: None,
        };
        assert!(matches!(
            failed.into_result("x", Duration::from_secs(1)),
            Err(NvrError::ExportFailed { .. })
        ));
        let timed_out = WaitOutcome {
            ready: false,
            status: ExportStatus::Timeout,
            download_path: None,
            error: None,
        };
        assert!(matches!(
            timed_out.into_result("x", Duration::from_secs(5)),
            Err(NvrError::ExportTimeout { waited_ms: 5000, .. })
        ));
    }
}
