// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

use std::fmt;

use thiserror::Error;

/// Retrieval strategies, in the order they are attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Direct,
    Manifest,
    RawFiles,
    Export,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Tier::Direct => "direct clip",
            Tier::Manifest => "manifest reassembly",
            Tier::RawFiles => "raw recording files",
            Tier::Export => "export job",
        };
        f.write_str(name)
    }
}

/// A tier that was attempted and why it gave up.
#[derive(Debug, Clone)]
pub struct TierFailure {
    pub tier: Tier,
    pub reason: String,
}

impl fmt::Display for TierFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.tier, self.reason)
    }
}

#[derive(Debug, Error)]
pub enum NvrError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid time range {start}..{end}: end must be after start and both bounds within ±253402300799 s")]
    InvalidRange { start: i64, end: i64 },

    #[error("Camera '{camera}': {range} starts in the future (server now {now}, tolerance {tolerance_secs}s)")]
    FutureTimestamp {
        camera: String,
        /// Server-time start.
        start: i64,
        local_start: i64,
        /// Both flavors, see `TimeNormalizer::describe`.
        range: String,
        now: i64,
        tolerance_secs: i64,
    },

    #[error("No recordings for camera '{camera}' in {range}: {reason}")]
    NotAvailable {
        camera: String,
        range: String,
        reason: String,
    },

    #[error("Transport error for {url}: {reason}")]
    Transport { url: String, reason: String },

    #[error("HTTP {status} for URL: {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Direct clip for camera '{camera}' in {range} rejected with HTTP {status} ({url})")]
    DirectRejected {
        camera: String,
        range: String,
        status: u16,
        url: String,
    },

    #[error("Empty payload from {url}")]
    EmptyPayload { url: String },

    #[error("Manifest parse error: {0}")]
    ManifestParse(String),

    #[error("Segment fetch failed for {uri}: {reason}")]
    SegmentFetch { uri: String, reason: String },

    #[error("Fallback unavailable: {0}")]
    FallbackUnavailable(String),

    #[error("Unexpected response shape from {url}: {reason}")]
    Decode { url: String, reason: String },

    #[error("No clip for camera '{camera}' in {range}; tried {}", join_failures(.attempts))]
    AllTiersExhausted {
        camera: String,
        range: String,
        attempts: Vec<TierFailure>,
    },

    #[error("Export '{id}' did not finish within {waited_ms} ms")]
    ExportTimeout { id: String, waited_ms: u64 },

    #[error("Export '{id}' failed: {reason}")]
    ExportFailed { id: String, reason: String },
}

impl NvrError {
    pub fn transport(url: impl fmt::Display, reason: impl fmt::Display) -> Self {
        Self::Transport {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn decode(url: impl fmt::Display, reason: impl fmt::Display) -> Self {
        Self::Decode {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Failures that are resolved locally and never reach the network.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            NvrError::InvalidRange { .. } | NvrError::FutureTimestamp { .. } | NvrError::Config(_)
        )
    }
}

fn join_failures(attempts: &[TierFailure]) -> String {
    attempts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

pub type Result<T> = std::result::Result<T, NvrError>;
