// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

//! Time normalisation between operator wall-clock and server reference time.
//!
//! Operators pick ranges on a local clock; the NVR stores recordings against
//! its own reference (UTC). The two differ by a fixed offset taken from
//! configuration:
//!
//! ```text
//! server = local - offset_hours * 3600
//! local  = server + offset_hours * 3600
//! ```
//!
//! Ranges carry their flavor in the type ([`TimeRange<Local>`] vs
//! [`TimeRange<Server>`]) so a local value cannot be put on the wire by
//! accident. The only way across is [`TimeNormalizer`].

use std::fmt;
use std::marker::PhantomData;

use chrono::{DateTime, Utc};

use crate::error::{NvrError, Result};

const SECS_PER_HOUR: f64 = 3600.0;

/// Largest magnitude a range bound may have: 9999-12-31T23:59:59Z. Keeps
/// every offset shift exact and every bound printable.
pub const MAX_EPOCH_SECS: i64 = 253_402_300_799;

/// Convert a local epoch second to server reference time. Saturates at the
/// `i64` limits.
pub fn to_server_time(local_epoch_secs: i64, offset_hours: f64) -> i64 {
    local_epoch_secs.saturating_sub(offset_secs(offset_hours))
}

/// Convert a server epoch second to local wall-clock time. Saturates at the
/// `i64` limits.
pub fn to_local_time(server_epoch_secs: i64, offset_hours: f64) -> i64 {
    server_epoch_secs.saturating_add(offset_secs(offset_hours))
}

fn offset_secs(offset_hours: f64) -> i64 {
    (offset_hours * SECS_PER_HOUR).round() as i64
}

// ──────────────── flavors ─────────────────────────────────────────────────

pub trait Flavor: Copy + fmt::Debug + PartialEq + Send + Sync + 'static {
    const NAME: &'static str;
}

/// Operator wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Local;

/// Server reference time (UTC).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Server;

impl Flavor for Local {
    const NAME: &'static str = "local";
}

impl Flavor for Server {
    const NAME: &'static str = "server";
}

/// Half-open range of epoch seconds, `start < end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange<F> {
    start: i64,
    end: i64,
    _flavor: PhantomData<F>,
}

impl<F: Flavor> TimeRange<F> {
    /// Build a range, rejecting `end <= start` and bounds beyond
    /// [`MAX_EPOCH_SECS`].
    pub fn new(start: i64, end: i64) -> Result<Self> {
        if end <= start || start < -MAX_EPOCH_SECS || end > MAX_EPOCH_SECS {
            return Err(NvrError::InvalidRange { start, end });
        }
        Ok(Self { start, end, _flavor: PhantomData })
    }

    pub fn start(&self) -> i64 {
        self.start
    }

    pub fn end(&self) -> i64 {
        self.end
    }

    pub fn duration_secs(&self) -> i64 {
        self.end - self.start
    }

    fn shifted<G: Flavor>(&self, by: i64) -> TimeRange<G> {
        TimeRange {
            start: self.start.saturating_add(by),
            end: self.end.saturating_add(by),
            _flavor: PhantomData,
        }
    }
}

impl<F: Flavor> fmt::Display for TimeRange<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{} .. {}] {} ({} .. {})",
            self.start,
            self.end,
            F::NAME,
            format_epoch(self.start),
            format_epoch(self.end)
        )
    }
}

/// Render epoch seconds as `YYYY-MM-DDTHH:MM:SS` for messages and file names.
pub fn format_epoch(secs: i64) -> String {
    match DateTime::<Utc>::from_timestamp(secs, 0) {
        Some(dt) => dt.format("%Y-%m-%dT%H:%M:%S").to_string(),
        None => format!("@{secs}"),
    }
}

// ──────────────── normalizer ──────────────────────────────────────────────

/// Fixed-offset converter. The offset is injected once per operation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeNormalizer {
    offset_hours: f64,
}

impl TimeNormalizer {
    pub fn new(offset_hours: f64) -> Self {
        Self { offset_hours }
    }

    pub fn offset_hours(&self) -> f64 {
        self.offset_hours
    }

    pub fn to_server(&self, range: TimeRange<Local>) -> TimeRange<Server> {
        range.shifted(-offset_secs(self.offset_hours))
    }

    pub fn to_local(&self, range: TimeRange<Server>) -> TimeRange<Local> {
        range.shifted(offset_secs(self.offset_hours))
    }

    /// Describe a range in both flavors, for user-visible failures.
    pub fn describe(&self, range: TimeRange<Server>) -> String {
        format!("{} / {}", self.to_local(range), range)
    }
}

// ──────────────── clock ───────────────────────────────────────────────────

/// Source of "now" in server reference time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn now_epoch(&self) -> i64 {
        self.now().timestamp()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock frozen at a given epoch second.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(self.0, 0).unwrap_or_default()
    }

    fn now_epoch(&self) -> i64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(1_700_000_000, -3.0)]
    #[case(1_700_000_000, 0.0)]
    #[case(0, 5.5)]
    #[case(-86_400, 14.0)]
    #[case(1_234_567_890, -12.0)]
    fn round_trip_is_identity(#[case] t: i64, #[case] offset: f64) {
        assert_eq!(to_local_time(to_server_time(t, offset), offset), t);
    }

    #[rstest]
    #[case(i64::MAX, -3.0)]
    #[case(i64::MIN, 3.0)]
    #[case(i64::MAX, 14.0)]
    fn extreme_instants_saturate(#[case] t: i64, #[case] offset: f64) {
        let server = to_server_time(t, offset);
        let local = to_local_time(server, offset);
        assert!(server == i64::MAX || server == i64::MIN || local == t);
    }

    #[test]
    fn round_trip_holds_at_range_limits() {
        let n = TimeNormalizer::new(-14.0);
        let edge = TimeRange::<Local>::new(MAX_EPOCH_SECS - 60, MAX_EPOCH_SECS).unwrap();
        assert_eq!(n.to_local(n.to_server(edge)), edge);
        let edge = TimeRange::<Server>::new(-MAX_EPOCH_SECS, -MAX_EPOCH_SECS + 60).unwrap();
        assert_eq!(n.to_server(n.to_local(edge)), edge);

        assert!(matches!(
            TimeRange::<Local>::new(i64::MAX - 10, i64::MAX),
            Err(NvrError::InvalidRange { .. })
        ));
        assert!(TimeRange::<Server>::new(i64::MIN, 0).is_err());
    }

    #[test]
    fn negative_offset_moves_server_time_forward() {
        let n = TimeNormalizer::new(-3.0);
        let local = TimeRange::<Local>::new(1_700_000_000, 1_700_003_600).unwrap();
        let server = n.to_server(local);
        assert_eq!(server.start(), 1_700_010_800);
        assert_eq!(server.end(), 1_700_014_400);
        assert_eq!(n.to_local(server), local);
    }

    #[test]
    fn range_rejects_empty_and_inverted() {
        assert!(matches!(
            TimeRange::<Server>::new(10, 10),
            Err(NvrError::InvalidRange { start: 10, end: 10 })
        ));
        assert!(TimeRange::<Local>::new(11, 10).is_err());
    }

    #[test]
    fn describe_mentions_both_flavors() {
        let n = TimeNormalizer::new(2.0);
        let server = TimeRange::<Server>::new(0, 60).unwrap();
        let text = n.describe(server);
        assert!(text.contains("local"));
        assert!(text.contains("server"));
        assert!(text.contains("1970-01-01T02:00:00"));
    }
}
