//! Request latency instrumentation.
//!
//! # Design
//! A `ClockTimeline` records three monotonic instants: when the task was
//! dispatched, when the response headers arrived, and when the transport
//! signalled completion. Each stamp is written once; later writes are
//! ignored. A stamp never precedes the one before it, so the breakdown
//! durations are always non-negative.

use std::time::{Duration, Instant};

use thiserror::Error;

/// One of the three instants recorded by a `ClockTimeline`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stamp {
    Start,
    FirstByte,
    Completion,
}

impl std::fmt::Display for Stamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stamp::Start => write!(f, "start"),
            Stamp::FirstByte => write!(f, "first byte"),
            Stamp::Completion => write!(f, "completion"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimelineError {
    /// The breakdown was requested before every stamp was recorded.
    #[error("timeline incomplete: {0} time not recorded")]
    Incomplete(Stamp),
}

/// Durations derived from a complete timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatencyBreakdown {
    pub time_to_first_byte: Duration,
    pub body_transfer: Duration,
    pub total: Duration,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClockTimeline {
    start: Option<Instant>,
    first_byte: Option<Instant>,
    completion: Option<Instant>,
}

impl ClockTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_start(&mut self) {
        self.mark_start_at(Instant::now());
    }

    pub fn mark_first_byte(&mut self) {
        self.mark_first_byte_at(Instant::now());
    }

    pub fn mark_completion(&mut self) {
        self.mark_completion_at(Instant::now());
    }

    pub fn mark_start_at(&mut self, at: Instant) {
        if self.start.is_none() {
            self.start = Some(at);
        }
    }

    /// Record the first-byte instant, clamped so it never precedes `start`.
    pub fn mark_first_byte_at(&mut self, at: Instant) {
        if self.first_byte.is_none() {
            self.first_byte = Some(clamp_after(at, self.start));
        }
    }

    /// Record the completion instant, clamped so it never precedes the
    /// first byte (or `start` when no byte ever arrived).
    pub fn mark_completion_at(&mut self, at: Instant) {
        if self.completion.is_none() {
            self.completion = Some(clamp_after(at, self.first_byte.or(self.start)));
        }
    }

    pub fn start(&self) -> Option<Instant> {
        self.start
    }

    pub fn first_byte(&self) -> Option<Instant> {
        self.first_byte
    }

    pub fn completion(&self) -> Option<Instant> {
        self.completion
    }

    pub fn is_complete(&self) -> bool {
        self.start.is_some() && self.first_byte.is_some() && self.completion.is_some()
    }

    /// Derive the latency breakdown.
    ///
    /// Fails with `TimelineError::Incomplete` naming the first missing stamp
    /// when any of the three instants has not been recorded yet.
    pub fn latency_breakdown(&self) -> Result<LatencyBreakdown, TimelineError> {
        let start = self.start.ok_or(TimelineError::Incomplete(Stamp::Start))?;
        let first_byte = self
            .first_byte
            .ok_or(TimelineError::Incomplete(Stamp::FirstByte))?;
        let completion = self
            .completion
            .ok_or(TimelineError::Incomplete(Stamp::Completion))?;

        Ok(LatencyBreakdown {
            time_to_first_byte: first_byte.duration_since(start),
            body_transfer: completion.duration_since(first_byte),
            total: completion.duration_since(start),
        })
    }
}

fn clamp_after(at: Instant, floor: Option<Instant>) -> Instant {
    match floor {
        Some(floor) if at < floor => floor,
        _ => at,
    }
}
