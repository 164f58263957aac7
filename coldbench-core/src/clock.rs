// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Monotonic latency measurement and duration formatting.
//!
//! Built on `Instant`, which never jumps with NTP adjustments.

use std::fmt;
use std::time::{Duration, Instant};

const NANOS_PER_SEC: u64 = 1_000_000_000;
const NANOS_PER_MILLI: u64 = 1_000_000;
const NANOS_PER_MICRO: u64 = 1_000;

/// Opaque monotonic start point.
#[derive(Debug, Clone, Copy)]
pub struct Timestamp(Instant);

/// Stateless monotonic clock.
pub struct LatencyClock;

impl LatencyClock {
    /// Start a measurement.
    pub fn start() -> Timestamp {
        Timestamp(Instant::now())
    }

    /// Time elapsed since `t0`.
    pub fn elapsed(t0: Timestamp) -> Duration {
        t0.0.elapsed()
    }

    /// Render a duration as e.g. `1s, 500ms`.
    pub fn format(duration: Duration) -> String {
        DurationParts::from(duration).to_string()
    }

    /// Render a possibly negative nanosecond quantity (means, overheads).
    pub fn format_nanos(nanos: f64) -> String {
        if !nanos.is_finite() {
            return "undefined".to_string();
        }
        let magnitude = Duration::from_nanos(nanos.abs().round() as u64);
        if nanos < 0.0 && !magnitude.is_zero() {
            format!("-{}", Self::format(magnitude))
        } else {
            Self::format(magnitude)
        }
    }
}

/// A duration decomposed into display components.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DurationParts {
    pub seconds: u64,
    pub milliseconds: u64,
    pub microseconds: u64,
    pub nanoseconds: u64,
}

impl From<Duration> for DurationParts {
    fn from(duration: Duration) -> Self {
        let total = duration.as_nanos().min(u64::MAX as u128) as u64;
        Self {
            seconds: total / NANOS_PER_SEC,
            milliseconds: (total % NANOS_PER_SEC) / NANOS_PER_MILLI,
            microseconds: (total % NANOS_PER_MILLI) / NANOS_PER_MICRO,
            nanoseconds: total % NANOS_PER_MICRO,
        }
    }
}

impl fmt::Display for DurationParts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::with_capacity(4);
        if self.seconds > 0 {
            parts.push(format!("{}s", self.seconds));
        }
        if self.milliseconds > 0 {
            parts.push(format!("{}ms", self.milliseconds));
        }
        if self.microseconds > 0 {
            parts.push(format!("{}µs", self.microseconds));
        }
        // Always emit the smallest unit when nothing else was written.
        if self.nanoseconds > 0 || parts.is_empty() {
            parts.push(format!("{}ns", self.nanoseconds));
        }
        write!(f, "{}", parts.join(", "))
    }
}
