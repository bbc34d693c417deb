//! Call outcome records and aggregate metrics.

use std::time::Duration;

/// Immutable record of a single completed call.
///
/// Built by the engine when a wrapped call finishes; owned by the window
/// once recorded and never mutated afterwards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Record {
    /// Whether the call counted as a success after tracker classification.
    pub success: bool,
    /// Elapsed call time.
    pub duration: Duration,
    /// Wall-clock completion time, seconds since the Unix epoch.
    pub timestamp: f64,
    /// Whether the call reached the breaker's slow threshold.
    ///
    /// Derived once at creation so windows can subtract an evicted record's
    /// contribution without access to breaker configuration.
    pub slow: bool,
}

impl Record {
    pub(crate) fn new(success: bool, duration: Duration, timestamp: f64, slow_threshold: Duration) -> Self {
        Record {
            success,
            duration,
            timestamp,
            slow: duration >= slow_threshold,
        }
    }
}

/// Aggregate snapshot over the outcomes currently held by a window.
///
/// Derived rates are defined as zero on an empty window, never NaN.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Metric {
    /// Number of recorded calls.
    pub total_count: u64,
    /// Number of calls classified as failures.
    pub failure_count: u64,
    /// Number of calls at or above the slow threshold.
    pub slow_count: u64,
    /// Sum of the durations of all recorded calls.
    pub total_duration: Duration,
}

impl Metric {
    /// Ratio of failed calls to total calls; 0.0 when empty.
    pub fn failure_rate(&self) -> f64 {
        if self.total_count == 0 {
            return 0.0;
        }
        self.failure_count as f64 / self.total_count as f64
    }

    /// Ratio of slow calls to total calls; 0.0 when empty.
    pub fn slow_rate(&self) -> f64 {
        if self.total_count == 0 {
            return 0.0;
        }
        self.slow_count as f64 / self.total_count as f64
    }

    /// Mean call duration; zero when empty.
    pub fn avg_duration(&self) -> Duration {
        if self.total_count == 0 {
            return Duration::ZERO;
        }
        self.total_duration / self.total_count as u32
    }
}
