//! Sliding-window aggregation of call outcomes.
//!
//! Two variants are provided: [`CountWindow`] keeps the last N outcomes in
//! a fixed ring, [`TimeWindow`] keeps per-second buckets over the last N
//! seconds. Both answer [`Window::metric`] in constant time by maintaining
//! running sums alongside the stored data.

use std::time::Duration;

use smallvec::SmallVec;

use crate::clock;
use crate::error::ConfigError;
use crate::metric::{Metric, Record};

/// A sliding aggregator over recent call outcomes.
///
/// Implementations are owned exclusively by a single breaker; no internal
/// synchronization is required or provided.
pub trait Window: Send + 'static {
    /// Records one completed call.
    fn record(&mut self, outcome: Record);

    /// Returns the aggregate over the outcomes currently in the window.
    fn metric(&self) -> Metric;

    /// Discards all recorded outcomes.
    fn reset(&mut self);
}

/// Window over the last N call outcomes.
///
/// A fixed-size ring of records plus running sums. Recording while full
/// evicts exactly the oldest record, subtracting its contribution from the
/// sums before the new record overwrites it.
pub struct CountWindow {
    slots: Vec<Record>,
    capacity: usize,
    head: usize,
    failure_count: u64,
    slow_count: u64,
    total_duration: Duration,
}

impl CountWindow {
    /// Creates a window holding the last `capacity` outcomes.
    ///
    /// Fails with [`ConfigError::ZeroCapacity`] when `capacity` is zero.
    pub fn new(capacity: usize) -> Result<Self, ConfigError> {
        if capacity == 0 {
            return Err(ConfigError::ZeroCapacity("count window"));
        }
        Ok(CountWindow {
            slots: Vec::with_capacity(capacity),
            capacity,
            head: 0,
            failure_count: 0,
            slow_count: 0,
            total_duration: Duration::ZERO,
        })
    }

    fn add(&mut self, outcome: &Record) {
        if !outcome.success {
            self.failure_count += 1;
        }
        if outcome.slow {
            self.slow_count += 1;
        }
        self.total_duration += outcome.duration;
    }

    fn subtract(&mut self, outcome: &Record) {
        if !outcome.success {
            self.failure_count -= 1;
        }
        if outcome.slow {
            self.slow_count -= 1;
        }
        self.total_duration = self.total_duration.saturating_sub(outcome.duration);
    }
}

impl Window for CountWindow {
    fn record(&mut self, outcome: Record) {
        self.add(&outcome);
        if self.slots.len() < self.capacity {
            self.slots.push(outcome);
        } else {
            let evicted = self.slots[self.head];
            self.subtract(&evicted);
            self.slots[self.head] = outcome;
        }
        self.head = (self.head + 1) % self.capacity;
    }

    fn metric(&self) -> Metric {
        Metric {
            total_count: self.slots.len() as u64,
            failure_count: self.failure_count,
            slow_count: self.slow_count,
            total_duration: self.total_duration,
        }
    }

    fn reset(&mut self) {
        self.slots.clear();
        self.head = 0;
        self.failure_count = 0;
        self.slow_count = 0;
        self.total_duration = Duration::ZERO;
    }
}

/// One second's aggregate inside a [`TimeWindow`].
#[derive(Debug, Clone, Copy, Default)]
struct Bucket {
    epoch: u64,
    total: u64,
    failure: u64,
    slow: u64,
    duration: Duration,
}

impl Bucket {
    fn clear(&mut self, epoch: u64) {
        *self = Bucket {
            epoch,
            ..Bucket::default()
        };
    }
}

/// Window over the last N seconds of call outcomes, in one-second buckets.
///
/// Buckets live in a ring indexed by `second % span`; a bucket whose epoch
/// has fallen out of the window is cleared and re-assigned the first time
/// its slot is touched again, so recording stays O(1) under steady traffic.
/// Metrics sum only buckets whose epoch lies within the live span, so a
/// long silence simply yields an all-zero metric.
pub struct TimeWindow {
    span: u64,
    buckets: SmallVec<[Bucket; 16]>,
}

impl TimeWindow {
    /// Creates a window spanning the last `span` seconds.
    ///
    /// Fails with [`ConfigError::ZeroCapacity`] when `span` is zero.
    pub fn new(span: u64) -> Result<Self, ConfigError> {
        if span == 0 {
            return Err(ConfigError::ZeroCapacity("time window"));
        }
        let mut buckets = SmallVec::with_capacity(span as usize);
        buckets.resize(span as usize, Bucket::default());
        Ok(TimeWindow { span, buckets })
    }

    fn second_of(timestamp: f64) -> u64 {
        timestamp.max(0.0).floor() as u64
    }
}

impl Window for TimeWindow {
    fn record(&mut self, outcome: Record) {
        let now_sec = Self::second_of(clock::unix_now());
        let sec = Self::second_of(outcome.timestamp);

        // Older than the live span; dropped silently.
        if sec + self.span <= now_sec {
            return;
        }

        let idx = (sec % self.span) as usize;
        let bucket = &mut self.buckets[idx];
        if bucket.epoch != sec {
            bucket.clear(sec);
        }
        bucket.total += 1;
        if !outcome.success {
            bucket.failure += 1;
        }
        if outcome.slow {
            bucket.slow += 1;
        }
        bucket.duration += outcome.duration;
    }

    fn metric(&self) -> Metric {
        let now_sec = Self::second_of(clock::unix_now());
        let oldest = now_sec.saturating_sub(self.span - 1);

        let mut metric = Metric::default();
        for bucket in &self.buckets {
            if bucket.epoch < oldest || bucket.epoch > now_sec {
                continue;
            }
            metric.total_count += bucket.total;
            metric.failure_count += bucket.failure;
            metric.slow_count += bucket.slow;
            metric.total_duration += bucket.duration;
        }
        metric
    }

    fn reset(&mut self) {
        for bucket in self.buckets.iter_mut() {
            bucket.clear(0);
        }
    }
}
