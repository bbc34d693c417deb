//! Retry clocks gating the OPEN → HALF_OPEN transition.
//!
//! A retry clock answers one question: given when the circuit opened and
//! how many times it has reopened, at what wall-clock time may the next
//! probe be attempted? All variants accept a jitter ratio; the jittered
//! delay is `delay * (1 + U(-jitter, +jitter))`, sampled per call.

use std::time::Duration;

use rand::Rng;

use crate::error::ConfigError;

/// Clock computing the earliest HALF_OPEN attempt time.
#[derive(Debug, Clone, PartialEq)]
pub enum Retry {
    /// The circuit never leaves OPEN on its own.
    Never,
    /// The next call may probe immediately.
    Always,
    /// A fixed delay after the circuit opened.
    Cooldown {
        /// Base delay before the next probe.
        delay: Duration,
        /// Symmetric jitter ratio in `[0, 1]`.
        jitter: f64,
    },
    /// An exponentially growing, capped delay.
    Backoff {
        /// Delay after the first OPEN entry.
        initial: Duration,
        /// Growth factor applied per reopen; at least 1.
        multiplier: f64,
        /// Upper bound on the un-jittered delay.
        cap: Duration,
        /// Symmetric jitter ratio in `[0, 1]`.
        jitter: f64,
    },
}

impl Retry {
    /// Clock that never allows probing.
    pub fn never() -> Self {
        Retry::Never
    }

    /// Clock that allows probing immediately.
    pub fn always() -> Self {
        Retry::Always
    }

    /// Fixed cooldown before the next probe.
    pub fn cooldown(delay: Duration) -> Self {
        Retry::Cooldown { delay, jitter: 0.0 }
    }

    /// Exponential backoff: `initial * multiplier^reopens`, capped at `cap`.
    pub fn backoff(initial: Duration, multiplier: f64, cap: Duration) -> Self {
        Retry::Backoff {
            initial,
            multiplier,
            cap,
            jitter: 0.0,
        }
    }

    /// Applies a symmetric jitter ratio to a cooldown or backoff clock.
    ///
    /// Has no effect on [`Retry::Never`] and [`Retry::Always`]. The ratio
    /// is validated at breaker construction.
    pub fn with_jitter(self, ratio: f64) -> Self {
        match self {
            Retry::Cooldown { delay, .. } => Retry::Cooldown {
                delay,
                jitter: ratio,
            },
            Retry::Backoff {
                initial,
                multiplier,
                cap,
                ..
            } => Retry::Backoff {
                initial,
                multiplier,
                cap,
                jitter: ratio,
            },
            other => other,
        }
    }

    /// Earliest wall-clock time (unix seconds) at which the next probe may
    /// run, given when the circuit opened and the prior reopen count.
    pub fn next_attempt_time(&self, opened_at: f64, reopens: u32) -> f64 {
        match self {
            Retry::Never => f64::INFINITY,
            Retry::Always => opened_at,
            Retry::Cooldown { delay, jitter } => {
                opened_at + delay.as_secs_f64() * jitter_factor(*jitter)
            }
            Retry::Backoff {
                initial,
                multiplier,
                cap,
                jitter,
            } => {
                let grown = initial.as_secs_f64() * multiplier.powi(reopens as i32);
                let delay = grown.min(cap.as_secs_f64());
                opened_at + delay * jitter_factor(*jitter)
            }
        }
    }

    /// Validates jitter and growth parameters; called at breaker
    /// construction.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Retry::Never | Retry::Always => Ok(()),
            Retry::Cooldown { jitter, .. } => check_jitter(*jitter),
            Retry::Backoff {
                multiplier, jitter, ..
            } => {
                if *multiplier < 1.0 {
                    return Err(ConfigError::OutOfRange {
                        param: "backoff multiplier",
                        value: *multiplier,
                    });
                }
                check_jitter(*jitter)
            }
        }
    }
}

fn check_jitter(ratio: f64) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&ratio) {
        return Err(ConfigError::OutOfRange {
            param: "jitter ratio",
            value: ratio,
        });
    }
    Ok(())
}

fn jitter_factor(ratio: f64) -> f64 {
    if ratio <= 0.0 {
        return 1.0;
    }
    1.0 + rand::thread_rng().gen_range(-ratio..=ratio)
}
