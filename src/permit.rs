//! Admission policies for HALF_OPEN probe traffic.
//!
//! While the circuit is HALF_OPEN every call faces the permit: an
//! admission probability is computed from the time spent in HALF_OPEN and
//! compared against an independent uniform sample.

use std::time::Duration;

use rand::Rng;

use crate::error::ConfigError;

/// Per-call admission policy during HALF_OPEN.
#[derive(Debug, Clone, PartialEq)]
pub enum Permit {
    /// Admit each call with a fixed probability.
    Random(f64),
    /// Ramp the admission probability linearly from `initial` to `target`
    /// over `period` after entering HALF_OPEN.
    RampUp {
        /// Probability immediately after entering HALF_OPEN.
        initial: f64,
        /// Probability once the ramp period has fully elapsed.
        target: f64,
        /// Ramp duration.
        period: Duration,
    },
}

impl Permit {
    /// Admit each call with probability `ratio`.
    pub fn random(ratio: f64) -> Self {
        Permit::Random(ratio)
    }

    /// Ramp the admission probability from `initial` to `target` over
    /// `period`.
    pub fn ramp_up(initial: f64, target: f64, period: Duration) -> Self {
        Permit::RampUp {
            initial,
            target,
            period,
        }
    }

    /// Decides admission for one call.
    ///
    /// `now` and `entered_at` are wall-clock unix seconds; `entered_at` is
    /// when the circuit entered HALF_OPEN. A clock reading before
    /// `entered_at` yields the initial probability.
    pub fn admits(&self, now: f64, entered_at: f64) -> bool {
        let probability = match self {
            Permit::Random(ratio) => *ratio,
            Permit::RampUp {
                initial,
                target,
                period,
            } => {
                let elapsed = ((now - entered_at) / period.as_secs_f64()).clamp(0.0, 1.0);
                initial + (target - initial) * elapsed
            }
        };
        rand::thread_rng().gen::<f64>() < probability
    }

    /// Validates probabilities and the ramp period; called at breaker
    /// construction.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Permit::Random(ratio) => check_probability("admission ratio", *ratio),
            Permit::RampUp {
                initial,
                target,
                period,
            } => {
                check_probability("ramp initial", *initial)?;
                check_probability("ramp target", *target)?;
                if period.is_zero() {
                    return Err(ConfigError::OutOfRange {
                        param: "ramp period",
                        value: 0.0,
                    });
                }
                Ok(())
            }
        }
    }
}

fn check_probability(param: &'static str, value: f64) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::OutOfRange { param, value });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_one_always_admits() {
        let permit = Permit::random(1.0);
        for _ in 0..100 {
            assert!(permit.admits(0.0, 0.0));
        }
    }

    #[test]
    fn random_zero_never_admits() {
        let permit = Permit::random(0.0);
        for _ in 0..100 {
            assert!(!permit.admits(0.0, 0.0));
        }
    }

    #[test]
    fn ramp_up_starts_at_initial() {
        // initial = 0 makes the boundary observable without sampling noise.
        let permit = Permit::ramp_up(0.0, 1.0, Duration::from_secs(10));
        for _ in 0..100 {
            assert!(!permit.admits(100.0, 100.0));
        }
    }

    #[test]
    fn ramp_up_before_entry_uses_initial() {
        let permit = Permit::ramp_up(0.0, 1.0, Duration::from_secs(10));
        for _ in 0..100 {
            assert!(!permit.admits(95.0, 100.0));
        }
    }

    #[test]
    fn ramp_up_reaches_target_after_period() {
        let permit = Permit::ramp_up(0.0, 1.0, Duration::from_secs(10));
        for _ in 0..100 {
            assert!(permit.admits(111.0, 100.0));
        }
    }

    #[test]
    fn validate_rejects_bad_probabilities_and_period() {
        assert!(Permit::random(1.5).validate().is_err());
        assert!(Permit::random(-0.5).validate().is_err());
        assert!(Permit::ramp_up(0.2, 1.1, Duration::from_secs(1))
            .validate()
            .is_err());
        assert!(Permit::ramp_up(0.2, 0.9, Duration::ZERO).validate().is_err());
        assert!(Permit::ramp_up(0.2, 0.9, Duration::from_secs(1))
            .validate()
            .is_ok());
    }
}
