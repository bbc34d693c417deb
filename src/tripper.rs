//! Transition predicates over the current state and window metric.
//!
//! A tripper evaluating to true while the circuit is CLOSED or HALF_OPEN
//! trips it OPEN; evaluating to false in HALF_OPEN with every
//! [`Tripper::min_requests`] leaf satisfied closes it. Trees compose with
//! `&` and `|` (or [`Tripper::and`] / [`Tripper::or`]) and short-circuit
//! left to right.

use std::ops::{BitAnd, BitOr};
use std::time::Duration;

use crate::error::ConfigError;
use crate::metric::Metric;
use crate::state::State;

/// Predicate deciding automatic state transitions.
#[derive(Debug, Clone, PartialEq)]
pub enum Tripper {
    /// True while the circuit is CLOSED.
    Closed,
    /// True while the circuit is HALF_OPEN.
    HalfOpened,
    /// True once the window holds at least this many calls.
    MinRequests(u64),
    /// True once the failure rate reaches this threshold.
    FailureRate(f64),
    /// True once the average call duration reaches this threshold.
    AvgLatency(Duration),
    /// True once the slow-call rate reaches this threshold.
    SlowRate(f64),
    /// Both operands hold.
    And(Box<Tripper>, Box<Tripper>),
    /// Either operand holds.
    Or(Box<Tripper>, Box<Tripper>),
}

impl Tripper {
    /// Predicate that holds only in the CLOSED state.
    pub fn closed() -> Self {
        Tripper::Closed
    }

    /// Predicate that holds only in the HALF_OPEN state.
    pub fn half_opened() -> Self {
        Tripper::HalfOpened
    }

    /// Predicate that holds once the window has seen at least `count` calls.
    pub fn min_requests(count: u64) -> Self {
        Tripper::MinRequests(count)
    }

    /// Predicate that holds once the failure rate reaches `ratio`.
    pub fn failure_rate(ratio: f64) -> Self {
        Tripper::FailureRate(ratio)
    }

    /// Predicate that holds once the average duration reaches `threshold`.
    pub fn avg_latency(threshold: Duration) -> Self {
        Tripper::AvgLatency(threshold)
    }

    /// Predicate that holds once the slow-call rate reaches `ratio`.
    pub fn slow_rate(ratio: f64) -> Self {
        Tripper::SlowRate(ratio)
    }

    /// Both `self` and `other` must hold.
    pub fn and(self, other: Tripper) -> Self {
        Tripper::And(Box::new(self), Box::new(other))
    }

    /// Either `self` or `other` holds.
    pub fn or(self, other: Tripper) -> Self {
        Tripper::Or(Box::new(self), Box::new(other))
    }

    /// Evaluates the tree against the current state and metric.
    ///
    /// Pure and idempotent: the verdict depends only on `(state, metric)`.
    pub fn eval(&self, state: State, metric: &Metric) -> bool {
        match self {
            Tripper::Closed => state == State::Closed,
            Tripper::HalfOpened => state == State::HalfOpen,
            Tripper::MinRequests(count) => metric.total_count >= *count,
            Tripper::FailureRate(ratio) => metric.failure_rate() >= *ratio,
            Tripper::AvgLatency(threshold) => metric.avg_duration() >= *threshold,
            Tripper::SlowRate(ratio) => metric.slow_rate() >= *ratio,
            Tripper::And(lhs, rhs) => lhs.eval(state, metric) && rhs.eval(state, metric),
            Tripper::Or(lhs, rhs) => lhs.eval(state, metric) || rhs.eval(state, metric),
        }
    }

    /// True when every [`Tripper::MinRequests`] leaf in the tree is
    /// satisfied by `metric`; vacuously true when the tree has none.
    ///
    /// This is the HALF_OPEN success condition: a non-tripping outcome
    /// closes the circuit only once the probe sample is large enough.
    pub(crate) fn min_requests_met(&self, metric: &Metric) -> bool {
        match self {
            Tripper::MinRequests(count) => metric.total_count >= *count,
            Tripper::And(lhs, rhs) | Tripper::Or(lhs, rhs) => {
                lhs.min_requests_met(metric) && rhs.min_requests_met(metric)
            }
            _ => true,
        }
    }

    /// Validates leaf parameters; called at breaker construction.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Tripper::Closed | Tripper::HalfOpened => Ok(()),
            Tripper::MinRequests(count) => {
                if *count == 0 {
                    return Err(ConfigError::OutOfRange {
                        param: "min_requests",
                        value: 0.0,
                    });
                }
                Ok(())
            }
            Tripper::FailureRate(ratio) => check_ratio("failure_rate", *ratio),
            Tripper::SlowRate(ratio) => check_ratio("slow_rate", *ratio),
            Tripper::AvgLatency(_) => Ok(()),
            Tripper::And(lhs, rhs) | Tripper::Or(lhs, rhs) => {
                lhs.validate()?;
                rhs.validate()
            }
        }
    }
}

fn check_ratio(param: &'static str, ratio: f64) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&ratio) {
        return Err(ConfigError::OutOfRange {
            param,
            value: ratio,
        });
    }
    Ok(())
}

impl BitAnd for Tripper {
    type Output = Tripper;

    fn bitand(self, rhs: Tripper) -> Tripper {
        self.and(rhs)
    }
}

impl BitOr for Tripper {
    type Output = Tripper;

    fn bitor(self, rhs: Tripper) -> Tripper {
        self.or(rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metric(total: u64, failures: u64, slow: u64, total_ms: u64) -> Metric {
        Metric {
            total_count: total,
            failure_count: failures,
            slow_count: slow,
            total_duration: Duration::from_millis(total_ms),
        }
    }

    #[test]
    fn state_leaves_match_their_state() {
        let empty = Metric::default();
        assert!(Tripper::closed().eval(State::Closed, &empty));
        assert!(!Tripper::closed().eval(State::HalfOpen, &empty));
        assert!(Tripper::half_opened().eval(State::HalfOpen, &empty));
        assert!(!Tripper::half_opened().eval(State::Open, &empty));
    }

    #[test]
    fn min_requests_compares_total_count() {
        let t = Tripper::min_requests(5);
        assert!(!t.eval(State::Closed, &metric(4, 0, 0, 0)));
        assert!(t.eval(State::Closed, &metric(5, 0, 0, 0)));
    }

    #[test]
    fn failure_rate_is_inclusive() {
        let t = Tripper::failure_rate(0.5);
        assert!(t.eval(State::Closed, &metric(10, 5, 0, 0)));
        assert!(!t.eval(State::Closed, &metric(10, 4, 0, 0)));
    }

    #[test]
    fn failure_rate_zero_trips_with_any_failure() {
        let t = Tripper::min_requests(1) & Tripper::failure_rate(0.0);
        assert!(t.eval(State::Closed, &metric(1, 1, 0, 100)));
    }

    #[test]
    fn avg_latency_compares_mean_duration() {
        let t = Tripper::avg_latency(Duration::from_millis(200));
        assert!(t.eval(State::Closed, &metric(4, 0, 0, 800)));
        assert!(!t.eval(State::Closed, &metric(4, 0, 0, 400)));
    }

    #[test]
    fn slow_rate_compares_slow_fraction() {
        let t = Tripper::slow_rate(0.6);
        assert!(t.eval(State::Closed, &metric(10, 0, 6, 0)));
        assert!(!t.eval(State::Closed, &metric(10, 0, 5, 0)));
    }

    #[test]
    fn empty_metric_never_divides_by_zero() {
        let empty = Metric::default();
        assert!(!Tripper::failure_rate(0.5).eval(State::Closed, &empty));
        assert!(!Tripper::slow_rate(0.5).eval(State::Closed, &empty));
        assert!(!Tripper::avg_latency(Duration::from_millis(1)).eval(State::Closed, &empty));
    }

    #[test]
    fn composition_short_circuits() {
        let t = Tripper::closed() & (Tripper::min_requests(5) | Tripper::failure_rate(1.0));
        assert!(t.eval(State::Closed, &metric(5, 0, 0, 0)));
        assert!(t.eval(State::Closed, &metric(2, 2, 0, 0)));
        assert!(!t.eval(State::HalfOpen, &metric(5, 5, 0, 0)));
    }

    #[test]
    fn min_requests_met_requires_every_leaf() {
        let t = (Tripper::min_requests(3) & Tripper::failure_rate(0.5))
            | Tripper::min_requests(10);
        assert!(!t.min_requests_met(&metric(5, 0, 0, 0)));
        assert!(t.min_requests_met(&metric(10, 0, 0, 0)));
    }

    #[test]
    fn min_requests_met_is_vacuous_without_leaves() {
        let t = Tripper::failure_rate(0.5);
        assert!(t.min_requests_met(&Metric::default()));
    }

    #[test]
    fn validate_rejects_bad_parameters() {
        assert!(Tripper::failure_rate(1.5).validate().is_err());
        assert!(Tripper::slow_rate(-0.1).validate().is_err());
        assert!(Tripper::min_requests(0).validate().is_err());
        assert!((Tripper::min_requests(5) & Tripper::failure_rate(0.5))
            .validate()
            .is_ok());
        assert!((Tripper::closed() | Tripper::failure_rate(2.0))
            .validate()
            .is_err());
    }

    #[test]
    fn evaluation_is_idempotent() {
        let t = Tripper::min_requests(5) & Tripper::failure_rate(0.5);
        let m = metric(10, 5, 0, 1000);
        assert_eq!(t.eval(State::Closed, &m), t.eval(State::Closed, &m));
    }
}
