//! The state machine shared by both engines.
//!
//! [`Core`] owns the state bundle — current state, transition bookkeeping,
//! window, tripper, retry clock, permit — and implements the transition
//! table. Engines wrap it in their own sharing primitive, classify errors
//! through the tracker, and dispatch the signals this module returns.

use std::time::Duration;

use tracing::debug;

use crate::metric::{Metric, Record};
use crate::permit::Permit;
use crate::retry::Retry;
use crate::signal::Signal;
use crate::state::State;
use crate::tripper::Tripper;
use crate::window::Window;

/// Snapshot of a breaker's identity and current standing.
#[derive(Debug, Clone)]
pub struct StateInfo {
    /// The breaker's configured name.
    pub name: String,
    /// Current state.
    pub state: State,
    /// Wall-clock time of the last transition, unix seconds.
    pub changed_at: f64,
    /// OPEN entries since the last manual reset.
    pub reopens: u32,
    /// Aggregate over the current window contents.
    pub metric: Metric,
}

/// Outcome of the pre-call gate.
pub(crate) enum Gate {
    /// Invoke the wrapped function; `probe` marks a HALF_OPEN admission.
    Proceed {
        /// True when the call is a HALF_OPEN probe (the cooperative engine
        /// must additionally acquire a probe slot).
        probe: bool,
    },
    /// DISABLED: invoke the function but record nothing.
    Bypass,
    /// Refuse the call.
    Reject {
        /// State responsible for the refusal.
        state: State,
        /// Which gate refused.
        message: Option<&'static str>,
    },
}

/// State bundle and transition table.
pub(crate) struct Core {
    name: String,
    state: State,
    changed_at: f64,
    reopens: u32,
    opened_at: f64,
    half_open_entered_at: f64,
    window: Box<dyn Window>,
    tripper: Tripper,
    retry: Retry,
    permit: Permit,
    slow_threshold: Duration,
}

impl Core {
    pub(crate) fn new(
        name: String,
        window: Box<dyn Window>,
        tripper: Tripper,
        retry: Retry,
        permit: Permit,
        slow_threshold: Duration,
        now: f64,
    ) -> Self {
        Core {
            name,
            state: State::Closed,
            changed_at: now,
            reopens: 0,
            opened_at: 0.0,
            half_open_entered_at: 0.0,
            window,
            tripper,
            retry,
            permit,
            slow_threshold,
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn state(&self) -> State {
        self.state
    }

    /// Decides whether a call may proceed, transitioning OPEN → HALF_OPEN
    /// when the retry clock has elapsed. The transitioning call itself
    /// still faces the permit.
    pub(crate) fn gate(&mut self, now: f64) -> (Gate, Option<Signal>) {
        match self.state {
            State::Closed | State::MetricsOnly => (Gate::Proceed { probe: false }, None),
            State::Disabled => (Gate::Bypass, None),
            State::ForcedOpen => (
                Gate::Reject {
                    state: State::ForcedOpen,
                    message: Some("circuit is forced open"),
                },
                None,
            ),
            State::Open => {
                let next = self
                    .retry
                    .next_attempt_time(self.opened_at, self.reopens.saturating_sub(1));
                if now < next {
                    return (
                        Gate::Reject {
                            state: State::Open,
                            message: Some("retry period has not elapsed"),
                        },
                        None,
                    );
                }
                let signal = self.transition(State::HalfOpen, now);
                (self.admit_probe(now), Some(signal))
            }
            State::HalfOpen => (self.admit_probe(now), None),
        }
    }

    fn admit_probe(&mut self, now: f64) -> Gate {
        if self.permit.admits(now, self.half_open_entered_at) {
            Gate::Proceed { probe: true }
        } else {
            Gate::Reject {
                state: State::HalfOpen,
                message: Some("probe admission rejected"),
            }
        }
    }

    /// Records a classified outcome and applies any automatic transition.
    pub(crate) fn on_outcome(
        &mut self,
        success: bool,
        duration: Duration,
        now: f64,
    ) -> Option<Signal> {
        // A call completing after a manual switch to DISABLED must not
        // perturb the freshly-reset window.
        if self.state == State::Disabled {
            return None;
        }

        self.window
            .record(Record::new(success, duration, now, self.slow_threshold));

        match self.state {
            State::Closed => {
                let metric = self.window.metric();
                if self.tripper.eval(State::Closed, &metric) {
                    return Some(self.transition(State::Open, now));
                }
                None
            }
            State::HalfOpen => {
                let metric = self.window.metric();
                if self.tripper.eval(State::HalfOpen, &metric) {
                    return Some(self.transition(State::Open, now));
                }
                if self.tripper.min_requests_met(&metric) {
                    return Some(self.transition(State::Closed, now));
                }
                None
            }
            // METRICS_ONLY records without ever transitioning; outcomes
            // completing late in OPEN or FORCED_OPEN have no transition row.
            _ => None,
        }
    }

    /// Performs a transition: entry actions, bookkeeping, signal.
    fn transition(&mut self, to: State, now: f64) -> Signal {
        let old = self.state;
        self.state = to;
        self.changed_at = now;
        self.window.reset();

        match to {
            State::Open => {
                self.opened_at = now;
                self.reopens += 1;
            }
            State::HalfOpen => {
                self.half_open_entered_at = now;
            }
            _ => {}
        }

        debug!(
            circuit = %self.name,
            from = %old,
            to = %to,
            reopens = self.reopens,
            "state transition"
        );

        Signal {
            circuit: self.name.clone(),
            old_state: old,
            new_state: to,
            timestamp: now,
        }
    }

    /// Manual transition to CLOSED with a fresh window and reopen counter.
    pub(crate) fn reset(&mut self, now: f64) -> Signal {
        let signal = self.transition(State::Closed, now);
        self.reopens = 0;
        signal
    }

    /// Manual transition to METRICS_ONLY.
    pub(crate) fn metrics_only(&mut self, now: f64) -> Signal {
        self.transition(State::MetricsOnly, now)
    }

    /// Manual transition to DISABLED.
    pub(crate) fn disable(&mut self, now: f64) -> Signal {
        self.transition(State::Disabled, now)
    }

    /// Manual transition to FORCED_OPEN.
    pub(crate) fn force_open(&mut self, now: f64) -> Signal {
        self.transition(State::ForcedOpen, now)
    }

    pub(crate) fn info(&self) -> StateInfo {
        StateInfo {
            name: self.name.clone(),
            state: self.state,
            changed_at: self.changed_at,
            reopens: self.reopens,
            metric: self.window.metric(),
        }
    }
}
