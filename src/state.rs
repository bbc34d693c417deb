//! Circuit breaker states.

use std::fmt;

/// Represents the possible states of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    /// Circuit is closed and calls flow through normally.
    Closed,

    /// Circuit is open and calls are rejected until the retry clock elapses.
    Open,

    /// Circuit is admitting a limited number of probe calls to test recovery.
    HalfOpen,

    /// Calls flow through and are recorded, but no automatic transition
    /// ever occurs.
    MetricsOnly,

    /// Calls bypass the breaker entirely; nothing is recorded.
    Disabled,

    /// Circuit is pinned open by manual control; calls are rejected
    /// unconditionally.
    ForcedOpen,
}

impl State {
    /// Returns the canonical name of the state.
    pub fn as_str(&self) -> &'static str {
        match self {
            State::Closed => "closed",
            State::Open => "open",
            State::HalfOpen => "half-open",
            State::MetricsOnly => "metrics-only",
            State::Disabled => "disabled",
            State::ForcedOpen => "forced-open",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
