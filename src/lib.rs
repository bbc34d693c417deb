//! # tripswitch
//!
//! A composable circuit breaker library for protecting callers of
//! unreliable collaborators (HTTP services, databases, message brokers)
//! against cascading failure.
//!
//! A breaker wraps an arbitrary callable, observes outcomes (success or
//! failure, elapsed time) through a sliding window, and decides via
//! composable predicates whether subsequent calls proceed, short-circuit,
//! or are admitted in limited quantity while probing recovery.
//!
//! The moving parts:
//!
//! - [`CountWindow`] / [`TimeWindow`] — sliding aggregation of recent
//!   outcomes.
//! - [`Tracker`] — which errors count as failures, composable with
//!   `&`, `|`, `!`.
//! - [`Tripper`] — when the circuit trips or recovers, composable with
//!   `&`, `|`.
//! - [`Retry`] — when an OPEN circuit may probe again.
//! - [`Permit`] — how much traffic a HALF_OPEN circuit admits.
//! - [`CircuitBreaker`] — the single-threaded engine; with the `async`
//!   feature, `AsyncCircuitBreaker` adds a cooperative engine that bounds
//!   concurrent HALF_OPEN probes.
//!
//! Each breaker is self-contained: it exclusively owns its window, state,
//! and signal dispatch, and there is no process-wide registry.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

#[cfg(feature = "async")]
mod async_breaker;
mod breaker;
mod clock;
mod config;
mod error;
mod machine;
mod metric;
mod permit;
pub mod prelude;
mod retry;
mod signal;
mod state;
mod tracker;
mod tripper;
mod window;

// Re-exports
#[cfg(feature = "async")]
pub use async_breaker::AsyncCircuitBreaker;
pub use breaker::CircuitBreaker;
pub use config::{BreakerBuilder, DEFAULT_MAX_HALF_OPEN_CALLS};
pub use error::{BreakerError, BreakerResult, ConfigError};
pub use machine::StateInfo;
pub use metric::{Metric, Record};
pub use permit::Permit;
pub use retry::Retry;
#[cfg(feature = "async")]
pub use signal::AsyncListener;
pub use signal::{Listener, LogListener, Signal};
pub use state::State;
pub use tracker::{Tracker, TypeMatcher};
pub use tripper::Tripper;
pub use window::{CountWindow, TimeWindow, Window};
