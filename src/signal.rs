//! State-transition signals and listener dispatch.
//!
//! Every state transition (unless suppressed with `notify = false`) builds
//! a [`Signal`] and hands it to each registered listener in registration
//! order. A panicking listener is caught and logged; it neither halts
//! dispatch nor perturbs the breaker's own state.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{info, warn};

use crate::state::State;

/// Record of one state transition.
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    /// Name of the circuit that transitioned.
    pub circuit: String,
    /// State before the transition.
    pub old_state: State,
    /// State after the transition.
    pub new_state: State,
    /// Wall-clock transition time, seconds since the Unix epoch.
    pub timestamp: f64,
}

/// Receives state-transition signals.
///
/// Implemented for any `Fn(&Signal)` closure, so plain closures can be
/// registered directly.
pub trait Listener: Send + Sync {
    /// Called synchronously for each transition, in registration order.
    fn on_signal(&self, signal: &Signal);
}

impl<F> Listener for F
where
    F: Fn(&Signal) + Send + Sync,
{
    fn on_signal(&self, signal: &Signal) {
        self(signal)
    }
}

/// Listener that logs transitions through [`tracing`] at info level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogListener;

impl Listener for LogListener {
    fn on_signal(&self, signal: &Signal) {
        info!(
            circuit = %signal.circuit,
            from = %signal.old_state,
            to = %signal.new_state,
            "circuit breaker state change"
        );
    }
}

/// Dispatches `signal` to each listener in order, isolating panics.
pub(crate) fn dispatch(listeners: &[Arc<dyn Listener>], signal: &Signal) {
    for listener in listeners {
        if catch_unwind(AssertUnwindSafe(|| listener.on_signal(signal))).is_err() {
            warn!(circuit = %signal.circuit, "listener panicked during signal dispatch");
        }
    }
}

/// Receives state-transition signals asynchronously.
///
/// The cooperative engine awaits async listeners sequentially; blocking
/// work belongs in a sync [`Listener`] only if it is genuinely cheap,
/// since it runs inline on the scheduler thread.
#[cfg(feature = "async")]
#[cfg_attr(docsrs, doc(cfg(feature = "async")))]
pub trait AsyncListener: Send + Sync {
    /// Called for each transition; awaited before the next listener runs.
    fn on_signal<'a>(&'a self, signal: &'a Signal) -> futures::future::BoxFuture<'a, ()>;
}
