//! The single-threaded circuit breaker engine.

use std::cell::RefCell;
use std::error::Error as StdError;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Instant;

use crate::clock;
use crate::config::BreakerBuilder;
use crate::error::{BreakerError, BreakerResult};
use crate::machine::{Core, Gate, StateInfo};
use crate::signal::{self, Listener};
use crate::state::State;
use crate::tracker::Tracker;

/// A circuit breaker for single-threaded callers.
///
/// This variant takes no locks: shared state lives in an `Rc<RefCell<_>>`,
/// which makes the type `!Send` and `!Sync`, so the single-threaded
/// contract is enforced by the compiler rather than by documentation.
/// Callers running under a cooperative scheduler should use the
/// cooperative variant instead.
///
/// Cloning is cheap and yields a handle to the same breaker.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use tripswitch::{CircuitBreaker, CountWindow, Permit, Retry, Tracker, Tripper};
///
/// let breaker: CircuitBreaker<std::io::Error> = CircuitBreaker::builder("payments")
///     .window(CountWindow::new(20)?)
///     .tracker(Tracker::all())
///     .tripper(Tripper::min_requests(10) & Tripper::failure_rate(0.5))
///     .retry(Retry::cooldown(Duration::from_secs(30)))
///     .permit(Permit::random(1.0))
///     .slow_threshold(Duration::from_secs(2))
///     .build()?;
///
/// let reply = breaker.call(|| Ok::<_, std::io::Error>("pong"));
/// assert_eq!(reply.unwrap(), "pong");
/// # Ok::<(), tripswitch::ConfigError>(())
/// ```
pub struct CircuitBreaker<E> {
    core: Rc<RefCell<Core>>,
    tracker: Rc<Tracker<E>>,
    listeners: Rc<[Arc<dyn Listener>]>,
}

impl<E> Clone for CircuitBreaker<E> {
    fn clone(&self) -> Self {
        CircuitBreaker {
            core: Rc::clone(&self.core),
            tracker: Rc::clone(&self.tracker),
            listeners: Rc::clone(&self.listeners),
        }
    }
}

impl<E: StdError + 'static> CircuitBreaker<E> {
    /// Starts configuring a breaker with the given name.
    pub fn builder(name: impl Into<String>) -> BreakerBuilder<E> {
        BreakerBuilder::new(name)
    }

    pub(crate) fn from_parts(
        core: Core,
        tracker: Tracker<E>,
        listeners: Vec<Arc<dyn Listener>>,
    ) -> Self {
        CircuitBreaker {
            core: Rc::new(RefCell::new(core)),
            tracker: Rc::new(tracker),
            listeners: listeners.into(),
        }
    }

    /// Invokes `f` under the breaker's protection.
    ///
    /// Short-circuits with [`BreakerError::NotPermitted`] when the circuit
    /// refuses the call; otherwise times the invocation, classifies the
    /// outcome through the tracker, records it, and applies any automatic
    /// transition. Errors from `f` always propagate, whether or not the
    /// tracker counted them as failures.
    pub fn call<F, T>(&self, f: F) -> BreakerResult<T, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        let (gate, signal) = self.core.borrow_mut().gate(clock::unix_now());
        if let Some(signal) = signal {
            signal::dispatch(&self.listeners, &signal);
        }

        match gate {
            Gate::Reject { state, message } => {
                let circuit = self.core.borrow().name().to_string();
                return Err(BreakerError::not_permitted(circuit, state, message));
            }
            Gate::Bypass => return f().map_err(BreakerError::Operation),
            Gate::Proceed { .. } => {}
        }

        let start = Instant::now();
        let result = f();
        let duration = start.elapsed();

        let success = match &result {
            Ok(_) => true,
            Err(error) => !self.tracker.eval(error),
        };

        let signal = self
            .core
            .borrow_mut()
            .on_outcome(success, duration, clock::unix_now());
        if let Some(signal) = signal {
            signal::dispatch(&self.listeners, &signal);
        }

        result.map_err(BreakerError::Operation)
    }

    /// Invokes `f` under the breaker's protection, diverting any error —
    /// short-circuit refusal or operation error — to `fallback`.
    ///
    /// The fallback is never invoked for a successful return.
    pub fn call_with_fallback<F, FB, T>(&self, f: F, fallback: FB) -> T
    where
        F: FnOnce() -> Result<T, E>,
        FB: FnOnce(BreakerError<E>) -> T,
    {
        match self.call(f) {
            Ok(value) => value,
            Err(error) => fallback(error),
        }
    }

    /// Returns a callable applying [`CircuitBreaker::call`] semantics to
    /// every invocation of `f`.
    pub fn wrap<F, T>(&self, mut f: F) -> impl FnMut() -> BreakerResult<T, E>
    where
        F: FnMut() -> Result<T, E>,
    {
        let breaker = self.clone();
        move || breaker.call(&mut f)
    }

    /// Returns a callable applying [`CircuitBreaker::call_with_fallback`]
    /// semantics to every invocation of `f`.
    pub fn wrap_with_fallback<F, FB, T>(&self, mut f: F, mut fallback: FB) -> impl FnMut() -> T
    where
        F: FnMut() -> Result<T, E>,
        FB: FnMut(BreakerError<E>) -> T,
    {
        let breaker = self.clone();
        move || breaker.call_with_fallback(&mut f, &mut fallback)
    }

    /// Returns a snapshot of the breaker's identity, state, and metric.
    pub fn info(&self) -> StateInfo {
        self.core.borrow().info()
    }

    /// Returns the current state.
    pub fn state(&self) -> State {
        self.core.borrow().state()
    }

    /// Manually returns the circuit to CLOSED with a fresh window and a
    /// zeroed reopen counter.
    pub fn reset(&self, notify: bool) {
        self.manual(notify, |core, now| core.reset(now));
    }

    /// Manually switches the circuit to METRICS_ONLY: calls flow and are
    /// recorded, but no automatic transition ever occurs.
    pub fn metrics_only(&self, notify: bool) {
        self.manual(notify, |core, now| core.metrics_only(now));
    }

    /// Manually switches the circuit to DISABLED: calls bypass the breaker
    /// entirely and nothing is recorded.
    pub fn disable(&self, notify: bool) {
        self.manual(notify, |core, now| core.disable(now));
    }

    /// Manually pins the circuit open; every call is refused until the
    /// next manual transition.
    pub fn force_open(&self, notify: bool) {
        self.manual(notify, |core, now| core.force_open(now));
    }

    fn manual(&self, notify: bool, apply: impl FnOnce(&mut Core, f64) -> crate::signal::Signal) {
        let signal = apply(&mut *self.core.borrow_mut(), clock::unix_now());
        if notify {
            signal::dispatch(&self.listeners, &signal);
        }
    }
}
