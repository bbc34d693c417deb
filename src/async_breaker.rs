//! The cooperative (async) circuit breaker engine.

use std::error::Error as StdError;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tracing::warn;

use crate::clock;
use crate::config::BreakerBuilder;
use crate::error::{BreakerError, BreakerResult};
use crate::machine::{Core, Gate, StateInfo};
use crate::signal::{self, AsyncListener, Listener, Signal};
use crate::state::State;
use crate::tracker::Tracker;

struct Inner<E> {
    core: Mutex<Core>,
    tracker: Tracker<E>,
    listeners: Vec<Arc<dyn Listener>>,
    async_listeners: Vec<Arc<dyn AsyncListener>>,
    probes: Semaphore,
}

/// A circuit breaker for cooperative schedulers.
///
/// Semantics match [`crate::CircuitBreaker`], with two additions for
/// concurrent probing:
///
/// - at most `max_half_open_calls` wrapped invocations run concurrently
///   while the circuit is HALF_OPEN, enforced by a counting semaphore with
///   non-blocking acquisition (a full semaphore short-circuits with
///   [`BreakerError::NotPermitted`]);
/// - the probe slot is held by an RAII permit, so it is released on every
///   exit path, including cancellation of the wrapped future.
///
/// State is read and written only between suspension points: the internal
/// mutex is never held across an `await`, so no other task ever observes a
/// half-applied transition. A cancelled in-flight call records no outcome.
///
/// Cloning is cheap and yields a handle to the same breaker.
#[cfg_attr(docsrs, doc(cfg(feature = "async")))]
pub struct AsyncCircuitBreaker<E> {
    inner: Arc<Inner<E>>,
}

impl<E> Clone for AsyncCircuitBreaker<E> {
    fn clone(&self) -> Self {
        AsyncCircuitBreaker {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E: StdError + 'static> AsyncCircuitBreaker<E> {
    /// Starts configuring a breaker with the given name.
    pub fn builder(name: impl Into<String>) -> BreakerBuilder<E> {
        BreakerBuilder::new(name)
    }

    pub(crate) fn from_parts(
        core: Core,
        tracker: Tracker<E>,
        listeners: Vec<Arc<dyn Listener>>,
        async_listeners: Vec<Arc<dyn AsyncListener>>,
        max_half_open_calls: u32,
    ) -> Self {
        AsyncCircuitBreaker {
            inner: Arc::new(Inner {
                core: Mutex::new(core),
                tracker,
                listeners,
                async_listeners,
                probes: Semaphore::new(max_half_open_calls as usize),
            }),
        }
    }

    /// Invokes the future produced by `f` under the breaker's protection.
    ///
    /// The gate runs before `f` is called, so a short-circuited call never
    /// executes user code. Errors from the wrapped future always
    /// propagate; the tracker only decides whether they count as failures.
    pub async fn call<F, Fut, T>(&self, f: F) -> BreakerResult<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let (gate, signal) = self.inner.core.lock().gate(clock::unix_now());
        if let Some(signal) = signal {
            self.dispatch(&signal).await;
        }

        let _slot = match gate {
            Gate::Reject { state, message } => {
                return Err(BreakerError::not_permitted(self.name(), state, message));
            }
            Gate::Bypass => return f().await.map_err(BreakerError::Operation),
            Gate::Proceed { probe: false } => None,
            Gate::Proceed { probe: true } => match self.inner.probes.try_acquire() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    return Err(BreakerError::not_permitted(
                        self.name(),
                        State::HalfOpen,
                        Some("concurrent probe limit reached"),
                    ));
                }
            },
        };

        let start = Instant::now();
        // Cancellation point: dropping this future here releases the probe
        // slot and records nothing.
        let result = f().await;
        let duration = start.elapsed();

        let success = match &result {
            Ok(_) => true,
            Err(error) => !self.inner.tracker.eval(error),
        };

        let signal = self
            .inner
            .core
            .lock()
            .on_outcome(success, duration, clock::unix_now());
        if let Some(signal) = signal {
            self.dispatch(&signal).await;
        }

        result.map_err(BreakerError::Operation)
    }

    /// Invokes the future produced by `f`, diverting any error to
    /// `fallback`. The fallback is never invoked for a successful return.
    pub async fn call_with_fallback<F, Fut, FB, T>(&self, f: F, fallback: FB) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        FB: FnOnce(BreakerError<E>) -> T,
    {
        match self.call(f).await {
            Ok(value) => value,
            Err(error) => fallback(error),
        }
    }

    /// Returns a callable applying [`AsyncCircuitBreaker::call`] semantics
    /// to every invocation of `f`.
    pub fn wrap<F, Fut, T>(&self, f: F) -> impl FnMut() -> BoxFuture<'static, BreakerResult<T, E>>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Send + Sync,
    {
        let breaker = self.clone();
        let f = Arc::new(Mutex::new(f));
        move || {
            let breaker = breaker.clone();
            let f = Arc::clone(&f);
            async move { breaker.call(|| (&mut *f.lock())()).await }.boxed()
        }
    }

    /// Returns a callable applying
    /// [`AsyncCircuitBreaker::call_with_fallback`] semantics to every
    /// invocation of `f`.
    pub fn wrap_with_fallback<F, Fut, FB, T>(
        &self,
        f: F,
        fallback: FB,
    ) -> impl FnMut() -> BoxFuture<'static, T>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        FB: FnMut(BreakerError<E>) -> T + Send + 'static,
        T: Send + 'static,
        E: Send + Sync,
    {
        let breaker = self.clone();
        let f = Arc::new(Mutex::new(f));
        let fallback = Arc::new(Mutex::new(fallback));
        move || {
            let breaker = breaker.clone();
            let f = Arc::clone(&f);
            let fallback = Arc::clone(&fallback);
            async move {
                match breaker.call(|| (&mut *f.lock())()).await {
                    Ok(value) => value,
                    Err(error) => (&mut *fallback.lock())(error),
                }
            }
            .boxed()
        }
    }

    /// Returns a snapshot of the breaker's identity, state, and metric.
    pub fn info(&self) -> StateInfo {
        self.inner.core.lock().info()
    }

    /// Returns the current state.
    pub fn state(&self) -> State {
        self.inner.core.lock().state()
    }

    /// Returns the breaker's configured name.
    pub fn name(&self) -> String {
        self.inner.core.lock().name().to_string()
    }

    /// Manually returns the circuit to CLOSED with a fresh window and a
    /// zeroed reopen counter.
    pub async fn reset(&self, notify: bool) {
        self.manual(notify, |core, now| core.reset(now)).await;
    }

    /// Manually switches the circuit to METRICS_ONLY.
    pub async fn metrics_only(&self, notify: bool) {
        self.manual(notify, |core, now| core.metrics_only(now)).await;
    }

    /// Manually switches the circuit to DISABLED.
    pub async fn disable(&self, notify: bool) {
        self.manual(notify, |core, now| core.disable(now)).await;
    }

    /// Manually pins the circuit open.
    pub async fn force_open(&self, notify: bool) {
        self.manual(notify, |core, now| core.force_open(now)).await;
    }

    async fn manual(&self, notify: bool, apply: impl FnOnce(&mut Core, f64) -> Signal) {
        let signal = apply(&mut *self.inner.core.lock(), clock::unix_now());
        if notify {
            self.dispatch(&signal).await;
        }
    }

    /// Sync listeners run inline; async listeners are awaited one by one.
    /// Panics on either side are isolated and logged.
    async fn dispatch(&self, signal: &Signal) {
        signal::dispatch(&self.inner.listeners, signal);
        for listener in &self.inner.async_listeners {
            let dispatched = AssertUnwindSafe(listener.on_signal(signal))
                .catch_unwind()
                .await;
            if dispatched.is_err() {
                warn!(circuit = %signal.circuit, "async listener panicked during signal dispatch");
            }
        }
    }
}
