//! Breaker configuration and construction.

use std::sync::Arc;
use std::time::Duration;

use crate::breaker::CircuitBreaker;
use crate::clock;
use crate::error::ConfigError;
use crate::machine::Core;
use crate::permit::Permit;
use crate::retry::Retry;
use crate::signal::Listener;
use crate::tracker::Tracker;
use crate::tripper::Tripper;
use crate::window::Window;

#[cfg(feature = "async")]
use crate::async_breaker::AsyncCircuitBreaker;
#[cfg(feature = "async")]
use crate::signal::AsyncListener;

/// Default bound on concurrent HALF_OPEN probes (cooperative engine).
pub const DEFAULT_MAX_HALF_OPEN_CALLS: u32 = 10;

/// Builder for circuit breakers.
///
/// Window, tracker, tripper, retry clock, permit, and slow threshold are
/// all required; [`BreakerBuilder::build`] fails with
/// [`ConfigError::Missing`] when any of them was never set, and with
/// [`ConfigError::OutOfRange`] when a predicate or clock carries an
/// invalid parameter. No partially-configured breaker is ever returned.
pub struct BreakerBuilder<E> {
    name: String,
    window: Option<Box<dyn Window>>,
    tracker: Option<Tracker<E>>,
    tripper: Option<Tripper>,
    retry: Option<Retry>,
    permit: Option<Permit>,
    slow_threshold: Option<Duration>,
    listeners: Vec<Arc<dyn Listener>>,
    #[cfg(feature = "async")]
    async_listeners: Vec<Arc<dyn AsyncListener>>,
    max_half_open_calls: u32,
}

impl<E: std::error::Error + 'static> BreakerBuilder<E> {
    /// Creates a builder for a breaker with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        BreakerBuilder {
            name: name.into(),
            window: None,
            tracker: None,
            tripper: None,
            retry: None,
            permit: None,
            slow_threshold: None,
            listeners: Vec::new(),
            #[cfg(feature = "async")]
            async_listeners: Vec::new(),
            max_half_open_calls: DEFAULT_MAX_HALF_OPEN_CALLS,
        }
    }

    /// Sets the sliding window aggregating call outcomes. Required.
    pub fn window<W: Window>(mut self, window: W) -> Self {
        self.window = Some(Box::new(window));
        self
    }

    /// Sets the failure classifier. Required.
    pub fn tracker(mut self, tracker: Tracker<E>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    /// Sets the transition predicate. Required.
    pub fn tripper(mut self, tripper: Tripper) -> Self {
        self.tripper = Some(tripper);
        self
    }

    /// Sets the OPEN → HALF_OPEN retry clock. Required.
    pub fn retry(mut self, retry: Retry) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Sets the HALF_OPEN admission policy. Required.
    pub fn permit(mut self, permit: Permit) -> Self {
        self.permit = Some(permit);
        self
    }

    /// Sets the slow-call cutoff. Required; pass [`Duration::MAX`] to
    /// disable slow classification.
    pub fn slow_threshold(mut self, threshold: Duration) -> Self {
        self.slow_threshold = Some(threshold);
        self
    }

    /// Registers a transition listener. May be called repeatedly;
    /// listeners are notified in registration order.
    pub fn listener<L: Listener + 'static>(mut self, listener: L) -> Self {
        self.listeners.push(Arc::new(listener));
        self
    }

    /// Registers an asynchronous transition listener for the cooperative
    /// engine; awaited sequentially after the transition.
    #[cfg(feature = "async")]
    #[cfg_attr(docsrs, doc(cfg(feature = "async")))]
    pub fn async_listener<L: AsyncListener + 'static>(mut self, listener: L) -> Self {
        self.async_listeners.push(Arc::new(listener));
        self
    }

    /// Bounds concurrent in-flight HALF_OPEN probes (cooperative engine
    /// only; the sync engine runs one call at a time by construction).
    pub fn max_half_open_calls(mut self, limit: u32) -> Self {
        self.max_half_open_calls = limit;
        self
    }

    fn into_core(self) -> Result<(Core, Tracker<E>, Parts), ConfigError> {
        let window = self.window.ok_or(ConfigError::Missing("window"))?;
        let tracker = self.tracker.ok_or(ConfigError::Missing("tracker"))?;
        let tripper = self.tripper.ok_or(ConfigError::Missing("tripper"))?;
        let retry = self.retry.ok_or(ConfigError::Missing("retry"))?;
        let permit = self.permit.ok_or(ConfigError::Missing("permit"))?;
        let slow_threshold = self
            .slow_threshold
            .ok_or(ConfigError::Missing("slow_threshold"))?;

        tripper.validate()?;
        retry.validate()?;
        permit.validate()?;
        if self.max_half_open_calls == 0 {
            return Err(ConfigError::OutOfRange {
                param: "max_half_open_calls",
                value: 0.0,
            });
        }

        let core = Core::new(
            self.name,
            window,
            tripper,
            retry,
            permit,
            slow_threshold,
            clock::unix_now(),
        );
        let parts = Parts {
            listeners: self.listeners,
            #[cfg(feature = "async")]
            async_listeners: self.async_listeners,
            #[cfg(feature = "async")]
            max_half_open_calls: self.max_half_open_calls,
        };
        Ok((core, tracker, parts))
    }

    /// Builds the single-threaded breaker.
    pub fn build(self) -> Result<CircuitBreaker<E>, ConfigError> {
        #[cfg(feature = "async")]
        if !self.async_listeners.is_empty() {
            return Err(ConfigError::Unsupported(
                "async listeners require the cooperative breaker",
            ));
        }
        let (core, tracker, parts) = self.into_core()?;
        Ok(CircuitBreaker::from_parts(core, tracker, parts.listeners))
    }

    /// Builds the cooperative breaker.
    #[cfg(feature = "async")]
    #[cfg_attr(docsrs, doc(cfg(feature = "async")))]
    pub fn build_async(self) -> Result<AsyncCircuitBreaker<E>, ConfigError> {
        let (core, tracker, parts) = self.into_core()?;
        Ok(AsyncCircuitBreaker::from_parts(
            core,
            tracker,
            parts.listeners,
            parts.async_listeners,
            parts.max_half_open_calls,
        ))
    }
}

struct Parts {
    listeners: Vec<Arc<dyn Listener>>,
    #[cfg(feature = "async")]
    async_listeners: Vec<Arc<dyn AsyncListener>>,
    #[cfg(feature = "async")]
    max_half_open_calls: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::CountWindow;
    use std::fmt;

    #[derive(Debug)]
    struct TestError;

    impl fmt::Display for TestError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("test error")
        }
    }

    impl std::error::Error for TestError {}

    fn complete_builder() -> BreakerBuilder<TestError> {
        BreakerBuilder::new("svc")
            .window(CountWindow::new(10).unwrap())
            .tracker(Tracker::all())
            .tripper(Tripper::min_requests(5) & Tripper::failure_rate(0.5))
            .retry(Retry::cooldown(Duration::from_secs(1)))
            .permit(Permit::random(1.0))
            .slow_threshold(Duration::MAX)
    }

    #[test]
    fn complete_configuration_builds() {
        assert!(complete_builder().build().is_ok());
    }

    #[test]
    fn missing_fields_fail_construction() {
        let builder: BreakerBuilder<TestError> = BreakerBuilder::new("svc");
        assert_eq!(builder.build().err(), Some(ConfigError::Missing("window")));

        let builder: BreakerBuilder<TestError> =
            BreakerBuilder::new("svc").window(CountWindow::new(10).unwrap());
        assert_eq!(builder.build().err(), Some(ConfigError::Missing("tracker")));
    }

    #[test]
    fn invalid_predicate_parameters_fail_construction() {
        let err = complete_builder()
            .tripper(Tripper::failure_rate(1.5))
            .build()
            .err();
        assert!(matches!(err, Some(ConfigError::OutOfRange { .. })));

        let err = complete_builder()
            .retry(Retry::cooldown(Duration::from_secs(1)).with_jitter(2.0))
            .build()
            .err();
        assert!(matches!(err, Some(ConfigError::OutOfRange { .. })));

        let err = complete_builder().permit(Permit::random(-1.0)).build().err();
        assert!(matches!(err, Some(ConfigError::OutOfRange { .. })));
    }

    #[test]
    fn zero_probe_limit_fails_construction() {
        let err = complete_builder().max_half_open_calls(0).build().err();
        assert!(matches!(err, Some(ConfigError::OutOfRange { .. })));
    }
}
