use std::error::Error;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use tripswitch::{
    BreakerError, CircuitBreaker, CountWindow, Permit, Retry, Signal, State, Tracker, Tripper,
};

// Error fixtures. ServiceError wraps its causes so TypeOf matching can see
// them through the source chain.

#[derive(Debug)]
struct ConnectionError;

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("connection refused")
    }
}

impl Error for ConnectionError {}

#[derive(Debug)]
struct ValueError;

impl fmt::Display for ValueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("invalid value")
    }
}

impl Error for ValueError {}

#[derive(Debug)]
enum ServiceError {
    Connection(ConnectionError),
    Value(ValueError),
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceError::Connection(e) => write!(f, "service: {}", e),
            ServiceError::Value(e) => write!(f, "service: {}", e),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ServiceError::Connection(e) => Some(e),
            ServiceError::Value(e) => Some(e),
        }
    }
}

type Transitions = Arc<Mutex<Vec<(State, State)>>>;

fn recording_listener(log: &Transitions) -> impl Fn(&Signal) + Send + Sync + 'static {
    let log = Arc::clone(log);
    move |signal: &Signal| {
        log.lock()
            .unwrap()
            .push((signal.old_state, signal.new_state));
    }
}

fn trip_and_recover_breaker(
    tracker: Tracker<ServiceError>,
    log: &Transitions,
) -> CircuitBreaker<ServiceError> {
    CircuitBreaker::builder("svc")
        .window(CountWindow::new(10).unwrap())
        .tracker(tracker)
        .tripper(Tripper::min_requests(5) & Tripper::failure_rate(0.5))
        .retry(Retry::cooldown(Duration::from_millis(100)))
        .permit(Permit::random(1.0))
        .slow_threshold(Duration::MAX)
        .listener(recording_listener(log))
        .build()
        .unwrap()
}

#[test]
fn trip_and_recover() {
    let log: Transitions = Arc::new(Mutex::new(Vec::new()));
    let breaker = trip_and_recover_breaker(Tracker::all(), &log);

    // Five failures trip the circuit.
    for _ in 0..5 {
        let result = breaker.call(|| Err::<(), _>(ServiceError::Connection(ConnectionError)));
        assert!(matches!(result, Err(BreakerError::Operation(_))));
    }
    assert_eq!(breaker.state(), State::Open);
    assert_eq!(breaker.info().reopens, 1);

    // While open, calls short-circuit without running.
    let result = breaker.call(|| -> Result<(), ServiceError> { panic!("must not run") });
    assert!(matches!(result, Err(BreakerError::NotPermitted { .. })));

    // After the cooldown the next call is admitted as a probe.
    thread::sleep(Duration::from_millis(150));
    let result = breaker.call(|| Ok::<_, ServiceError>("recovered"));
    assert_eq!(result.unwrap(), "recovered");
    assert_eq!(breaker.state(), State::HalfOpen);

    // The circuit closes once the probe sample satisfies MinRequests.
    for _ in 0..4 {
        breaker.call(|| Ok::<_, ServiceError>("ok")).unwrap();
    }
    assert_eq!(breaker.state(), State::Closed);
    // Recovery preserves the reopen count; only reset() clears it.
    assert_eq!(breaker.info().reopens, 1);

    let log = log.lock().unwrap();
    assert_eq!(
        *log,
        vec![
            (State::Closed, State::Open),
            (State::Open, State::HalfOpen),
            (State::HalfOpen, State::Closed),
        ]
    );
}

#[test]
fn tracker_filters_untracked_errors() {
    let log: Transitions = Arc::new(Mutex::new(Vec::new()));
    let breaker = trip_and_recover_breaker(Tracker::type_of::<ConnectionError>(), &log);

    // Value errors are not tracked: they propagate but count as successes.
    for _ in 0..5 {
        let result = breaker.call(|| Err::<(), _>(ServiceError::Value(ValueError)));
        assert!(matches!(result, Err(BreakerError::Operation(_))));
    }

    assert_eq!(breaker.state(), State::Closed);
    let metric = breaker.info().metric;
    assert_eq!(metric.total_count, 5);
    assert_eq!(metric.failure_count, 0);
    assert!(log.lock().unwrap().is_empty());
}

#[test]
fn half_open_retrip_restarts_the_clock() {
    let log: Transitions = Arc::new(Mutex::new(Vec::new()));
    // A dedicated HALF_OPEN arm lets a single failed probe re-trip.
    let tripper = (Tripper::closed() & Tripper::min_requests(5) & Tripper::failure_rate(0.5))
        | (Tripper::half_opened() & Tripper::failure_rate(0.5));
    let breaker: CircuitBreaker<ServiceError> = CircuitBreaker::builder("svc")
        .window(CountWindow::new(10).unwrap())
        .tracker(Tracker::all())
        .tripper(tripper)
        .retry(Retry::cooldown(Duration::from_millis(100)))
        .permit(Permit::random(1.0))
        .slow_threshold(Duration::MAX)
        .listener(recording_listener(&log))
        .build()
        .unwrap();

    for _ in 0..5 {
        let _ = breaker.call(|| Err::<(), _>(ServiceError::Connection(ConnectionError)));
    }
    assert_eq!(breaker.state(), State::Open);

    // A failed probe sends the circuit straight back to OPEN.
    thread::sleep(Duration::from_millis(150));
    let result = breaker.call(|| Err::<(), _>(ServiceError::Connection(ConnectionError)));
    assert!(matches!(result, Err(BreakerError::Operation(_))));
    assert_eq!(breaker.state(), State::Open);
    assert_eq!(breaker.info().reopens, 2);

    // The retry clock restarts from the re-trip, so an immediate call is
    // still refused.
    let result = breaker.call(|| Ok::<_, ServiceError>(()));
    assert!(matches!(result, Err(BreakerError::NotPermitted { .. })));

    let log = log.lock().unwrap();
    assert_eq!(
        *log,
        vec![
            (State::Closed, State::Open),
            (State::Open, State::HalfOpen),
            (State::HalfOpen, State::Open),
        ]
    );
}

#[test]
fn slow_rate_trips_without_failures() {
    let breaker: CircuitBreaker<ServiceError> = CircuitBreaker::builder("svc")
        .window(CountWindow::new(10).unwrap())
        .tracker(Tracker::all())
        .tripper(Tripper::min_requests(5) & Tripper::slow_rate(0.6))
        .retry(Retry::cooldown(Duration::from_secs(30)))
        .permit(Permit::random(1.0))
        .slow_threshold(Duration::from_millis(20))
        .build()
        .unwrap();

    // Four fast calls, then slow ones; every call succeeds.
    for _ in 0..4 {
        breaker.call(|| Ok::<_, ServiceError>(())).unwrap();
    }
    for _ in 0..6 {
        breaker
            .call(|| {
                thread::sleep(Duration::from_millis(40));
                Ok::<_, ServiceError>(())
            })
            .unwrap();
    }

    // Six slow out of ten reaches the 0.6 slow-rate threshold.
    assert_eq!(breaker.state(), State::Open);
}

#[test]
fn time_window_breaker_trips_on_recent_failures() {
    use tripswitch::TimeWindow;

    let breaker: CircuitBreaker<ServiceError> = CircuitBreaker::builder("svc")
        .window(TimeWindow::new(10).unwrap())
        .tracker(Tracker::all())
        .tripper(Tripper::min_requests(4) & Tripper::failure_rate(0.5))
        .retry(Retry::cooldown(Duration::from_secs(30)))
        .permit(Permit::random(1.0))
        .slow_threshold(Duration::MAX)
        .build()
        .unwrap();

    for _ in 0..2 {
        breaker.call(|| Ok::<_, ServiceError>(())).unwrap();
    }
    for _ in 0..2 {
        let _ = breaker.call(|| Err::<(), _>(ServiceError::Connection(ConnectionError)));
    }
    assert_eq!(breaker.state(), State::Open);
}

#[test]
fn disabled_bypasses_entirely() {
    let log: Transitions = Arc::new(Mutex::new(Vec::new()));
    let breaker = trip_and_recover_breaker(Tracker::all(), &log);
    breaker.disable(false);

    for _ in 0..10 {
        let result = breaker.call(|| Err::<(), _>(ServiceError::Connection(ConnectionError)));
        // The error still propagates; the breaker just does not look at it.
        assert!(matches!(result, Err(BreakerError::Operation(_))));
    }

    assert_eq!(breaker.state(), State::Disabled);
    assert_eq!(breaker.info().metric.total_count, 0);
    assert!(log.lock().unwrap().is_empty());
}

#[test]
fn metrics_only_records_but_never_trips() {
    let log: Transitions = Arc::new(Mutex::new(Vec::new()));
    let breaker = trip_and_recover_breaker(Tracker::all(), &log);
    breaker.metrics_only(false);

    for _ in 0..10 {
        let _ = breaker.call(|| Err::<(), _>(ServiceError::Connection(ConnectionError)));
    }

    assert_eq!(breaker.state(), State::MetricsOnly);
    let metric = breaker.info().metric;
    assert_eq!(metric.total_count, 10);
    assert_eq!(metric.failure_count, 10);
    assert!(log.lock().unwrap().is_empty());
}

#[test]
fn force_open_then_reset_round_trip() {
    let log: Transitions = Arc::new(Mutex::new(Vec::new()));
    let breaker = trip_and_recover_breaker(Tracker::all(), &log);

    breaker.force_open(true);
    assert_eq!(breaker.state(), State::ForcedOpen);
    let result = breaker.call(|| Ok::<_, ServiceError>(()));
    assert!(matches!(result, Err(BreakerError::NotPermitted { .. })));

    breaker.reset(true);
    assert_eq!(breaker.state(), State::Closed);
    assert_eq!(breaker.info().reopens, 0);
    assert_eq!(breaker.info().metric.total_count, 0);

    let log = log.lock().unwrap();
    assert_eq!(
        *log,
        vec![
            (State::Closed, State::ForcedOpen),
            (State::ForcedOpen, State::Closed),
        ]
    );
}

#[test]
fn manual_transitions_can_suppress_signals() {
    let log: Transitions = Arc::new(Mutex::new(Vec::new()));
    let breaker = trip_and_recover_breaker(Tracker::all(), &log);

    breaker.force_open(false);
    breaker.reset(false);
    assert!(log.lock().unwrap().is_empty());
}

#[test]
fn recording_is_immediately_visible() {
    let log: Transitions = Arc::new(Mutex::new(Vec::new()));
    let breaker = trip_and_recover_breaker(Tracker::all(), &log);

    breaker.call(|| Ok::<_, ServiceError>(())).unwrap();
    assert_eq!(breaker.info().metric.total_count, 1);

    let _ = breaker.call(|| Err::<(), _>(ServiceError::Connection(ConnectionError)));
    let metric = breaker.info().metric;
    assert_eq!(metric.total_count, 2);
    assert_eq!(metric.failure_count, 1);
}

#[test]
fn listener_panic_does_not_disturb_the_breaker() {
    let log: Transitions = Arc::new(Mutex::new(Vec::new()));
    let breaker: CircuitBreaker<ServiceError> = CircuitBreaker::builder("svc")
        .window(CountWindow::new(10).unwrap())
        .tracker(Tracker::all())
        .tripper(Tripper::min_requests(2) & Tripper::failure_rate(0.5))
        .retry(Retry::never())
        .permit(Permit::random(1.0))
        .slow_threshold(Duration::MAX)
        .listener(|_: &Signal| panic!("broken listener"))
        .listener(recording_listener(&log))
        .build()
        .unwrap();

    for _ in 0..2 {
        let _ = breaker.call(|| Err::<(), _>(ServiceError::Connection(ConnectionError)));
    }

    // The breaker tripped and the second listener still ran.
    assert_eq!(breaker.state(), State::Open);
    assert_eq!(*log.lock().unwrap(), vec![(State::Closed, State::Open)]);
}

#[test]
fn never_retry_keeps_the_circuit_open() {
    let log: Transitions = Arc::new(Mutex::new(Vec::new()));
    let breaker: CircuitBreaker<ServiceError> = CircuitBreaker::builder("svc")
        .window(CountWindow::new(4).unwrap())
        .tracker(Tracker::all())
        .tripper(Tripper::min_requests(2) & Tripper::failure_rate(0.5))
        .retry(Retry::never())
        .permit(Permit::random(1.0))
        .slow_threshold(Duration::MAX)
        .listener(recording_listener(&log))
        .build()
        .unwrap();

    for _ in 0..2 {
        let _ = breaker.call(|| Err::<(), _>(ServiceError::Connection(ConnectionError)));
    }
    assert_eq!(breaker.state(), State::Open);

    thread::sleep(Duration::from_millis(50));
    let result = breaker.call(|| Ok::<_, ServiceError>(()));
    assert!(matches!(result, Err(BreakerError::NotPermitted { .. })));
    assert_eq!(breaker.state(), State::Open);
}

#[test]
fn custom_tracker_panic_counts_as_success() {
    let breaker: CircuitBreaker<ServiceError> = CircuitBreaker::builder("svc")
        .window(CountWindow::new(4).unwrap())
        .tracker(Tracker::custom(|_| panic!("predicate bug")))
        .tripper(Tripper::min_requests(1) & Tripper::failure_rate(0.5))
        .retry(Retry::never())
        .permit(Permit::random(1.0))
        .slow_threshold(Duration::MAX)
        .build()
        .unwrap();

    let result = breaker.call(|| Err::<(), _>(ServiceError::Connection(ConnectionError)));
    assert!(matches!(result, Err(BreakerError::Operation(_))));
    assert_eq!(breaker.state(), State::Closed);
    assert_eq!(breaker.info().metric.failure_count, 0);
}

#[test]
fn not_permitted_error_names_the_circuit() {
    let log: Transitions = Arc::new(Mutex::new(Vec::new()));
    let breaker = trip_and_recover_breaker(Tracker::all(), &log);
    breaker.force_open(false);

    match breaker.call(|| Ok::<_, ServiceError>(())) {
        Err(BreakerError::NotPermitted { circuit, state, .. }) => {
            assert_eq!(circuit, "svc");
            assert_eq!(state, State::ForcedOpen);
        }
        other => panic!("expected a refusal, got {:?}", other.map(|_| ())),
    }
}
