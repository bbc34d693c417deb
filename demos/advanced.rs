//! Advanced circuit breaker example (cooperative engine).
//!
//! Demonstrates:
//! 1. The async breaker under tokio
//! 2. Tracking only a subset of error types
//! 3. Exponential backoff with jitter between probe rounds
//! 4. Ramped half-open admission
//! 5. Structured logging of transitions via `LogListener`

use std::error::Error;
use std::fmt;
use std::time::Duration;

use tripswitch::{
    AsyncCircuitBreaker, BreakerError, CountWindow, LogListener, Permit, Retry, Tracker, Tripper,
};

#[derive(Debug)]
struct Timeout;

impl fmt::Display for Timeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("upstream timed out")
    }
}

impl Error for Timeout {}

#[derive(Debug)]
struct BadRequest;

impl fmt::Display for BadRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("bad request")
    }
}

impl Error for BadRequest {}

#[derive(Debug)]
enum GatewayError {
    Timeout(Timeout),
    BadRequest(BadRequest),
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayError::Timeout(e) => write!(f, "gateway: {}", e),
            GatewayError::BadRequest(e) => write!(f, "gateway: {}", e),
        }
    }
}

impl Error for GatewayError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            GatewayError::Timeout(e) => Some(e),
            GatewayError::BadRequest(e) => Some(e),
        }
    }
}

async fn flaky_upstream(attempt: u32) -> Result<String, GatewayError> {
    match attempt {
        // Client mistakes: these should not trip the circuit.
        n if n % 7 == 0 => Err(GatewayError::BadRequest(BadRequest)),
        // Early calls time out; the upstream recovers later.
        n if n <= 6 => Err(GatewayError::Timeout(Timeout)),
        _ => Ok(format!("reply #{}", attempt)),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt().with_target(false).init();

    let breaker: AsyncCircuitBreaker<GatewayError> = AsyncCircuitBreaker::builder("gateway")
        .window(CountWindow::new(20)?)
        // Only timeouts count as failures; bad requests pass through
        // untracked.
        .tracker(Tracker::type_of::<Timeout>())
        .tripper(Tripper::min_requests(4) & Tripper::failure_rate(0.5))
        .retry(Retry::backoff(Duration::from_millis(500), 2.0, Duration::from_secs(8)).with_jitter(0.2))
        .permit(Permit::ramp_up(0.5, 1.0, Duration::from_secs(2)))
        .slow_threshold(Duration::from_secs(1))
        .listener(LogListener)
        .max_half_open_calls(2)
        .build_async()?;

    for attempt in 1..=20 {
        let result = breaker
            .call_with_fallback(
                || flaky_upstream(attempt),
                |err| match err {
                    BreakerError::NotPermitted { .. } => "fallback: served from cache".to_string(),
                    BreakerError::Operation(err) => format!("fallback after error: {}", err),
                },
            )
            .await;

        println!("attempt {:2}: {}", attempt, result);

        tokio::time::sleep(Duration::from_millis(300)).await;
    }

    let info = breaker.info();
    println!(
        "final state={} total={} failures={}",
        info.state, info.metric.total_count, info.metric.failure_count
    );

    Ok(())
}
