//! Basic circuit breaker example.
//!
//! Demonstrates:
//! 1. Building a breaker from its parts
//! 2. Tripping on a failure rate
//! 3. Short-circuited calls while the circuit is open
//! 4. Recovery through half-open probing

use std::error::Error;
use std::fmt;
use std::thread;
use std::time::Duration;

use tripswitch::{BreakerError, CircuitBreaker, CountWindow, Permit, Retry, Tracker, Tripper};

#[derive(Debug)]
struct ServiceError(String);

impl ServiceError {
    fn new(msg: &str) -> Self {
        ServiceError(msg.to_string())
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "service error: {}", self.0)
    }
}

impl Error for ServiceError {}

// Simulates an external service that fails for a while, then recovers.
fn external_service(call_count: &mut u32) -> Result<String, ServiceError> {
    *call_count += 1;

    if *call_count <= 5 {
        Err(ServiceError::new("temporarily unavailable"))
    } else {
        Ok("stable response".to_string())
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let breaker: CircuitBreaker<ServiceError> = CircuitBreaker::builder("demo")
        .window(CountWindow::new(10)?)
        .tracker(Tracker::all())
        .tripper(Tripper::min_requests(5) & Tripper::failure_rate(0.5))
        .retry(Retry::cooldown(Duration::from_secs(1)))
        .permit(Permit::random(1.0))
        .slow_threshold(Duration::MAX)
        .listener(|signal: &tripswitch::Signal| {
            println!(
                ">> circuit '{}' moved {} -> {}",
                signal.circuit, signal.old_state, signal.new_state
            );
        })
        .build()?;

    let mut call_count = 0;

    for i in 1..=12 {
        let result = breaker.call(|| external_service(&mut call_count));

        match result {
            Ok(response) => println!("call {:2}: {}", i, response),
            Err(BreakerError::NotPermitted { .. }) => {
                println!("call {:2}: short-circuited", i)
            }
            Err(BreakerError::Operation(err)) => println!("call {:2}: {}", i, err),
        }

        let info = breaker.info();
        println!(
            "         state={} failure_rate={:.2} reopens={}",
            info.state,
            info.metric.failure_rate(),
            info.reopens
        );

        if info.state == tripswitch::State::Open {
            // Wait out the cooldown so the next call probes recovery.
            thread::sleep(Duration::from_millis(1100));
        }
    }

    Ok(())
}
