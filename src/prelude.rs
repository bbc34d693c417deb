//! Re-exports common types for convenient glob import.
//!
//! # Example
//! ```rust,no_run
//! use tripswitch::prelude::*;
//! ```

#[cfg(feature = "async")]
pub use crate::AsyncCircuitBreaker;
pub use crate::{
    BreakerError, CircuitBreaker, CountWindow, Permit, Retry, State, TimeWindow, Tracker, Tripper,
};
