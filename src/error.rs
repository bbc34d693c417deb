//! Error types for the circuit breaker library.

use std::error::Error;
use std::fmt::{self, Display, Formatter};

use crate::state::State;

/// Result type for circuit breaker call operations.
pub type BreakerResult<T, E> = Result<T, BreakerError<E>>;

/// Error type for circuit breaker call operations.
///
/// Errors raised by the wrapped function are never swallowed; they come
/// back as [`BreakerError::Operation`] whether or not the tracker counted
/// them as failures.
#[derive(Debug)]
pub enum BreakerError<E> {
    /// The engine refused to invoke the wrapped function: the circuit is
    /// open before its retry time, forced open, or the half-open admission
    /// policy (or probe limit) rejected the call.
    NotPermitted {
        /// Name of the refusing circuit.
        circuit: String,
        /// State the circuit was in when it refused the call.
        state: State,
        /// Optional detail on which gate refused.
        message: Option<&'static str>,
    },

    /// The wrapped function returned an error.
    Operation(E),
}

impl<E> BreakerError<E> {
    pub(crate) fn not_permitted(
        circuit: impl Into<String>,
        state: State,
        message: Option<&'static str>,
    ) -> Self {
        BreakerError::NotPermitted {
            circuit: circuit.into(),
            state,
            message,
        }
    }

    /// Returns true if this error is a short-circuit refusal rather than a
    /// wrapped-function error.
    pub fn is_not_permitted(&self) -> bool {
        matches!(self, BreakerError::NotPermitted { .. })
    }

    /// Returns the wrapped operation error, if any.
    pub fn into_operation(self) -> Option<E> {
        match self {
            BreakerError::Operation(e) => Some(e),
            BreakerError::NotPermitted { .. } => None,
        }
    }
}

impl<E> Display for BreakerError<E>
where
    E: Display,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            BreakerError::NotPermitted {
                circuit,
                state,
                message,
            } => {
                write!(f, "circuit '{}' did not permit the call ({})", circuit, state)?;
                if let Some(msg) = message {
                    write!(f, ": {}", msg)?;
                }
                Ok(())
            }
            BreakerError::Operation(e) => write!(f, "operation error: {}", e),
        }
    }
}

impl<E: Error + 'static> Error for BreakerError<E> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            BreakerError::NotPermitted { .. } => None,
            BreakerError::Operation(e) => Some(e),
        }
    }
}

/// Error raised when a breaker or one of its parts is misconfigured.
///
/// Construction either succeeds completely or fails with one of these; no
/// partially-configured breaker is ever handed out.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A required builder field was never set.
    Missing(&'static str),

    /// A window was constructed with zero capacity.
    ZeroCapacity(&'static str),

    /// A numeric parameter fell outside its permitted range.
    OutOfRange {
        /// Name of the offending parameter.
        param: &'static str,
        /// The rejected value.
        value: f64,
    },

    /// A configured capability is not supported by the engine being built.
    Unsupported(&'static str),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(field) => write!(f, "required field '{}' is not set", field),
            ConfigError::ZeroCapacity(what) => {
                write!(f, "{} capacity must be greater than zero", what)
            }
            ConfigError::OutOfRange { param, value } => {
                write!(f, "parameter '{}' is out of range: {}", param, value)
            }
            ConfigError::Unsupported(what) => write!(f, "{}", what),
        }
    }
}

impl Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Boom;

    impl Display for Boom {
        fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
            f.write_str("boom")
        }
    }

    impl Error for Boom {}

    #[test]
    fn not_permitted_formats_with_state_and_message() {
        let err: BreakerError<Boom> =
            BreakerError::not_permitted("db", State::Open, Some("retry period has not elapsed"));
        let text = err.to_string();
        assert!(text.contains("db"));
        assert!(text.contains("open"));
        assert!(text.contains("retry period"));
        assert!(err.is_not_permitted());
    }

    #[test]
    fn operation_error_exposes_source() {
        let err: BreakerError<Boom> = BreakerError::Operation(Boom);
        assert!(err.source().is_some());
        assert!(!err.is_not_permitted());
        assert!(err.into_operation().is_some());
    }

    #[test]
    fn config_error_messages() {
        assert_eq!(
            ConfigError::Missing("window").to_string(),
            "required field 'window' is not set"
        );
        let oor = ConfigError::OutOfRange {
            param: "jitter",
            value: 1.5,
        };
        assert!(oor.to_string().contains("jitter"));
    }
}
