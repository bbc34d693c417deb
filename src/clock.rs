//! Wall-clock access.
//!
//! All state-machine timestamps are wall-clock seconds since the Unix epoch.
//! Call durations are measured separately with [`std::time::Instant`]; the
//! state machine tolerates small clock regressions and does not depend on a
//! monotonic source.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time as fractional seconds since the Unix epoch.
pub(crate) fn unix_now() -> f64 {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(elapsed) => elapsed.as_secs_f64(),
        // Clock set before the epoch; treat as the epoch itself.
        Err(_) => 0.0,
    }
}
