//! Project-wide constants.

use std::time::Duration;

/// Name given to the worker OS thread.
pub const WORKER_THREAD_NAME: &str = "polyworker";

/// Tasks the worker runs at once unless configured otherwise.
pub const DEFAULT_MAX_CONCURRENT: usize = 1;

/// First correlation token handed out by a fresh bridge.
pub const DEFAULT_TOKEN_BASE: u64 = 0;

/// Timed-out tokens remembered so their late completions aren't reported
/// as protocol errors.
pub const RECLAIMED_CAPACITY: usize = 1024;

/// How long the launcher waits on a single invocation.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Capacity of the bridge event bus.
pub const EVENT_CAPACITY: usize = 64;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_usable() {
        assert!(!WORKER_THREAD_NAME.is_empty());
        assert!(DEFAULT_MAX_CONCURRENT >= 1);
        assert!(DEFAULT_TIMEOUT > Duration::ZERO);
        assert!(EVENT_CAPACITY > 0);
        assert!(RECLAIMED_CAPACITY > 0);
    }
}
