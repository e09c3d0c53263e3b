//! Time source for the sync engine
//!
//! Provides millisecond timestamps for request timing and render lookups:
//! - `Timestamp` - Monotonic milliseconds
//! - `Clock` - Anything that can report the current timestamp
//! - `SystemClock` - Monotonic clock anchored at construction

use std::time::Instant;

/// Monotonic milliseconds
pub type Timestamp = u64;

/// A source of monotonic millisecond timestamps
pub trait Clock: Send + Sync {
    /// Current time in milliseconds
    fn now_ms(&self) -> Timestamp;
}

/// Monotonic clock backed by `std::time::Instant`
///
/// Reports milliseconds elapsed since `origin_ms` was read at construction.
#[derive(Debug, Clone)]
pub struct SystemClock {
    start: Instant,
    origin_ms: Timestamp,
}

impl SystemClock {
    /// Create a clock that starts counting at zero
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    /// Create a clock that starts counting at `origin_ms`
    pub fn starting_at(origin_ms: Timestamp) -> Self {
        Self {
            start: Instant::now(),
            origin_ms,
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> Timestamp {
        self.origin_ms + self.start.elapsed().as_millis() as u64
    }
}

impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
    fn now_ms(&self) -> Timestamp {
        (**self).now_ms()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_is_monotonic() {
        let clock = SystemClock::starting_at(5_000);
        let a = clock.now_ms();
        let b = clock.now_ms();
        assert!(a >= 5_000);
        assert!(b >= a);
    }
}
