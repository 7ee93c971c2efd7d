//! Time utilities and constants for the Voyage currency layer.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

/// Timing constants.
pub mod constants {
    use super::Duration;

    /// How long a successful rate refresh is reused (1 hour).
    pub fn rate_cache_window() -> Duration {
        Duration::hours(1)
    }

    /// Timeout for the outbound rate request (10 seconds).
    pub fn rate_request_timeout() -> std::time::Duration {
        std::time::Duration::from_secs(10)
    }
}

/// A timestamp, always UTC.
pub type Timestamp = DateTime<Utc>;

/// Get the current timestamp.
pub fn now() -> Timestamp {
    Utc::now()
}

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    current: Mutex<Timestamp>,
}

impl ManualClock {
    /// Create a clock frozen at `start`.
    pub fn new(start: Timestamp) -> Self {
        Self {
            current: Mutex::new(start),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        *self.current.lock() += by;
    }

    /// Jump to a specific instant.
    pub fn set(&self, to: Timestamp) {
        *self.current.lock() = to;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.current.lock()
    }
}
