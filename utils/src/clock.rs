//! Time source abstraction.
//!
//! Everything that reads the time (token replenishment, stamp creation,
//! stamp expiry) goes through [`Clock`] so tests can drive time by hand.

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// A source of monotonic and wall-clock time.
pub trait Clock: Send + Sync {
    /// Monotonic instant, used for measuring elapsed time.
    fn now(&self) -> Instant;

    /// Wall-clock time, used for timestamps that leave the process.
    fn system_time(&self) -> SystemTime;

    /// Time elapsed since `since`. Zero if `since` lies in the future.
    fn elapsed(&self, since: Instant) -> Duration {
        self.now().saturating_duration_since(since)
    }

    /// Seconds since the Unix epoch; zero for a clock set before 1970.
    fn unix_secs(&self) -> u64 {
        self.system_time()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// The operating system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn system_time(&self) -> SystemTime {
        SystemTime::now()
    }
}
