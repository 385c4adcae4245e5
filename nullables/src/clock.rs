//! Nullable clock — deterministic time for testing.

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use wow_utils::Clock;

/// Wall time the clock reads before any advance: 2024-01-22T22:33:58Z.
pub const DEFAULT_START_SECS: u64 = 1_705_962_838;

/// A deterministic clock for testing.
///
/// Time only advances when you tell it to. Monotonic and wall-clock
/// readings move together.
pub struct NullClock {
    origin: Instant,
    wall_origin: SystemTime,
    offset: Mutex<Duration>,
}

impl NullClock {
    pub fn new() -> Self {
        Self::starting_at(DEFAULT_START_SECS)
    }

    /// Start the wall clock at `unix_secs`.
    pub fn starting_at(unix_secs: u64) -> Self {
        Self {
            origin: Instant::now(),
            wall_origin: UNIX_EPOCH + Duration::from_secs(unix_secs),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    /// Move time forward.
    pub fn advance(&self, by: Duration) {
        *self.offset.lock().unwrap_or_else(PoisonError::into_inner) += by;
    }

    fn offset(&self) -> Duration {
        *self.offset.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for NullClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for NullClock {
    fn now(&self) -> Instant {
        self.origin + self.offset()
    }

    fn system_time(&self) -> SystemTime {
        self.wall_origin + self.offset()
    }
}
