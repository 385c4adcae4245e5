//! Token bucket with debt.
//!
//! Unlike a classic token bucket the level is not clamped at zero: every
//! draw is accepted, and a negative level records the backlog. Recovery
//! happens only through replenishment at `rate` tokens per second.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use wow_utils::{Clock, SystemClock};

use crate::Load;

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Capacity-bounded token counter that can be over-drawn.
pub struct TokenBucket {
    /// Tokens replenished per second.
    rate: u32,
    /// Upper bound of `level`.
    capacity: u32,
    state: Mutex<BucketState>,
    clock: Arc<dyn Clock>,
}

struct BucketState {
    /// Always `<= capacity`; negative while in debt.
    level: i64,
    last_refill: Instant,
}

impl TokenBucket {
    /// Create a full bucket backed by the system clock.
    pub fn new(rate: u32, capacity: u32) -> Self {
        Self::with_clock(rate, capacity, Arc::new(SystemClock))
    }

    /// Create a full bucket reading time from `clock`.
    pub fn with_clock(rate: u32, capacity: u32, clock: Arc<dyn Clock>) -> Self {
        let last_refill = clock.now();
        Self {
            rate,
            capacity,
            state: Mutex::new(BucketState {
                level: i64::from(capacity),
                last_refill,
            }),
            clock,
        }
    }

    /// Tokens replenished per second.
    pub fn rate(&self) -> u32 {
        self.rate
    }

    /// Maximum number of tokens the bucket holds.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Current level as of the last draw. Does not replenish.
    pub fn level(&self) -> i64 {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).level
    }

    /// Replenish, then take `tokens` out of the bucket.
    ///
    /// Returns the absolute value of the level when it ends up negative,
    /// `0` otherwise. `take(0)` only replenishes and reports.
    pub fn take(&self, tokens: u32) -> u64 {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        self.refill(&mut state);
        state.level = state.level.saturating_sub(i64::from(tokens));
        if state.level < 0 {
            state.level.unsigned_abs()
        } else {
            0
        }
    }

    /// Add `floor(elapsed_ns * rate / 1e9)` tokens, capped at capacity.
    fn refill(&self, state: &mut BucketState) {
        let now = self.clock.now();
        let elapsed = now.saturating_duration_since(state.last_refill);
        let added = elapsed.as_nanos() * u128::from(self.rate) / NANOS_PER_SEC;
        let added = i64::try_from(added).unwrap_or(i64::MAX);
        state.level = state
            .level
            .saturating_add(added)
            .min(i64::from(self.capacity));
        state.last_refill = now;
    }
}

impl Load for TokenBucket {
    fn draw(&self, tokens: u32) -> u64 {
        let overflow = self.take(tokens);
        if overflow > 0 && tokens > 0 {
            tracing::trace!(overflow, "load tracker over capacity");
        }
        overflow
    }
}

impl std::fmt::Debug for TokenBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenBucket")
            .field("rate", &self.rate)
            .field("capacity", &self.capacity)
            .field("level", &self.level())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wow_nullables::NullClock;

    fn bucket(rate: u32, capacity: u32) -> (TokenBucket, Arc<NullClock>) {
        let clock = Arc::new(NullClock::new());
        (TokenBucket::with_clock(rate, capacity, clock.clone()), clock)
    }

    #[test]
    fn starts_full() {
        let (tb, _) = bucket(5, 10);
        assert_eq!(tb.level(), 10);
        assert_eq!(tb.rate(), 5);
        assert_eq!(tb.capacity(), 10);
    }

    #[test]
    fn draw_overflow_and_recovery() {
        let (tb, clock) = bucket(1, 2);

        // Take both tokens -> nothing left, no overflow.
        assert_eq!(tb.draw(2), 0);

        // One more -> one token of debt.
        assert_eq!(tb.draw(1), 1);

        // Two seconds at rate 1 pay off the debt and leave one token.
        clock.advance(Duration::from_secs(2));
        assert_eq!(tb.draw(1), 0);
        assert_eq!(tb.level(), 0);
    }

    #[test]
    fn level_goes_negative_and_stays_negative() {
        let (tb, _) = bucket(1, 3);
        assert_eq!(tb.draw(10), 7);
        assert_eq!(tb.level(), -7);
        assert_eq!(tb.overflow(), 7);
        assert_eq!(tb.level(), -7);
    }

    #[test]
    fn peek_does_not_change_load() {
        let (tb, _) = bucket(1, 5);
        tb.draw(3);
        assert_eq!(tb.overflow(), 0);
        assert_eq!(tb.overflow(), 0);
        assert_eq!(tb.level(), 2);
    }

    #[test]
    fn sub_token_elapsed_time_adds_nothing() {
        let (tb, clock) = bucket(2, 10);
        tb.draw(10);
        // 499ms at 2 tokens/s is 0.998 tokens -> truncated to zero.
        clock.advance(Duration::from_millis(499));
        assert_eq!(tb.overflow(), 0);
        assert_eq!(tb.level(), 0);
        // 500ms is exactly one token.
        clock.advance(Duration::from_millis(500));
        tb.overflow();
        assert_eq!(tb.level(), 1);
    }

    #[test]
    fn refill_is_capped_at_capacity() {
        let (tb, clock) = bucket(100, 10);
        tb.draw(4);
        clock.advance(Duration::from_secs(3600));
        tb.overflow();
        assert_eq!(tb.level(), 10);
    }

    #[test]
    fn concurrent_draws_are_all_counted() {
        let (tb, _) = bucket(1, 100);
        let tb = Arc::new(tb);
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let tb = Arc::clone(&tb);
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        tb.draw(1);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(tb.level(), 100 - 400);
        assert_eq!(tb.overflow(), 300);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// The level never exceeds capacity and the reported overflow
            /// always equals max(0, n - L) for the post-refill level L.
            #[test]
            fn level_bounded_and_overflow_exact(
                rate in 1u32..1_000,
                capacity in 1u32..1_000,
                steps in prop::collection::vec((0u32..500, 0u64..5_000), 1..40),
            ) {
                let (tb, clock) = bucket(rate, capacity);
                for (tokens, advance_ms) in steps {
                    clock.advance(Duration::from_millis(advance_ms));
                    let before = tb.level();
                    let added = i64::try_from(
                        u128::from(advance_ms) * 1_000_000 * u128::from(rate) / NANOS_PER_SEC,
                    ).unwrap();
                    let refilled = (before + added).min(i64::from(capacity));

                    let overflow = tb.draw(tokens);

                    prop_assert!(tb.level() <= i64::from(capacity));
                    prop_assert_eq!(tb.level(), refilled - i64::from(tokens));
                    let expected = (i64::from(tokens) - refilled).max(0) as u64;
                    prop_assert_eq!(overflow, expected);
                }
            }
        }
    }
}
