//! Load-driven PoW difficulty.
//!
//! The load tracker's overdraw is turned into extra bits: one bit for every
//! `step` tokens of backlog on top of [`BASE_DIFFICULTY`].

use std::num::NonZeroU32;
use std::sync::Arc;

use wow_bucket::Load;

use crate::error::WorkError;
use crate::stamp::MAX_BITS;

/// Difficulty with no backlog.
pub const BASE_DIFFICULTY: u32 = 20;

/// Provides the difficulty for the next challenge.
pub trait Difficulty: Send + Sync {
    fn difficulty(&self) -> u32;
}

/// Raises the difficulty by one bit for every `step` points of overflow.
pub struct LoadDifficulty {
    load: Arc<dyn Load>,
    step: NonZeroU32,
}

impl LoadDifficulty {
    /// Fails with [`WorkError::ZeroDifficultyStep`] when `step` is 0.
    pub fn new(load: Arc<dyn Load>, step: u32) -> Result<Self, WorkError> {
        let step = NonZeroU32::new(step).ok_or(WorkError::ZeroDifficultyStep)?;
        Ok(Self { load, step })
    }

    pub fn step(&self) -> u32 {
        self.step.get()
    }
}

impl Difficulty for LoadDifficulty {
    fn difficulty(&self) -> u32 {
        // Peek only: sampling the load must not add to it.
        let overflow = self.load.overflow();
        let extra = overflow / u64::from(self.step.get());
        let extra = u32::try_from(extra).unwrap_or(u32::MAX);
        BASE_DIFFICULTY.saturating_add(extra).min(MAX_BITS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wow_nullables::NullLoad;

    fn difficulty_at(overflow: u64, step: u32) -> u32 {
        let load = Arc::new(NullLoad::new(overflow));
        LoadDifficulty::new(load, step).unwrap().difficulty()
    }

    #[test]
    fn base_difficulty_below_one_step() {
        assert_eq!(difficulty_at(0, 100), BASE_DIFFICULTY);
        assert_eq!(difficulty_at(10, 100), BASE_DIFFICULTY);
        assert_eq!(difficulty_at(99, 100), BASE_DIFFICULTY);
    }

    #[test]
    fn one_bit_per_step() {
        assert_eq!(difficulty_at(100, 100), 21);
        assert_eq!(difficulty_at(250, 100), 22);
        assert_eq!(difficulty_at(7, 1), 27);
    }

    #[test]
    fn monotonic_in_overflow() {
        let mut last = 0;
        for overflow in (0..5_000).step_by(37) {
            let d = difficulty_at(overflow, 100);
            assert!(d >= last);
            last = d;
        }
    }

    #[test]
    fn capped_at_hash_width() {
        assert_eq!(difficulty_at(u64::MAX, 1), MAX_BITS);
    }

    #[test]
    fn sampling_does_not_register_load() {
        let load = Arc::new(NullLoad::new(0));
        let policy = LoadDifficulty::new(load.clone(), 100).unwrap();
        policy.difficulty();
        policy.difficulty();
        assert_eq!(load.drawn(), 0);
    }

    #[test]
    fn follows_live_load() {
        let load = Arc::new(NullLoad::new(0));
        let policy = LoadDifficulty::new(load.clone(), 100).unwrap();
        assert_eq!(policy.step(), 100);
        assert_eq!(policy.difficulty(), BASE_DIFFICULTY);

        load.set_overflow(300);
        assert_eq!(policy.difficulty(), BASE_DIFFICULTY + 3);

        load.set_overflow(0);
        assert_eq!(policy.difficulty(), BASE_DIFFICULTY);
    }

    #[test]
    fn zero_step_is_rejected() {
        let load = Arc::new(NullLoad::new(0));
        assert!(matches!(
            LoadDifficulty::new(load, 0),
            Err(WorkError::ZeroDifficultyStep)
        ));
    }
}
