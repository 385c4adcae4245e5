//! Nullable difficulty policy — a fixed number of bits.

use wow_work::Difficulty;

/// Always asks for the same difficulty.
#[derive(Debug, Clone, Copy)]
pub struct NullDifficulty(pub u32);

impl Difficulty for NullDifficulty {
    fn difficulty(&self) -> u32 {
        self.0
    }
}
