//! Server load tracking.
//!
//! A [`TokenBucket`] that may be drawn below zero. The amount of debt is
//! the load signal the proof-of-work difficulty policy feeds on.

pub mod token;

pub use token::TokenBucket;

/// Something that accepts load and reports how far it is over capacity.
pub trait Load: Send + Sync {
    /// Draw `tokens` units of load. Returns how far the tracker is now
    /// over-drawn, or `0` while it still has capacity.
    fn draw(&self, tokens: u32) -> u64;

    /// Current overdraw without registering any load.
    fn overflow(&self) -> u64 {
        self.draw(0)
    }
}
