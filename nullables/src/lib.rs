//! Nullable infrastructure for deterministic testing.
//!
//! Every collaborator the server is wired from (clock, load signal,
//! difficulty policy, quote source) sits behind a trait. This crate provides
//! implementations that:
//! - Return deterministic values
//! - Can be controlled programmatically
//! - Never sleep or touch the network
//!
//! Usage: swap real implementations for nullables in tests.

pub mod clock;
pub mod difficulty;
pub mod load;
pub mod quotes;

pub use clock::NullClock;
pub use difficulty::NullDifficulty;
pub use load::NullLoad;
pub use quotes::NullQuoter;
