//! Nullable load signal with a settable overflow.

use std::sync::atomic::{AtomicU64, Ordering};

use wow_bucket::Load;

/// A [`Load`] that reports whatever overflow it was told to and records
/// how many tokens were drawn from it.
#[derive(Debug, Default)]
pub struct NullLoad {
    overflow: AtomicU64,
    drawn: AtomicU64,
}

impl NullLoad {
    pub fn new(overflow: u64) -> Self {
        Self {
            overflow: AtomicU64::new(overflow),
            drawn: AtomicU64::new(0),
        }
    }

    pub fn set_overflow(&self, overflow: u64) {
        self.overflow.store(overflow, Ordering::SeqCst);
    }

    /// Total tokens drawn so far (peeks count as zero).
    pub fn drawn(&self) -> u64 {
        self.drawn.load(Ordering::SeqCst)
    }
}

impl Load for NullLoad {
    fn draw(&self, tokens: u32) -> u64 {
        self.drawn.fetch_add(u64::from(tokens), Ordering::SeqCst);
        self.overflow.load(Ordering::SeqCst)
    }
}
