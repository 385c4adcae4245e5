//! Quotes served as the reward for a solved challenge.

pub mod embedded;

pub use embedded::{EmbeddedQuoter, QuoteError};

/// Source of the payload written to a client after it proved its work.
pub trait Quoter: Send + Sync {
    /// A non-empty quote.
    fn quote(&self) -> String;
}
