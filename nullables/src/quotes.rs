//! Nullable quote source.

use wow_quotes::Quoter;

/// Returns the same quote every time.
#[derive(Debug, Clone)]
pub struct NullQuoter {
    quote: String,
}

impl NullQuoter {
    pub fn new(quote: impl Into<String>) -> Self {
        Self {
            quote: quote.into(),
        }
    }
}

impl Quoter for NullQuoter {
    fn quote(&self) -> String {
        self.quote.clone()
    }
}
