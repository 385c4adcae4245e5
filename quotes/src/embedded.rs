//! Quotes compiled into the binary.

use rand::Rng;
use thiserror::Error;

use crate::Quoter;

const EMBEDDED_QUOTES: &str = include_str!("../quotes.txt");

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QuoteError {
    #[error("quote source contains no quotes")]
    Empty,
}

type Picker = Box<dyn Fn(usize) -> usize + Send + Sync>;

/// Holds the quote list in memory and hands out one at random.
pub struct EmbeddedQuoter {
    quotes: Vec<String>,
    picker: Picker,
}

impl EmbeddedQuoter {
    /// Quotes shipped with the binary.
    pub fn new() -> Result<Self, QuoteError> {
        Self::from_text(EMBEDDED_QUOTES)
    }

    /// One quote per non-blank line, surrounding whitespace trimmed.
    pub fn from_text(text: &str) -> Result<Self, QuoteError> {
        let quotes: Vec<String> = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_owned)
            .collect();
        if quotes.is_empty() {
            return Err(QuoteError::Empty);
        }
        Ok(Self {
            quotes,
            picker: Box::new(|len| rand::thread_rng().gen_range(0..len)),
        })
    }

    /// Replace the random index choice, e.g. with a fixed one in tests.
    /// The picker receives the number of quotes and must return an index
    /// below it; out-of-range picks wrap around.
    pub fn with_picker(mut self, picker: impl Fn(usize) -> usize + Send + Sync + 'static) -> Self {
        self.picker = Box::new(picker);
        self
    }

    pub fn quotes(&self) -> &[String] {
        &self.quotes
    }
}

impl Quoter for EmbeddedQuoter {
    fn quote(&self) -> String {
        let index = (self.picker)(self.quotes.len()) % self.quotes.len();
        self.quotes[index].clone()
    }
}

impl std::fmt::Debug for EmbeddedQuoter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddedQuoter")
            .field("quotes", &self.quotes.len())
            .finish()
    }
}
