use std::io;
use std::time::Duration;

use thiserror::Error;
use wow_quotes::QuoteError;
use wow_work::{ChallengeError, WorkError};

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("config error: {0}")]
    Config(String),

    #[error("bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("work error: {0}")]
    Work(#[from] WorkError),

    #[error("quote source error: {0}")]
    Quotes(#[from] QuoteError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Why a single connection was closed without a quote.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error(transparent)]
    Challenge(#[from] ChallengeError),

    #[error("write quote: {0}")]
    WritePayload(#[source] io::Error),

    #[error("connection deadline of {0:?} exceeded")]
    Deadline(Duration),
}

impl ConnectionError {
    /// Short name of the failing stage, for logs.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Challenge(e) => e.stage(),
            Self::WritePayload(_) => "write_payload",
            Self::Deadline(_) => "deadline",
        }
    }
}
