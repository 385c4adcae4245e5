use std::io;
use std::num::ParseIntError;
use std::time::Duration;

use thiserror::Error;

/// Configuration errors of the work crate. Raised at construction time.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorkError {
    #[error("difficulty step must be > 0")]
    ZeroDifficultyStep,
}

/// A stamp line that does not follow the wire grammar.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum FormatError {
    #[error("invalid count of segments: {0}, expected 5 or 6")]
    SegmentCount(usize),

    #[error("invalid version: {0}")]
    Version(ParseIntError),

    #[error("invalid bits: {0}")]
    Bits(ParseIntError),

    #[error("invalid timestamp: {0}")]
    Timestamp(ParseIntError),

    #[error("empty resource")]
    EmptyResource,

    #[error("empty nonce")]
    EmptyNonce,

    #[error("empty counter")]
    EmptyCounter,

    #[error("stamp is already solved")]
    AlreadySolved,

    #[error("stamp carries no counter")]
    MissingCounter,
}

/// Rejected request to build a new stamp.
#[derive(Debug, Error)]
pub enum StampError {
    #[error("resource can't be empty")]
    EmptyResource,

    #[error("difficulty has to be > 0")]
    ZeroDifficulty,

    #[error("difficulty {0} exceeds the 256-bit hash width")]
    DifficultyTooHigh(u32),

    #[error("random source failed: {0}")]
    Random(getrandom::Error),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SolveError {
    #[error("parse stamp: {0}")]
    Format(#[from] FormatError),

    #[error("solving cancelled")]
    Cancelled,

    #[error("no counter satisfies {bits} bits")]
    Exhausted { bits: u32 },
}

/// Reasons a claimed solution is refused.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VerifyError {
    #[error("solution does not extend the issued challenge")]
    PrefixMismatch,

    #[error("parse solution: {0}")]
    Format(#[from] FormatError),

    #[error("expired stamp: {age:?} old, window {window:?}")]
    Expired { age: Duration, window: Duration },

    #[error("hash lacks {bits} leading zero bits")]
    InsufficientWork { bits: u32 },
}

/// Failure of one challenge round trip, tagged with the stage it hit.
#[derive(Debug, Error)]
pub enum ChallengeError {
    #[error("build stamp: {0}")]
    Build(#[from] StampError),

    #[error("write challenge: {0}")]
    SendChallenge(#[source] io::Error),

    #[error("read solution: {0}")]
    ReadSolution(#[source] io::Error),

    #[error("verify solution: {0}")]
    Verify(#[from] VerifyError),
}

impl ChallengeError {
    /// Short name of the failing stage, for logs.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Build(_) => "build",
            Self::SendChallenge(_) => "send_challenge",
            Self::ReadSolution(_) => "read_solution",
            Self::Verify(_) => "verify",
        }
    }
}
