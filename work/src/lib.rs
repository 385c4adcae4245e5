//! Admission proof-of-work.
//!
//! The client gets a hashcash stamp and must extend it with a counter
//! so that the SHA-256 of the result has enough leading zero bits. The number of bits follows
//! server load, so flooding gets more expensive the harder it is tried.
//!
//! Wire form of a stamp (one line, colon separated):
//!
//! ```text
//! version:bits:timestamp:base64(resource):base64(nonce)[:base64(counter)]
//! ```

pub mod challenger;
pub mod difficulty;
pub mod error;
pub mod solver;
pub mod stamp;
pub mod transport;

pub use challenger::{ChallengePhase, Challenger, HashcashChallenger};
pub use difficulty::{Difficulty, LoadDifficulty, BASE_DIFFICULTY};
pub use error::{ChallengeError, FormatError, SolveError, StampError, VerifyError, WorkError};
pub use solver::{solve, solve_parallel, solve_until};
pub use stamp::{build, has_leading_zero_bits, verify, Stamp};
pub use transport::{read_line, write_line, Transport, DEFAULT_MAX_LINE_LEN};
