//! One hashcash round trip over a connection.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;
use wow_utils::{Clock, SystemClock};

use crate::difficulty::Difficulty;
use crate::error::ChallengeError;
use crate::stamp;
use crate::transport::{read_line, write_line, Transport, DEFAULT_MAX_LINE_LEN};

/// How far a challenge got. Written by the challenger as each step
/// completes, so the caller still knows it if the challenge future is
/// dropped halfway (e.g. by a deadline).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ChallengePhase {
    /// Nothing has reached the peer yet.
    #[default]
    Issuing,
    /// The stamp was written; waiting for the peer's answer.
    Sent,
    /// An answer line arrived and is being checked.
    Received,
    /// The answer carried enough work.
    Verified,
}

/// Challenges a freshly accepted connection.
#[async_trait]
pub trait Challenger: Send + Sync {
    /// Run the challenge against `peer` over `conn`, advancing `phase` as
    /// it goes. `Ok` means the peer proved its work and may be served.
    async fn challenge(
        &self,
        peer: SocketAddr,
        conn: &mut dyn Transport,
        phase: &mut ChallengePhase,
    ) -> Result<(), ChallengeError>;
}

/// Challenges connections with a hashcash stamp bound to the peer address.
pub struct HashcashChallenger {
    difficulty: Arc<dyn Difficulty>,
    clock: Arc<dyn Clock>,
    expiration: Duration,
    max_line_len: usize,
}

impl HashcashChallenger {
    /// `expiration` is how long a client has, from stamp creation, to
    /// come back with a solution.
    pub fn new(difficulty: Arc<dyn Difficulty>, expiration: Duration) -> Self {
        Self {
            difficulty,
            clock: Arc::new(SystemClock),
            expiration,
            max_line_len: DEFAULT_MAX_LINE_LEN,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_max_line_len(mut self, max_line_len: usize) -> Self {
        self.max_line_len = max_line_len;
        self
    }

    pub fn expiration(&self) -> Duration {
        self.expiration
    }
}

#[async_trait]
impl Challenger for HashcashChallenger {
    async fn challenge(
        &self,
        peer: SocketAddr,
        conn: &mut dyn Transport,
        phase: &mut ChallengePhase,
    ) -> Result<(), ChallengeError> {
        let bits = self.difficulty.difficulty();
        let resource = peer.to_string().into_bytes();

        let challenge = stamp::build(&resource, bits, self.clock.system_time())?;
        debug!(peer = %peer, bits, "sending challenge");

        write_line(&mut *conn, &challenge)
            .await
            .map_err(ChallengeError::SendChallenge)?;
        *phase = ChallengePhase::Sent;

        debug!(peer = %peer, "waiting for solution");
        let solution = read_line(&mut *conn, self.max_line_len)
            .await
            .map_err(ChallengeError::ReadSolution)?;
        *phase = ChallengePhase::Received;

        stamp::verify(
            &solution,
            &challenge,
            self.expiration,
            self.clock.system_time(),
        )?;
        *phase = ChallengePhase::Verified;
        debug!(peer = %peer, bits, "solution accepted");

        Ok(())
    }
}
