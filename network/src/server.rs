//! TCP accept loop and per-connection lifecycle.
//!
//! Every accepted connection runs in its own task:
//!
//! ```text
//! Accepted -> LoadRegistered -> ChallengeSent -> SolutionPending
//!          -> Verified -> PayloadSent -> Closed
//! ```
//!
//! Any failure after `Accepted` moves to `Failed` and then `Closed`. The
//! peer never sees why; it only sees the connection close without a quote.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncWriteExt, BufStream};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::task::{JoinError, JoinSet};
use tokio::time::timeout;
use tracing::{debug, error, info, trace, warn};
use wow_bucket::{Load, TokenBucket};
use wow_quotes::{EmbeddedQuoter, Quoter};
use wow_work::{ChallengePhase, Challenger, HashcashChallenger, LoadDifficulty};

use crate::config::ServerConfig;
use crate::error::{ConnectionError, NetworkError};

/// Where a connection is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Accepted,
    LoadRegistered,
    ChallengeSent,
    SolutionPending,
    Verified,
    PayloadSent,
    Failed,
    Closed,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::LoadRegistered => "load_registered",
            Self::ChallengeSent => "challenge_sent",
            Self::SolutionPending => "solution_pending",
            Self::Verified => "verified",
            Self::PayloadSent => "payload_sent",
            Self::Failed => "failed",
            Self::Closed => "closed",
        }
    }
}

impl From<ChallengePhase> for ConnectionState {
    fn from(phase: ChallengePhase) -> Self {
        match phase {
            ChallengePhase::Issuing => Self::LoadRegistered,
            ChallengePhase::Sent => Self::ChallengeSent,
            ChallengePhase::Received => Self::SolutionPending,
            ChallengePhase::Verified => Self::Verified,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a connection ended.
#[derive(Debug)]
struct Outcome {
    /// `PayloadSent` on success, otherwise the last state before `Failed`.
    reached: ConnectionState,
    error: Option<ConnectionError>,
}

/// Shared by every connection task.
struct ConnectionHandler {
    load: Arc<dyn Load>,
    challenger: Arc<dyn Challenger>,
    quoter: Arc<dyn Quoter>,
    deadline: Duration,
}

impl ConnectionHandler {
    /// Drive one connection to `Closed`.
    async fn handle(&self, stream: TcpStream, peer: SocketAddr) -> Outcome {
        let overflow = self.load.draw(1);
        trace!(peer = %peer, overflow, state = %ConnectionState::LoadRegistered, "load registered");

        let mut conn = BufStream::new(stream);
        let mut phase = ChallengePhase::default();
        let result = match timeout(self.deadline, self.exchange(peer, &mut conn, &mut phase)).await
        {
            Ok(result) => result,
            Err(_) => Err(ConnectionError::Deadline(self.deadline)),
        };

        let outcome = match result {
            Ok(()) => {
                debug!(peer = %peer, "quote delivered");
                Outcome {
                    reached: ConnectionState::PayloadSent,
                    error: None,
                }
            }
            Err(e) => {
                let stage = e.stage();
                let reached = ConnectionState::from(phase);
                match &e {
                    ConnectionError::WritePayload(_) => {
                        error!(peer = %peer, stage, reached = %reached, "connection failed: {e}")
                    }
                    _ => warn!(peer = %peer, stage, reached = %reached, "connection failed: {e}"),
                }
                Outcome {
                    reached,
                    error: Some(e),
                }
            }
        };

        if let Err(e) = conn.shutdown().await {
            trace!(peer = %peer, "shutdown after {}: {e}", outcome.reached);
        }
        trace!(peer = %peer, state = %ConnectionState::Closed, "connection closed");
        outcome
    }

    async fn exchange(
        &self,
        peer: SocketAddr,
        conn: &mut BufStream<TcpStream>,
        phase: &mut ChallengePhase,
    ) -> Result<(), ConnectionError> {
        self.challenger.challenge(peer, &mut *conn, phase).await?;
        trace!(peer = %peer, state = %ConnectionState::Verified, "solution verified");

        let quote = self.quoter.quote();
        conn.write_all(quote.as_bytes())
            .await
            .map_err(ConnectionError::WritePayload)?;
        conn.flush().await.map_err(ConnectionError::WritePayload)?;
        Ok(())
    }
}

/// The word-of-wisdom server.
pub struct Server {
    listen_addr: String,
    accept_poll: Duration,
    handler: Arc<ConnectionHandler>,
}

impl Server {
    /// Assemble a server from its collaborators. `load` must be the same
    /// tracker the challenger's difficulty policy samples.
    pub fn new(
        config: &ServerConfig,
        load: Arc<dyn Load>,
        challenger: Arc<dyn Challenger>,
        quoter: Arc<dyn Quoter>,
    ) -> Result<Self, NetworkError> {
        config.validate()?;
        Ok(Self {
            listen_addr: config.listen_addr.clone(),
            accept_poll: config.accept_poll(),
            handler: Arc::new(ConnectionHandler {
                load,
                challenger,
                quoter,
                deadline: config.connection_timeout(),
            }),
        })
    }

    /// Wire up the production stack: a token bucket, the load-based
    /// difficulty policy, hashcash challenges and the embedded quotes.
    pub fn from_config(config: &ServerConfig) -> Result<Self, NetworkError> {
        config.validate()?;

        let bucket = Arc::new(TokenBucket::new(config.bucket_rate, config.bucket_capacity));
        let difficulty = LoadDifficulty::new(bucket.clone(), config.difficulty_step)?;
        let challenger =
            HashcashChallenger::new(Arc::new(difficulty), config.challenge_expiration())
                .with_max_line_len(config.max_line_len);
        let quoter = EmbeddedQuoter::new()?;

        info!(
            rate = config.bucket_rate,
            capacity = config.bucket_capacity,
            step = config.difficulty_step,
            "load tracker configured"
        );
        Self::new(config, bucket, Arc::new(challenger), Arc::new(quoter))
    }

    pub fn listen_addr(&self) -> &str {
        &self.listen_addr
    }

    /// Bind the configured address and serve until `shutdown` fires.
    pub async fn run(self, shutdown: broadcast::Receiver<()>) -> Result<(), NetworkError> {
        let listener = TcpListener::bind(&self.listen_addr)
            .await
            .map_err(|source| NetworkError::Bind {
                addr: self.listen_addr.clone(),
                source,
            })?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` fires, then
    /// wait for every in-flight connection to finish.
    pub async fn serve(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), NetworkError> {
        let local = listener.local_addr()?;
        info!(addr = %local, "listening");

        let mut connections = JoinSet::new();
        loop {
            while let Some(joined) = connections.try_join_next() {
                reap(joined);
            }

            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    info!("shutdown requested, no longer accepting");
                    break;
                }
                accepted = timeout(self.accept_poll, listener.accept()) => {
                    match accepted {
                        Err(_) => continue,
                        Ok(Ok((stream, peer))) => {
                            trace!(
                                peer = %peer,
                                state = %ConnectionState::Accepted,
                                "connection accepted"
                            );
                            let handler = Arc::clone(&self.handler);
                            connections.spawn(async move { handler.handle(stream, peer).await });
                        }
                        Ok(Err(e)) => warn!("accept failed: {e}"),
                    }
                }
            }
        }

        drop(listener);
        if !connections.is_empty() {
            info!(in_flight = connections.len(), "draining connections");
        }
        while let Some(joined) = connections.join_next().await {
            reap(joined);
        }
        info!("server stopped");
        Ok(())
    }
}

fn reap(joined: Result<Outcome, JoinError>) {
    match joined {
        Ok(outcome) => trace!(
            reached = %outcome.reached,
            failed = outcome.error.is_some(),
            "connection task finished"
        ),
        Err(e) if e.is_panic() => error!("connection task panicked: {e}"),
        Err(_) => {}
    }
}
