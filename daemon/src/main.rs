//! wow-server: serves quotes to clients that solve a proof-of-work challenge.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use wow_network::{Server, ServerConfig, ShutdownController};
use wow_utils::{init_logging, LogFormat};

#[derive(Parser)]
#[command(name = "wow-server", about = "Word-of-wisdom quote server behind hashcash")]
struct Cli {
    /// Address to listen on, e.g. "0.0.0.0:8080".
    #[arg(long, env = "WOW_LISTEN_ADDR")]
    listen_addr: Option<String>,

    /// Milliseconds a client has to return a solved stamp.
    #[arg(long, env = "WOW_CHALLENGE_EXPIRATION_MS")]
    challenge_expiration_ms: Option<u64>,

    /// Milliseconds a whole connection may take, from accept to quote.
    #[arg(long, env = "WOW_CONNECTION_TIMEOUT_MS")]
    connection_timeout_ms: Option<u64>,

    /// Longest single accept wait before re-checking for shutdown.
    #[arg(long, env = "WOW_ACCEPT_POLL_MS")]
    accept_poll_ms: Option<u64>,

    /// Load tracker refill rate, connections per second.
    #[arg(long, env = "WOW_BUCKET_RATE")]
    bucket_rate: Option<u32>,

    /// Connections absorbed before difficulty starts to rise.
    #[arg(long, env = "WOW_BUCKET_CAPACITY")]
    bucket_capacity: Option<u32>,

    /// Overflow points per extra bit of difficulty. Must be positive.
    #[arg(long, env = "WOW_DIFFICULTY_STEP")]
    difficulty_step: Option<u32>,

    /// Longest solution line accepted from a client, in bytes.
    #[arg(long, env = "WOW_MAX_LINE_LEN")]
    max_line_len: Option<usize>,

    /// Log format: "human" or "json".
    #[arg(long, env = "WOW_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "WOW_LOG_LEVEL")]
    log_level: Option<String>,

    /// Path to a TOML configuration file. If provided, file settings
    /// are used as the base; CLI flags and env vars override them.
    #[arg(long)]
    config: Option<PathBuf>,
}

impl Cli {
    fn into_config(self) -> anyhow::Result<ServerConfig> {
        let base = match &self.config {
            Some(path) => ServerConfig::from_toml_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => ServerConfig::default(),
        };

        Ok(ServerConfig {
            listen_addr: self.listen_addr.unwrap_or(base.listen_addr),
            challenge_expiration_ms: self
                .challenge_expiration_ms
                .unwrap_or(base.challenge_expiration_ms),
            connection_timeout_ms: self
                .connection_timeout_ms
                .unwrap_or(base.connection_timeout_ms),
            accept_poll_ms: self.accept_poll_ms.unwrap_or(base.accept_poll_ms),
            bucket_rate: self.bucket_rate.unwrap_or(base.bucket_rate),
            bucket_capacity: self.bucket_capacity.unwrap_or(base.bucket_capacity),
            difficulty_step: self.difficulty_step.unwrap_or(base.difficulty_step),
            max_line_len: self.max_line_len.unwrap_or(base.max_line_len),
            log_format: self.log_format.unwrap_or(base.log_format),
            log_level: self.log_level.unwrap_or(base.log_level),
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let from_file = cli.config.clone();
    let config = cli.into_config()?;

    init_logging(config.log_format, &config.log_level);
    if let Some(path) = from_file {
        tracing::info!("loaded config from {}", path.display());
    }
    config.validate().context("invalid configuration")?;

    let shutdown = Arc::new(ShutdownController::new());
    let shutdown_rx = shutdown.subscribe();
    let signals = Arc::clone(&shutdown);
    tokio::spawn(async move {
        if let Err(e) = signals.wait_for_signal().await {
            tracing::error!("cannot listen for shutdown signals: {e}");
        }
    });

    tracing::info!(
        addr = %config.listen_addr,
        expiration_ms = config.challenge_expiration_ms,
        timeout_ms = config.connection_timeout_ms,
        "starting word-of-wisdom server"
    );
    let server = Server::from_config(&config)?;
    server.run(shutdown_rx).await?;

    tracing::info!("wow-server exited cleanly");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn flags_override_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "bucket_capacity = 7\ndifficulty_step = 3").unwrap();

        let cli = Cli::parse_from([
            "wow-server",
            "--config",
            file.path().to_str().unwrap(),
            "--difficulty-step",
            "9",
        ]);
        let config = cli.into_config().unwrap();
        assert_eq!(config.bucket_capacity, 7);
        assert_eq!(config.difficulty_step, 9);
        assert_eq!(config.listen_addr, "0.0.0.0:8080");
    }

    #[test]
    fn no_file_means_defaults() {
        let cli = Cli::parse_from(["wow-server", "--log-format", "json"]);
        let config = cli.into_config().unwrap();
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.connection_timeout_ms, 10_000);
    }

    #[test]
    fn unreadable_file_is_an_error() {
        let cli = Cli::parse_from(["wow-server", "--config", "/nonexistent/wow.toml"]);
        assert!(cli.into_config().is_err());
    }
}
