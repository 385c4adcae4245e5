//! wow-client: solves the server's challenge and prints the quote.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use clap::Parser;
use tokio::io::{AsyncReadExt, BufStream};
use tokio::net::TcpStream;
use tokio::time::timeout;
use wow_utils::{init_logging, LogFormat};
use wow_work::{read_line, solve_parallel, write_line, Stamp, DEFAULT_MAX_LINE_LEN};

#[derive(Parser)]
#[command(name = "wow-client", about = "Fetch a quote from a word-of-wisdom server")]
struct Cli {
    /// Server address.
    #[arg(long, default_value = "127.0.0.1:8080", env = "WOW_ADDR")]
    addr: String,

    /// Give up solving after this many milliseconds.
    #[arg(long, default_value_t = 30_000, env = "WOW_SOLVE_TIMEOUT_MS")]
    solve_timeout_ms: u64,

    /// Solver threads (defaults to one per core).
    #[arg(long, env = "WOW_THREADS")]
    threads: Option<usize>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, default_value = "warn", env = "WOW_LOG_LEVEL")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(LogFormat::Human, &cli.log_level);

    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("configuring solver threads")?;
    }

    let stream = TcpStream::connect(&cli.addr)
        .await
        .with_context(|| format!("connecting to {}", cli.addr))?;
    let mut conn = BufStream::new(stream);

    let challenge = read_line(&mut conn, DEFAULT_MAX_LINE_LEN)
        .await
        .context("reading challenge")?;
    let stamp = Stamp::parse(&challenge).context("malformed challenge")?;
    tracing::info!(bits = stamp.bits(), "solving challenge");

    let cancel = Arc::new(AtomicBool::new(false));
    let worker_cancel = Arc::clone(&cancel);
    let started = Instant::now();
    let mut solver =
        tokio::task::spawn_blocking(move || solve_parallel(&challenge, &worker_cancel));

    let limit = Duration::from_millis(cli.solve_timeout_ms);
    let solved = match timeout(limit, &mut solver).await {
        Ok(joined) => joined.context("solver task failed")??,
        Err(_) => {
            cancel.store(true, Ordering::Relaxed);
            let _ = solver.await;
            bail!("no solution within {limit:?}");
        }
    };
    tracing::info!(
        elapsed_ms = started.elapsed().as_millis() as u64,
        "challenge solved"
    );

    write_line(&mut conn, &solved)
        .await
        .context("sending solution")?;

    let mut quote = String::new();
    conn.read_to_string(&mut quote)
        .await
        .context("reading quote")?;
    if quote.is_empty() {
        bail!("server closed the connection without a quote");
    }

    println!("{quote}");
    Ok(())
}
