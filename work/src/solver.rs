//! Brute-force stamp solving (client side).
//!
//! The search has no time bound of its own. Callers that need one run it
//! on a blocking worker and flip the cancellation flag when they give up.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine as _;
use rayon::prelude::*;
use sha2::{Digest, Sha256};

use crate::error::{FormatError, SolveError};
use crate::stamp::{has_leading_zero_bits, Stamp, DELIMITER, MAX_BITS};

/// Attempts between two checks of the cancellation flag.
const BATCH_SIZE: u64 = 4096;

/// Counter values available to a solver.
const COUNTER_SPACE: u64 = u32::MAX as u64 + 1;

const NOT_FOUND: u64 = u64::MAX;

/// Solve `challenge` by trying counters 0, 1, 2, … in order.
pub fn solve(challenge: &[u8]) -> Result<Vec<u8>, SolveError> {
    solve_until(challenge, &AtomicBool::new(false))
}

/// Like [`solve`], giving up with [`SolveError::Cancelled`] once `cancel`
/// is set.
pub fn solve_until(challenge: &[u8], cancel: &AtomicBool) -> Result<Vec<u8>, SolveError> {
    let bits = unsolved_bits(challenge)?;
    let prefix = prefix_hasher(challenge);

    for counter in 0..COUNTER_SPACE {
        if counter % BATCH_SIZE == 0 && cancel.load(Ordering::Relaxed) {
            return Err(SolveError::Cancelled);
        }
        if let Some(encoded) = attempt(&prefix, counter, bits) {
            return Ok(append_counter(challenge, &encoded));
        }
    }
    Err(SolveError::Exhausted { bits })
}

/// Solve `challenge` on every thread of the current rayon pool.
///
/// Worker `i` of `n` tries counters `i, i + n, i + 2n, …`; the first hit
/// stops the others. The winning counter is not necessarily the smallest.
pub fn solve_parallel(challenge: &[u8], cancel: &AtomicBool) -> Result<Vec<u8>, SolveError> {
    let bits = unsolved_bits(challenge)?;
    let prefix = prefix_hasher(challenge);
    let found = AtomicU64::new(NOT_FOUND);
    let workers = rayon::current_num_threads().max(1) as u64;

    (0..workers).into_par_iter().for_each(|worker| {
        let mut counter = worker;
        while counter < COUNTER_SPACE {
            if found.load(Ordering::Relaxed) != NOT_FOUND || cancel.load(Ordering::Relaxed) {
                return;
            }
            let end = counter.saturating_add(BATCH_SIZE * workers).min(COUNTER_SPACE);
            while counter < end {
                if attempt(&prefix, counter, bits).is_some() {
                    let _ = found.compare_exchange(
                        NOT_FOUND,
                        counter,
                        Ordering::Relaxed,
                        Ordering::Relaxed,
                    );
                    return;
                }
                counter += workers;
            }
        }
    });

    match found.load(Ordering::Relaxed) {
        NOT_FOUND if cancel.load(Ordering::Relaxed) => Err(SolveError::Cancelled),
        NOT_FOUND => Err(SolveError::Exhausted { bits }),
        counter => Ok(append_counter(challenge, &encode_counter(counter))),
    }
}

fn unsolved_bits(challenge: &[u8]) -> Result<u32, SolveError> {
    let stamp = Stamp::parse(challenge)?;
    if stamp.is_solved() {
        return Err(FormatError::AlreadySolved.into());
    }
    if stamp.bits() > MAX_BITS {
        return Err(SolveError::Exhausted { bits: stamp.bits() });
    }
    Ok(stamp.bits())
}

/// Hasher already fed with `challenge ‖ ':'`.
fn prefix_hasher(challenge: &[u8]) -> Sha256 {
    let mut hasher = Sha256::new();
    hasher.update(challenge);
    hasher.update([DELIMITER]);
    hasher
}

fn attempt(prefix: &Sha256, counter: u64, bits: u32) -> Option<String> {
    let encoded = encode_counter(counter);
    let mut hasher = prefix.clone();
    hasher.update(encoded.as_bytes());
    has_leading_zero_bits(&hasher.finalize(), bits).then_some(encoded)
}

/// Base64 of the counter as 4 little-endian bytes. `counter` is always
/// below [`COUNTER_SPACE`].
fn encode_counter(counter: u64) -> String {
    let bytes = (counter as u32).to_le_bytes();
    URL_SAFE.encode(bytes)
}

fn append_counter(challenge: &[u8], encoded: &str) -> Vec<u8> {
    let mut solved = Vec::with_capacity(challenge.len() + 1 + encoded.len());
    solved.extend_from_slice(challenge);
    solved.push(DELIMITER);
    solved.extend_from_slice(encoded.as_bytes());
    solved
}
