//! Hashcash stamp format, creation and verification.
//!
//! The solved stamp is the unsolved line with one more delimited field
//! appended, so a solution can be checked against the issued challenge by
//! a plain byte-prefix comparison.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine as _;
use sha2::{Digest, Sha256};

use crate::error::{FormatError, StampError, VerifyError};

/// Stamp format version.
pub const VERSION: u32 = 1;

/// Field separator. Never produced by the URL-safe base64 alphabet.
pub const DELIMITER: u8 = b':';

/// Random bytes per stamp.
pub const NONCE_LEN: usize = 16;

/// Width of a SHA-256 digest in bits; no stamp can demand more.
pub const MAX_BITS: u32 = 256;

const UNSOLVED_SEGMENTS: usize = 5;
const SOLVED_SEGMENTS: usize = 6;

/// A parsed stamp. Binary fields are kept in their base64 wire form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stamp {
    version: u32,
    bits: u32,
    timestamp: u64,
    resource: Vec<u8>,
    nonce: Vec<u8>,
    counter: Option<Vec<u8>>,
}

impl Stamp {
    /// Parse a 5-field (unsolved) or 6-field (solved) stamp line.
    pub fn parse(line: &[u8]) -> Result<Self, FormatError> {
        let segments: Vec<&[u8]> = line.split(|b| *b == DELIMITER).collect();
        if segments.len() != UNSOLVED_SEGMENTS && segments.len() != SOLVED_SEGMENTS {
            return Err(FormatError::SegmentCount(segments.len()));
        }

        let version = number(segments[0]).map_err(FormatError::Version)?;
        let bits = number(segments[1]).map_err(FormatError::Bits)?;
        let timestamp = number(segments[2]).map_err(FormatError::Timestamp)?;

        let resource = segments[3];
        if resource.is_empty() {
            return Err(FormatError::EmptyResource);
        }
        let nonce = segments[4];
        if nonce.is_empty() {
            return Err(FormatError::EmptyNonce);
        }
        let counter = match segments.get(5) {
            Some(c) if c.is_empty() => return Err(FormatError::EmptyCounter),
            Some(c) => Some(c.to_vec()),
            None => None,
        };

        Ok(Self {
            version,
            bits,
            timestamp,
            resource: resource.to_vec(),
            nonce: nonce.to_vec(),
            counter,
        })
    }

    /// Wire form of the stamp, without a trailing newline.
    pub fn encode(&self) -> Vec<u8> {
        let version = self.version.to_string();
        let bits = self.bits.to_string();
        let timestamp = self.timestamp.to_string();

        let mut fields: Vec<&[u8]> = vec![
            version.as_bytes(),
            bits.as_bytes(),
            timestamp.as_bytes(),
            self.resource.as_slice(),
            self.nonce.as_slice(),
        ];
        if let Some(counter) = &self.counter {
            fields.push(counter.as_slice());
        }
        fields.join(&DELIMITER)
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// Required leading zero bits.
    pub fn bits(&self) -> u32 {
        self.bits
    }

    /// Creation time in Unix seconds.
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Decoded resource bytes.
    pub fn resource(&self) -> Result<Vec<u8>, base64::DecodeError> {
        URL_SAFE.decode(&self.resource)
    }

    /// Decoded counter, if the stamp is solved and the counter is 4 bytes.
    pub fn counter(&self) -> Option<u32> {
        let raw = URL_SAFE.decode(self.counter.as_ref()?).ok()?;
        Some(u32::from_le_bytes(raw.try_into().ok()?))
    }

    pub fn is_solved(&self) -> bool {
        self.counter.is_some()
    }
}

/// Build a fresh unsolved stamp for `resource` at time `now`.
pub fn build(resource: &[u8], difficulty: u32, now: SystemTime) -> Result<Vec<u8>, StampError> {
    if resource.is_empty() {
        return Err(StampError::EmptyResource);
    }
    if difficulty == 0 {
        return Err(StampError::ZeroDifficulty);
    }
    if difficulty > MAX_BITS {
        return Err(StampError::DifficultyTooHigh(difficulty));
    }

    let mut nonce = [0u8; NONCE_LEN];
    getrandom::getrandom(&mut nonce).map_err(StampError::Random)?;

    let stamp = Stamp {
        version: VERSION,
        bits: difficulty,
        timestamp: unix_secs(now).as_secs(),
        resource: URL_SAFE.encode(resource).into_bytes(),
        nonce: URL_SAFE.encode(nonce).into_bytes(),
        counter: None,
    };
    Ok(stamp.encode())
}

/// Check a claimed `solution` against the `challenge` that was issued.
///
/// In order: the solution must extend the challenge byte for byte, parse
/// as a solved stamp, be no older than `expiration` at `now`, and hash to
/// at least the stamp's number of leading zero bits.
pub fn verify(
    solution: &[u8],
    challenge: &[u8],
    expiration: Duration,
    now: SystemTime,
) -> Result<Stamp, VerifyError> {
    if !solution.starts_with(challenge) {
        return Err(VerifyError::PrefixMismatch);
    }

    let stamp = Stamp::parse(solution)?;
    if !stamp.is_solved() {
        return Err(FormatError::MissingCounter.into());
    }

    let age = unix_secs(now).saturating_sub(Duration::from_secs(stamp.timestamp));
    if age > expiration {
        return Err(VerifyError::Expired {
            age,
            window: expiration,
        });
    }

    let hash = Sha256::digest(solution);
    if !has_leading_zero_bits(&hash, stamp.bits) {
        return Err(VerifyError::InsufficientWork { bits: stamp.bits });
    }

    Ok(stamp)
}

/// Whether the first `n` bits of `hash` are all zero.
///
/// Whole bytes must be zero; for a trailing partial byte only its top
/// `n % 8` bits are inspected.
pub fn has_leading_zero_bits(hash: &[u8], n: u32) -> bool {
    let full = (n / 8) as usize;
    let rest = n % 8;
    let needed = full + usize::from(rest > 0);
    if hash.len() < needed {
        return false;
    }
    if hash[..full].iter().any(|b| *b != 0) {
        return false;
    }
    rest == 0 || hash[full] >> (8 - rest) == 0
}

fn number<T: std::str::FromStr<Err = std::num::ParseIntError>>(
    field: &[u8],
) -> Result<T, std::num::ParseIntError> {
    String::from_utf8_lossy(field).parse()
}

fn unix_secs(now: SystemTime) -> Duration {
    now.duration_since(UNIX_EPOCH).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::solve;

    fn at(secs: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(secs)
    }

    fn is_unsolved_shape(line: &[u8], bits: u32) -> bool {
        let text = std::str::from_utf8(line).unwrap();
        let parts: Vec<&str> = text.split(':').collect();
        parts.len() == 5
            && parts[0] == "1"
            && parts[1] == bits.to_string()
            && parts[2].chars().all(|c| c.is_ascii_digit())
            && !parts[3].is_empty()
            && !parts[4].is_empty()
    }

    #[test]
    fn build_produces_five_fields() {
        let stamp = build(b"new", 10, at(1_705_962_838)).unwrap();
        assert!(is_unsolved_shape(&stamp, 10));

        let parsed = Stamp::parse(&stamp).unwrap();
        assert_eq!(parsed.version(), VERSION);
        assert_eq!(parsed.bits(), 10);
        assert_eq!(parsed.timestamp(), 1_705_962_838);
        assert_eq!(parsed.resource().unwrap(), b"new");
        assert!(!parsed.is_solved());
        assert_eq!(parsed.encode(), stamp);
    }

    #[test]
    fn build_uses_fresh_nonce() {
        let a = build(b"peer", 4, at(100)).unwrap();
        let b = build(b"peer", 4, at(100)).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn build_rejects_bad_input() {
        assert!(matches!(build(b"", 10, at(1)), Err(StampError::EmptyResource)));
        assert!(matches!(build(b"x", 0, at(1)), Err(StampError::ZeroDifficulty)));
        assert!(matches!(build(b"x", 257, at(1)), Err(StampError::DifficultyTooHigh(257))));
    }

    #[test]
    fn solve_then_verify() {
        let now = at(1_705_962_838);
        let challenge = build(b"new", 10, now).unwrap();
        let solved = solve(&challenge).unwrap();

        assert!(solved.starts_with(&challenge));
        assert_eq!(solved[challenge.len()], DELIMITER);
        let parsed = Stamp::parse(&solved).unwrap();
        assert!(parsed.is_solved());
        assert!(parsed.counter().is_some());

        let verified = verify(&solved, &challenge, Duration::from_secs(20), now).unwrap();
        assert_eq!(verified.bits(), 10);
    }

    #[test]
    fn expired_solution_is_rejected() {
        let issued = at(1_000);
        let challenge = build(b"new", 8, issued).unwrap();
        let solved = solve(&challenge).unwrap();

        let window = Duration::from_secs(3);
        assert!(verify(&solved, &challenge, window, at(1_003)).is_ok());
        assert_eq!(
            verify(&solved, &challenge, window, at(1_004)),
            Err(VerifyError::Expired {
                age: Duration::from_secs(4),
                window,
            })
        );
    }

    #[test]
    fn future_timestamp_is_not_expired() {
        let challenge = build(b"new", 4, at(2_000)).unwrap();
        let solved = solve(&challenge).unwrap();
        assert!(verify(&solved, &challenge, Duration::ZERO, at(1_000)).is_ok());
    }

    #[test]
    fn unrelated_stamp_is_rejected() {
        let now = at(1_705_962_838);
        let challenge = build(b"new", 10, now).unwrap();
        let other = build(b"new", 10, now).unwrap();
        let solved_other = solve(&other).unwrap();

        assert_eq!(
            verify(&solved_other, &challenge, Duration::from_secs(20), now),
            Err(VerifyError::PrefixMismatch)
        );
    }

    #[test]
    fn hand_written_zero_bit_stamp_is_rejected() {
        let challenge = build(b"new", 10, at(1_705_962_838)).unwrap();
        let forged = b"1:0:1705962838:bmV3:Bod8ozrlUcqUImyR2swBuQ==:SwAAAA==";
        assert_eq!(
            verify(forged, &challenge, Duration::from_secs(1), at(1_705_962_838)),
            Err(VerifyError::PrefixMismatch)
        );
    }

    #[test]
    fn unsolved_echo_is_a_format_error() {
        let now = at(50);
        let challenge = build(b"new", 4, now).unwrap();
        assert_eq!(
            verify(&challenge, &challenge, Duration::from_secs(5), now),
            Err(VerifyError::Format(FormatError::MissingCounter))
        );
    }

    #[test]
    fn wrong_counter_lacks_work() {
        let now = at(50);
        let challenge = build(b"new", 24, now).unwrap();
        let solution = (0u32..64)
            .map(|counter| {
                let mut solution = challenge.clone();
                solution.push(DELIMITER);
                solution.extend_from_slice(URL_SAFE.encode(counter.to_le_bytes()).as_bytes());
                solution
            })
            .find(|solution| !has_leading_zero_bits(&Sha256::digest(solution), 24))
            .expect("64 counters cannot all carry 24 bits of work");

        assert_eq!(
            verify(&solution, &challenge, Duration::from_secs(5), now),
            Err(VerifyError::InsufficientWork { bits: 24 })
        );
    }

    #[test]
    fn parse_reports_each_malformed_field() {
        assert_eq!(Stamp::parse(b"invalidhash"), Err(FormatError::SegmentCount(1)));
        assert_eq!(Stamp::parse(b""), Err(FormatError::SegmentCount(1)));
        assert_eq!(Stamp::parse(b"1:2:3:4:5:6:7"), Err(FormatError::SegmentCount(7)));
        assert!(matches!(Stamp::parse(b"x:2:3:a:b"), Err(FormatError::Version(_))));
        assert!(matches!(Stamp::parse(b"1:-2:3:a:b"), Err(FormatError::Bits(_))));
        assert!(matches!(Stamp::parse(b"1:2:t:a:b"), Err(FormatError::Timestamp(_))));
        assert_eq!(Stamp::parse(b"1:2:3::b"), Err(FormatError::EmptyResource));
        assert_eq!(Stamp::parse(b"1:2:3:a:"), Err(FormatError::EmptyNonce));
        assert_eq!(Stamp::parse(b"1:2:3:a:b:"), Err(FormatError::EmptyCounter));
        assert!(matches!(Stamp::parse(b"1:2:\xff:a:b"), Err(FormatError::Timestamp(_))));
    }

    #[test]
    fn leading_zero_bits_are_exact() {
        assert!(has_leading_zero_bits(&[0xff], 0));
        assert!(has_leading_zero_bits(&[], 0));

        assert!(has_leading_zero_bits(&[0x00, 0x00, 0x3f], 18));
        assert!(!has_leading_zero_bits(&[0x00, 0x00, 0x3f], 19));
        assert!(!has_leading_zero_bits(&[0x00, 0x00, 0x40], 18));

        // Byte-granular counting would accept these; the bit test must not.
        assert!(!has_leading_zero_bits(&[0x00, 0x80], 10));
        assert!(has_leading_zero_bits(&[0x00, 0x20], 10));
        assert!(!has_leading_zero_bits(&[0x01, 0x00], 8));

        assert!(has_leading_zero_bits(&[0x00, 0x00], 16));
        assert!(!has_leading_zero_bits(&[0x00, 0x00], 17));
        assert!(!has_leading_zero_bits(&[0u8; 32], 257));
        assert!(has_leading_zero_bits(&[0u8; 32], 256));
    }
}
