//! Shared utilities for the word-of-wisdom services.

pub mod clock;
pub mod logging;

pub use clock::{Clock, SystemClock};
pub use logging::{init_logging, LogFormat};
