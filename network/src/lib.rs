//! Network side of the word-of-wisdom service.
//!
//! Accepts TCP connections, registers each one as load, challenges the
//! peer with a proof-of-work stamp and writes a quote back to peers that
//! solve it.

pub mod config;
pub mod error;
pub mod server;
pub mod shutdown;

pub use config::ServerConfig;
pub use error::{ConnectionError, NetworkError};
pub use server::{ConnectionState, Server};
pub use shutdown::ShutdownController;
