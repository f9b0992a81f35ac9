//! Error types for relayport core library.

use thiserror::Error;

/// Result type alias using relayport Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for relayport operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}
