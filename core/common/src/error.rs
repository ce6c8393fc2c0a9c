//! Common error types for GenPwd.

use thiserror::Error;

/// Top-level error type for GenPwd operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed domain object or parameter, rejected before any
    /// crypto work is attempted.
    #[error("Validation error: {0}")]
    Validation(String),

    /// AEAD tag mismatch: wrong password or corrupted ciphertext.
    /// Intentionally carries no further detail.
    #[error("Invalid password or corrupted data")]
    Authentication,

    /// Unknown format or version tag.
    #[error("Format error: {0}")]
    Format(String),

    /// Version-1 vault files require an external migration step.
    #[error("Vault file version {0} requires migration")]
    NeedsMigration(u32),

    /// Update/delete of a missing entry or group id.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Group move would make a group its own ancestor.
    #[error("Cycle: {0}")]
    Cycle(String),

    /// Breach-oracle or sync-transport failure; retryable.
    #[error("Transient network error: {0}")]
    TransientNetwork(String),

    /// Cryptographic operation failed for reasons other than
    /// authentication (bad key length, RNG failure).
    #[error("Cryptographic error: {0}")]
    Crypto(String),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether a caller may retry the failed operation.
    ///
    /// Authentication and validation failures are never retryable;
    /// automated retry logic must not hammer a wrong-password case.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::TransientNetwork(_) | Error::Io(_))
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
