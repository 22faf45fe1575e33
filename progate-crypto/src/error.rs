//! Error types for the sealing layer.

use thiserror::Error;

/// Result type for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors that can occur in cryptographic operations.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Key derivation failed.
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    /// Encryption failed.
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// The sealed envelope failed its integrity check (tampered, truncated or corrupt).
    #[error("integrity check failed: {0}")]
    Integrity(String),

    /// The envelope is intact but was sealed under another machine's key.
    #[error("sealed data belongs to a different machine")]
    KeyMismatch,

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CryptoError {
    /// Returns true for failures that mean "this data was never ours".
    ///
    /// Hosts use this to choose between asking for reactivation and
    /// discarding the file as corrupt.
    #[must_use]
    pub fn is_foreign(&self) -> bool {
        matches!(self, Self::KeyMismatch)
    }
}
