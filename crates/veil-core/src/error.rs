//! Error types for Veil Core.

use thiserror::Error;

/// Errors raised by the primitive layer.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Authenticated decryption failed: wrong key, wrong nonce, or tampered
    /// ciphertext. Never retried with the same inputs.
    #[error("integrity check failed")]
    Integrity,

    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("invalid key material: {0}")]
    InvalidKey(String),

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("decoding error: {0}")]
    Decoding(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
