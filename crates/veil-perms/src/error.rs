//! Error types for the permissions module.

use thiserror::Error;

/// Errors that can occur during envelope, grant and resolution work.
#[derive(Debug, Error)]
pub enum PermsError {
    /// The caller lacks the access level the operation needs.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// No grant or ownership edge leads from the requester to the node.
    #[error("no key path to node {0}")]
    NoKeyPath(String),

    /// The grant has passed its expiry.
    #[error("grant has expired: {0}")]
    GrantExpired(String),

    /// The grant record is malformed for the requested use.
    #[error("invalid grant: {0}")]
    InvalidGrant(String),

    /// A password was required and none was supplied, or it was wrong.
    #[error("password rejected")]
    PasswordRejected,

    /// Decrypted attribute bytes were not valid text.
    #[error("invalid attribute: {0}")]
    InvalidAttribute(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Core error.
    #[error(transparent)]
    Core(#[from] veil_core::CoreError),
}

impl PermsError {
    /// Whether this error is an authenticated-decryption failure.
    pub fn is_integrity(&self) -> bool {
        matches!(self, PermsError::Core(veil_core::CoreError::Integrity))
    }
}

/// Result type for permission operations.
pub type Result<T> = std::result::Result<T, PermsError>;
