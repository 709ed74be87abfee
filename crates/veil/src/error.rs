//! Error types for the Vault.
//!
//! Internally every failure keeps its cause. At the API boundary,
//! [`VaultError::to_api`] folds "not found", "not allowed" and "expired"
//! into one answer so a caller cannot learn whether a node exists when it
//! has no access to it.

use thiserror::Error;
use veil_core::CoreError;
use veil_perms::PermsError;
use veil_store::StoreError;

/// Errors that can occur during Vault operations.
#[derive(Debug, Error)]
pub enum VaultError {
    /// Authenticated decryption failed.
    #[error("integrity check failed")]
    Integrity,

    /// The caller's access level is too low for the operation.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The node, grant or principal does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The move would place a node under itself or a descendant.
    #[error("move rejected: would create a cycle")]
    CycleRejected,

    /// The only grant that would have applied has expired.
    #[error("grant has expired")]
    ExpiredGrant,

    /// Malformed request (wrong node kind, password on a user grant, ...).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(StoreError),

    /// Permission-layer error.
    #[error("permission error: {0}")]
    Perms(PermsError),
}

impl From<StoreError> for VaultError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(what) => VaultError::NotFound(what),
            StoreError::Cycle(_) => VaultError::CycleRejected,
            other => VaultError::Store(other),
        }
    }
}

impl From<PermsError> for VaultError {
    fn from(e: PermsError) -> Self {
        match e {
            PermsError::Core(CoreError::Integrity) => VaultError::Integrity,
            PermsError::PermissionDenied(why) => VaultError::PermissionDenied(why),
            PermsError::NoKeyPath(node) => VaultError::PermissionDenied(format!("no key path to {node}")),
            PermsError::PasswordRejected => VaultError::PermissionDenied("password rejected".into()),
            PermsError::GrantExpired(_) => VaultError::ExpiredGrant,
            other => VaultError::Perms(other),
        }
    }
}

impl From<CoreError> for VaultError {
    fn from(e: CoreError) -> Self {
        PermsError::from(e).into()
    }
}

/// What callers outside the vault see.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// No such node, or no access to it. Deliberately one variant.
    #[error("not found")]
    NotFound,

    #[error("move would create a cycle")]
    CycleRejected,

    #[error("integrity check failed")]
    Integrity,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("internal error")]
    Internal,
}

impl VaultError {
    /// Map to the error a remote caller is allowed to see.
    pub fn to_api(&self) -> ApiError {
        match self {
            VaultError::NotFound(_) | VaultError::PermissionDenied(_) | VaultError::ExpiredGrant => {
                ApiError::NotFound
            }
            VaultError::CycleRejected => ApiError::CycleRejected,
            VaultError::Integrity => ApiError::Integrity,
            VaultError::InvalidRequest(why) => ApiError::InvalidRequest(why.clone()),
            VaultError::Store(e) => {
                tracing::warn!(error = %e, "storage failure at api boundary");
                ApiError::Internal
            }
            VaultError::Perms(e) => {
                tracing::warn!(error = %e, "permission-layer failure at api boundary");
                ApiError::Internal
            }
        }
    }

    /// Whether this failure is a denial of any flavour.
    pub fn is_denial(&self) -> bool {
        matches!(
            self,
            VaultError::NotFound(_) | VaultError::PermissionDenied(_) | VaultError::ExpiredGrant
        )
    }
}

/// Result type for Vault operations.
pub type Result<T> = std::result::Result<T, VaultError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_denials_collapse_at_boundary() {
        let errors = [
            VaultError::NotFound("node".into()),
            VaultError::PermissionDenied("viewer".into()),
            VaultError::ExpiredGrant,
        ];
        for e in errors {
            assert!(e.is_denial());
            assert_eq!(e.to_api(), ApiError::NotFound);
        }
    }

    #[test]
    fn test_store_errors_map_to_vault_errors() {
        assert!(matches!(
            VaultError::from(StoreError::Cycle("x".into())),
            VaultError::CycleRejected
        ));
        assert!(matches!(
            VaultError::from(StoreError::NotFound("x".into())),
            VaultError::NotFound(_)
        ));
        assert_eq!(
            VaultError::from(StoreError::Conflict("x".into())).to_api(),
            ApiError::Internal
        );
    }

    #[test]
    fn test_integrity_surfaces_unchanged() {
        let e = VaultError::from(PermsError::Core(CoreError::Integrity));
        assert!(matches!(e, VaultError::Integrity));
        assert_eq!(e.to_api(), ApiError::Integrity);
        assert!(matches!(VaultError::from(CoreError::Integrity), VaultError::Integrity));
    }

    #[test]
    fn test_missing_key_path_is_a_denial() {
        let e = VaultError::from(PermsError::NoKeyPath("abc".into()));
        assert!(e.is_denial());
    }
}
