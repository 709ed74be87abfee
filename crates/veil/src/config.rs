//! Vault configuration.

use serde::{Deserialize, Serialize};
use veil_core::KdfParams;

/// Configuration for a [`Vault`](crate::Vault).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// Argon2id cost for principal passwords.
    pub principal_kdf: KdfParams,
    /// Argon2id cost for link passwords.
    pub link_kdf: KdfParams,
    /// Deepest ancestor chain a request will load.
    pub max_chain_depth: usize,
    /// How many times a move commit is re-run on lock contention.
    pub max_commit_retries: u32,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            principal_kdf: KdfParams::default(),
            link_kdf: KdfParams::default(),
            max_chain_depth: 256,
            max_commit_retries: 3,
        }
    }
}

impl VaultConfig {
    /// Cheap KDF settings for tests. Never use these for real passwords.
    pub fn insecure_fast() -> Self {
        Self {
            principal_kdf: KdfParams::insecure_fast(),
            link_kdf: KdfParams::insecure_fast(),
            ..Self::default()
        }
    }

    /// Parse from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
