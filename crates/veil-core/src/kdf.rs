//! Password-based key derivation (Argon2id).

use argon2::{Algorithm, Argon2, Params, Version};
use rand::rngs::OsRng;
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::crypto::{SymmetricKey, KEY_SIZE};
use crate::error::{CoreError, Result};

/// Size of a KDF salt in bytes.
pub const SALT_SIZE: usize = 16;

/// A random per-password salt.
///
/// Generated once for each password a principal (or link) sets; a new
/// password always gets a new salt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Salt(pub [u8; SALT_SIZE]);

impl Salt {
    /// Generate a new random salt.
    pub fn generate() -> Self {
        let mut bytes = [0u8; SALT_SIZE];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; SALT_SIZE]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; SALT_SIZE] {
        &self.0
    }
}

impl TryFrom<&[u8]> for Salt {
    type Error = CoreError;

    fn try_from(slice: &[u8]) -> Result<Self> {
        let arr: [u8; SALT_SIZE] = slice
            .try_into()
            .map_err(|_| CoreError::Decoding(format!("salt must be {SALT_SIZE} bytes")))?;
        Ok(Self(arr))
    }
}

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KdfParams {
    /// Memory cost in KiB.
    pub mem_cost_kib: u32,
    /// Number of passes.
    pub iterations: u32,
    /// Degree of parallelism.
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            mem_cost_kib: 65536,
            iterations: 3,
            parallelism: 4,
        }
    }
}

impl KdfParams {
    /// Cheap parameters for tests. Never use these for real passwords.
    pub const fn insecure_fast() -> Self {
        Self {
            mem_cost_kib: 256,
            iterations: 1,
            parallelism: 1,
        }
    }
}

/// Derive a 256-bit key from a password and salt.
///
/// Deterministic: the same password, salt and params always give the same
/// key.
pub fn derive_key(password: &SecretString, salt: &Salt, params: &KdfParams) -> Result<SymmetricKey> {
    let argon2_params = Params::new(
        params.mem_cost_kib,
        params.iterations,
        params.parallelism,
        Some(KEY_SIZE),
    )
    .map_err(|e| CoreError::KeyDerivation(format!("invalid Argon2id params: {e}")))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params);

    let mut out = Zeroizing::new([0u8; KEY_SIZE]);
    argon2
        .hash_password_into(password.expose_secret().as_bytes(), salt.as_bytes(), &mut out[..])
        .map_err(|e| CoreError::KeyDerivation(e.to_string()))?;

    Ok(SymmetricKey::from_bytes(*out))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kdf_deterministic() {
        let password = SecretString::from("correct horse");
        let salt = Salt::from_bytes([1u8; 16]);
        let params = KdfParams::insecure_fast();

        let k1 = derive_key(&password, &salt, &params).unwrap();
        let k2 = derive_key(&password, &salt, &params).unwrap();

        assert_eq!(k1.as_bytes(), k2.as_bytes());
    }

    #[test]
    fn test_kdf_different_salts() {
        let password = SecretString::from("correct horse");
        let params = KdfParams::insecure_fast();

        let k1 = derive_key(&password, &Salt::from_bytes([1u8; 16]), &params).unwrap();
        let k2 = derive_key(&password, &Salt::from_bytes([2u8; 16]), &params).unwrap();

        assert_ne!(k1.as_bytes(), k2.as_bytes());
    }

    #[test]
    fn test_kdf_different_passwords() {
        let salt = Salt::generate();
        let params = KdfParams::insecure_fast();

        let k1 = derive_key(&SecretString::from("alpha"), &salt, &params).unwrap();
        let k2 = derive_key(&SecretString::from("bravo"), &salt, &params).unwrap();

        assert_ne!(k1.as_bytes(), k2.as_bytes());
    }

    #[test]
    fn test_kdf_rejects_bad_params() {
        let params = KdfParams {
            mem_cost_kib: 1,
            iterations: 0,
            parallelism: 1,
        };
        let result = derive_key(&SecretString::from("x"), &Salt::generate(), &params);
        assert!(matches!(result, Err(CoreError::KeyDerivation(_))));
    }

    #[test]
    fn test_params_from_json_fills_defaults() {
        let params: KdfParams = serde_json::from_str(r#"{"iterations": 5}"#).unwrap();
        assert_eq!(params.iterations, 5);
        assert_eq!(params.mem_cost_kib, KdfParams::default().mem_cost_kib);
    }
}
