//! Principal keypairs and password wrapping.
//!
//! A principal's private key is stored encrypted under a key derived from
//! their password and a random salt. A second, independent salt derives the
//! password verifier, so the stored verifier says nothing about the key that
//! wraps the private key.

use secrecy::SecretString;
use zeroize::Zeroizing;

use veil_core::{
    derive_key, derive_subkey, EncryptedField, KdfParams, PrincipalId, PrincipalRecord,
    PrivateKey, Salt,
};

use crate::error::{PermsError, Result};

const VERIFIER_DOMAIN: &str = "veil 2024 password verifier v1";

/// A freshly registered principal.
///
/// The record goes to the store; the private key stays with the caller.
pub struct NewPrincipal {
    pub record: PrincipalRecord,
    pub private_key: PrivateKey,
}

/// Generate a keypair and wrap the private key under `password`.
pub fn create_principal(password: &SecretString, params: &KdfParams, now: i64) -> Result<NewPrincipal> {
    let private_key = PrivateKey::generate();
    let key_salt = Salt::generate();
    let auth_salt = Salt::generate();

    let wrapping_key = derive_key(password, &key_salt, params)?;
    let wrapped_private_key = EncryptedField::seal(private_key.to_bytes().as_slice(), &wrapping_key)?;

    let record = PrincipalRecord {
        id: PrincipalId::generate(),
        public_key: private_key.public_key(),
        wrapped_private_key,
        key_salt,
        auth_salt,
        password_verifier: password_verifier(password, &auth_salt, params)?,
        created_at: now,
        updated_at: now,
    };

    Ok(NewPrincipal {
        record,
        private_key,
    })
}

/// Compute the stored verifier for a password.
pub fn password_verifier(password: &SecretString, auth_salt: &Salt, params: &KdfParams) -> Result<[u8; 32]> {
    let auth_key = derive_key(password, auth_salt, params)?;
    Ok(*derive_subkey(VERIFIER_DOMAIN, &[auth_key.as_bytes().as_slice()]).as_bytes())
}

/// Check a password against a principal's verifier in constant time.
pub fn verify_password(record: &PrincipalRecord, password: &SecretString, params: &KdfParams) -> Result<bool> {
    let candidate = password_verifier(password, &record.auth_salt, params)?;
    Ok(blake3::Hash::from(candidate) == blake3::Hash::from(record.password_verifier))
}

/// Unwrap a principal's private key with their password.
pub fn unlock_private_key(
    record: &PrincipalRecord,
    password: &SecretString,
    params: &KdfParams,
) -> Result<PrivateKey> {
    let wrapping_key = derive_key(password, &record.key_salt, params)?;
    let bytes = Zeroizing::new(record.wrapped_private_key.open(&wrapping_key)?);

    let arr: Zeroizing<[u8; 32]> = Zeroizing::new(
        bytes
            .as_slice()
            .try_into()
            .map_err(|_| veil_core::CoreError::Integrity)?,
    );
    let private_key = PrivateKey::from_bytes(*arr);

    if private_key.public_key() != record.public_key {
        return Err(PermsError::Core(veil_core::CoreError::Integrity));
    }
    Ok(private_key)
}

/// Re-wrap a principal's private key under a new password.
///
/// Both salts and the wrap nonce are regenerated. Node and grant wraps are
/// unaffected since they are sealed to the unchanged public key.
pub fn rewrap_private_key(
    record: &PrincipalRecord,
    private_key: &PrivateKey,
    new_password: &SecretString,
    params: &KdfParams,
    now: i64,
) -> Result<PrincipalRecord> {
    if private_key.public_key() != record.public_key {
        return Err(PermsError::InvalidGrant(
            "private key does not belong to principal".into(),
        ));
    }

    let key_salt = Salt::generate();
    let auth_salt = Salt::generate();
    let wrapping_key = derive_key(new_password, &key_salt, params)?;

    Ok(PrincipalRecord {
        id: record.id,
        public_key: record.public_key,
        wrapped_private_key: EncryptedField::seal(private_key.to_bytes().as_slice(), &wrapping_key)?,
        key_salt,
        auth_salt,
        password_verifier: password_verifier(new_password, &auth_salt, params)?,
        created_at: record.created_at,
        updated_at: now,
    })
}
