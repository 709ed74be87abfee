//! The primitive layer: authenticated encryption and key wrapping.
//!
//! Symmetric operations use ChaCha20-Poly1305. Public-key wrapping uses an
//! ephemeral X25519 agreement whose output is run through Blake3 key
//! derivation before it touches the AEAD.
//!
//! Nothing here generates a nonce on the caller's behalf except
//! [`seal_key`], whose ephemeral key makes every seal a fresh key anyway.

use std::fmt;

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Key,
};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use x25519_dalek::{EphemeralSecret, PublicKey, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::error::{CoreError, Result};

/// Size of a symmetric key in bytes.
pub const KEY_SIZE: usize = 32;

/// Size of an AEAD nonce in bytes.
pub const NONCE_SIZE: usize = 12;

const SEAL_DOMAIN: &str = "veil 2024 sealed key wrap v1";

/// A 256-bit symmetric key for ChaCha20-Poly1305.
///
/// Used for node content keys, password-derived keys and link keys alike.
/// Zeroed on drop; `Debug` never prints the bytes.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey([u8; KEY_SIZE]);

impl SymmetricKey {
    /// Generate a new random key.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }

    fn cipher(&self) -> ChaCha20Poly1305 {
        ChaCha20Poly1305::new(Key::from_slice(&self.0))
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SymmetricKey([REDACTED])")
    }
}

/// A 96-bit nonce for ChaCha20-Poly1305.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Nonce(pub [u8; NONCE_SIZE]);

impl Nonce {
    /// Generate a new random nonce.
    pub fn generate() -> Self {
        let mut bytes = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; NONCE_SIZE]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; NONCE_SIZE] {
        &self.0
    }
}

impl TryFrom<&[u8]> for Nonce {
    type Error = CoreError;

    fn try_from(slice: &[u8]) -> Result<Self> {
        let arr: [u8; NONCE_SIZE] = slice
            .try_into()
            .map_err(|_| CoreError::Decoding(format!("nonce must be {NONCE_SIZE} bytes")))?;
        Ok(Self(arr))
    }
}

/// Encrypt `plaintext` under `key` with `nonce`.
pub fn encrypt(plaintext: &[u8], key: &SymmetricKey, nonce: &Nonce) -> Result<Vec<u8>> {
    key.cipher()
        .encrypt(chacha20poly1305::Nonce::from_slice(&nonce.0), plaintext)
        .map_err(|e| CoreError::Encryption(e.to_string()))
}

/// Decrypt `ciphertext` under `key` with `nonce`.
///
/// Fails with [`CoreError::Integrity`] on a wrong key, wrong nonce or any
/// modification of the ciphertext.
pub fn decrypt(ciphertext: &[u8], key: &SymmetricKey, nonce: &Nonce) -> Result<Vec<u8>> {
    key.cipher()
        .decrypt(chacha20poly1305::Nonce::from_slice(&nonce.0), ciphertext)
        .map_err(|_| CoreError::Integrity)
}

/// Wrap `payload_key` under `wrapping_key`.
pub fn wrap(payload_key: &SymmetricKey, wrapping_key: &SymmetricKey, nonce: &Nonce) -> Result<Vec<u8>> {
    encrypt(payload_key.as_bytes(), wrapping_key, nonce)
}

/// Recover a key wrapped by [`wrap`].
pub fn unwrap(ciphertext: &[u8], wrapping_key: &SymmetricKey, nonce: &Nonce) -> Result<SymmetricKey> {
    let bytes = Zeroizing::new(decrypt(ciphertext, wrapping_key, nonce)?);
    let arr: [u8; KEY_SIZE] = bytes.as_slice().try_into().map_err(|_| CoreError::Integrity)?;
    Ok(SymmetricKey::from_bytes(arr))
}

/// Derive a symmetric key from input material under a domain string.
///
/// Each part is length-prefixed so `["ab", "c"]` and `["a", "bc"]` never
/// collide.
pub fn derive_subkey(domain: &str, parts: &[&[u8]]) -> SymmetricKey {
    let mut hasher = blake3::Hasher::new_derive_key(domain);
    for part in parts {
        hasher.update(&(part.len() as u64).to_le_bytes());
        hasher.update(part);
    }
    SymmetricKey::from_bytes(*hasher.finalize().as_bytes())
}

/// An X25519 public key (32 bytes).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct X25519PublicKey(pub [u8; 32]);

impl X25519PublicKey {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    fn to_dalek(self) -> PublicKey {
        PublicKey::from(self.0)
    }
}

impl From<PublicKey> for X25519PublicKey {
    fn from(pk: PublicKey) -> Self {
        Self(*pk.as_bytes())
    }
}

impl fmt::Debug for X25519PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "X25519PublicKey({})", &hex::encode(self.0)[..16])
    }
}

/// A principal's X25519 private key.
///
/// Only ever held unwrapped inside a session; zeroed on drop by
/// `x25519-dalek`.
#[derive(Clone)]
pub struct PrivateKey(StaticSecret);

impl PrivateKey {
    /// Generate a new random private key.
    pub fn generate() -> Self {
        Self(StaticSecret::random_from_rng(OsRng))
    }

    /// Create from raw bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(StaticSecret::from(bytes))
    }

    /// Export the raw bytes, zeroed when the returned buffer drops.
    pub fn to_bytes(&self) -> Zeroizing<[u8; 32]> {
        Zeroizing::new(self.0.to_bytes())
    }

    /// Derive the public key.
    pub fn public_key(&self) -> X25519PublicKey {
        X25519PublicKey::from(PublicKey::from(&self.0))
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrivateKey(public={:?})", self.public_key())
    }
}

/// A symmetric key sealed to a recipient's public key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedKey {
    /// Sender's one-time X25519 public key.
    pub ephemeral_public: X25519PublicKey,

    /// Nonce for the AEAD wrap.
    pub nonce: Nonce,

    /// The wrapped key (includes authentication tag).
    pub ciphertext: Vec<u8>,
}

fn sealing_key(
    shared: &[u8; 32],
    ephemeral_public: &X25519PublicKey,
    recipient: &X25519PublicKey,
) -> SymmetricKey {
    derive_subkey(
        SEAL_DOMAIN,
        &[
            shared.as_slice(),
            ephemeral_public.as_bytes().as_slice(),
            recipient.as_bytes().as_slice(),
        ],
    )
}

/// Wrap `payload_key` so that only the holder of `recipient`'s private key
/// can recover it.
pub fn seal_key(payload_key: &SymmetricKey, recipient: &X25519PublicKey) -> Result<SealedKey> {
    let ephemeral = EphemeralSecret::random_from_rng(OsRng);
    let ephemeral_public = X25519PublicKey::from(PublicKey::from(&ephemeral));

    let shared = ephemeral.diffie_hellman(&recipient.to_dalek());
    if !shared.was_contributory() {
        return Err(CoreError::InvalidKey("low-order recipient public key".into()));
    }

    let wrap_key = sealing_key(shared.as_bytes(), &ephemeral_public, recipient);
    let nonce = Nonce::generate();
    let ciphertext = wrap(payload_key, &wrap_key, &nonce)?;

    Ok(SealedKey {
        ephemeral_public,
        nonce,
        ciphertext,
    })
}

/// Recover a key sealed by [`seal_key`].
pub fn open_sealed(sealed: &SealedKey, private_key: &PrivateKey) -> Result<SymmetricKey> {
    let shared = private_key.0.diffie_hellman(&sealed.ephemeral_public.to_dalek());
    if !shared.was_contributory() {
        return Err(CoreError::Integrity);
    }

    let wrap_key = sealing_key(
        shared.as_bytes(),
        &sealed.ephemeral_public,
        &private_key.public_key(),
    );
    unwrap(&sealed.ciphertext, &wrap_key, &sealed.nonce)
}
