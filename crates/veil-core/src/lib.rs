//! # Veil Core
//!
//! Pure primitives for Veil: identifiers, authenticated encryption, key
//! wrapping, password key derivation, and the persisted record model.
//!
//! This crate contains no I/O, no storage, no networking. Every function is
//! a computation over byte buffers and key handles.
//!
//! ## Key Types
//!
//! - [`SymmetricKey`] - A 256-bit ChaCha20-Poly1305 key, zeroed on drop
//! - [`PrivateKey`] / [`X25519PublicKey`] - A principal's asymmetric keypair
//! - [`WrappedKey`] - A key encrypted under another key or a public key
//! - [`NodeRecord`], [`GrantRecord`], [`PrincipalRecord`] - What the server stores
//! - [`ChainSnapshot`] - A node's ancestor chain with the grants attached to it
//!
//! ## Nonces
//!
//! Every encryption takes an explicit [`Nonce`]. Callers generate a fresh one
//! per operation with [`Nonce::generate`]; a `(key, nonce)` pair must never be
//! used twice.

pub mod clock;
pub mod crypto;
pub mod error;
pub mod kdf;
pub mod model;
pub mod types;

pub use clock::{Clock, SystemClock};
pub use crypto::{
    decrypt, derive_subkey, encrypt, open_sealed, seal_key, unwrap, wrap, Nonce, PrivateKey,
    SealedKey, SymmetricKey, X25519PublicKey, KEY_SIZE, NONCE_SIZE,
};
pub use error::{CoreError, Result};
pub use kdf::{derive_key, KdfParams, Salt, SALT_SIZE};
pub use model::{
    ChainLink, ChainSnapshot, EncryptedField, GrantRecord, Grantee, NodeKind, NodeRecord,
    PrincipalRecord, WrappedKey,
};
pub use types::{GrantId, LinkId, NodeId, PrincipalId};
