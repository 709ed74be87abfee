//! # Veil
//!
//! A zero-knowledge hierarchical file vault. The server stores a tree of
//! files and folders plus sharing grants, but only ever sees ciphertext and
//! wrapped keys.
//!
//! ## Overview
//!
//! - **Envelopes**: every node has its own key, wrapped under its parent's
//!   key; a root's key is sealed to its owner
//! - **Moves**: re-wrap one key and swap one parent pointer, atomically
//! - **Sharing**: user grants (sealed to a public key) and links (wrapped
//!   under a key derived from a link secret and optional password)
//! - **Resolution**: access is the most permissive level found on the
//!   node's ancestor chain
//!
//! ## Usage
//!
//! ```rust,no_run
//! use secrecy::SecretString;
//! use veil::{Actor, LinkOptions, NodeKind, Vault, VaultConfig};
//! use veil::store::{FsBlobStore, SqliteStore};
//!
//! async fn example() -> anyhow::Result<()> {
//!     let store = SqliteStore::open("vault.db")?;
//!     let blobs = FsBlobStore::open("blobs").await?;
//!     let vault = Vault::new(store, blobs, VaultConfig::default());
//!
//!     let alice = vault.register(&SecretString::from("correct horse")).await?;
//!     let docs = vault.create_root(&alice, NodeKind::Folder, "docs", "inode/directory").await?;
//!     let file = vault
//!         .create_child(Actor::User(&alice), &docs, NodeKind::File, "notes.txt", "text/plain")
//!         .await?;
//!     vault.update_content(Actor::User(&alice), &file, b"hello").await?;
//!
//!     let link = vault.grant_link(&alice, &docs, LinkOptions::default()).await?;
//!     let credentials = link.credentials();
//!     let text = vault.read_content(Actor::Link(&credentials), &file).await?;
//!     assert_eq!(text, b"hello");
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! This crate re-exports the component crates for convenience:
//!
//! - `veil::core` - Primitives, ids and records
//! - `veil::perms` - Envelopes, grants, resolver and key paths
//! - `veil::store` - Storage abstraction, SQLite and blob stores

pub mod config;
pub mod error;
pub mod session;
pub mod vault;

// Re-export component crates
pub use veil_core as core;
pub use veil_perms as perms;
pub use veil_store as store;

// Re-export main types for convenience
pub use config::VaultConfig;
pub use error::{ApiError, Result, VaultError};
pub use session::{Actor, Session};
pub use vault::{LinkOptions, LinkPasswordChange, MoveState, NodeEntry, SharedLink, Vault};

// Re-export commonly used component types
pub use veil_core::{Clock, GrantId, GrantRecord, LinkId, NodeId, NodeKind, PrincipalId, SystemClock};
pub use veil_perms::{AccessLevel, KeyPath, LinkCredentials, LinkSecret};
