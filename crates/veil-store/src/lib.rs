//! # Veil Store
//!
//! Storage abstraction for Veil. Provides a trait-based interface for
//! principal, node and grant persistence with SQLite and in-memory
//! implementations, plus a separate blob boundary for content ciphertext.
//!
//! ## Key Types
//!
//! - [`Store`] - The async trait for all metadata operations
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//! - [`MoveCommit`] - A reparent plus re-wrap, applied atomically
//! - [`BlobStore`] - Opaque ciphertext keyed by node id
//!
//! ## Usage
//!
//! ```rust,no_run
//! use veil_store::{SqliteStore, Store};
//! use veil_core::NodeId;
//!
//! async fn example() {
//!     let store = SqliteStore::open("vault.db").unwrap();
//!
//!     // Everything a request decides on comes from one snapshot.
//!     let snapshot = store.chain_snapshot(&NodeId::generate(), 64).await.unwrap();
//!     assert!(snapshot.is_none());
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Ciphertext only**: every key column holds a wrapped key; names and
//!   MIME types are stored encrypted
//! - **Atomic moves**: the parent pointer and wrapped key change in one
//!   transaction, with the cycle check inside it
//! - **Retry classification**: [`StoreError::is_retryable`] marks lock
//!   contention, the only failure worth re-running unchanged

pub mod blob;
pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

#[cfg(test)]
mod testing;

pub use blob::{BlobStore, FsBlobStore, MemoryBlobStore};
pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{MoveCommit, Store};
