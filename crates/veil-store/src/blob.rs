//! Blob storage for encrypted node content.
//!
//! Content ciphertext lives apart from node metadata, keyed by node id. The
//! blob layer sees only opaque bytes; the content nonce stays with the node
//! record.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use async_trait::async_trait;
use bytes::Bytes;

use veil_core::NodeId;

use crate::error::{Result, StoreError};

/// Opaque ciphertext storage keyed by node id.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store (or replace) a node's content ciphertext.
    async fn put(&self, node_id: &NodeId, ciphertext: Bytes) -> Result<()>;

    /// Fetch a node's content ciphertext.
    async fn get(&self, node_id: &NodeId) -> Result<Option<Bytes>>;

    /// Remove a node's content. Returns whether anything was stored.
    async fn delete(&self, node_id: &NodeId) -> Result<bool>;
}

/// In-memory blob store for tests.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<NodeId, Bytes>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> StoreError {
    StoreError::InvalidData(format!("lock poisoned: {e}"))
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, node_id: &NodeId, ciphertext: Bytes) -> Result<()> {
        self.blobs.write().map_err(poisoned)?.insert(*node_id, ciphertext);
        Ok(())
    }

    async fn get(&self, node_id: &NodeId) -> Result<Option<Bytes>> {
        Ok(self.blobs.read().map_err(poisoned)?.get(node_id).cloned())
    }

    async fn delete(&self, node_id: &NodeId) -> Result<bool> {
        Ok(self.blobs.write().map_err(poisoned)?.remove(node_id).is_some())
    }
}

/// Blob store backed by a directory, one file per node.
///
/// Writes go to a temporary file first and are renamed into place, so a
/// reader never sees a partially written blob.
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Use `root` as the blob directory, creating it if needed.
    pub async fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    fn path_for(&self, node_id: &NodeId) -> PathBuf {
        self.root.join(node_id.to_hex())
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, node_id: &NodeId, ciphertext: Bytes) -> Result<()> {
        let path = self.path_for(node_id);
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, &ciphertext).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn get(&self, node_id: &NodeId) -> Result<Option<Bytes>> {
        match tokio::fs::read(self.path_for(node_id)).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, node_id: &NodeId) -> Result<bool> {
        match tokio::fs::remove_file(self.path_for(node_id)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
