//! The Vault: unified API over envelopes, grants and storage.
//!
//! Every request loads one [`ChainSnapshot`] of the target's ancestors and
//! their grants, resolves access against it, and unwraps keys from it. The
//! clock is read once per request, so expiry is judged at a single instant.
//!
//! Plaintext exists only inside these methods, on the caller's side of the
//! store boundary. Everything handed to [`Store`] or [`BlobStore`] is
//! ciphertext or a wrapped key.

mod mutation;
mod sharing;

use std::sync::Arc;

use bytes::Bytes;
use secrecy::SecretString;

use veil_core::{
    ChainSnapshot, Clock, NodeId, NodeKind, NodeRecord, PrincipalId, SymmetricKey, SystemClock,
    WrappedKey, X25519PublicKey,
};
use veil_perms::{
    create_node_key, create_principal, open_attributes, open_content, resolve, rewrap_private_key,
    seal_attributes, seal_content, seal_text, unlock_private_key, unwrap_node_key, verify_password,
    AccessLevel, KeyPath, NewPrincipal, UnwrapKey, WrapTarget,
};
use veil_store::{BlobStore, Store};

use crate::config::VaultConfig;
use crate::error::{Result, VaultError};
use crate::session::{Actor, Session};

pub use mutation::MoveState;
pub use sharing::{LinkOptions, LinkPasswordChange, SharedLink};

/// A node with its attributes decrypted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeEntry {
    pub id: NodeId,
    pub parent: Option<NodeId>,
    pub kind: NodeKind,
    pub name: String,
    pub mime_type: String,
    pub size: u64,
    pub created_at: i64,
    pub modified_at: i64,
}

impl NodeEntry {
    fn open(node: &NodeRecord, node_key: &SymmetricKey) -> Result<Self> {
        let attributes = open_attributes(node, node_key)?;
        Ok(Self {
            id: node.id,
            parent: node.parent,
            kind: node.kind,
            name: attributes.name,
            mime_type: attributes.mime_type,
            size: node.size,
            created_at: node.created_at,
            modified_at: node.modified_at,
        })
    }
}

/// A request that passed its access check.
struct Authorized {
    node: NodeRecord,
    snapshot: ChainSnapshot,
    now: i64,
}

impl Authorized {
    /// Owner of the tree the node sits in.
    fn tree_owner(&self) -> PrincipalId {
        self.snapshot.root().map_or(self.node.owner, |root| root.owner)
    }
}

/// The main Vault struct.
///
/// Provides:
/// - Principal registration and sessions
/// - Node creation, attributes and content
/// - Moves with key re-wrapping
/// - User and link grants
/// - Access resolution and key paths
pub struct Vault<S: Store, B: BlobStore> {
    store: Arc<S>,
    blobs: Arc<B>,
    clock: Arc<dyn Clock>,
    config: VaultConfig,
}

impl<S: Store, B: BlobStore> Vault<S, B> {
    /// Create a vault on the system clock.
    pub fn new(store: S, blobs: B, config: VaultConfig) -> Self {
        Self::with_clock(store, blobs, config, Arc::new(SystemClock))
    }

    /// Create a vault with an explicit clock.
    pub fn with_clock(store: S, blobs: B, config: VaultConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            store: Arc::new(store),
            blobs: Arc::new(blobs),
            clock,
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn blobs(&self) -> &B {
        &self.blobs
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    fn now(&self) -> i64 {
        self.clock.now_millis()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Principals
    // ─────────────────────────────────────────────────────────────────────────

    /// Register a new principal and return an open session for it.
    pub async fn register(&self, password: &SecretString) -> Result<Session> {
        let NewPrincipal {
            record,
            private_key,
        } = create_principal(password, &self.config.principal_kdf, self.now())?;

        self.store.insert_principal(&record).await?;
        tracing::debug!(principal = %record.id, "registered principal");
        Ok(Session::new(record.id, private_key))
    }

    /// Unlock a principal's private key with their password.
    pub async fn open_session(&self, principal_id: &PrincipalId, password: &SecretString) -> Result<Session> {
        let record = self.principal(principal_id).await?;

        if !verify_password(&record, password, &self.config.principal_kdf)? {
            tracing::debug!(principal = %principal_id, "password verification failed");
            return Err(VaultError::PermissionDenied("wrong password".into()));
        }

        let private_key = unlock_private_key(&record, password, &self.config.principal_kdf)
            .map_err(|e| {
                if e.is_integrity() {
                    tracing::warn!(principal = %principal_id, "private key failed to unwrap after verifier matched");
                }
                e
            })?;
        Ok(Session::new(record.id, private_key))
    }

    /// Change a principal's password.
    ///
    /// Only the private-key wrap and the verifier change; node keys and
    /// grants are bound to the keypair, not the password.
    pub async fn change_password(
        &self,
        session: &Session,
        current: &SecretString,
        new_password: &SecretString,
    ) -> Result<()> {
        let record = self.principal(&session.principal_id()).await?;
        if !verify_password(&record, current, &self.config.principal_kdf)? {
            return Err(VaultError::PermissionDenied("wrong password".into()));
        }

        let updated = rewrap_private_key(
            &record,
            session.private_key(),
            new_password,
            &self.config.principal_kdf,
            self.now(),
        )?;
        self.store.update_principal_keys(&updated).await?;
        tracing::debug!(principal = %record.id, "password changed");
        Ok(())
    }

    /// A principal's public key, for sealing grants to them.
    pub async fn public_key(&self, principal_id: &PrincipalId) -> Result<X25519PublicKey> {
        Ok(self.principal(principal_id).await?.public_key)
    }

    async fn principal(&self, principal_id: &PrincipalId) -> Result<veil_core::PrincipalRecord> {
        self.store
            .get_principal(principal_id)
            .await?
            .ok_or_else(|| VaultError::NotFound(format!("principal {principal_id}")))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Authorization
    // ─────────────────────────────────────────────────────────────────────────

    async fn snapshot(&self, node_id: &NodeId) -> Result<ChainSnapshot> {
        self.store
            .chain_snapshot(node_id, self.config.max_chain_depth)
            .await?
            .ok_or_else(|| VaultError::NotFound(format!("node {node_id}")))
    }

    /// Load the chain for `node_id` and require at least `min` access.
    async fn authorized(&self, actor: Actor<'_>, node_id: &NodeId, min: AccessLevel) -> Result<Authorized> {
        let now = self.now();
        let snapshot = self.snapshot(node_id).await?;
        let resolution = resolve(&snapshot, &actor.requester(), now, &self.config.link_kdf);

        if resolution.level < min {
            if resolution.expired_match {
                return Err(VaultError::ExpiredGrant);
            }
            return Err(VaultError::PermissionDenied(format!(
                "{:?} access to {node_id}, {min:?} required",
                resolution.level
            )));
        }

        let node = snapshot
            .target()
            .cloned()
            .ok_or_else(|| VaultError::NotFound(format!("node {node_id}")))?;

        Ok(Authorized {
            node,
            snapshot,
            now,
        })
    }

    /// Recover the node key for an authorized request.
    fn node_key(&self, authorized: &Authorized, actor: Actor<'_>) -> Result<SymmetricKey> {
        let path = KeyPath::find(&authorized.snapshot, &actor.requester(), authorized.now)?;
        path.unlock(actor.unlock(), &self.config.link_kdf).map_err(|e| {
            if e.is_integrity() {
                tracing::warn!(node = %authorized.node.id, anchor = %path.anchor.node_id(), "key path failed to unlock");
            }
            e.into()
        })
    }

    /// Effective access for `actor` on a node.
    ///
    /// Returns `Denied` rather than an error when nothing applies. A missing
    /// node is also `Denied`, so the answer does not reveal whether it exists.
    pub async fn authorize(&self, actor: Actor<'_>, node_id: &NodeId) -> Result<AccessLevel> {
        let Some(snapshot) = self
            .store
            .chain_snapshot(node_id, self.config.max_chain_depth)
            .await?
        else {
            tracing::debug!(node = %node_id, "resolved access on missing node");
            return Ok(AccessLevel::Denied);
        };
        let resolution = resolve(&snapshot, &actor.requester(), self.now(), &self.config.link_kdf);
        tracing::debug!(node = %node_id, level = ?resolution.level, "resolved access");
        Ok(resolution.level)
    }

    /// The wrapped keys `actor` needs to recover a node key locally.
    pub async fn key_path(&self, actor: Actor<'_>, node_id: &NodeId) -> Result<KeyPath> {
        let authorized = self.authorized(actor, node_id, AccessLevel::Viewer).await?;
        Ok(KeyPath::find(&authorized.snapshot, &actor.requester(), authorized.now)?)
    }

    /// Fetch and unlock a node key for `actor`.
    pub async fn unlock_node_key(&self, actor: Actor<'_>, node_id: &NodeId) -> Result<SymmetricKey> {
        let authorized = self.authorized(actor, node_id, AccessLevel::Viewer).await?;
        self.node_key(&authorized, actor)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Nodes
    // ─────────────────────────────────────────────────────────────────────────

    fn seal_node(
        parent: Option<NodeId>,
        owner: PrincipalId,
        kind: NodeKind,
        key: (&SymmetricKey, WrappedKey),
        name: &str,
        mime_type: &str,
        now: i64,
    ) -> Result<NodeRecord> {
        let (node_key, wrapped_key) = key;
        let sealed = seal_attributes(name, mime_type, node_key)?;
        Ok(NodeRecord {
            id: NodeId::generate(),
            parent,
            owner,
            kind,
            wrapped_key,
            name: sealed.name,
            mime_type: sealed.mime_type,
            content_nonce: None,
            size: 0,
            created_at: now,
            modified_at: now,
        })
    }

    /// Create a new tree root owned by the session's principal.
    pub async fn create_root(&self, session: &Session, kind: NodeKind, name: &str, mime_type: &str) -> Result<NodeId> {
        let owner_key = session.public_key();
        let (node_key, wrapped_key) = create_node_key(WrapTarget::Owner(&owner_key))?;
        let node = Self::seal_node(
            None,
            session.principal_id(),
            kind,
            (&node_key, wrapped_key),
            name,
            mime_type,
            self.now(),
        )?;

        self.store.insert_node(&node).await?;
        tracing::debug!(node = %node.id, kind = ?kind, "created root");
        Ok(node.id)
    }

    /// Create a node under a folder. Requires edit access on the folder.
    ///
    /// The new node belongs to the owner of the tree it joins.
    pub async fn create_child(
        &self,
        actor: Actor<'_>,
        parent_id: &NodeId,
        kind: NodeKind,
        name: &str,
        mime_type: &str,
    ) -> Result<NodeId> {
        let parent = self.authorized(actor, parent_id, AccessLevel::Editor).await?;
        if parent.node.kind != NodeKind::Folder {
            return Err(VaultError::InvalidRequest(format!("{parent_id} is not a folder")));
        }

        let parent_key = self.node_key(&parent, actor)?;
        let (node_key, wrapped_key) = create_node_key(WrapTarget::Parent(&parent_key))?;
        let node = Self::seal_node(
            Some(parent.node.id),
            parent.tree_owner(),
            kind,
            (&node_key, wrapped_key),
            name,
            mime_type,
            parent.now,
        )?;

        self.store.insert_node(&node).await?;
        tracing::debug!(node = %node.id, parent = %parent_id, kind = ?kind, "created node");
        Ok(node.id)
    }

    /// Decrypt a node's name and metadata.
    pub async fn read_attributes(&self, actor: Actor<'_>, node_id: &NodeId) -> Result<NodeEntry> {
        let authorized = self.authorized(actor, node_id, AccessLevel::Viewer).await?;
        let node_key = self.node_key(&authorized, actor)?;
        NodeEntry::open(&authorized.node, &node_key)
    }

    /// Rename a node. The name is re-encrypted under a fresh nonce.
    pub async fn rename(&self, actor: Actor<'_>, node_id: &NodeId, new_name: &str) -> Result<()> {
        let authorized = self.authorized(actor, node_id, AccessLevel::Editor).await?;
        let node_key = self.node_key(&authorized, actor)?;

        let mut node = authorized.node;
        node.name = seal_text(new_name, &node_key)?;
        node.modified_at = authorized.now;
        self.store.update_node_attributes(&node).await?;
        Ok(())
    }

    /// Replace a file's content.
    pub async fn update_content(&self, actor: Actor<'_>, node_id: &NodeId, plaintext: &[u8]) -> Result<()> {
        let authorized = self.authorized(actor, node_id, AccessLevel::Editor).await?;
        if authorized.node.kind != NodeKind::File {
            return Err(VaultError::InvalidRequest(format!("{node_id} is not a file")));
        }
        let node_key = self.node_key(&authorized, actor)?;
        let sealed = seal_content(plaintext, &node_key)?;

        let previous = self.blobs.get(node_id).await?;
        self.blobs.put(node_id, Bytes::from(sealed.ciphertext)).await?;

        let mut node = authorized.node;
        node.content_nonce = Some(sealed.nonce);
        node.size = sealed.size;
        node.modified_at = authorized.now;

        if let Err(e) = self.store.update_node_attributes(&node).await {
            // The record still carries the old nonce; put the matching blob back.
            let restored = match previous {
                Some(old) => self.blobs.put(node_id, old).await,
                None => self.blobs.delete(node_id).await.map(|_| ()),
            };
            if let Err(restore_error) = restored {
                tracing::warn!(node = %node_id, error = %restore_error, "failed to restore content after metadata error");
            }
            return Err(e.into());
        }

        tracing::debug!(node = %node_id, size = node.size, "content updated");
        Ok(())
    }

    /// Decrypt a file's content. A file that was never written reads empty.
    pub async fn read_content(&self, actor: Actor<'_>, node_id: &NodeId) -> Result<Vec<u8>> {
        let authorized = self.authorized(actor, node_id, AccessLevel::Viewer).await?;
        if authorized.node.kind != NodeKind::File {
            return Err(VaultError::InvalidRequest(format!("{node_id} is not a file")));
        }
        let Some(nonce) = authorized.node.content_nonce else {
            return Ok(Vec::new());
        };

        let node_key = self.node_key(&authorized, actor)?;
        let ciphertext = self
            .blobs
            .get(node_id)
            .await?
            .ok_or_else(|| VaultError::NotFound(format!("content of {node_id}")))?;
        Ok(open_content(&ciphertext, &nonce, &node_key)?)
    }

    /// List a folder's children with their attributes decrypted.
    pub async fn list_children(&self, actor: Actor<'_>, node_id: &NodeId) -> Result<Vec<NodeEntry>> {
        let authorized = self.authorized(actor, node_id, AccessLevel::Viewer).await?;
        let folder_key = self.node_key(&authorized, actor)?;

        let children = self.store.list_children(node_id).await?;
        let mut entries = Vec::with_capacity(children.len());
        for child in &children {
            let child_key = unwrap_node_key(&child.wrapped_key, UnwrapKey::Parent(&folder_key))?;
            entries.push(NodeEntry::open(child, &child_key)?);
        }
        Ok(entries)
    }
}
