//! In-memory implementation of the Store trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence. A single lock guards
//! all state, so every read sees one consistent snapshot.

use std::collections::{HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use veil_core::{
    ChainLink, ChainSnapshot, GrantId, GrantRecord, LinkId, NodeId, NodeRecord, PrincipalId,
    PrincipalRecord,
};

use crate::error::{Result, StoreError};
use crate::traits::{MoveCommit, Store};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    principals: HashMap<PrincipalId, PrincipalRecord>,

    nodes: HashMap<NodeId, NodeRecord>,

    grants: HashMap<GrantId, GrantRecord>,

    /// Index: node -> grants attached to it.
    grants_by_node: HashMap<NodeId, Vec<GrantId>>,

    /// Index: link id -> its grant.
    grants_by_link: HashMap<LinkId, GrantId>,
}

impl MemoryStoreInner {
    fn grants_for(&self, node_id: &NodeId) -> Vec<GrantRecord> {
        let mut grants: Vec<GrantRecord> = self
            .grants_by_node
            .get(node_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.grants.get(id).cloned())
            .collect();
        grants.sort_by_key(|g| (g.created_at, g.id));
        grants
    }

    fn remove_grant(&mut self, id: &GrantId) -> Option<GrantRecord> {
        let grant = self.grants.remove(id)?;
        if let Some(ids) = self.grants_by_node.get_mut(&grant.node_id) {
            ids.retain(|g| g != id);
        }
        if let Some(link_id) = grant.link_id() {
            self.grants_by_link.remove(link_id);
        }
        Some(grant)
    }

    /// Whether `candidate` is `node_id` or lies beneath it.
    fn is_within(&self, candidate: &NodeId, node_id: &NodeId) -> bool {
        let mut current = Some(*candidate);
        let mut seen = HashSet::new();
        while let Some(id) = current {
            if &id == node_id {
                return true;
            }
            if !seen.insert(id) {
                return false;
            }
            current = self.nodes.get(&id).and_then(|n| n.parent);
        }
        false
    }
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner
            .read()
            .map_err(|e| StoreError::InvalidData(format!("lock poisoned: {e}")))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.inner
            .write()
            .map_err(|e| StoreError::InvalidData(format!("lock poisoned: {e}")))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_principal(&self, principal: &PrincipalRecord) -> Result<()> {
        let mut inner = self.write()?;
        if inner.principals.contains_key(&principal.id) {
            return Err(StoreError::Conflict(format!("principal {}", principal.id)));
        }
        inner.principals.insert(principal.id, principal.clone());
        Ok(())
    }

    async fn get_principal(&self, id: &PrincipalId) -> Result<Option<PrincipalRecord>> {
        Ok(self.read()?.principals.get(id).cloned())
    }

    async fn update_principal_keys(&self, principal: &PrincipalRecord) -> Result<()> {
        let mut inner = self.write()?;
        let existing = inner
            .principals
            .get_mut(&principal.id)
            .ok_or_else(|| StoreError::NotFound(format!("principal {}", principal.id)))?;
        existing.wrapped_private_key = principal.wrapped_private_key.clone();
        existing.key_salt = principal.key_salt;
        existing.auth_salt = principal.auth_salt;
        existing.password_verifier = principal.password_verifier;
        existing.updated_at = principal.updated_at;
        Ok(())
    }

    async fn insert_node(&self, node: &NodeRecord) -> Result<()> {
        let mut inner = self.write()?;
        if inner.nodes.contains_key(&node.id) {
            return Err(StoreError::Conflict(format!("node {}", node.id)));
        }
        if let Some(parent) = &node.parent {
            if !inner.nodes.contains_key(parent) {
                return Err(StoreError::NotFound(format!("parent {}", parent)));
            }
        }
        inner.nodes.insert(node.id, node.clone());
        Ok(())
    }

    async fn get_node(&self, id: &NodeId) -> Result<Option<NodeRecord>> {
        Ok(self.read()?.nodes.get(id).cloned())
    }

    async fn update_node_attributes(&self, node: &NodeRecord) -> Result<()> {
        let mut inner = self.write()?;
        let existing = inner
            .nodes
            .get_mut(&node.id)
            .ok_or_else(|| StoreError::NotFound(format!("node {}", node.id)))?;
        existing.name = node.name.clone();
        existing.mime_type = node.mime_type.clone();
        existing.content_nonce = node.content_nonce;
        existing.size = node.size;
        existing.modified_at = node.modified_at;
        Ok(())
    }

    async fn list_children(&self, parent: &NodeId) -> Result<Vec<NodeRecord>> {
        let inner = self.read()?;
        let mut children: Vec<NodeRecord> = inner
            .nodes
            .values()
            .filter(|n| n.parent.as_ref() == Some(parent))
            .cloned()
            .collect();
        children.sort_by_key(|n| (n.created_at, n.id));
        Ok(children)
    }

    async fn commit_move(&self, commit: &MoveCommit) -> Result<()> {
        let mut inner = self.write()?;

        let current_parent = inner
            .nodes
            .get(&commit.node_id)
            .map(|n| n.parent)
            .ok_or_else(|| StoreError::NotFound(format!("node {}", commit.node_id)))?;
        if current_parent != commit.expected_parent {
            return Err(StoreError::Conflict(format!(
                "node {} was moved concurrently",
                commit.node_id
            )));
        }

        if let Some(new_parent) = &commit.new_parent {
            if !inner.nodes.contains_key(new_parent) {
                return Err(StoreError::NotFound(format!("parent {}", new_parent)));
            }
            if inner.is_within(new_parent, &commit.node_id) {
                return Err(StoreError::Cycle(format!(
                    "{} is inside {}",
                    new_parent, commit.node_id
                )));
            }
        }

        let node = inner
            .nodes
            .get_mut(&commit.node_id)
            .ok_or_else(|| StoreError::NotFound(format!("node {}", commit.node_id)))?;
        node.parent = commit.new_parent;
        node.wrapped_key = commit.wrapped_key.clone();
        node.modified_at = commit.modified_at;

        let subtree: Vec<NodeId> = inner
            .nodes
            .keys()
            .filter(|id| inner.is_within(id, &commit.node_id))
            .copied()
            .collect();
        for id in subtree {
            if let Some(n) = inner.nodes.get_mut(&id) {
                n.owner = commit.owner;
            }
        }
        Ok(())
    }

    async fn insert_grant(&self, grant: &GrantRecord) -> Result<()> {
        let mut inner = self.write()?;
        if inner.grants.contains_key(&grant.id) {
            return Err(StoreError::Conflict(format!("grant {}", grant.id)));
        }
        if !inner.nodes.contains_key(&grant.node_id) {
            return Err(StoreError::NotFound(format!("node {}", grant.node_id)));
        }
        if let Some(link_id) = grant.link_id() {
            if inner.grants_by_link.contains_key(link_id) {
                return Err(StoreError::Conflict(format!("link {}", link_id)));
            }
            inner.grants_by_link.insert(*link_id, grant.id);
        }

        inner
            .grants_by_node
            .entry(grant.node_id)
            .or_default()
            .push(grant.id);
        inner.grants.insert(grant.id, grant.clone());
        Ok(())
    }

    async fn get_grant(&self, id: &GrantId) -> Result<Option<GrantRecord>> {
        Ok(self.read()?.grants.get(id).cloned())
    }

    async fn get_link_grant(&self, link_id: &LinkId) -> Result<Option<GrantRecord>> {
        let inner = self.read()?;
        Ok(inner
            .grants_by_link
            .get(link_id)
            .and_then(|id| inner.grants.get(id))
            .cloned())
    }

    async fn update_grant(&self, grant: &GrantRecord) -> Result<()> {
        let mut inner = self.write()?;
        let existing = inner
            .grants
            .get_mut(&grant.id)
            .ok_or_else(|| StoreError::NotFound(format!("grant {}", grant.id)))?;
        if existing.link_id() != grant.link_id() || existing.principal() != grant.principal() {
            return Err(StoreError::Conflict(format!("grant {} grantee changed", grant.id)));
        }
        existing.grantee = grant.grantee.clone();
        existing.edit = grant.edit;
        existing.expires_at = grant.expires_at;
        existing.wrapped_key = grant.wrapped_key.clone();
        Ok(())
    }

    async fn delete_grant(&self, id: &GrantId) -> Result<bool> {
        Ok(self.write()?.remove_grant(id).is_some())
    }

    async fn list_grants(&self, node_id: &NodeId) -> Result<Vec<GrantRecord>> {
        Ok(self.read()?.grants_for(node_id))
    }

    async fn delete_expired_grants(&self, now: i64) -> Result<Vec<GrantId>> {
        let mut inner = self.write()?;
        let mut expired: Vec<GrantId> = inner
            .grants
            .values()
            .filter(|g| g.is_expired(now))
            .map(|g| g.id)
            .collect();
        expired.sort();
        for id in &expired {
            inner.remove_grant(id);
        }
        Ok(expired)
    }

    async fn chain_snapshot(&self, node_id: &NodeId, max_depth: usize) -> Result<Option<ChainSnapshot>> {
        let inner = self.read()?;
        if !inner.nodes.contains_key(node_id) {
            return Ok(None);
        }

        let mut links = Vec::new();
        let mut current = Some(*node_id);
        while let Some(id) = current {
            if links.len() >= max_depth {
                return Err(StoreError::InvalidData(format!(
                    "ancestor chain of {} exceeds {} nodes",
                    node_id, max_depth
                )));
            }
            let node = inner
                .nodes
                .get(&id)
                .ok_or_else(|| StoreError::InvalidData(format!("dangling parent {}", id)))?;
            current = node.parent;
            links.push(ChainLink {
                node: node.clone(),
                grants: inner.grants_for(&id),
            });
        }

        Ok(Some(ChainSnapshot::new(links)))
    }
}
