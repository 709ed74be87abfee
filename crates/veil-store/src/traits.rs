//! Store trait: the abstract interface for vault persistence.
//!
//! The store holds only wrapped keys and ciphertext. It enforces structural
//! rules (unique ids, existing parents, acyclic trees) but never makes an
//! authorization decision; that is the resolver's job, over a snapshot the
//! store provides.

use async_trait::async_trait;
use veil_core::{
    ChainSnapshot, GrantId, GrantRecord, LinkId, NodeId, NodeRecord, PrincipalId, PrincipalRecord,
    WrappedKey,
};

use crate::error::Result;

/// Everything a move persists, applied as one transaction.
#[derive(Debug, Clone)]
pub struct MoveCommit {
    pub node_id: NodeId,

    /// The parent the caller observed. The commit fails with a conflict if
    /// the node has been moved since.
    pub expected_parent: Option<NodeId>,

    /// The new parent; `None` makes the node a root.
    pub new_parent: Option<NodeId>,

    /// The node key wrapped for the new parent (or sealed to the owner).
    pub wrapped_key: WrappedKey,

    /// Owner of the destination tree. The node and all its descendants
    /// take this owner.
    pub owner: PrincipalId,

    pub modified_at: i64,
}

/// The Store trait: async interface for vault persistence.
///
/// All methods are async to support both sync (SQLite) and async backends.
/// For SQLite, we use `spawn_blocking` internally to avoid blocking the runtime.
///
/// # Design Notes
///
/// - **Single-transaction writes**: a move rewrites the parent pointer and
///   the wrapped key together; a grant is inserted and visible together.
/// - **Snapshots**: [`chain_snapshot`](Store::chain_snapshot) reads a node's
///   ancestors and their grants in one consistent read.
/// - **Structure only**: grants are never touched by moves.
#[async_trait]
pub trait Store: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Principal Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert a newly registered principal. Fails with `Conflict` on a
    /// duplicate id.
    async fn insert_principal(&self, principal: &PrincipalRecord) -> Result<()>;

    /// Get a principal by id.
    async fn get_principal(&self, id: &PrincipalId) -> Result<Option<PrincipalRecord>>;

    /// Replace a principal's wrapped private key, salts and verifier.
    async fn update_principal_keys(&self, principal: &PrincipalRecord) -> Result<()>;

    // ─────────────────────────────────────────────────────────────────────────
    // Node Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert a node. The parent, if any, must exist.
    async fn insert_node(&self, node: &NodeRecord) -> Result<()>;

    /// Get a node by id.
    async fn get_node(&self, id: &NodeId) -> Result<Option<NodeRecord>>;

    /// Replace a node's encrypted attributes, content nonce, size and
    /// modification time.
    ///
    /// The parent pointer and wrapped key are left alone; those only change
    /// through [`commit_move`](Store::commit_move).
    async fn update_node_attributes(&self, node: &NodeRecord) -> Result<()>;

    /// List the direct children of a node, oldest first.
    async fn list_children(&self, parent: &NodeId) -> Result<Vec<NodeRecord>>;

    /// Atomically reparent a node and replace its wrapped key.
    ///
    /// Fails with `Cycle` if the new parent is the node or one of its
    /// descendants, `Conflict` if the node's parent is no longer
    /// `expected_parent`, and `NotFound` if either node is missing. On any
    /// failure nothing is written.
    async fn commit_move(&self, commit: &MoveCommit) -> Result<()>;

    // ─────────────────────────────────────────────────────────────────────────
    // Grant Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert a grant. The node must exist and a link id may only be used
    /// once.
    async fn insert_grant(&self, grant: &GrantRecord) -> Result<()>;

    /// Get a grant by id.
    async fn get_grant(&self, id: &GrantId) -> Result<Option<GrantRecord>>;

    /// Find the grant issued for a link id.
    async fn get_link_grant(&self, link_id: &LinkId) -> Result<Option<GrantRecord>>;

    /// Replace a grant's edit flag, grantee details and wrapped key.
    async fn update_grant(&self, grant: &GrantRecord) -> Result<()>;

    /// Delete one grant. Returns whether it existed.
    async fn delete_grant(&self, id: &GrantId) -> Result<bool>;

    /// List the grants attached directly to a node, oldest first.
    async fn list_grants(&self, node_id: &NodeId) -> Result<Vec<GrantRecord>>;

    /// Delete every grant whose expiry is before `now`. Returns the ids
    /// removed.
    async fn delete_expired_grants(&self, now: i64) -> Result<Vec<GrantId>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Chain Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Read a node's ancestor chain with each node's grants, target first.
    ///
    /// Returns `None` if the node does not exist. Fails with `InvalidData`
    /// if the chain is longer than `max_depth` or loops.
    async fn chain_snapshot(&self, node_id: &NodeId, max_depth: usize) -> Result<Option<ChainSnapshot>>;
}
