//! The move protocol.
//!
//! A move re-wraps the node key under the destination (the new parent's
//! key, or the owner's public key for a root destination) and then swaps
//! the parent pointer and wrapped key in a single store transaction.
//! Content, descendants and grants are untouched: descendants stay wrapped
//! under the node key, which does not change. Ownership follows the tree, so
//! the moved subtree takes the owner of the tree it lands in.
//!
//! ```text
//! Requested ──► KeyRewrapped ──► Committed
//!     │               │
//!     └───────────────┴────────► Aborted
//! ```
//!
//! Nothing is persisted before `Committed`, so an aborted move leaves no
//! trace.

use std::time::Duration;

use veil_core::{NodeId, NodeKind};
use veil_perms::{rewrap, AccessLevel, WrapTarget};
use veil_store::{BlobStore, MoveCommit, Store};

use super::Vault;
use crate::error::{Result, VaultError};
use crate::session::Actor;

/// Stages of a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveState {
    /// Authorized, nothing computed yet.
    Requested,
    /// The node key is wrapped for its destination; nothing is stored yet.
    KeyRewrapped,
    /// Parent pointer and wrapped key persisted together.
    Committed,
    /// Rejected or failed before commit.
    Aborted,
}

impl MoveState {
    /// Whether `next` is a legal successor of `self`.
    pub fn can_advance_to(self, next: MoveState) -> bool {
        use MoveState::*;
        matches!(
            (self, next),
            (Requested, KeyRewrapped) | (Requested, Aborted) | (KeyRewrapped, Committed) | (KeyRewrapped, Aborted)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, MoveState::Committed | MoveState::Aborted)
    }
}

struct MoveTracker {
    node_id: NodeId,
    state: MoveState,
}

impl MoveTracker {
    fn new(node_id: NodeId) -> Self {
        tracing::debug!(node = %node_id, state = ?MoveState::Requested, "move");
        Self {
            node_id,
            state: MoveState::Requested,
        }
    }

    fn advance(&mut self, next: MoveState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "illegal move transition {:?} -> {:?}",
            self.state,
            next
        );
        tracing::debug!(node = %self.node_id, from = ?self.state, to = ?next, "move");
        self.state = next;
    }
}

impl<S: Store, B: BlobStore> Vault<S, B> {
    /// Move a node under `new_parent`, or make it a root with `None`.
    ///
    /// Requires edit access on the node and on the destination folder. A
    /// destination inside the node's own subtree is rejected with
    /// [`VaultError::CycleRejected`] before any key is touched; the store
    /// repeats the check inside the commit transaction.
    pub async fn move_node(&self, actor: Actor<'_>, node_id: &NodeId, new_parent: Option<&NodeId>) -> Result<()> {
        let mut tracker = MoveTracker::new(*node_id);
        let result = self.run_move(actor, node_id, new_parent, &mut tracker).await;

        match &result {
            Ok(()) => tracker.advance(MoveState::Committed),
            Err(e) => {
                tracker.advance(MoveState::Aborted);
                tracing::debug!(node = %node_id, error = %e, "move aborted");
            }
        }
        result
    }

    async fn run_move(
        &self,
        actor: Actor<'_>,
        node_id: &NodeId,
        new_parent: Option<&NodeId>,
        tracker: &mut MoveTracker,
    ) -> Result<()> {
        let source = self.authorized(actor, node_id, AccessLevel::Editor).await?;
        let node_key = self.node_key(&source, actor)?;

        let (wrapped_key, owner) = match new_parent {
            Some(parent_id) => {
                let destination = self.authorized(actor, parent_id, AccessLevel::Editor).await?;
                if destination.snapshot.contains(node_id) {
                    return Err(VaultError::CycleRejected);
                }
                if destination.node.kind != NodeKind::Folder {
                    return Err(VaultError::InvalidRequest(format!("{parent_id} is not a folder")));
                }
                let parent_key = self.node_key(&destination, actor)?;
                (
                    rewrap(&node_key, WrapTarget::Parent(&parent_key))?,
                    destination.tree_owner(),
                )
            }
            None => {
                let owner = source.tree_owner();
                let owner_key = self.public_key(&owner).await?;
                (rewrap(&node_key, WrapTarget::Owner(&owner_key))?, owner)
            }
        };
        if owner != source.tree_owner() {
            tracing::debug!(node = %node_id, owner = %owner, "move hands subtree to another owner");
        }
        tracker.advance(MoveState::KeyRewrapped);

        let commit = MoveCommit {
            node_id: *node_id,
            expected_parent: source.node.parent,
            new_parent: new_parent.copied(),
            wrapped_key,
            owner,
            modified_at: source.now,
        };
        self.commit_move(&commit).await
    }

    /// Persist a move, re-running the same commit on lock contention.
    ///
    /// The wrapped key (and its nonce) is fixed before the first attempt.
    async fn commit_move(&self, commit: &MoveCommit) -> Result<()> {
        let mut attempt = 0u32;
        loop {
            match self.store.commit_move(commit).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_retryable() && attempt < self.config.max_commit_retries => {
                    attempt += 1;
                    tracing::warn!(node = %commit.node_id, attempt, error = %e, "move commit contended, retrying");
                    tokio::time::sleep(Duration::from_millis(10 * u64::from(attempt))).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_move_state_transitions() {
        use MoveState::*;
        assert!(Requested.can_advance_to(KeyRewrapped));
        assert!(KeyRewrapped.can_advance_to(Committed));
        assert!(Requested.can_advance_to(Aborted));
        assert!(KeyRewrapped.can_advance_to(Aborted));

        assert!(!Requested.can_advance_to(Committed));
        assert!(!Committed.can_advance_to(Aborted));
        assert!(!Aborted.can_advance_to(KeyRewrapped));
    }

    #[test]
    fn test_terminal_states() {
        assert!(MoveState::Committed.is_terminal());
        assert!(MoveState::Aborted.is_terminal());
        assert!(!MoveState::Requested.is_terminal());
        assert!(!MoveState::KeyRewrapped.is_terminal());
    }

    #[test]
    fn test_tracker_follows_happy_path() {
        let mut tracker = MoveTracker::new(NodeId::generate());
        tracker.advance(MoveState::KeyRewrapped);
        tracker.advance(MoveState::Committed);
        assert_eq!(tracker.state, MoveState::Committed);
    }
}
