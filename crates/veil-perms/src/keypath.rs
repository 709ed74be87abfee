//! Key paths: how a requester recovers a node key.
//!
//! The server hands out wrapped material only. A path starts at an anchor
//! the requester can open themselves (a root sealed to them, a user grant
//! sealed to them, or a link grant) and then descends tree edges, each
//! wrapped under the key of the node above. The client unlocks the path
//! locally.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use veil_core::{
    ChainSnapshot, GrantId, GrantRecord, Grantee, KdfParams, LinkId, NodeId, PrivateKey, Salt,
    SymmetricKey, WrappedKey,
};

use crate::envelope::{unwrap_node_key, UnwrapKey};
use crate::error::{PermsError, Result};
use crate::grant::{derive_link_key, LinkCredentials};
use crate::resolver::Requester;

/// Where a key path starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyAnchor {
    /// A tree root, sealed to its owner.
    Root { node_id: NodeId, wrapped: WrappedKey },

    /// A user grant, sealed to the grantee.
    UserGrant {
        grant_id: GrantId,
        node_id: NodeId,
        wrapped: WrappedKey,
    },

    /// A link grant, wrapped under a link key.
    LinkGrant {
        grant_id: GrantId,
        node_id: NodeId,
        link_id: LinkId,
        password_salt: Option<Salt>,
        wrapped: WrappedKey,
    },
}

impl KeyAnchor {
    /// The node whose key the anchor yields.
    pub fn node_id(&self) -> &NodeId {
        match self {
            KeyAnchor::Root { node_id, .. }
            | KeyAnchor::UserGrant { node_id, .. }
            | KeyAnchor::LinkGrant { node_id, .. } => node_id,
        }
    }
}

/// One downward tree edge: a node key wrapped under its parent's key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathEdge {
    pub node_id: NodeId,
    pub wrapped: WrappedKey,
}

/// What the requester unlocks the anchor with.
#[derive(Debug, Clone, Copy)]
pub enum Unlock<'a> {
    Private(&'a PrivateKey),
    Link(&'a LinkCredentials),
}

/// The wrapped keys leading from an anchor down to a target node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPath {
    pub target: NodeId,
    pub anchor: KeyAnchor,
    /// Edges below the anchor, nearest the anchor first.
    pub edges: Vec<PathEdge>,
}

fn anchor_grant(grant: &GrantRecord, requester: &Requester<'_>, now: i64) -> Option<KeyAnchor> {
    if grant.is_expired(now) {
        return None;
    }
    match (&grant.grantee, requester) {
        (Grantee::User(grantee), Requester::User(id)) if grantee == id => Some(KeyAnchor::UserGrant {
            grant_id: grant.id,
            node_id: grant.node_id,
            wrapped: grant.wrapped_key.clone(),
        }),
        (Grantee::Link { link_id, password_salt }, Requester::Link(credentials))
            if *link_id == credentials.link_id =>
        {
            Some(KeyAnchor::LinkGrant {
                grant_id: grant.id,
                node_id: grant.node_id,
                link_id: *link_id,
                password_salt: *password_salt,
                wrapped: grant.wrapped_key.clone(),
            })
        }
        _ => None,
    }
}

impl KeyPath {
    /// Find the shortest path for `requester` to the snapshot's target.
    ///
    /// Grants closest to the target win since they need the fewest unwraps.
    pub fn find(snapshot: &ChainSnapshot, requester: &Requester<'_>, now: i64) -> Result<Self> {
        let links = snapshot.links();
        let target = snapshot
            .target()
            .map(|n| n.id)
            .ok_or_else(|| PermsError::NoKeyPath("empty chain".into()))?;

        for (depth, link) in links.iter().enumerate() {
            let mut anchor = link
                .grants
                .iter()
                .find_map(|grant| anchor_grant(grant, requester, now));

            let is_root = depth + 1 == links.len() && link.node.is_root();
            if anchor.is_none() && is_root && requester.principal() == Some(link.node.owner) {
                anchor = Some(KeyAnchor::Root {
                    node_id: link.node.id,
                    wrapped: link.node.wrapped_key.clone(),
                });
            }

            if let Some(anchor) = anchor {
                let edges = links[..depth]
                    .iter()
                    .rev()
                    .map(|l| PathEdge {
                        node_id: l.node.id,
                        wrapped: l.node.wrapped_key.clone(),
                    })
                    .collect();
                return Ok(KeyPath {
                    target,
                    anchor,
                    edges,
                });
            }
        }

        Err(PermsError::NoKeyPath(target.to_hex()))
    }

    /// Number of unwraps needed to reach the target.
    pub fn hops(&self) -> usize {
        self.edges.len() + 1
    }

    /// Unlock the anchor and walk down to the target key.
    pub fn unlock(&self, with: Unlock<'_>, link_params: &KdfParams) -> Result<SymmetricKey> {
        let mut key = match (&self.anchor, with) {
            (KeyAnchor::Root { wrapped, .. }, Unlock::Private(private_key))
            | (KeyAnchor::UserGrant { wrapped, .. }, Unlock::Private(private_key)) => {
                unwrap_node_key(wrapped, UnwrapKey::Private(private_key))?
            }
            (
                KeyAnchor::LinkGrant {
                    link_id,
                    password_salt,
                    wrapped,
                    ..
                },
                Unlock::Link(credentials),
            ) => {
                let password: Option<(&SecretString, &Salt)> =
                    match (credentials.password.as_ref(), password_salt.as_ref()) {
                        (Some(password), Some(salt)) => Some((password, salt)),
                        (None, Some(_)) => return Err(PermsError::PasswordRejected),
                        (_, None) => None,
                    };
                let link_key = derive_link_key(link_id, &credentials.secret, password, link_params)?;
                unwrap_node_key(wrapped, UnwrapKey::Link(&link_key))?
            }
            _ => {
                return Err(PermsError::InvalidGrant(
                    "unlock material does not match anchor".into(),
                ))
            }
        };

        for edge in &self.edges {
            key = unwrap_node_key(&edge.wrapped, UnwrapKey::Parent(&key))?;
        }
        Ok(key)
    }

    /// Serialize to CBOR bytes for transport to the client.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf).map_err(|e| PermsError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize from CBOR bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ciborium::from_reader(bytes).map_err(|e| PermsError::Serialization(e.to_string()))
    }
}
