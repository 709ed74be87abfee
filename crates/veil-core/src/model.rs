//! The persisted record model.
//!
//! These are the rows the server holds. Every secret in them is either
//! wrapped or encrypted; nothing here can be read without a key the server
//! never sees.

use serde::{Deserialize, Serialize};

use crate::crypto::{decrypt, encrypt, Nonce, SealedKey, SymmetricKey, X25519PublicKey};
use crate::error::Result;
use crate::kdf::Salt;
use crate::types::{GrantId, LinkId, NodeId, PrincipalId};

/// A key wrapped under some other key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WrappedKey {
    /// Wrapped under a symmetric key: a parent node key or a link key.
    Symmetric {
        /// Nonce used for the wrap.
        nonce: Nonce,
        /// The wrapped key (includes authentication tag).
        ciphertext: Vec<u8>,
    },

    /// Sealed to a principal's public key.
    Sealed(SealedKey),
}

impl WrappedKey {
    /// The wrap nonce.
    pub fn nonce(&self) -> &Nonce {
        match self {
            WrappedKey::Symmetric { nonce, .. } => nonce,
            WrappedKey::Sealed(sealed) => &sealed.nonce,
        }
    }

    /// The wrapped key bytes.
    pub fn ciphertext(&self) -> &[u8] {
        match self {
            WrappedKey::Symmetric { ciphertext, .. } => ciphertext,
            WrappedKey::Sealed(sealed) => &sealed.ciphertext,
        }
    }

    /// The sender's ephemeral public key, for sealed wraps.
    pub fn ephemeral_public(&self) -> Option<&X25519PublicKey> {
        match self {
            WrappedKey::Symmetric { .. } => None,
            WrappedKey::Sealed(sealed) => Some(&sealed.ephemeral_public),
        }
    }

    /// Whether this key is sealed to a public key.
    pub fn is_sealed(&self) -> bool {
        matches!(self, WrappedKey::Sealed(_))
    }

    /// Reassemble from storage columns.
    pub fn from_parts(
        ciphertext: Vec<u8>,
        nonce: Nonce,
        ephemeral_public: Option<X25519PublicKey>,
    ) -> Self {
        match ephemeral_public {
            Some(ephemeral_public) => WrappedKey::Sealed(SealedKey {
                ephemeral_public,
                nonce,
                ciphertext,
            }),
            None => WrappedKey::Symmetric { nonce, ciphertext },
        }
    }
}

/// An encrypted attribute with its own nonce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedField {
    /// Nonce used for this encryption only.
    pub nonce: Nonce,

    /// The encrypted data (includes authentication tag).
    pub ciphertext: Vec<u8>,
}

impl EncryptedField {
    /// Encrypt `plaintext` under `key` with a fresh nonce.
    pub fn seal(plaintext: &[u8], key: &SymmetricKey) -> Result<Self> {
        let nonce = Nonce::generate();
        let ciphertext = encrypt(plaintext, key, &nonce)?;
        Ok(Self { nonce, ciphertext })
    }

    /// Decrypt with `key`.
    pub fn open(&self, key: &SymmetricKey) -> Result<Vec<u8>> {
        decrypt(&self.ciphertext, key, &self.nonce)
    }
}

/// A registered principal as stored by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalRecord {
    pub id: PrincipalId,

    /// Plaintext X25519 public key.
    pub public_key: X25519PublicKey,

    /// Private key encrypted under `derive_key(password, key_salt)`.
    pub wrapped_private_key: EncryptedField,

    /// Salt for the private-key wrapping key.
    pub key_salt: Salt,

    /// Salt for the password verifier.
    pub auth_salt: Salt,

    /// Hash of the key derived from the password and `auth_salt`.
    pub password_verifier: [u8; 32],

    pub created_at: i64,
    pub updated_at: i64,
}

/// File or folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum NodeKind {
    File = 0,
    Folder = 1,
}

impl NodeKind {
    /// Convert to the stored discriminant.
    pub const fn to_u8(self) -> u8 {
        self as u8
    }

    /// Parse a stored discriminant.
    pub const fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(NodeKind::File),
            1 => Some(NodeKind::Folder),
            _ => None,
        }
    }
}

/// A file or folder as stored by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRecord {
    pub id: NodeId,

    /// `None` for a tree root.
    pub parent: Option<NodeId>,

    pub owner: PrincipalId,

    pub kind: NodeKind,

    /// The content key, wrapped under the parent key (or sealed to the
    /// owner for a root).
    pub wrapped_key: WrappedKey,

    pub name: EncryptedField,

    pub mime_type: EncryptedField,

    /// Nonce of the content ciphertext held by the blob store. `None` until
    /// content is written, and always `None` for folders.
    pub content_nonce: Option<Nonce>,

    /// Plaintext content size in bytes.
    pub size: u64,

    pub created_at: i64,
    pub modified_at: i64,
}

impl NodeRecord {
    /// Whether this node is a tree root.
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

/// Who a grant is for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grantee {
    /// A registered principal. The node key is sealed to their public key.
    User(PrincipalId),

    /// Anyone holding the link. The node key is wrapped under a link key.
    Link {
        link_id: LinkId,
        /// Present when the link is password protected.
        password_salt: Option<Salt>,
    },
}

/// A grant as stored by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantRecord {
    pub id: GrantId,

    /// The node this grant attaches to. Its effect covers all descendants.
    pub node_id: NodeId,

    pub grantee: Grantee,

    /// Edit (true) or view (false).
    pub edit: bool,

    /// Expiry in Unix milliseconds; `None` never expires.
    pub expires_at: Option<i64>,

    /// The node key wrapped for the grantee.
    pub wrapped_key: WrappedKey,

    pub created_by: PrincipalId,
    pub created_at: i64,
}

impl GrantRecord {
    /// Whether the grant is past its expiry at `now`.
    ///
    /// A grant is still valid at exactly `expires_at`.
    pub fn is_expired(&self, now: i64) -> bool {
        matches!(self.expires_at, Some(expires) if now > expires)
    }

    /// The principal this grant names, for user grants.
    pub fn principal(&self) -> Option<&PrincipalId> {
        match &self.grantee {
            Grantee::User(id) => Some(id),
            Grantee::Link { .. } => None,
        }
    }

    /// The link id, for link grants.
    pub fn link_id(&self) -> Option<&LinkId> {
        match &self.grantee {
            Grantee::User(_) => None,
            Grantee::Link { link_id, .. } => Some(link_id),
        }
    }

    /// The password salt, for password-protected link grants.
    pub fn password_salt(&self) -> Option<&Salt> {
        match &self.grantee {
            Grantee::Link { password_salt, .. } => password_salt.as_ref(),
            Grantee::User(_) => None,
        }
    }

    /// Whether a password is needed to use this grant.
    pub fn is_password_protected(&self) -> bool {
        self.password_salt().is_some()
    }
}

/// One node on an ancestor chain, with the grants attached to it.
#[derive(Debug, Clone)]
pub struct ChainLink {
    pub node: NodeRecord,
    pub grants: Vec<GrantRecord>,
}

/// A node's ancestor chain, target first and root last.
///
/// Read as one consistent snapshot; every authorization decision for a
/// request is made against the same snapshot.
#[derive(Debug, Clone)]
pub struct ChainSnapshot {
    links: Vec<ChainLink>,
}

impl ChainSnapshot {
    /// Build from links ordered target first.
    pub fn new(links: Vec<ChainLink>) -> Self {
        Self { links }
    }

    /// The target node.
    pub fn target(&self) -> Option<&NodeRecord> {
        self.links.first().map(|l| &l.node)
    }

    /// The root of the target's tree.
    pub fn root(&self) -> Option<&NodeRecord> {
        self.links.last().map(|l| &l.node)
    }

    /// All links, target first.
    pub fn links(&self) -> &[ChainLink] {
        &self.links
    }

    /// Number of nodes on the chain.
    pub fn len(&self) -> usize {
        self.links.len()
    }

    /// Whether the chain is empty.
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Whether `node_id` is on the chain (the target counts).
    pub fn contains(&self, node_id: &NodeId) -> bool {
        self.position(node_id).is_some()
    }

    /// Distance of `node_id` from the target: 0 for the target itself.
    pub fn position(&self, node_id: &NodeId) -> Option<usize> {
        self.links.iter().position(|l| &l.node.id == node_id)
    }
}
