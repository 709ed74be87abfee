//! The key envelope manager.
//!
//! Every node has one symmetric content key. That key is never stored
//! unwrapped: the tree edge wraps it under the parent's key (or seals it to
//! the owner for a root), and each grant holds an independent copy wrapped
//! for its grantee. Changing a wrapping never touches the node's content.

use veil_core::{
    open_sealed, seal_key, unwrap, wrap, Nonce, PrivateKey, SymmetricKey, WrappedKey,
    X25519PublicKey,
};

use crate::error::Result;

/// What a node key gets wrapped under.
#[derive(Debug, Clone, Copy)]
pub enum WrapTarget<'a> {
    /// The parent node's content key.
    Parent(&'a SymmetricKey),

    /// The owning principal's public key, for tree roots.
    Owner(&'a X25519PublicKey),
}

/// What a wrapped node key gets unwrapped with.
#[derive(Debug, Clone, Copy)]
pub enum UnwrapKey<'a> {
    /// The parent node's content key (tree edge).
    Parent(&'a SymmetricKey),

    /// A principal's private key (root edge or user grant).
    Private(&'a PrivateKey),

    /// A link key derived from link credentials (link grant).
    Link(&'a SymmetricKey),
}

/// Wrap `node_key` for `target` under a freshly generated nonce.
pub fn wrap_for(node_key: &SymmetricKey, target: WrapTarget<'_>) -> Result<WrappedKey> {
    match target {
        WrapTarget::Parent(parent_key) => wrap_symmetric(node_key, parent_key),
        WrapTarget::Owner(public_key) => Ok(WrappedKey::Sealed(seal_key(node_key, public_key)?)),
    }
}

/// Wrap `node_key` under a symmetric key with a fresh nonce.
pub fn wrap_symmetric(node_key: &SymmetricKey, wrapping_key: &SymmetricKey) -> Result<WrappedKey> {
    let nonce = Nonce::generate();
    let ciphertext = wrap(node_key, wrapping_key, &nonce)?;
    Ok(WrappedKey::Symmetric { nonce, ciphertext })
}

/// Create a new node key wrapped for `target`.
pub fn create_node_key(target: WrapTarget<'_>) -> Result<(SymmetricKey, WrappedKey)> {
    let node_key = SymmetricKey::generate();
    let wrapped = wrap_for(&node_key, target)?;
    Ok((node_key, wrapped))
}

/// Re-wrap an existing node key for a new target.
///
/// The key value is unchanged; the wrap always gets a new nonce, so a
/// re-wrap never repeats an earlier `(key, nonce)` pair.
pub fn rewrap(node_key: &SymmetricKey, target: WrapTarget<'_>) -> Result<WrappedKey> {
    wrap_for(node_key, target)
}

/// Recover a node key.
///
/// A symmetric wrap opened with a private key (or a sealed wrap opened with
/// a symmetric key) fails as an integrity error, the same as a wrong key.
pub fn unwrap_node_key(wrapped: &WrappedKey, key: UnwrapKey<'_>) -> Result<SymmetricKey> {
    let node_key = match (wrapped, key) {
        (WrappedKey::Symmetric { nonce, ciphertext }, UnwrapKey::Parent(k))
        | (WrappedKey::Symmetric { nonce, ciphertext }, UnwrapKey::Link(k)) => {
            unwrap(ciphertext, k, nonce)?
        }
        (WrappedKey::Sealed(sealed), UnwrapKey::Private(private_key)) => {
            open_sealed(sealed, private_key)?
        }
        _ => return Err(veil_core::CoreError::Integrity.into()),
    };
    Ok(node_key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PermsError;

    #[test]
    fn test_child_unwraps_with_parent_key() {
        let parent = SymmetricKey::generate();
        let (child, wrapped) = create_node_key(WrapTarget::Parent(&parent)).unwrap();

        let recovered = unwrap_node_key(&wrapped, UnwrapKey::Parent(&parent)).unwrap();
        assert_eq!(recovered.as_bytes(), child.as_bytes());
    }

    #[test]
    fn test_root_unwraps_with_owner_private_key() {
        let owner = PrivateKey::generate();
        let (root, wrapped) = create_node_key(WrapTarget::Owner(&owner.public_key())).unwrap();
        assert!(wrapped.is_sealed());

        let recovered = unwrap_node_key(&wrapped, UnwrapKey::Private(&owner)).unwrap();
        assert_eq!(recovered.as_bytes(), root.as_bytes());
    }

    #[test]
    fn test_mismatched_unwrap_key_is_integrity_error() {
        let parent = SymmetricKey::generate();
        let (_, wrapped) = create_node_key(WrapTarget::Parent(&parent)).unwrap();

        let err = unwrap_node_key(&wrapped, UnwrapKey::Private(&PrivateKey::generate())).unwrap_err();
        assert!(err.is_integrity());

        let err = unwrap_node_key(&wrapped, UnwrapKey::Parent(&SymmetricKey::generate())).unwrap_err();
        assert!(matches!(err, PermsError::Core(veil_core::CoreError::Integrity)));
    }

    #[test]
    fn test_rewrap_keeps_key_changes_nonce() {
        let a = SymmetricKey::generate();
        let b = SymmetricKey::generate();
        let (node, original) = create_node_key(WrapTarget::Parent(&a)).unwrap();

        let moved = rewrap(&node, WrapTarget::Parent(&b)).unwrap();
        assert_ne!(moved.nonce(), original.nonce());

        let recovered = unwrap_node_key(&moved, UnwrapKey::Parent(&b)).unwrap();
        assert_eq!(recovered.as_bytes(), node.as_bytes());
        assert!(unwrap_node_key(&moved, UnwrapKey::Parent(&a)).is_err());
    }
}
