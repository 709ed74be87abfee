//! Record builders shared by the store tests.
//!
//! The store never decrypts anything, so these carry random bytes where
//! real records would carry ciphertext.

use veil_core::{
    EncryptedField, GrantId, GrantRecord, Grantee, LinkId, NodeId, NodeKind, NodeRecord, Nonce,
    PrincipalId, PrincipalRecord, Salt, SealedKey, WrappedKey, X25519PublicKey,
};

fn field(len: usize) -> EncryptedField {
    EncryptedField {
        nonce: Nonce::generate(),
        ciphertext: vec![0x5a; len],
    }
}

pub(crate) fn principal() -> PrincipalRecord {
    PrincipalRecord {
        id: PrincipalId::generate(),
        public_key: X25519PublicKey::from_bytes([9u8; 32]),
        wrapped_private_key: field(48),
        key_salt: Salt::generate(),
        auth_salt: Salt::generate(),
        password_verifier: [3u8; 32],
        created_at: 1,
        updated_at: 1,
    }
}

pub(crate) fn node_under(parent: Option<NodeId>) -> NodeRecord {
    let wrapped_key = match parent {
        Some(_) => WrappedKey::Symmetric {
            nonce: Nonce::generate(),
            ciphertext: vec![1u8; 48],
        },
        None => WrappedKey::Sealed(SealedKey {
            ephemeral_public: X25519PublicKey::from_bytes([4u8; 32]),
            nonce: Nonce::generate(),
            ciphertext: vec![2u8; 48],
        }),
    };
    NodeRecord {
        id: NodeId::generate(),
        parent,
        owner: PrincipalId::from_bytes([1u8; 16]),
        kind: NodeKind::Folder,
        wrapped_key,
        name: field(24),
        mime_type: field(26),
        content_nonce: None,
        size: 0,
        created_at: 10,
        modified_at: 10,
    }
}

pub(crate) fn grant_on(node: &NodeRecord) -> GrantRecord {
    GrantRecord {
        id: GrantId::generate(),
        node_id: node.id,
        grantee: Grantee::User(PrincipalId::generate()),
        edit: true,
        expires_at: None,
        wrapped_key: WrappedKey::Sealed(SealedKey {
            ephemeral_public: X25519PublicKey::from_bytes([6u8; 32]),
            nonce: Nonce::generate(),
            ciphertext: vec![7u8; 48],
        }),
        created_by: node.owner,
        created_at: 20,
    }
}

pub(crate) fn link_grant_on(node: &NodeRecord, expires_at: Option<i64>) -> GrantRecord {
    GrantRecord {
        id: GrantId::generate(),
        node_id: node.id,
        grantee: Grantee::Link {
            link_id: LinkId::generate(),
            password_salt: Some(Salt::generate()),
        },
        edit: false,
        expires_at,
        wrapped_key: WrappedKey::Symmetric {
            nonce: Nonce::generate(),
            ciphertext: vec![8u8; 48],
        },
        created_by: node.owner,
        created_at: 30,
    }
}
