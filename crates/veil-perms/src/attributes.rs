//! Encrypted node attributes.
//!
//! Name, MIME type and content are encrypted under the node key, each with
//! its own nonce. Re-encrypting an attribute always draws a new nonce.

use veil_core::{decrypt, encrypt, EncryptedField, Nonce, NodeRecord, SymmetricKey};

use crate::error::{PermsError, Result};

/// Decrypted node metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeAttributes {
    pub name: String,
    pub mime_type: String,
}

/// Encrypted name and MIME type, ready to store.
#[derive(Debug, Clone)]
pub struct SealedAttributes {
    pub name: EncryptedField,
    pub mime_type: EncryptedField,
}

/// Encrypted content, ready for the blob store.
#[derive(Debug, Clone)]
pub struct SealedContent {
    pub nonce: Nonce,
    pub ciphertext: Vec<u8>,
    /// Plaintext length.
    pub size: u64,
}

/// Encrypt a name and MIME type under `node_key`.
pub fn seal_attributes(name: &str, mime_type: &str, node_key: &SymmetricKey) -> Result<SealedAttributes> {
    Ok(SealedAttributes {
        name: EncryptedField::seal(name.as_bytes(), node_key)?,
        mime_type: EncryptedField::seal(mime_type.as_bytes(), node_key)?,
    })
}

/// Encrypt a single text attribute under `node_key`.
pub fn seal_text(value: &str, node_key: &SymmetricKey) -> Result<EncryptedField> {
    Ok(EncryptedField::seal(value.as_bytes(), node_key)?)
}

/// Decrypt a node's name and MIME type.
pub fn open_attributes(node: &NodeRecord, node_key: &SymmetricKey) -> Result<NodeAttributes> {
    Ok(NodeAttributes {
        name: open_text(&node.name, node_key)?,
        mime_type: open_text(&node.mime_type, node_key)?,
    })
}

fn open_text(field: &EncryptedField, node_key: &SymmetricKey) -> Result<String> {
    let bytes = field.open(node_key)?;
    String::from_utf8(bytes).map_err(|e| PermsError::InvalidAttribute(e.to_string()))
}

/// Check that `node_key` is this node's key.
///
/// Every node has an encrypted name, so decrypting it proves possession.
pub fn verify_node_key(node: &NodeRecord, node_key: &SymmetricKey) -> Result<()> {
    node.name.open(node_key)?;
    Ok(())
}

/// Encrypt file content under `node_key` with a fresh nonce.
pub fn seal_content(plaintext: &[u8], node_key: &SymmetricKey) -> Result<SealedContent> {
    let nonce = Nonce::generate();
    let ciphertext = encrypt(plaintext, node_key, &nonce)?;
    Ok(SealedContent {
        nonce,
        ciphertext,
        size: plaintext.len() as u64,
    })
}

/// Decrypt file content.
pub fn open_content(ciphertext: &[u8], nonce: &Nonce, node_key: &SymmetricKey) -> Result<Vec<u8>> {
    Ok(decrypt(ciphertext, node_key, nonce)?)
}
