//! # Veil Permissions
//!
//! Envelope keys, grants and access resolution.
//!
//! ## Overview
//!
//! Every node carries one symmetric content key. The key is wrapped down the
//! tree: a child's key is wrapped under its parent's key, and a root's key is
//! sealed to its owner. Sharing adds grants, each holding an independent
//! wrapped copy of the shared node's key:
//!
//! - **User grant**: the key sealed to the grantee's X25519 public key
//! - **Link grant**: the key wrapped under a link key derived from a random
//!   link secret (kept in the link's URL fragment) and, optionally, a
//!   password
//!
//! A grant's effect flows down to every descendant of the node it attaches
//! to, never up. [`resolve`] folds the ancestor chain into an
//! [`AccessLevel`]; [`KeyPath`] gives the requester the wrapped keys to
//! recover the node key locally.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use veil_core::{ChainSnapshot, KdfParams, PrincipalId};
//! use veil_perms::{resolve, AccessLevel, Requester};
//!
//! # fn snapshot() -> ChainSnapshot { unimplemented!() }
//! let requester = PrincipalId::generate();
//! let resolution = resolve(&snapshot(), &Requester::User(requester), 0, &KdfParams::default());
//! if resolution.level >= AccessLevel::Viewer {
//!     // fetch the key path and unwrap locally
//! }
//! ```

pub mod access;
pub mod attributes;
pub mod envelope;
pub mod error;
pub mod grant;
pub mod keypath;
pub mod principal;
pub mod resolver;

pub use access::AccessLevel;
pub use attributes::{
    open_attributes, open_content, seal_attributes, seal_content, seal_text, verify_node_key,
    NodeAttributes, SealedAttributes, SealedContent,
};
pub use envelope::{create_node_key, rewrap, unwrap_node_key, wrap_for, wrap_symmetric, UnwrapKey, WrapTarget};
pub use error::{PermsError, Result};
pub use grant::{
    derive_link_key, link_grant, link_key_for_grant, open_link_grant, rewrap_link_grant,
    user_grant, GrantOptions, IssuedLink, LinkCredentials, LinkSecret, LINK_SECRET_SIZE,
};
pub use keypath::{KeyAnchor, KeyPath, PathEdge, Unlock};
pub use principal::{
    create_principal, password_verifier, rewrap_private_key, unlock_private_key, verify_password,
    NewPrincipal,
};
pub use resolver::{resolve, Requester, Resolution};
