//! Grant construction and link credentials.
//!
//! A grant attaches to one node and holds its own wrapped copy of that
//! node's key. User grants seal the key to the grantee's public key. Link
//! grants wrap it under a link key derived from a random link secret that
//! never reaches the server, plus the link password when one is set.

use std::fmt;

use rand::rngs::OsRng;
use rand::RngCore;
use secrecy::SecretString;
use zeroize::{Zeroize, ZeroizeOnDrop};

use veil_core::{
    derive_key, derive_subkey, seal_key, GrantId, GrantRecord, Grantee, KdfParams, LinkId, NodeId,
    PrincipalId, Salt, SymmetricKey, WrappedKey, X25519PublicKey,
};

use crate::envelope::{unwrap_node_key, wrap_symmetric, UnwrapKey};
use crate::error::{PermsError, Result};

/// Size of a link secret in bytes.
pub const LINK_SECRET_SIZE: usize = 32;

const LINK_KEY_DOMAIN: &str = "veil 2024 link key v1";

/// The client-held half of a share link.
///
/// Travels in the link's URL fragment; the server only ever sees the
/// [`LinkId`].
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct LinkSecret([u8; LINK_SECRET_SIZE]);

impl LinkSecret {
    /// Generate a new random secret.
    pub fn generate() -> Self {
        let mut bytes = [0u8; LINK_SECRET_SIZE];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; LINK_SECRET_SIZE]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; LINK_SECRET_SIZE] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s).map_err(|e| PermsError::InvalidGrant(e.to_string()))?;
        let arr: [u8; LINK_SECRET_SIZE] = bytes
            .try_into()
            .map_err(|_| PermsError::InvalidGrant("link secret has wrong length".into()))?;
        Ok(Self(arr))
    }
}

impl fmt::Debug for LinkSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("LinkSecret([REDACTED])")
    }
}

/// Everything an anonymous link holder presents.
#[derive(Debug)]
pub struct LinkCredentials {
    pub link_id: LinkId,
    pub secret: LinkSecret,
    pub password: Option<SecretString>,
}

impl LinkCredentials {
    /// Credentials without a password.
    pub fn new(link_id: LinkId, secret: LinkSecret) -> Self {
        Self {
            link_id,
            secret,
            password: None,
        }
    }

    /// Attach a password.
    pub fn with_password(mut self, password: SecretString) -> Self {
        self.password = Some(password);
        self
    }

    /// Render as `link_id#secret`, the form handed to recipients.
    pub fn to_token(&self) -> String {
        format!("{}#{}", self.link_id.to_hex(), self.secret.to_hex())
    }

    /// Parse a token produced by [`to_token`](Self::to_token).
    pub fn from_token(token: &str) -> Result<Self> {
        let (id, secret) = token
            .split_once('#')
            .ok_or_else(|| PermsError::InvalidGrant("malformed link token".into()))?;
        let link_id = LinkId::from_hex(id).map_err(|e| PermsError::InvalidGrant(e.to_string()))?;
        Ok(Self::new(link_id, LinkSecret::from_hex(secret)?))
    }
}

/// Derive the key a link grant's node key is wrapped under.
///
/// `password` pairs the link password with the grant's per-link salt.
pub fn derive_link_key(
    link_id: &LinkId,
    secret: &LinkSecret,
    password: Option<(&SecretString, &Salt)>,
    params: &KdfParams,
) -> Result<SymmetricKey> {
    let key = match password {
        Some((password, salt)) => {
            let password_key = derive_key(password, salt, params)?;
            derive_subkey(
                LINK_KEY_DOMAIN,
                &[
                    link_id.as_bytes().as_slice(),
                    secret.as_bytes().as_slice(),
                    password_key.as_bytes().as_slice(),
                ],
            )
        }
        None => derive_subkey(
            LINK_KEY_DOMAIN,
            &[link_id.as_bytes().as_slice(), secret.as_bytes().as_slice()],
        ),
    };
    Ok(key)
}

/// Derive the link key for an existing grant from presented credentials.
///
/// Fails with [`PermsError::PasswordRejected`] when the grant is password
/// protected and no password was presented.
pub fn link_key_for_grant(
    grant: &GrantRecord,
    credentials: &LinkCredentials,
    params: &KdfParams,
) -> Result<SymmetricKey> {
    let link_id = grant
        .link_id()
        .ok_or_else(|| PermsError::InvalidGrant("not a link grant".into()))?;
    if link_id != &credentials.link_id {
        return Err(PermsError::InvalidGrant("link id mismatch".into()));
    }

    let password = match (grant.password_salt(), credentials.password.as_ref()) {
        (Some(salt), Some(password)) => Some((password, salt)),
        (Some(_), None) => return Err(PermsError::PasswordRejected),
        (None, _) => None,
    };
    derive_link_key(link_id, &credentials.secret, password, params)
}

/// Unwrap a link grant's node key with presented credentials.
///
/// A wrong password or secret surfaces as an integrity error.
pub fn open_link_grant(
    grant: &GrantRecord,
    credentials: &LinkCredentials,
    params: &KdfParams,
) -> Result<SymmetricKey> {
    let link_key = link_key_for_grant(grant, credentials, params)?;
    unwrap_node_key(&grant.wrapped_key, UnwrapKey::Link(&link_key))
}

/// Options shared by every new grant.
#[derive(Debug, Clone, Copy)]
pub struct GrantOptions {
    pub edit: bool,
    pub expires_at: Option<i64>,
    pub created_by: PrincipalId,
    pub now: i64,
}

/// Build a grant sealing `node_key` to a registered principal.
pub fn user_grant(
    node_id: NodeId,
    node_key: &SymmetricKey,
    grantee: PrincipalId,
    grantee_public_key: &X25519PublicKey,
    options: GrantOptions,
) -> Result<GrantRecord> {
    Ok(GrantRecord {
        id: GrantId::generate(),
        node_id,
        grantee: Grantee::User(grantee),
        edit: options.edit,
        expires_at: options.expires_at,
        wrapped_key: WrappedKey::Sealed(seal_key(node_key, grantee_public_key)?),
        created_by: options.created_by,
        created_at: options.now,
    })
}

/// A newly issued link grant and the secret to hand out with it.
#[derive(Debug)]
pub struct IssuedLink {
    pub link_id: LinkId,
    pub grant: GrantRecord,
    pub secret: LinkSecret,
}

impl IssuedLink {
    /// Credentials for the link, without the password.
    pub fn credentials(&self) -> LinkCredentials {
        LinkCredentials::new(self.link_id, self.secret.clone())
    }
}

/// Build a link grant for `node_key`.
pub fn link_grant(
    node_id: NodeId,
    node_key: &SymmetricKey,
    password: Option<&SecretString>,
    options: GrantOptions,
    params: &KdfParams,
) -> Result<IssuedLink> {
    let link_id = LinkId::generate();
    let secret = LinkSecret::generate();
    let password_salt = password.map(|_| Salt::generate());

    let link_key = derive_link_key(
        &link_id,
        &secret,
        password.zip(password_salt.as_ref()),
        params,
    )?;

    let grant = GrantRecord {
        id: GrantId::generate(),
        node_id,
        grantee: Grantee::Link {
            link_id,
            password_salt,
        },
        edit: options.edit,
        expires_at: options.expires_at,
        wrapped_key: wrap_symmetric(node_key, &link_key)?,
        created_by: options.created_by,
        created_at: options.now,
    };

    Ok(IssuedLink {
        link_id,
        grant,
        secret,
    })
}

/// Re-wrap a link grant for a new password (or none).
///
/// `current` must open the grant as it stands today, password included, and
/// must yield `node_key`. The link id and secret stay the same so existing
/// links keep working with the new password. The salt and nonce are always
/// fresh.
pub fn rewrap_link_grant(
    grant: &GrantRecord,
    node_key: &SymmetricKey,
    current: &LinkCredentials,
    new_password: Option<&SecretString>,
    params: &KdfParams,
) -> Result<GrantRecord> {
    let opened = open_link_grant(grant, current, params)?;
    if opened.as_bytes() != node_key.as_bytes() {
        return Err(veil_core::CoreError::Integrity.into());
    }

    let link_id = current.link_id;
    let password_salt = new_password.map(|_| Salt::generate());
    let link_key = derive_link_key(
        &link_id,
        &current.secret,
        new_password.zip(password_salt.as_ref()),
        params,
    )?;

    Ok(GrantRecord {
        grantee: Grantee::Link {
            link_id,
            password_salt,
        },
        wrapped_key: wrap_symmetric(node_key, &link_key)?,
        ..grant.clone()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use veil_core::{open_sealed, PrivateKey};

    fn options(edit: bool) -> GrantOptions {
        GrantOptions {
            edit,
            expires_at: None,
            created_by: PrincipalId::generate(),
            now: 1_000,
        }
    }

    fn params() -> KdfParams {
        KdfParams::insecure_fast()
    }

    #[test]
    fn test_user_grant_sealed_to_grantee() {
        let grantee = PrivateKey::generate();
        let node_key = SymmetricKey::generate();
        let grant = user_grant(
            NodeId::generate(),
            &node_key,
            PrincipalId::generate(),
            &grantee.public_key(),
            options(true),
        )
        .unwrap();

        let WrappedKey::Sealed(sealed) = &grant.wrapped_key else {
            panic!("user grant must be sealed");
        };
        let opened = open_sealed(sealed, &grantee).unwrap();
        assert_eq!(opened.as_bytes(), node_key.as_bytes());
        assert!(grant.edit);
    }

    #[test]
    fn test_link_grant_opens_with_credentials() {
        let node_key = SymmetricKey::generate();
        let issued = link_grant(NodeId::generate(), &node_key, None, options(false), &params()).unwrap();
        assert!(!issued.grant.is_password_protected());

        let opened = open_link_grant(&issued.grant, &issued.credentials(), &params()).unwrap();
        assert_eq!(opened.as_bytes(), node_key.as_bytes());
    }

    #[test]
    fn test_link_grant_wrong_secret_fails() {
        let issued = link_grant(
            NodeId::generate(),
            &SymmetricKey::generate(),
            None,
            options(false),
            &params(),
        )
        .unwrap();

        let forged = LinkCredentials::new(issued.credentials().link_id, LinkSecret::generate());
        assert!(open_link_grant(&issued.grant, &forged, &params()).unwrap_err().is_integrity());
    }

    #[test]
    fn test_password_link_requires_password() {
        let node_key = SymmetricKey::generate();
        let password = SecretString::from("open sesame");
        let issued = link_grant(
            NodeId::generate(),
            &node_key,
            Some(&password),
            options(false),
            &params(),
        )
        .unwrap();
        assert!(issued.grant.is_password_protected());

        let bare = issued.credentials();
        assert!(matches!(
            open_link_grant(&issued.grant, &bare, &params()),
            Err(PermsError::PasswordRejected)
        ));

        let wrong = issued.credentials().with_password(SecretString::from("nope"));
        assert!(open_link_grant(&issued.grant, &wrong, &params()).unwrap_err().is_integrity());

        let right = issued.credentials().with_password(password);
        let opened = open_link_grant(&issued.grant, &right, &params()).unwrap();
        assert_eq!(opened.as_bytes(), node_key.as_bytes());
    }

    #[test]
    fn test_rewrap_link_changes_password() {
        let node_key = SymmetricKey::generate();
        let old = SecretString::from("old");
        let new = SecretString::from("new");
        let issued = link_grant(NodeId::generate(), &node_key, Some(&old), options(false), &params()).unwrap();

        let current = issued.credentials().with_password(SecretString::from("old"));
        let updated = rewrap_link_grant(&issued.grant, &node_key, &current, Some(&new), &params()).unwrap();
        assert_eq!(updated.id, issued.grant.id);
        assert_ne!(updated.wrapped_key.nonce(), issued.grant.wrapped_key.nonce());
        assert_ne!(updated.password_salt(), issued.grant.password_salt());

        let with_old = issued.credentials().with_password(old);
        assert!(open_link_grant(&updated, &with_old, &params()).is_err());
        let with_new = issued.credentials().with_password(new);
        assert!(open_link_grant(&updated, &with_new, &params()).is_ok());
    }

    #[test]
    fn test_rewrap_link_requires_current_credentials() {
        let node_key = SymmetricKey::generate();
        let old = SecretString::from("old");
        let new = SecretString::from("new");
        let issued = link_grant(NodeId::generate(), &node_key, Some(&old), options(false), &params()).unwrap();

        let no_password = issued.credentials();
        assert!(matches!(
            rewrap_link_grant(&issued.grant, &node_key, &no_password, Some(&new), &params()),
            Err(PermsError::PasswordRejected)
        ));

        let forged = LinkCredentials::new(issued.link_id, LinkSecret::generate()).with_password(SecretString::from("old"));
        let err = rewrap_link_grant(&issued.grant, &node_key, &forged, None, &params()).unwrap_err();
        assert!(err.is_integrity());

        let current = issued.credentials().with_password(old);
        let other_key = SymmetricKey::generate();
        let err = rewrap_link_grant(&issued.grant, &other_key, &current, None, &params()).unwrap_err();
        assert!(err.is_integrity());
    }

    #[test]
    fn test_token_roundtrip() {
        let creds = LinkCredentials::new(LinkId::generate(), LinkSecret::generate());
        let parsed = LinkCredentials::from_token(&creds.to_token()).unwrap();
        assert_eq!(parsed.link_id, creds.link_id);
        assert_eq!(parsed.secret.as_bytes(), creds.secret.as_bytes());
        assert!(LinkCredentials::from_token("no-separator").is_err());
    }

    #[test]
    fn test_link_secret_debug_redacted() {
        let secret = LinkSecret::from_bytes([0xee; 32]);
        assert!(!format!("{:?}", secret).contains("ee"));
    }
}
