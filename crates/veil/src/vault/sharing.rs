//! User grants and share links.
//!
//! Each grant carries its own wrapped copy of the shared node's key, so
//! creating, updating or revoking one never touches the tree or any other
//! grant. Only editors (and owners) may manage grants on a node.

use secrecy::SecretString;

use veil_core::{GrantId, GrantRecord, LinkId, NodeId, PrincipalId};
use veil_perms::{
    link_grant, rewrap_link_grant, user_grant, AccessLevel, GrantOptions, LinkCredentials, LinkSecret,
};
use veil_store::{BlobStore, Store};

use super::Vault;
use crate::error::{Result, VaultError};
use crate::session::{Actor, Session};

/// Settings for a new share link.
#[derive(Debug, Default)]
pub struct LinkOptions {
    pub edit: bool,
    pub password: Option<SecretString>,
    pub expires_at: Option<i64>,
}

/// A link as returned to its creator.
///
/// The secret is never stored; losing it means issuing a new link.
#[derive(Debug)]
pub struct SharedLink {
    pub grant_id: GrantId,
    pub link_id: LinkId,
    pub secret: LinkSecret,
}

impl SharedLink {
    /// Credentials to hand out, without any password.
    pub fn credentials(&self) -> LinkCredentials {
        LinkCredentials::new(self.link_id, self.secret.clone())
    }

    /// The `id#secret` token form of the link.
    pub fn token(&self) -> String {
        self.credentials().to_token()
    }
}

/// A new password (or none) for an existing link.
///
/// `current` is the link as it opens today: its secret, plus the present
/// password if it has one. The new wrap is derived from the same secret.
#[derive(Debug)]
pub struct LinkPasswordChange {
    pub current: LinkCredentials,
    pub password: Option<SecretString>,
}

fn check_expiry(expires_at: Option<i64>, now: i64) -> Result<()> {
    match expires_at {
        Some(at) if at < now => Err(VaultError::InvalidRequest("expiry is in the past".into())),
        _ => Ok(()),
    }
}

impl<S: Store, B: BlobStore> Vault<S, B> {
    /// Share a node with a registered principal.
    pub async fn grant_to_user(
        &self,
        session: &Session,
        node_id: &NodeId,
        grantee: &PrincipalId,
        edit: bool,
        expires_at: Option<i64>,
    ) -> Result<GrantId> {
        let actor = Actor::User(session);
        let authorized = self.authorized(actor, node_id, AccessLevel::Editor).await?;
        check_expiry(expires_at, authorized.now)?;

        let grantee_key = self.public_key(grantee).await?;
        let node_key = self.node_key(&authorized, actor)?;
        let grant = user_grant(
            *node_id,
            &node_key,
            *grantee,
            &grantee_key,
            GrantOptions {
                edit,
                expires_at,
                created_by: session.principal_id(),
                now: authorized.now,
            },
        )?;

        self.store.insert_grant(&grant).await?;
        tracing::debug!(grant = %grant.id, node = %node_id, edit, "user grant created");
        Ok(grant.id)
    }

    /// Create a share link for a node.
    pub async fn grant_link(&self, session: &Session, node_id: &NodeId, options: LinkOptions) -> Result<SharedLink> {
        let actor = Actor::User(session);
        let authorized = self.authorized(actor, node_id, AccessLevel::Editor).await?;
        check_expiry(options.expires_at, authorized.now)?;

        let node_key = self.node_key(&authorized, actor)?;
        let issued = link_grant(
            *node_id,
            &node_key,
            options.password.as_ref(),
            GrantOptions {
                edit: options.edit,
                expires_at: options.expires_at,
                created_by: session.principal_id(),
                now: authorized.now,
            },
            &self.config.link_kdf,
        )?;

        self.store.insert_grant(&issued.grant).await?;
        tracing::debug!(
            grant = %issued.grant.id,
            node = %node_id,
            edit = options.edit,
            password = options.password.is_some(),
            "link grant created"
        );

        Ok(SharedLink {
            grant_id: issued.grant.id,
            link_id: issued.link_id,
            secret: issued.secret,
        })
    }

    async fn managed_grant(&self, session: &Session, grant_id: &GrantId) -> Result<(GrantRecord, super::Authorized)> {
        let grant = self
            .store
            .get_grant(grant_id)
            .await?
            .ok_or_else(|| VaultError::NotFound(format!("grant {grant_id}")))?;
        let authorized = self
            .authorized(Actor::User(session), &grant.node_id, AccessLevel::Editor)
            .await?;
        Ok((grant, authorized))
    }

    /// Delete one grant. Nothing else changes.
    pub async fn revoke(&self, session: &Session, grant_id: &GrantId) -> Result<()> {
        let (grant, _) = self.managed_grant(session, grant_id).await?;
        if !self.store.delete_grant(grant_id).await? {
            return Err(VaultError::NotFound(format!("grant {grant_id}")));
        }
        tracing::debug!(grant = %grant_id, node = %grant.node_id, "grant revoked");
        Ok(())
    }

    /// Change a grant's edit flag and, for links, its password.
    ///
    /// The wrapped key is re-wrapped (under a fresh nonce) only when the
    /// password changes, and only after the presented link credentials are
    /// shown to open the current wrap.
    pub async fn update_grant(
        &self,
        session: &Session,
        grant_id: &GrantId,
        edit: bool,
        password: Option<LinkPasswordChange>,
    ) -> Result<()> {
        let (grant, authorized) = self.managed_grant(session, grant_id).await?;

        let mut updated = GrantRecord { edit, ..grant };
        if let Some(change) = password {
            match updated.link_id() {
                None => return Err(VaultError::InvalidRequest("only link grants have passwords".into())),
                Some(id) if id != &change.current.link_id => {
                    return Err(VaultError::InvalidRequest("credentials are for another link".into()))
                }
                Some(_) => {}
            }
            let node_key = self.node_key(&authorized, Actor::User(session))?;
            updated = rewrap_link_grant(
                &updated,
                &node_key,
                &change.current,
                change.password.as_ref(),
                &self.config.link_kdf,
            )
            .map_err(|e| {
                tracing::warn!(grant = %grant_id, error = %e, "link credentials do not open grant");
                VaultError::from(e)
            })?;
        }

        self.store.update_grant(&updated).await?;
        tracing::debug!(grant = %grant_id, edit, "grant updated");
        Ok(())
    }

    /// All grants attached directly to a node.
    pub async fn list_grants(&self, session: &Session, node_id: &NodeId) -> Result<Vec<GrantRecord>> {
        self.authorized(Actor::User(session), node_id, AccessLevel::Editor)
            .await?;
        Ok(self.store.list_grants(node_id).await?)
    }

    /// Delete every grant whose expiry has passed.
    pub async fn purge_expired_grants(&self) -> Result<Vec<GrantId>> {
        let purged = self.store.delete_expired_grants(self.now()).await?;
        if !purged.is_empty() {
            tracing::debug!(count = purged.len(), "purged expired grants");
        }
        Ok(purged)
    }
}
