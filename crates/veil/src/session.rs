//! Unlocked principal sessions.

use std::fmt;

use veil_core::{PrincipalId, PrivateKey, X25519PublicKey};
use veil_perms::{LinkCredentials, Requester, Unlock};

/// A principal whose private key has been unlocked with their password.
///
/// The private key is zeroed when the session drops.
pub struct Session {
    principal_id: PrincipalId,
    private_key: PrivateKey,
}

impl Session {
    pub(crate) fn new(principal_id: PrincipalId, private_key: PrivateKey) -> Self {
        Self {
            principal_id,
            private_key,
        }
    }

    pub fn principal_id(&self) -> PrincipalId {
        self.principal_id
    }

    pub fn public_key(&self) -> X25519PublicKey {
        self.private_key.public_key()
    }

    pub(crate) fn private_key(&self) -> &PrivateKey {
        &self.private_key
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("principal_id", &self.principal_id)
            .finish_non_exhaustive()
    }
}

/// Whoever is acting on the vault: a signed-in principal or a link holder.
#[derive(Debug, Clone, Copy)]
pub enum Actor<'a> {
    User(&'a Session),
    Link(&'a LinkCredentials),
}

impl<'a> Actor<'a> {
    pub(crate) fn requester(&self) -> Requester<'a> {
        match *self {
            Actor::User(session) => Requester::User(session.principal_id),
            Actor::Link(credentials) => Requester::Link(credentials),
        }
    }

    pub(crate) fn unlock(&self) -> Unlock<'a> {
        match *self {
            Actor::User(session) => Unlock::Private(&session.private_key),
            Actor::Link(credentials) => Unlock::Link(credentials),
        }
    }
}

impl<'a> From<&'a Session> for Actor<'a> {
    fn from(session: &'a Session) -> Self {
        Actor::User(session)
    }
}

impl<'a> From<&'a LinkCredentials> for Actor<'a> {
    fn from(credentials: &'a LinkCredentials) -> Self {
        Actor::Link(credentials)
    }
}
