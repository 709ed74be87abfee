//! The authorization resolver.
//!
//! Access to a node is the join of everything that applies anywhere on its
//! ancestor chain. The fold runs from the target up to the root:
//!
//! 1. Owning any node on the chain yields `Owner` immediately.
//! 2. An unexpired user grant naming the requester contributes its level.
//! 3. An unexpired link grant with the requester's link id contributes its
//!    level; for password links the presented password must unwrap the
//!    grant's key.
//!
//! A more restrictive grant closer to the target never lowers what an
//! ancestor grant gives.

use veil_core::{ChainSnapshot, GrantRecord, Grantee, KdfParams, NodeRecord, PrincipalId};

use crate::access::AccessLevel;
use crate::grant::{open_link_grant, LinkCredentials};

/// Who is asking.
#[derive(Debug, Clone, Copy)]
pub enum Requester<'a> {
    /// An authenticated principal.
    User(PrincipalId),

    /// An anonymous link holder.
    Link(&'a LinkCredentials),
}

impl Requester<'_> {
    fn owns(&self, node: &NodeRecord) -> bool {
        matches!(self, Requester::User(id) if *id == node.owner)
    }

    /// The principal, for user requesters.
    pub fn principal(&self) -> Option<PrincipalId> {
        match self {
            Requester::User(id) => Some(*id),
            Requester::Link(_) => None,
        }
    }
}

/// Outcome of a resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    /// Effective access level.
    pub level: AccessLevel,

    /// Whether some grant would have applied but had expired.
    ///
    /// Only used to tell `ExpiredGrant` apart internally; callers outside
    /// the vault see a plain denial.
    pub expired_match: bool,
}

impl Resolution {
    const DENIED: Resolution = Resolution {
        level: AccessLevel::Denied,
        expired_match: false,
    };

    const OWNER: Resolution = Resolution {
        level: AccessLevel::Owner,
        expired_match: false,
    };
}

enum GrantMatch {
    NotApplicable,
    Expired,
    Applies(AccessLevel),
}

fn match_grant(grant: &GrantRecord, requester: &Requester<'_>, now: i64, link_params: &KdfParams) -> GrantMatch {
    let applies = match (&grant.grantee, requester) {
        (Grantee::User(grantee), Requester::User(id)) => grantee == id,
        (Grantee::Link { link_id, .. }, Requester::Link(credentials)) => *link_id == credentials.link_id,
        _ => false,
    };
    if !applies {
        return GrantMatch::NotApplicable;
    }
    if grant.is_expired(now) {
        return GrantMatch::Expired;
    }

    if let Requester::Link(credentials) = requester {
        if grant.is_password_protected() {
            if let Err(e) = open_link_grant(grant, credentials, link_params) {
                tracing::debug!(grant = ?grant.id, error = %e, "link password rejected");
                return GrantMatch::NotApplicable;
            }
        }
    }

    GrantMatch::Applies(AccessLevel::from_edit_flag(grant.edit))
}

/// Fold the chain into an access level for `requester`.
///
/// The owner of the tree's root is `Owner` everywhere in it. `now` is
/// compared against grant expiry inclusively.
pub fn resolve(
    snapshot: &ChainSnapshot,
    requester: &Requester<'_>,
    now: i64,
    link_params: &KdfParams,
) -> Resolution {
    let mut acc = Resolution::DENIED;

    if snapshot
        .root()
        .is_some_and(|root| root.is_root() && requester.owns(root))
    {
        return Resolution::OWNER;
    }

    for link in snapshot.links() {
        for grant in &link.grants {
            // Nothing to gain, and password links cost a KDF run.
            if acc.level >= AccessLevel::from_edit_flag(grant.edit) {
                continue;
            }

            match match_grant(grant, requester, now, link_params) {
                GrantMatch::Applies(level) => acc.level = acc.level.join(level),
                GrantMatch::Expired => acc.expired_match = true,
                GrantMatch::NotApplicable => {}
            }
        }
    }

    acc
}
