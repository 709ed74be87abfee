//! The access lattice.

use serde::{Deserialize, Serialize};

/// Effective access to a node.
///
/// Totally ordered `Denied < Viewer < Editor < Owner`; combining two levels
/// takes the more permissive one.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum AccessLevel {
    #[default]
    Denied,
    Viewer,
    Editor,
    Owner,
}

impl AccessLevel {
    /// Least upper bound of two levels.
    pub fn join(self, other: Self) -> Self {
        self.max(other)
    }

    /// The level a grant with the given edit flag confers.
    pub const fn from_edit_flag(edit: bool) -> Self {
        if edit {
            AccessLevel::Editor
        } else {
            AccessLevel::Viewer
        }
    }

    /// Whether this level permits reading content and metadata.
    pub fn can_read(self) -> bool {
        self >= AccessLevel::Viewer
    }

    /// Whether this level permits modification, moves and sharing.
    pub fn can_edit(self) -> bool {
        self >= AccessLevel::Editor
    }

    pub fn is_owner(self) -> bool {
        self == AccessLevel::Owner
    }
}
