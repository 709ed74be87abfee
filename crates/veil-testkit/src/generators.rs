//! Proptest generators for property-based testing.

use proptest::prelude::*;
use proptest::sample::Index;

/// A plausible file or folder name.
pub fn node_name() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9][a-zA-Z0-9 ._-]{0,39}".prop_map(String::from)
}

/// File content up to `max_len` bytes.
pub fn content(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=max_len)
}

/// The edit flag of a grant.
pub fn edit_flag() -> impl Strategy<Value = bool> {
    any::<bool>()
}

/// The shape of a tree: node 0 is the root, every other node names an
/// earlier node as its parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeShape {
    /// `parents[i]` is the parent of node `i + 1`.
    pub parents: Vec<usize>,
}

impl TreeShape {
    /// Number of nodes, root included.
    pub fn len(&self) -> usize {
        self.parents.len() + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn parent_of(&self, node: usize) -> Option<usize> {
        node.checked_sub(1).and_then(|i| self.parents.get(i).copied())
    }

    /// Whether `ancestor` is `node` or lies above it.
    pub fn is_ancestor_or_self(&self, ancestor: usize, node: usize) -> bool {
        let mut current = Some(node);
        while let Some(n) = current {
            if n == ancestor {
                return true;
            }
            current = self.parent_of(n);
        }
        false
    }
}

/// Trees of 1 to `max_nodes` nodes.
pub fn tree_shape(max_nodes: usize) -> impl Strategy<Value = TreeShape> {
    prop::collection::vec(any::<Index>(), 0..max_nodes.max(1)).prop_map(|picks| TreeShape {
        parents: picks
            .iter()
            .enumerate()
            .map(|(i, pick)| pick.index(i + 1))
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn parents_precede_children(shape in tree_shape(16)) {
            for node in 1..shape.len() {
                let parent = shape.parent_of(node).unwrap();
                prop_assert!(parent < node);
                prop_assert!(shape.is_ancestor_or_self(0, node));
            }
        }
    }

    #[test]
    fn test_ancestry() {
        let shape = TreeShape {
            parents: vec![0, 1, 0],
        };
        assert!(shape.is_ancestor_or_self(1, 2));
        assert!(shape.is_ancestor_or_self(2, 2));
        assert!(!shape.is_ancestor_or_self(2, 1));
        assert!(!shape.is_ancestor_or_self(3, 2));
        assert_eq!(shape.parent_of(0), None);
    }
}
