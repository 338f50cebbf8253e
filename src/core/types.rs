use serde::{Deserialize, Serialize};

/// Index of a node inside a [`BinaryTree`](crate::core::binary_tree::BinaryTree) arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

impl NodeId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Which slot of its parent a node occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Right,
    /// Head of a top-level tree, hanging directly off the soma root.
    Root,
}

impl Side {
    #[must_use]
    pub const fn is_left(self) -> bool {
        matches!(self, Self::Left)
    }

    #[must_use]
    pub const fn is_right(self) -> bool {
        matches!(self, Self::Right)
    }
}

/// Which reconstruction a node belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    Gold,
    Test,
}

impl Origin {
    /// The opposite reconstruction.
    #[must_use]
    pub const fn other(self) -> Self {
        match self {
            Self::Gold => Self::Test,
            Self::Test => Self::Gold,
        }
    }
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gold => write!(f, "gold"),
            Self::Test => write!(f, "test"),
        }
    }
}

/// A node qualified by the reconstruction it lives in.
///
/// Matching code is written against `NodeRef` rather than bare ids so the
/// same routines can run with the two trees in either role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeRef {
    pub origin: Origin,
    pub id: NodeId,
}

impl NodeRef {
    #[must_use]
    pub const fn new(origin: Origin, id: NodeId) -> Self {
        Self { origin, id }
    }

    #[must_use]
    pub const fn gold(id: NodeId) -> Self {
        Self::new(Origin::Gold, id)
    }

    #[must_use]
    pub const fn test(id: NodeId) -> Self {
        Self::new(Origin::Test, id)
    }
}

impl std::fmt::Display for NodeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.origin, self.id)
    }
}
