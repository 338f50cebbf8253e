//! Arena-backed binary tree produced by reduction.
//!
//! The arena slot 0 always holds the soma root. Every other reachable node
//! sits below one of the root's `heads`; a head records `Side::Root` and the
//! root as its parent, but the root does not list heads as left/right
//! children. Parent links are plain indices and never own anything.
//!
//! After reduction every non-root node has either no children or exactly
//! two; [`BinaryTree::is_strictly_binary`] checks this.

use crate::core::geometry::Point3D;
use crate::core::secondary::SecondaryData;
use crate::core::types::{NodeId, Side};
use crate::parsing::swc::SwcRecord;

/// Sample data carried by a binary node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeRecord {
    pub id: i64,
    pub node_type: u32,
    pub position: Point3D,
    pub radius: f64,
    /// Inserted during binarisation; coincides with its real parent.
    pub synthetic: bool,
}

impl NodeRecord {
    /// Copy of a real node used as the synthetic parent of two of its
    /// children.
    #[must_use]
    pub const fn synthetic_copy(&self) -> Self {
        Self {
            id: self.id,
            node_type: self.node_type,
            position: self.position,
            radius: 0.0,
            synthetic: true,
        }
    }

    #[must_use]
    pub fn diameter(&self) -> f64 {
        self.radius * 2.0
    }
}

impl From<&SwcRecord> for NodeRecord {
    fn from(record: &SwcRecord) -> Self {
        Self {
            id: record.id,
            node_type: record.node_type,
            position: record.position,
            radius: record.radius,
            synthetic: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BinaryNode {
    pub record: NodeRecord,
    pub secondary: SecondaryData,
    pub left: Option<NodeId>,
    pub right: Option<NodeId>,
    pub parent: Option<NodeId>,
    pub side: Side,
}

impl BinaryNode {
    fn new(record: NodeRecord) -> Self {
        Self {
            record,
            secondary: SecondaryData::default(),
            left: None,
            right: None,
            parent: None,
            side: Side::Root,
        }
    }

    #[must_use]
    pub const fn is_leaf(&self) -> bool {
        self.left.is_none() && self.right.is_none()
    }

    /// A node holding only a left child: a continuation awaiting removal.
    #[must_use]
    pub const fn is_link(&self) -> bool {
        self.left.is_some() && self.right.is_none()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BinaryTree {
    nodes: Vec<BinaryNode>,
    root: NodeId,
    heads: Vec<NodeId>,
}

impl BinaryTree {
    /// Tree holding only the soma root.
    #[must_use]
    pub fn new(root: NodeRecord) -> Self {
        Self {
            nodes: vec![BinaryNode::new(root)],
            root: NodeId(0),
            heads: Vec::new(),
        }
    }

    /// Add a detached node.
    pub fn push(&mut self, record: NodeRecord) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(BinaryNode::new(record));
        id
    }

    #[must_use]
    pub const fn root(&self) -> NodeId {
        self.root
    }

    #[must_use]
    pub fn heads(&self) -> &[NodeId] {
        &self.heads
    }

    pub fn set_heads(&mut self, heads: Vec<NodeId>) {
        self.heads = heads;
    }

    #[must_use]
    pub fn node(&self, id: NodeId) -> &BinaryNode {
        &self.nodes[id.index()]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut BinaryNode {
        &mut self.nodes[id.index()]
    }

    #[must_use]
    pub fn position(&self, id: NodeId) -> Point3D {
        self.node(id).record.position
    }

    #[must_use]
    pub fn secondary(&self, id: NodeId) -> &SecondaryData {
        &self.node(id).secondary
    }

    pub fn secondary_mut(&mut self, id: NodeId) -> &mut SecondaryData {
        &mut self.node_mut(id).secondary
    }

    #[must_use]
    pub fn left(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).left
    }

    #[must_use]
    pub fn right(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).right
    }

    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    #[must_use]
    pub fn side(&self, id: NodeId) -> Side {
        self.node(id).side
    }

    #[must_use]
    pub fn is_leaf(&self, id: NodeId) -> bool {
        self.node(id).is_leaf()
    }

    #[must_use]
    pub fn is_root(&self, id: NodeId) -> bool {
        id == self.root
    }

    /// Both children of a bifurcation.
    #[must_use]
    pub fn children(&self, id: NodeId) -> Option<(NodeId, NodeId)> {
        let node = self.node(id);
        node.left.zip(node.right)
    }

    /// The other child of `id`'s parent, if any.
    #[must_use]
    pub fn sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        match self.side(id) {
            Side::Left => self.right(parent),
            Side::Right => self.left(parent),
            Side::Root => None,
        }
    }

    pub fn set_left(&mut self, parent: NodeId, child: Option<NodeId>) {
        self.set_child(parent, child, Side::Left);
    }

    pub fn set_right(&mut self, parent: NodeId, child: Option<NodeId>) {
        self.set_child(parent, child, Side::Right);
    }

    /// Place `child` in the `side` slot of `parent`. For `Side::Root` the
    /// child becomes a head hanging off the soma root.
    pub fn set_child(&mut self, parent: NodeId, child: Option<NodeId>, side: Side) {
        match side {
            Side::Left => self.node_mut(parent).left = child,
            Side::Right => self.node_mut(parent).right = child,
            Side::Root => {}
        }
        if let Some(child) = child {
            let node = self.node_mut(child);
            node.parent = Some(parent);
            node.side = side;
        }
    }

    /// Whether `ancestor` lies on the path from `node` to the root.
    /// A node is not its own ancestor.
    #[must_use]
    pub fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = self.parent(node);
        while let Some(c) = current {
            if c == ancestor {
                return true;
            }
            current = self.parent(c);
        }
        false
    }

    /// Nodes of the subtree under `head` in pre-order, left before right.
    #[must_use]
    pub fn preorder(&self, head: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut stack = vec![head];
        while let Some(id) = stack.pop() {
            order.push(id);
            let node = self.node(id);
            if let Some(right) = node.right {
                stack.push(right);
            }
            if let Some(left) = node.left {
                stack.push(left);
            }
        }
        order
    }

    /// Number of nodes in the subtree under `head`, itself included.
    #[must_use]
    pub fn subtree_size(&self, head: NodeId) -> usize {
        self.preorder(head).len()
    }

    /// Nodes reachable from the root, the root first and then each head's
    /// subtree in pre-order.
    #[must_use]
    pub fn reachable(&self) -> Vec<NodeId> {
        let mut order = vec![self.root];
        for &head in &self.heads {
            order.extend(self.preorder(head));
        }
        order
    }

    /// Number of nodes reachable from the root, the root included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.reachable().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.heads.is_empty()
    }

    /// Every non-root node has zero or two children, and every child's
    /// parent link points back at the node holding it.
    #[must_use]
    pub fn is_strictly_binary(&self) -> bool {
        self.heads.iter().all(|&head| {
            self.parent(head) == Some(self.root)
                && self.preorder(head).into_iter().all(|id| {
                    let node = self.node(id);
                    if node.left.is_some() != node.right.is_some() {
                        return false;
                    }
                    self.links_back(node.left, id, Side::Left)
                        && self.links_back(node.right, id, Side::Right)
                })
        })
    }

    fn links_back(&self, child: Option<NodeId>, parent: NodeId, side: Side) -> bool {
        child.map_or(true, |c| self.parent(c) == Some(parent) && self.side(c) == side)
    }

    /// Rebuild the arena keeping only reachable nodes, renumbered in
    /// [`BinaryTree::reachable`] order.
    #[must_use]
    pub fn compact(&self) -> Self {
        let order = self.reachable();
        let mut remap = vec![None; self.nodes.len()];
        for (new, old) in order.iter().enumerate() {
            remap[old.index()] = Some(NodeId(new));
        }
        let map = |id: Option<NodeId>| id.and_then(|i| remap[i.index()]);

        let nodes = order
            .iter()
            .map(|&old| {
                let node = self.node(old);
                BinaryNode {
                    left: map(node.left),
                    right: map(node.right),
                    parent: map(node.parent),
                    ..node.clone()
                }
            })
            .collect();
        let heads = self.heads.iter().filter_map(|&h| map(Some(h))).collect();

        Self {
            nodes,
            root: NodeId(0),
            heads,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: i64, x: f64) -> NodeRecord {
        NodeRecord {
            id,
            node_type: 1,
            position: Point3D::new(x, 0.0, 0.0),
            radius: 1.0,
            synthetic: false,
        }
    }

    /// root -> head(1) -> {2, 3}
    fn small_tree() -> BinaryTree {
        let mut tree = BinaryTree::new(record(1, 0.0));
        let head = tree.push(record(2, 1.0));
        let a = tree.push(record(3, 2.0));
        let b = tree.push(record(4, 3.0));
        tree.set_left(head, Some(a));
        tree.set_right(head, Some(b));
        let root = tree.root();
        tree.set_child(root, Some(head), Side::Root);
        tree.set_heads(vec![head]);
        tree
    }

    #[test]
    fn test_links_and_sides() {
        let tree = small_tree();
        let head = tree.heads()[0];
        let (l, r) = tree.children(head).unwrap();

        assert_eq!(tree.parent(head), Some(tree.root()));
        assert_eq!(tree.side(head), Side::Root);
        assert_eq!(tree.side(l), Side::Left);
        assert_eq!(tree.sibling(l), Some(r));
        assert_eq!(tree.sibling(head), None);
        assert!(tree.is_ancestor(head, r));
        assert!(tree.is_ancestor(tree.root(), r));
        assert!(!tree.is_ancestor(r, r));
        assert!(tree.is_strictly_binary());
    }

    #[test]
    fn test_preorder_left_first() {
        let tree = small_tree();
        let head = tree.heads()[0];
        let ids: Vec<i64> = tree.preorder(head).iter().map(|&n| tree.node(n).record.id).collect();
        assert_eq!(ids, vec![2, 3, 4]);
        assert_eq!(tree.subtree_size(head), 3);
        assert_eq!(tree.len(), 4);
    }

    #[test]
    fn test_single_child_is_not_binary() {
        let mut tree = small_tree();
        let head = tree.heads()[0];
        tree.set_right(head, None);
        assert!(!tree.is_strictly_binary());
    }

    #[test]
    fn test_compact_drops_unreachable() {
        let mut tree = small_tree();
        let orphan = tree.push(record(99, 50.0));
        let head = tree.heads()[0];
        let (l, _) = tree.children(head).unwrap();
        // Splice the orphan in and back out, leaving it unreachable
        tree.set_left(head, Some(orphan));
        tree.set_left(head, Some(l));

        let compacted = tree.compact();
        assert_eq!(compacted.len(), 4);
        assert!(compacted.is_strictly_binary());
        let ids: Vec<i64> = compacted
            .reachable()
            .iter()
            .map(|&n| compacted.node(n).record.id)
            .collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_synthetic_copy() {
        let copy = record(7, 4.0).synthetic_copy();
        assert!(copy.synthetic);
        assert_eq!(copy.id, 7);
        assert!(copy.radius.abs() < f64::EPSILON);
        assert_eq!(copy.position, Point3D::new(4.0, 0.0, 0.0));
    }
}
