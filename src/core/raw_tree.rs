//! Parent-linked n-ary tree assembled directly from SWC records.
//!
//! Nodes live in an arena in file order. A record links to its parent only
//! when the parent appeared earlier in the file; later references are
//! tolerated and leave the node unattached.

use std::collections::HashMap;

use tracing::warn;

use crate::parsing::swc::SwcRecord;

/// Rule deciding whether a record may hang off its declared parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkPolicy {
    /// Link only when parent and child share the same structure type, so
    /// each type forms its own tree below the root.
    #[default]
    SameType,
    /// Link regardless of type.
    AnyType,
}

#[derive(Debug, Clone)]
pub struct RawNode {
    pub record: SwcRecord,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct RawTree {
    nodes: Vec<RawNode>,
    root: usize,
    index: HashMap<i64, usize>,
}

impl RawTree {
    /// Link records into a tree.
    ///
    /// Returns `None` when no record declares itself the root. If several
    /// do, the last one wins.
    #[must_use]
    pub fn from_records(records: &[SwcRecord], policy: LinkPolicy) -> Option<Self> {
        let mut nodes: Vec<RawNode> = Vec::with_capacity(records.len());
        let mut index: HashMap<i64, usize> = HashMap::with_capacity(records.len());
        let mut root: Option<usize> = None;

        for record in records {
            let slot = nodes.len();
            if record.is_root() {
                if let Some(previous) = root {
                    warn!(
                        "Multiple root records; sample {} replaces sample {}",
                        record.id, nodes[previous].record.id
                    );
                }
                root = Some(slot);
            }

            let parent = if record.is_root() {
                None
            } else if let Some(&p) = index.get(&record.parent_id) {
                let compatible = match policy {
                    LinkPolicy::AnyType => true,
                    LinkPolicy::SameType => nodes[p].record.node_type == record.node_type,
                };
                compatible.then_some(p)
            } else {
                warn!(
                    "Sample {} references parent {} before it is defined; left unattached",
                    record.id, record.parent_id
                );
                None
            };

            if let Some(p) = parent {
                nodes[p].children.push(slot);
            }
            index.insert(record.id, slot);
            nodes.push(RawNode {
                record: *record,
                parent,
                children: Vec::new(),
            });
        }

        root.map(|root| Self { nodes, root, index })
    }

    #[must_use]
    pub const fn root(&self) -> usize {
        self.root
    }

    #[must_use]
    pub fn node(&self, index: usize) -> &RawNode {
        &self.nodes[index]
    }

    #[must_use]
    pub fn children(&self, index: usize) -> &[usize] {
        &self.nodes[index].children
    }

    #[must_use]
    pub fn parent(&self, index: usize) -> Option<usize> {
        self.nodes[index].parent
    }

    /// Arena index of the most recent record carrying `id`.
    #[must_use]
    pub fn find_by_id(&self, id: i64) -> Option<usize> {
        self.index.get(&id).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::swc::parse_swc_text;

    fn tree(text: &str, policy: LinkPolicy) -> Option<RawTree> {
        RawTree::from_records(&parse_swc_text(text, "test.swc", 1.0).unwrap(), policy)
    }

    #[test]
    fn test_links_children_in_file_order() {
        let t = tree(
            "1 1 0 0 0 1 -1\n2 1 1 0 0 1 1\n3 1 2 0 0 1 1\n4 1 3 0 0 1 2\n",
            LinkPolicy::SameType,
        )
        .unwrap();

        assert_eq!(t.len(), 4);
        assert_eq!(t.node(t.root()).record.id, 1);
        assert_eq!(t.children(t.root()), &[1, 2]);
        assert_eq!(t.parent(3), Some(1));
        assert_eq!(t.find_by_id(4), Some(3));
    }

    #[test]
    fn test_type_policy() {
        let text = "1 1 0 0 0 1 -1\n2 3 1 0 0 1 1\n3 3 2 0 0 1 2\n";

        let same = tree(text, LinkPolicy::SameType).unwrap();
        assert!(same.children(same.root()).is_empty());
        assert_eq!(same.children(1), &[2]);

        let any = tree(text, LinkPolicy::AnyType).unwrap();
        assert_eq!(any.children(any.root()), &[1]);
    }

    #[test]
    fn test_forward_parent_reference_left_unattached() {
        let t = tree("1 1 0 0 0 1 -1\n2 1 1 0 0 1 3\n3 1 2 0 0 1 1\n", LinkPolicy::AnyType).unwrap();
        assert_eq!(t.parent(1), None);
        assert_eq!(t.children(t.root()), &[2]);
    }

    #[test]
    fn test_missing_root() {
        assert!(tree("2 1 1 0 0 1 1\n", LinkPolicy::AnyType).is_none());
    }

    #[test]
    fn test_last_root_wins() {
        let t = tree("1 1 0 0 0 1 -1\n2 1 5 0 0 1 -1\n", LinkPolicy::AnyType).unwrap();
        assert_eq!(t.node(t.root()).record.id, 2);
    }
}
