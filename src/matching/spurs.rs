//! Spur detection.
//!
//! A spur is a short unmatched terminal branch, treated as tracing noise.
//! When only one child of a bifurcation is a spur the bifurcation is no
//! longer a real branch point and becomes a pass-through; when both are,
//! the bifurcation stays and is scored like a termination.

use std::collections::HashSet;

use crate::core::types::{NodeId, NodeRef, Origin, Side};
use crate::matching::engine::MatchEngine;

/// Spur leaves and the pass-through bifurcations they leave behind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpurSet {
    leaves: HashSet<NodeId>,
    pass_through: HashSet<NodeId>,
}

impl SpurSet {
    /// Whether `id` is excluded from scoring, as a spur or a pass-through.
    #[must_use]
    pub fn contains(&self, id: NodeId) -> bool {
        self.leaves.contains(&id) || self.pass_through.contains(&id)
    }

    #[must_use]
    pub fn is_spur_leaf(&self, id: NodeId) -> bool {
        self.leaves.contains(&id)
    }

    #[must_use]
    pub fn is_pass_through(&self, id: NodeId) -> bool {
        self.pass_through.contains(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.leaves.len() + self.pass_through.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty() && self.pass_through.is_empty()
    }
}

impl MatchEngine<'_> {
    /// Spurs of one tree under the configured length threshold. Leaves that
    /// already correspond to something are never spurs.
    pub(super) fn find_spurs(&self, origin: Origin) -> SpurSet {
        let threshold = self.config.spur_threshold;
        let tree = self.tree(origin);
        let is_spur = |id: NodeId| {
            tree.is_leaf(id)
                && tree.secondary(id).lengths.total < threshold
                && !self.state.contains(NodeRef::new(origin, id))
        };

        let mut spurs = SpurSet::default();
        for &head in tree.heads() {
            let mut stack = vec![head];
            while let Some(id) = stack.pop() {
                if let Some((left, right)) = tree.children(id) {
                    stack.push(left);
                    stack.push(right);
                    continue;
                }
                if !is_spur(id) {
                    continue;
                }
                spurs.leaves.insert(id);

                // The left sibling sits on top of the stack, not yet visited
                let sibling = match tree.side(id) {
                    Side::Right => tree.sibling(id).filter(|&s| is_spur(s)),
                    Side::Left | Side::Root => None,
                };
                if let Some(sibling) = sibling {
                    spurs.leaves.insert(sibling);
                    stack.pop();
                } else if tree.side(id) != Side::Root {
                    if let Some(parent) = tree.parent(id) {
                        spurs.pass_through.insert(parent);
                    }
                }
            }
        }
        spurs
    }
}
