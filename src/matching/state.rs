//! Correspondences found so far during a scoring run.

use std::collections::HashMap;

use crate::core::types::{NodeRef, Origin};

/// Map from a node to the node it corresponds to in the other tree.
///
/// Direct and distant matches are recorded in both directions. A few
/// entries are one-way claims: the gold soma root claims the test soma
/// root, and the test nodes inside a matched rosette claim the gold
/// termination so they cannot be matched again. Being a key is what makes a
/// node "used".
#[derive(Debug, Clone, Default)]
pub struct MatchState {
    matches: HashMap<NodeRef, NodeRef>,
}

impl MatchState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `a` and `b` as matching each other.
    pub fn pair(&mut self, a: NodeRef, b: NodeRef) {
        self.matches.insert(a, b);
        self.matches.insert(b, a);
    }

    /// Mark `node` as used by `partner` without the reverse entry. An
    /// existing entry is kept; returns whether the claim was recorded.
    pub fn claim(&mut self, node: NodeRef, partner: NodeRef) -> bool {
        if self.matches.contains_key(&node) {
            return false;
        }
        self.matches.insert(node, partner);
        true
    }

    #[must_use]
    pub fn get(&self, node: NodeRef) -> Option<NodeRef> {
        self.matches.get(&node).copied()
    }

    #[must_use]
    pub fn contains(&self, node: NodeRef) -> bool {
        self.matches.contains_key(&node)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.matches.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    /// Every entry crosses between the two trees, and no two gold nodes
    /// correspond to the same test node.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        let mut targets = HashMap::new();
        for (key, value) in &self.matches {
            if key.origin == value.origin {
                return false;
            }
            if key.origin == Origin::Gold {
                if let Some(previous) = targets.insert(*value, *key) {
                    if previous != *key {
                        return false;
                    }
                }
            }
        }
        true
    }
}
