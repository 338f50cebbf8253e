//! Continuation and distant-match detection.
//!
//! A gold bifurcation without a direct match may still be present in the
//! test tree, shifted along the branch. It counts as a continuation when,
//! starting from a corresponding ancestor, a descendant on either side can
//! be matched with a path length that agrees. When both sides match, the
//! test nodes' common ancestor is a distant match if it lies within a
//! relaxed multiple of the spatial thresholds.

use std::collections::HashMap;

use tracing::trace;

use crate::core::secondary::{PathLengths, Trajectory};
use crate::core::types::NodeRef;
use crate::matching::engine::MatchEngine;

/// Corresponding ancestors a continuation search starts from.
#[derive(Debug, Clone, Copy)]
struct Anchor {
    ancestor: NodeRef,
    matched: NodeRef,
    /// Ancestor's trajectory toward the target's branch
    trajectory: Trajectory,
}

impl MatchEngine<'_> {
    /// Whether `target` is present in the other tree as a continuation.
    ///
    /// Ancestors are tried nearest first. The first one with a known
    /// correspondence settles the question; ancestors without one are tried
    /// against each unused nearby node. With `record`, the outcome is added
    /// to the continuation or distant-match lists. Distant matches are
    /// paired either way.
    pub(super) fn is_continuation(&mut self, target: NodeRef, record: bool) -> bool {
        if self.is_leaf(target) {
            return false;
        }

        let mut target_path = self.secondary(target).lengths;
        let mut is_left = self.side(target).is_left();
        let mut ancestor = self.parent(target);

        while let Some(node) = ancestor {
            if let Some(matched) = self.state.get(node) {
                return self.continuation_via(target, node, matched, is_left, target_path, record);
            }
            for candidate in self.find_nearest(node, true) {
                if self.continuation_via(target, node, candidate, is_left, target_path, record) {
                    return true;
                }
            }

            target_path += self.secondary(node).lengths;
            is_left = self.side(node).is_left();
            ancestor = self.parent(node);
        }
        false
    }

    fn continuation_via(
        &mut self,
        target: NodeRef,
        ancestor: NodeRef,
        matched: NodeRef,
        is_left: bool,
        target_path: PathLengths,
        record: bool,
    ) -> bool {
        let Some((left, right)) = self.children(target) else {
            return false;
        };
        let anchor = Anchor {
            ancestor,
            matched,
            trajectory: *self.secondary(ancestor).child_trajectory(is_left),
        };
        let mut paths = HashMap::from([(target, target_path)]);

        let left_match = self.descendant_match(left, &anchor, &mut paths);
        let right_match = self.descendant_match(right, &anchor, &mut paths);

        match (left_match, right_match) {
            (Some(l), Some(r)) => {
                let target_pos = self.position(target);
                let distant = self
                    .least_common_ancestor(l, r, matched)
                    .filter(|&n| !self.state.contains(n))
                    .filter(|&n| self.within_distant_threshold(&self.position(n), &target_pos));

                if let Some(common) = distant {
                    trace!("{} is a distant match to {}", target, common);
                    self.state.pair(target, common);
                    if record {
                        self.distant_matches.push(target.id);
                    }
                } else if record {
                    self.continuations.push(target.id);
                }
                true
            }
            (Some(_), None) | (None, Some(_)) => {
                if record {
                    self.continuations.push(target.id);
                }
                true
            }
            (None, None) => false,
        }
    }

    /// First node below `first` that matches a node of the other tree
    /// descending from the anchor's match, searching depth-first. A
    /// descendant with a known correspondence is only compared with it and
    /// is not searched below.
    fn descendant_match(
        &self,
        first: NodeRef,
        anchor: &Anchor,
        paths: &mut HashMap<NodeRef, PathLengths>,
    ) -> Option<NodeRef> {
        let ancestor_pos = self.position(anchor.ancestor);
        let matched_pos = self.position(anchor.matched);
        let mut stack = vec![first];

        while let Some(node) = stack.pop() {
            let node_pos = self.position(node);
            let node_trajectory = self.secondary(node).parent_trajectory;
            let known = self.state.get(node);
            let candidates = known.map_or_else(|| self.find_nearest(node, false), |m| vec![m]);

            let parent_path = self
                .parent(node)
                .and_then(|p| paths.get(&p).copied())
                .unwrap_or_default();
            let node_path = self.secondary(node).lengths + parent_path;
            paths.insert(node, node_path);

            for candidate in candidates {
                let Some(candidate_path) = self.path_to_anchor(candidate, anchor.matched, paths) else {
                    trace!("{} does not descend from {}", candidate, anchor.matched);
                    continue;
                };
                paths.insert(candidate, candidate_path);

                let trajectory = if anchor.trajectory.is_resolved() {
                    anchor.trajectory
                } else {
                    anchor
                        .trajectory
                        .or(&self.trajectory_for_path(anchor.ancestor, node))
                };
                let candidate_pos = self.position(candidate);
                let xy = candidate_path.xy
                    + trajectory.xy_offset(&ancestor_pos, &matched_pos)
                    + node_trajectory.xy_offset(&node_pos, &candidate_pos);
                let z = candidate_path.z
                    + trajectory.z_offset(&ancestor_pos, &matched_pos)
                    + node_trajectory.z_offset(&node_pos, &candidate_pos);

                if self.path_length_matches(&node_path, xy, z) {
                    trace!("{} continues through {}", node, candidate);
                    return Some(candidate);
                }
            }

            if known.is_none() {
                if let Some((left, right)) = self.children(node) {
                    stack.push(left);
                    stack.push(right);
                }
            }
        }
        None
    }

    /// Path length from `node` up to `anchor`, reusing any path already
    /// measured on the way. `None` when `node` does not descend from it.
    fn path_to_anchor(
        &self,
        node: NodeRef,
        anchor: NodeRef,
        paths: &HashMap<NodeRef, PathLengths>,
    ) -> Option<PathLengths> {
        let mut path = self.secondary(node).lengths;
        let mut current = self.parent(node)?;
        while current != anchor {
            if let Some(measured) = paths.get(&current) {
                return Some(path + *measured);
            }
            path += self.secondary(current).lengths;
            current = self.parent(current)?;
        }
        Some(path)
    }

    /// Deepest common proper ancestor of `first` and `second` strictly
    /// below `known`, which must be a common ancestor of both.
    pub(super) fn least_common_ancestor(&self, first: NodeRef, second: NodeRef, known: NodeRef) -> Option<NodeRef> {
        let mut ancestors = Vec::new();
        let mut node = self.parent(first);
        while let Some(n) = node {
            if n == known {
                break;
            }
            ancestors.push(n);
            node = self.parent(n);
        }

        let mut node = Some(second);
        while let Some(n) = node {
            if n == known {
                break;
            }
            if ancestors.contains(&n) {
                return Some(n);
            }
            node = self.parent(n);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use crate::core::reconstruction::Reconstruction;
    use crate::core::reduce::ReductionSettings;
    use crate::core::types::NodeRef;
    use crate::matching::config::ThresholdConfig;
    use crate::matching::engine::MatchEngine;

    const GOLD: &str = "1 1 0 0 0 1 -1\n2 1 10 0 0 1 1\n3 1 20 5 0 1 2\n4 1 20 -5 0 1 2\n";

    fn shifted(x: f64) -> String {
        format!("1 1 0 0 0 1 -1\n2 1 {x} 0 0 1 1\n3 1 20 5 0 1 2\n4 1 20 -5 0 1 2\n")
    }

    fn load(text: &str, config: &ThresholdConfig) -> Reconstruction {
        Reconstruction::from_swc_text(text, "tree.swc", &ReductionSettings::from(config)).unwrap()
    }

    /// Match the two leaves directly, as the scoring pass would.
    fn engine_with_leaves<'a>(
        gold: &'a Reconstruction,
        test: &'a Reconstruction,
        config: &'a ThresholdConfig,
    ) -> (MatchEngine<'a>, NodeRef) {
        let mut engine = MatchEngine::new(gold, test, config);
        let root = NodeRef::gold(engine.gold.root());
        let test_root = NodeRef::test(engine.test.root());
        engine.state.claim(root, test_root);

        let head = NodeRef::gold(engine.gold.heads()[0]);
        let (l, r) = engine.children(head).unwrap();
        for leaf in [r, l] {
            let found = engine.closest_match(leaf).unwrap();
            engine.state.pair(leaf, found);
        }
        (engine, head)
    }

    #[test]
    fn test_shifted_bifurcation_is_continuation() {
        let config = ThresholdConfig::default();
        let gold = load(GOLD, &config);
        let test = load(&shifted(15.0), &config);
        let (mut engine, head) = engine_with_leaves(&gold, &test, &config);

        assert!(engine.closest_match(head).is_none());
        assert!(engine.is_continuation(head, true));
        assert_eq!(engine.continuations, vec![head.id]);
        assert!(engine.distant_matches.is_empty());
        assert!(!engine.state.contains(head));
    }

    #[test]
    fn test_slightly_shifted_bifurcation_is_distant_match() {
        let config = ThresholdConfig::default();
        let gold = load(GOLD, &config);
        let test = load(&shifted(12.2), &config);
        let (mut engine, head) = engine_with_leaves(&gold, &test, &config);

        assert!(engine.is_continuation(head, true));
        assert_eq!(engine.distant_matches, vec![head.id]);
        let partner = engine.state.get(head).unwrap();
        assert_eq!(partner, NodeRef::test(engine.test.heads()[0]));
        assert_eq!(engine.state.get(partner), Some(head));
        assert!(engine.state.is_consistent());
    }

    #[test]
    fn test_unmatched_subtree_is_not_continuation() {
        let config = ThresholdConfig::default();
        let gold = load(GOLD, &config);
        let test = load("1 1 0 0 0 1 -1\n2 1 10 40 0 1 1\n3 1 20 45 0 1 2\n4 1 20 35 0 1 2\n", &config);
        let mut engine = MatchEngine::new(&gold, &test, &config);
        engine
            .state
            .claim(NodeRef::gold(engine.gold.root()), NodeRef::test(engine.test.root()));
        let head = NodeRef::gold(engine.gold.heads()[0]);

        assert!(!engine.is_continuation(head, true));
        let (leaf, _) = engine.children(head).unwrap();
        assert!(!engine.is_continuation(leaf, true));
        assert!(engine.continuations.is_empty());
    }

    #[test]
    fn test_least_common_ancestor() {
        let config = ThresholdConfig::default();
        let recon = load(
            "1 1 0 0 0 1 -1\n2 1 10 0 0 1 1\n3 1 20 5 0 1 2\n4 1 20 -5 0 1 2\n5 1 30 0 0 1 4\n6 1 30 -10 0 1 4\n",
            &config,
        );
        let engine = MatchEngine::new(&recon, &recon, &config);
        let root = NodeRef::test(engine.test.root());
        let head = NodeRef::test(engine.test.heads()[0]);
        let (leaf, fork) = engine.children(head).unwrap();
        let (a, b) = engine.children(fork).unwrap();

        assert_eq!(engine.least_common_ancestor(a, b, root), Some(fork));
        assert_eq!(engine.least_common_ancestor(leaf, a, root), Some(head));
        // The known ancestor itself is never returned
        assert_eq!(engine.least_common_ancestor(leaf, a, head), None);
    }
}
