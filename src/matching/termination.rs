//! Termination matching for neuromuscular projection fibers.
//!
//! Axons in this dataset end in rosettes: dense clusters of samples that a
//! tracer may resolve as a small subtree instead of a single termination. A
//! gold termination may therefore match an unused test node whose own
//! children stay within [`ROSETTE_THRESHOLD`] of it. If the regular path
//! confirmation fails, the raw test samples above the candidate are walked
//! to find where the traced branch passes closest to the gold termination,
//! and the path is re-checked from there.
//!
//! The winning node's descendants are claimed so the rest of the rosette
//! cannot be matched again.

use std::collections::HashSet;

use tracing::trace;

use crate::core::types::{NodeRef, Origin};
use crate::matching::config::ROSETTE_THRESHOLD;
use crate::matching::engine::{path_ratio, MatchEngine};

impl MatchEngine<'_> {
    /// Match for gold termination `gold` among rosette candidates; the
    /// smallest relative path error wins.
    pub(super) fn termination_match(&mut self, gold: NodeRef) -> Option<NodeRef> {
        let candidates = self.rosette_candidates(gold);
        let outermost: Vec<NodeRef> = candidates
            .iter()
            .copied()
            .filter(|&c| !self.has_ancestor_in(c, &candidates))
            .collect();

        let mut best: Option<(NodeRef, f64)> = None;
        for candidate in outermost {
            let difference = self
                .match_path_difference(gold, candidate)
                .or_else(|| self.rosette_path_difference(gold, candidate));
            let Some(difference) = difference.filter(|&d| d < 1.0) else {
                continue;
            };
            if best.map_or(true, |(_, b)| difference < b) {
                best = Some((candidate, difference));
            }
        }

        let (winner, difference) = best?;
        trace!("{} ends in rosette at {} ({:.3})", gold, winner, difference);
        let below = self.tree(Origin::Test).preorder(winner.id);
        for id in below.into_iter().skip(1) {
            self.state.claim(NodeRef::test(id), gold);
        }
        Some(winner)
    }

    /// Unused test nodes near `gold` whose children stay near them.
    fn rosette_candidates(&self, gold: NodeRef) -> Vec<NodeRef> {
        let target = self.position(gold);
        let tree = self.tree(Origin::Test);
        self.pool(Origin::Test)
            .iter()
            .map(|&id| NodeRef::test(id))
            .filter(|&c| !self.state.contains(c))
            .filter(|&c| tree.position(c.id).distance(&target) < ROSETTE_THRESHOLD)
            .filter(|&c| {
                let here = tree.position(c.id);
                tree.children(c.id).map_or(true, |(l, r)| {
                    tree.position(l).distance(&here) <= ROSETTE_THRESHOLD
                        && tree.position(r).distance(&here) <= ROSETTE_THRESHOLD
                })
            })
            .collect()
    }

    fn has_ancestor_in(&self, node: NodeRef, set: &[NodeRef]) -> bool {
        let mut current = self.parent(node);
        while let Some(n) = current {
            if set.contains(&n) {
                return true;
            }
            current = self.parent(n);
        }
        false
    }

    /// Path error for a candidate whose branch passes by the gold
    /// termination before reaching it.
    ///
    /// Walks the raw test samples from the candidate up to the previous
    /// branch point, picking the sample within threshold of `gold` that
    /// starts the last close approach (or is closest within it). The test
    /// path is shortened by the distance walked to that sample.
    pub(super) fn rosette_path_difference(&self, gold: NodeRef, test: NodeRef) -> Option<f64> {
        let raw = self.test_raw;
        let gold_pos = self.position(gold);
        let record_id = self.tree(Origin::Test).node(test.id).record.id;
        let mut index = raw.find_by_id(record_id)?;

        let mut running = 0.0;
        let mut selected = 0.0;
        let mut smallest = 0.0;
        let mut found = false;
        let mut was_outside = true;
        loop {
            let here = raw.node(index).record.position;
            let distance = here.distance(&gold_pos);
            if self.within_threshold(&here, &gold_pos) {
                if was_outside || distance <= smallest {
                    smallest = distance;
                    selected = running;
                }
                found = true;
                was_outside = false;
            } else {
                was_outside = true;
            }

            let Some(parent) = raw.parent(index) else {
                break;
            };
            running += here.distance(&raw.node(parent).record.position);
            index = parent;
            if raw.children(index).len() >= 2 {
                break;
            }
        }
        if !found {
            return None;
        }

        let mut gold_length = self.secondary(gold).lengths.total;
        let mut test_length = self.secondary(test).lengths.total - selected;
        let mut gold_node = self.parent(gold)?;
        let mut test_node = self.parent(test)?;
        let mut checked = HashSet::new();

        loop {
            let (gold_here, test_here) = (self.position(gold_node), self.position(test_node));
            if self.within_threshold(&gold_here, &test_here) {
                let difference = (gold_length - test_length).abs() - gold_here.distance(&test_here);
                let ratio = path_ratio(difference, gold_length);
                return (ratio < self.config.xy_path_error_threshold).then_some(ratio);
            }

            let revisits = if gold_length < test_length {
                let (parent, revisits) = self.climb_from(gold_node, &mut checked)?;
                gold_length += self.secondary(gold_node).lengths.total;
                gold_node = parent;
                revisits
            } else {
                let (parent, revisits) = self.climb_from(test_node, &mut checked)?;
                test_length += self.secondary(test_node).lengths.total;
                test_node = parent;
                revisits
            };
            if revisits {
                return None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::core::reconstruction::Reconstruction;
    use crate::core::reduce::ReductionSettings;
    use crate::core::types::NodeRef;
    use crate::matching::config::{Dataset, ThresholdConfig};
    use crate::matching::engine::MatchEngine;

    const GOLD: &str = "1 1 0 0 0 1 -1\n2 1 100 0 0 1 1\n3 1 200 60 0 1 2\n4 1 200 -60 0 1 2\n";

    /// Same tree with a small rosette traced at the end of one branch.
    const TEST: &str = "\
1 1 0 0 0 1 -1
2 1 100 0 0 1 1
3 1 200 60 0 1 2
4 1 200 -60 0 1 2
5 1 203 -58 0 1 4
6 1 203 -62 0 1 4
";

    fn load(text: &str, config: &ThresholdConfig) -> Reconstruction {
        Reconstruction::from_swc_text(text, "nmp.swc", &ReductionSettings::from(config)).unwrap()
    }

    #[test]
    fn test_rosette_termination_claims_subtree() {
        let config = ThresholdConfig::for_dataset(Dataset::NeuromuscularProjection);
        let gold = load(GOLD, &config);
        let test = load(TEST, &config);
        let mut engine = MatchEngine::new(&gold, &test, &config);
        engine
            .state
            .claim(NodeRef::gold(engine.gold.root()), NodeRef::test(engine.test.root()));

        let head = NodeRef::gold(engine.gold.heads()[0]);
        let test_head = NodeRef::test(engine.test.heads()[0]);
        engine.state.pair(head, test_head);
        let (_, leaf) = engine.children(head).unwrap();
        let (_, rosette) = engine.children(test_head).unwrap();

        let found = engine.termination_match(leaf);
        assert_eq!(found, Some(rosette));
        let (a, b) = engine.children(rosette).unwrap();
        assert_eq!(engine.state.get(a), Some(leaf));
        assert_eq!(engine.state.get(b), Some(leaf));
    }

    #[test]
    fn test_far_termination_has_no_rosette_match() {
        let config = ThresholdConfig::for_dataset(Dataset::NeuromuscularProjection);
        let gold = load(GOLD, &config);
        let test = load("1 1 0 0 0 1 -1\n2 1 100 0 0 1 1\n3 1 200 60 0 1 2\n4 1 250 -60 0 1 2\n", &config);
        let mut engine = MatchEngine::new(&gold, &test, &config);
        let head = NodeRef::gold(engine.gold.heads()[0]);
        let (_, leaf) = engine.children(head).unwrap();

        assert!(engine.termination_match(leaf).is_none());
    }

    #[test]
    fn test_rosette_walk_finds_passing_sample() {
        let config = ThresholdConfig::for_dataset(Dataset::NeuromuscularProjection);
        let gold = load(GOLD, &config);
        // The branch passes the gold termination and overshoots by 9 units
        let test = load(
            "1 1 0 0 0 1 -1\n2 1 100 0 0 1 1\n3 1 200 60 0 1 2\n7 1 200 -60 0 1 2\n4 1 209 -60 0 1 7\n",
            &config,
        );
        let engine = MatchEngine::new(&gold, &test, &config);
        let head = NodeRef::gold(engine.gold.heads()[0]);
        let (_, leaf) = engine.children(head).unwrap();
        let test_head = NodeRef::test(engine.test.heads()[0]);
        let (_, overshoot) = engine.children(test_head).unwrap();

        let difference = engine.rosette_path_difference(leaf, overshoot).unwrap();
        assert!(difference.abs() < 0.04);
    }
}
