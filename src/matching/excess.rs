//! Gold node weights and test excess.
//!
//! | Gold node                                   | Weight                     |
//! |---------------------------------------------|----------------------------|
//! | Termination                                 | 1                          |
//! | Two terminations, neither a spur            | 2                          |
//! | Two terminations, at least one a spur       | 1                          |
//! | Pass-through (one spur, one bifurcation)    | the bifurcation's weight   |
//! | Otherwise                                   | sum of the children        |
//!
//! Excess runs bottom-up over the test tree. An unmatched termination whose
//! parent is unmatched too, with no unused gold node nearby, weighs 1. An
//! unmatched bifurcation with no unused gold node nearby that does not
//! continue any gold branch carries the excess of the two branches below.

use std::collections::HashMap;

use tracing::trace;

use crate::core::types::{NodeId, NodeRef};
use crate::matching::engine::MatchEngine;

impl MatchEngine<'_> {
    /// Weight of every gold node, spurs and pass-throughs included.
    pub(super) fn node_weights(&self) -> HashMap<NodeId, u32> {
        let tree = &self.gold;
        let spurs = &self.gold_spurs;
        let mut weights = HashMap::new();

        for &head in tree.heads() {
            // Reverse pre-order visits children before their parent
            for id in tree.preorder(head).into_iter().rev() {
                let weight = match tree.children(id) {
                    None => 1,
                    Some((left, right)) if tree.is_leaf(left) && tree.is_leaf(right) => {
                        if spurs.is_spur_leaf(left) || spurs.is_spur_leaf(right) {
                            1
                        } else {
                            2
                        }
                    }
                    Some((left, right)) if spurs.is_pass_through(id) => {
                        let branch = if tree.is_leaf(left) { right } else { left };
                        weights.get(&branch).copied().unwrap_or(1)
                    }
                    Some((left, right)) => {
                        weights.get(&left).copied().unwrap_or(1) + weights.get(&right).copied().unwrap_or(1)
                    }
                };
                weights.insert(id, weight);
            }
        }
        weights
    }

    /// Total excess weight of the test tree and the excess nodes with
    /// their weights, deepest first. Heads are never excess.
    pub(super) fn weigh_excess(&mut self) -> (f64, Vec<(NodeId, u32)>) {
        let mut order = Vec::new();
        for &head in self.test.heads() {
            let mut stack = vec![head];
            while let Some(id) = stack.pop() {
                if let Some((left, right)) = self.test.children(id) {
                    stack.push(left);
                    stack.push(right);
                    order.push(left);
                    order.push(right);
                }
            }
        }

        let mut below: HashMap<NodeId, u32> = HashMap::new();
        let mut total = 0u32;
        let mut excess_nodes = Vec::new();

        for id in order.into_iter().rev() {
            let node = NodeRef::test(id);
            let excess = if let Some((left, right)) = self.test.children(id) {
                let carried = below.get(&left).copied().unwrap_or(0) + below.get(&right).copied().unwrap_or(0);
                if !self.state.contains(node)
                    && self.find_nearest(node, true).is_empty()
                    && !self.is_continuation(node, false)
                {
                    excess_nodes.push((id, carried));
                    if !self.test_spurs.contains(id) {
                        total += carried;
                    }
                    carried
                } else {
                    0
                }
            } else if !self.test_spurs.contains(id)
                && !self.state.contains(node)
                && !self.parent(node).is_some_and(|p| self.state.contains(p))
                && self.find_nearest(node, true).is_empty()
            {
                excess_nodes.push((id, 1));
                total += 1;
                1
            } else {
                0
            };
            if excess > 0 {
                trace!("{} is excess ({})", node, excess);
            }
            below.insert(id, excess);
        }

        (f64::from(total), excess_nodes)
    }
}

#[cfg(test)]
mod tests {
    use crate::core::reconstruction::Reconstruction;
    use crate::core::reduce::ReductionSettings;
    use crate::core::types::{NodeId, NodeRef, Origin};
    use crate::matching::config::ThresholdConfig;
    use crate::matching::engine::MatchEngine;

    const SPURRED: &str = "\
1 1 0 0 0 1 -1
2 1 10 0 0 1 1
3 1 11 1 0 1 2
4 1 20 -5 0 1 2
5 1 30 -5 0 1 4
6 1 20 -15 0 1 4
";

    fn load(text: &str, config: &ThresholdConfig) -> Reconstruction {
        Reconstruction::from_swc_text(text, "tree.swc", &ReductionSettings::from(config)).unwrap()
    }

    fn weight_of(engine: &MatchEngine<'_>, weights: &std::collections::HashMap<NodeId, u32>, id: i64) -> u32 {
        let node = engine
            .gold
            .reachable()
            .into_iter()
            .find(|&n| engine.gold.node(n).record.id == id)
            .unwrap();
        weights[&node]
    }

    #[test]
    fn test_weights_without_spurs() {
        let config = ThresholdConfig::default();
        let recon = load(SPURRED, &config);
        let engine = MatchEngine::new(&recon, &recon, &config);
        let weights = engine.node_weights();

        assert_eq!(weight_of(&engine, &weights, 3), 1);
        assert_eq!(weight_of(&engine, &weights, 4), 2);
        assert_eq!(weight_of(&engine, &weights, 2), 3);
    }

    #[test]
    fn test_pass_through_forwards_branch_weight() {
        let config = ThresholdConfig {
            spur_threshold: 3.0,
            ..Default::default()
        };
        let recon = load(SPURRED, &config);
        let mut engine = MatchEngine::new(&recon, &recon, &config);
        engine.gold_spurs = engine.find_spurs(Origin::Gold);
        let weights = engine.node_weights();

        assert_eq!(weight_of(&engine, &weights, 2), 2);
        assert_eq!(weight_of(&engine, &weights, 4), 2);
    }

    #[test]
    fn test_displaced_leaves_are_excess() {
        let config = ThresholdConfig::default();
        let gold = load("1 1 0 0 0 1 -1\n2 1 10 0 0 1 1\n3 1 20 5 0 1 2\n4 1 20 -5 0 1 2\n", &config);
        let test = load("1 1 0 0 0 1 -1\n2 1 12.2 0 0 1 1\n3 1 22.2 5 0 1 2\n4 1 22.2 -5 0 1 2\n", &config);
        let mut engine = MatchEngine::new(&gold, &test, &config);
        engine
            .state
            .claim(NodeRef::gold(engine.gold.root()), NodeRef::test(engine.test.root()));

        let (weight, nodes) = engine.weigh_excess();
        assert!((weight - 2.0).abs() < 1e-9);
        assert_eq!(nodes.len(), 2);
        assert!(nodes.iter().all(|&(_, w)| w == 1));
    }

    #[test]
    fn test_leaves_under_matched_parent_are_not_excess() {
        let config = ThresholdConfig::default();
        let gold = load("1 1 0 0 0 1 -1\n2 1 10 0 0 1 1\n3 1 20 5 0 1 2\n4 1 20 -5 0 1 2\n", &config);
        let test = load(
            "1 1 0 0 0 1 -1\n2 1 10 0 0 1 1\n3 1 20 5 0 1 2\n4 1 20 -5 0 1 2\n5 1 30 -5 0 1 4\n6 1 20 -15 0 1 4\n",
            &config,
        );
        let mut engine = MatchEngine::new(&gold, &test, &config);
        let head = NodeRef::gold(engine.gold.heads()[0]);
        let test_head = NodeRef::test(engine.test.heads()[0]);
        engine.state.pair(head, test_head);
        let (gl, gr) = engine.children(head).unwrap();
        let (tl, tr) = engine.children(test_head).unwrap();
        engine.state.pair(gl, tl);
        engine.state.pair(gr, tr);

        let (weight, nodes) = engine.weigh_excess();
        assert!(weight.abs() < f64::EPSILON);
        assert!(nodes.is_empty());
        assert!(engine.state.is_consistent());
    }
}
