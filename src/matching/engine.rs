//! Gold-to-test node matching.
//!
//! [`MatchEngine`] owns working copies of both reduced trees for one
//! scoring run. Gold nodes are visited depth-first, one head at a time; each
//! is matched to a test node that is spatially close and whose path back to
//! an already-corresponding ancestor has a similar length. The visit order
//! matters: a test node taken by one gold node is unavailable to the next.
//!
//! Matching helpers are written against [`NodeRef`] so the same code runs
//! with the trees in either role. Excess weighting relies on this when it
//! asks whether an unmatched test bifurcation is a continuation of the gold
//! tree.

use std::collections::{HashMap, HashSet};

use tracing::{debug, trace};

use crate::core::binary_tree::BinaryTree;
use crate::core::geometry::Point3D;
use crate::core::raw_tree::RawTree;
use crate::core::reconstruction::Reconstruction;
use crate::core::secondary::{PathLengths, SecondaryData, Trajectory};
use crate::core::types::{NodeId, NodeRef, Origin, Side};
use crate::matching::config::{ThresholdConfig, DISTANT_MATCH_FACTOR, Z_TOLERANCE};
use crate::matching::diagnosis::ClassifiedNode;
use crate::matching::spurs::SpurSet;
use crate::matching::state::MatchState;
use crate::utils::validation::count_to_f64;

/// Everything a scoring run produces.
#[derive(Debug, Clone)]
pub struct MatchOutcome {
    /// Gold nodes taking part in scoring (spurs and pass-throughs excluded)
    pub scorable_nodes: usize,
    pub direct_matches: usize,
    /// Weight of directly matched and continuation gold nodes
    pub score_sum: f64,
    /// Weight of all scorable gold nodes
    pub weight_sum: f64,
    pub excess_weight: f64,
    pub direct_match_score: f64,
    pub quality_score: f64,
    pub final_score: f64,
    pub misses: Vec<ClassifiedNode>,
    pub continuations: Vec<ClassifiedNode>,
    pub distant_matches: Vec<ClassifiedNode>,
    pub excess_nodes: Vec<ClassifiedNode>,
    pub state: MatchState,
}

/// Relative path error, defined for a zero-length gold path.
pub(crate) fn path_ratio(difference: f64, total: f64) -> f64 {
    if difference == 0.0 {
        0.0
    } else if total == 0.0 {
        f64::INFINITY
    } else {
        difference / total
    }
}

pub struct MatchEngine<'a> {
    pub(super) config: &'a ThresholdConfig,
    pub(super) gold: BinaryTree,
    pub(super) test: BinaryTree,
    /// Unreduced test samples, walked when a termination sits in a rosette
    pub(super) test_raw: &'a RawTree,
    pub(super) state: MatchState,
    pub(super) gold_pool: Vec<NodeId>,
    pub(super) test_pool: Vec<NodeId>,
    pub(super) gold_spurs: SpurSet,
    pub(super) test_spurs: SpurSet,
    pub(super) weights: HashMap<NodeId, u32>,
    pub(super) continuations: Vec<NodeId>,
    pub(super) distant_matches: Vec<NodeId>,
}

impl<'a> MatchEngine<'a> {
    pub fn new(gold: &'a Reconstruction, test: &'a Reconstruction, config: &'a ThresholdConfig) -> Self {
        let pool = |tree: &BinaryTree| -> Vec<NodeId> { tree.heads().iter().flat_map(|&h| tree.preorder(h)).collect() };

        Self {
            config,
            gold_pool: pool(&gold.tree),
            test_pool: pool(&test.tree),
            gold: gold.tree.clone(),
            test: test.tree.clone(),
            test_raw: &test.raw,
            state: MatchState::new(),
            gold_spurs: SpurSet::default(),
            test_spurs: SpurSet::default(),
            weights: HashMap::new(),
            continuations: Vec::new(),
            distant_matches: Vec::new(),
        }
    }

    /// Score every gold node and weigh the test tree's excess.
    #[must_use]
    pub fn run(mut self) -> MatchOutcome {
        // The soma roots are registered with each other by definition
        self.state
            .claim(NodeRef::gold(self.gold.root()), NodeRef::test(self.test.root()));

        if self.config.removes_spurs() {
            self.gold_spurs = self.find_spurs(Origin::Gold);
            let spurs = &self.gold_spurs;
            self.gold_pool.retain(|&id| !spurs.is_spur_leaf(id));
            debug!("Gold spurs: {}", spurs.len());
        }
        self.weights = self.node_weights();

        let heads = self.gold.heads().to_vec();
        let total_nodes: usize = heads.iter().map(|&h| self.gold.subtree_size(h)).sum();
        let scorable_nodes = total_nodes.saturating_sub(self.gold_spurs.len());

        let mut direct_matches = 0usize;
        let mut score_sum = 0.0;
        let mut weight_sum = 0.0;
        let mut misses = Vec::new();

        for head in heads {
            let mut stack = vec![head];
            while let Some(id) = stack.pop() {
                if let Some((left, right)) = self.gold.children(id) {
                    stack.push(left);
                    stack.push(right);
                }
                if self.gold_spurs.contains(id) {
                    trace!("Skipping spur {}", NodeRef::gold(id));
                    continue;
                }

                let weight = f64::from(self.weight(id));
                weight_sum += weight;

                let gold = NodeRef::gold(id);
                let found = if self.config.has_rosettes() && self.gold.is_leaf(id) {
                    self.termination_match(gold)
                } else {
                    self.closest_match(gold)
                };

                if let Some(test) = found {
                    trace!("{} matches {}", gold, test);
                    self.state.pair(gold, test);
                    score_sum += weight;
                    direct_matches += 1;
                } else {
                    misses.push(id);
                }
            }
        }

        let mut remaining = Vec::new();
        for id in misses {
            if !self.gold.is_leaf(id) && self.is_continuation(NodeRef::gold(id), true) {
                score_sum += f64::from(self.weight(id));
            } else {
                remaining.push(id);
            }
        }

        let mut outcome = MatchOutcome {
            scorable_nodes,
            direct_matches,
            score_sum,
            weight_sum,
            excess_weight: 0.0,
            direct_match_score: 0.0,
            quality_score: 0.0,
            final_score: 0.0,
            misses: Vec::new(),
            continuations: Vec::new(),
            distant_matches: Vec::new(),
            excess_nodes: Vec::new(),
            state: MatchState::new(),
        };

        let mut excess_nodes = Vec::new();
        if weight_sum > 0.0 {
            outcome.direct_match_score = count_to_f64(direct_matches) / count_to_f64(scorable_nodes.max(1));
            outcome.quality_score = score_sum / weight_sum;

            if self.config.removes_spurs() {
                self.test_spurs = self.find_spurs(Origin::Test);
                let spurs = &self.test_spurs;
                self.test_pool.retain(|&id| !spurs.is_spur_leaf(id));
                debug!("Test spurs: {}", spurs.len());
            }
            let (excess_weight, nodes) = self.weigh_excess();
            excess_nodes = nodes;
            outcome.excess_weight = excess_weight;
            outcome.final_score = score_sum / (weight_sum + excess_weight);
        }

        debug!(
            "Direct matches {}/{}, continuations {}, distant {}, misses {}, excess weight {}",
            direct_matches,
            scorable_nodes,
            self.continuations.len(),
            self.distant_matches.len(),
            remaining.len(),
            outcome.excess_weight
        );

        let scale_z = self.config.scale_z;
        let classify = |tree: &BinaryTree, id: NodeId, weight: u32| {
            ClassifiedNode::new(&tree.node(id).record, weight, scale_z)
        };
        outcome.misses = remaining
            .iter()
            .map(|&id| classify(&self.gold, id, self.weight(id)))
            .collect();
        outcome.continuations = self
            .continuations
            .iter()
            .map(|&id| classify(&self.gold, id, self.weight(id)))
            .collect();
        outcome.distant_matches = self
            .distant_matches
            .iter()
            .map(|&id| classify(&self.gold, id, self.weight(id)))
            .collect();
        outcome.excess_nodes = excess_nodes
            .iter()
            .map(|&(id, weight)| classify(&self.test, id, weight))
            .collect();
        outcome.state = self.state;
        outcome
    }

    /// Weight a scored gold node contributes.
    pub(super) fn weight(&self, id: NodeId) -> u32 {
        if self.config.weighted {
            self.weights.get(&id).copied().unwrap_or(1)
        } else {
            1
        }
    }

    // Role-independent tree access

    pub(super) fn tree(&self, origin: Origin) -> &BinaryTree {
        match origin {
            Origin::Gold => &self.gold,
            Origin::Test => &self.test,
        }
    }

    pub(super) fn tree_mut(&mut self, origin: Origin) -> &mut BinaryTree {
        match origin {
            Origin::Gold => &mut self.gold,
            Origin::Test => &mut self.test,
        }
    }

    pub(super) fn pool(&self, origin: Origin) -> &[NodeId] {
        match origin {
            Origin::Gold => &self.gold_pool,
            Origin::Test => &self.test_pool,
        }
    }

    pub(super) fn position(&self, node: NodeRef) -> Point3D {
        self.tree(node.origin).position(node.id)
    }

    pub(super) fn secondary(&self, node: NodeRef) -> &SecondaryData {
        self.tree(node.origin).secondary(node.id)
    }

    pub(super) fn parent(&self, node: NodeRef) -> Option<NodeRef> {
        self.tree(node.origin)
            .parent(node.id)
            .map(|id| NodeRef::new(node.origin, id))
    }

    pub(super) fn children(&self, node: NodeRef) -> Option<(NodeRef, NodeRef)> {
        self.tree(node.origin)
            .children(node.id)
            .map(|(l, r)| (NodeRef::new(node.origin, l), NodeRef::new(node.origin, r)))
    }

    pub(super) fn is_leaf(&self, node: NodeRef) -> bool {
        self.tree(node.origin).is_leaf(node.id)
    }

    pub(super) fn side(&self, node: NodeRef) -> Side {
        self.tree(node.origin).side(node.id)
    }

    pub(super) fn distance(&self, a: NodeRef, b: NodeRef) -> f64 {
        self.position(a).distance(&self.position(b))
    }

    // Spatial thresholds

    pub(super) fn within_threshold(&self, a: &Point3D, b: &Point3D) -> bool {
        a.xy_distance(b) <= self.config.xy_threshold && a.z_distance(b) <= self.config.z_threshold + Z_TOLERANCE
    }

    pub(super) fn within_distant_threshold(&self, a: &Point3D, b: &Point3D) -> bool {
        a.xy_distance(b) <= self.config.xy_threshold * DISTANT_MATCH_FACTOR
            && a.z_distance(b) <= self.config.z_threshold * DISTANT_MATCH_FACTOR + Z_TOLERANCE
    }

    /// Nodes of the other tree within the spatial threshold of `target`,
    /// in pool order. With `check_used`, nodes that already correspond to
    /// something are skipped.
    pub(super) fn find_nearest(&self, target: NodeRef, check_used: bool) -> Vec<NodeRef> {
        let origin = target.origin.other();
        let position = self.position(target);
        let tree = self.tree(origin);
        self.pool(origin)
            .iter()
            .map(|&id| NodeRef::new(origin, id))
            .filter(|&candidate| !check_used || !self.state.contains(candidate))
            .filter(|&candidate| self.within_threshold(&position, &tree.position(candidate.id)))
            .collect()
    }

    // Path length confirmation

    /// Whether a test path is close enough in length to a gold path.
    ///
    /// When the gold path is shorter than the spatial threshold the error
    /// is waived if the test path is too, and otherwise held to the local
    /// path error threshold.
    pub(super) fn path_length_matches(&self, gold: &PathLengths, test_xy: f64, test_z: f64) -> bool {
        let config = self.config;
        let mut xy_error = path_ratio((gold.xy - test_xy).abs(), gold.total);
        let mut z_error = path_ratio((gold.z - test_z).abs(), gold.total);
        let mut xy_limit = config.xy_path_error_threshold;
        let mut z_limit = config.z_path_error_threshold;

        if gold.xy < config.xy_threshold {
            if test_xy < config.xy_threshold {
                xy_error = 0.0;
            } else {
                xy_limit = config.local_path_error_threshold;
            }
        }
        if gold.z < config.z_threshold {
            if test_z < config.z_threshold {
                z_error = 0.0;
            } else {
                z_limit = config.local_path_error_threshold;
            }
        }

        xy_error < xy_limit && z_error < z_limit
    }

    /// Relative XY path error between `gold` and `test`, measured up to the
    /// first pair of ancestors that are within threshold of each other.
    ///
    /// The climb advances whichever side has the shorter accumulated path.
    /// It gives up at a root, or when a node about to be passed is near one
    /// the other side already passed.
    pub(super) fn match_path_difference(&mut self, gold: NodeRef, test: NodeRef) -> Option<f64> {
        let mut test_node = self.parent(test)?;
        let target = gold;

        let mut gold_path = self.secondary(gold).lengths;
        let mut test_path = self.secondary(test).lengths;
        let parent_trajectory = self.secondary(gold).parent_trajectory;
        let (gold_pos, test_pos) = (self.position(gold), self.position(test));
        test_path.xy += parent_trajectory.xy_offset(&gold_pos, &test_pos);
        test_path.z += parent_trajectory.z_offset(&gold_pos, &test_pos);

        let mut is_left = self.side(gold).is_left();
        let mut gold_node = self.parent(gold)?;
        let mut checked: HashSet<NodeRef> = HashSet::new();

        loop {
            let (gold_pos, test_pos) = (self.position(gold_node), self.position(test_node));
            if self.within_threshold(&gold_pos, &test_pos) {
                let trajectory = self.resolve_child_trajectory(gold_node, is_left, target);
                let test_xy = test_path.xy + trajectory.xy_offset(&gold_pos, &test_pos);
                let test_z = test_path.z + trajectory.z_offset(&gold_pos, &test_pos);
                trace!(
                    "{} vs {}: gold path {:.3}, test path {:.3}",
                    gold_node,
                    test_node,
                    gold_path.total,
                    test_path.total
                );
                return self
                    .path_length_matches(&gold_path, test_xy, test_z)
                    .then(|| path_ratio((gold_path.xy - test_xy).abs(), gold_path.total));
            }

            let revisits = if gold_path.total < test_path.total {
                let (parent, revisits) = self.climb_from(gold_node, &mut checked)?;
                gold_path += self.secondary(gold_node).lengths;
                is_left = self.side(gold_node).is_left();
                gold_node = parent;
                revisits
            } else {
                let (parent, revisits) = self.climb_from(test_node, &mut checked)?;
                test_path += self.secondary(test_node).lengths;
                test_node = parent;
                revisits
            };
            if revisits {
                return None;
            }
        }
    }

    /// Parent of `node` on a confirmation climb, and whether `node` is near
    /// a node the other side has already climbed past. `None` at a root.
    pub(super) fn climb_from(&self, node: NodeRef, checked: &mut HashSet<NodeRef>) -> Option<(NodeRef, bool)> {
        let parent = self.parent(node)?;
        let revisits = self.find_nearest(node, false).iter().any(|n| checked.contains(n));
        checked.insert(node);
        Some((parent, revisits))
    }

    // Candidate selection

    /// Best test node for `gold` among the unused nearby ones whose paths
    /// confirm the match.
    pub(super) fn closest_match(&mut self, gold: NodeRef) -> Option<NodeRef> {
        let nearby = self.find_nearest(gold, true);
        trace!("{}: {} nearby", gold, nearby.len());

        let mut confirmed = Vec::new();
        for test in nearby {
            if self.match_path_difference(gold, test).is_some_and(|d| d < 1.0) {
                confirmed.push(test);
            }
        }

        match confirmed.len() {
            0 => None,
            1 => confirmed.pop(),
            _ => self.determine_best_match(confirmed, gold),
        }
    }

    /// Pick among several confirmed candidates using descendant evidence.
    ///
    /// The gold node's descendants are visited one branching level at a
    /// time. A candidate is confirmed when a test node near a descendant
    /// climbs through it with a matching path length. A single confirmed
    /// candidate wins; otherwise the nearest of the confirmed (or, with
    /// none confirmed, of all) candidates is taken.
    pub(super) fn determine_best_match(&mut self, mut candidates: Vec<NodeRef>, gold: NodeRef) -> Option<NodeRef> {
        let mut confirmed = Vec::new();

        if let Some((left, right)) = self.children(gold) {
            let gold_pos = self.position(gold);
            let mut paths: HashMap<NodeRef, PathLengths> = HashMap::from([(gold, PathLengths::default())]);
            let mut level = vec![
                (left, self.resolve_child_trajectory(gold, true, left)),
                (right, self.resolve_child_trajectory(gold, false, right)),
            ];

            while !level.is_empty() && confirmed.is_empty() {
                let mut next = Vec::new();
                for (descendant, target_trajectory) in level {
                    if let Some((l, r)) = self.children(descendant) {
                        next.push((l, target_trajectory));
                        next.push((r, target_trajectory));
                    }

                    let descendant_pos = self.position(descendant);
                    let descendant_trajectory = self.secondary(descendant).parent_trajectory;
                    let parent_path = self
                        .parent(descendant)
                        .and_then(|p| paths.get(&p).copied())
                        .unwrap_or_default();
                    let gold_path = self.secondary(descendant).lengths + parent_path;
                    paths.insert(descendant, gold_path);

                    for test_descendant in self.find_nearest(descendant, true) {
                        let test_descendant_pos = self.position(test_descendant);
                        let mut test_path = PathLengths::default();
                        let mut node = test_descendant;
                        while let Some(parent) = self.parent(node) {
                            test_path += self.secondary(node).lengths;
                            node = parent;

                            let Some(k) = candidates.iter().position(|&c| c == node) else {
                                continue;
                            };
                            let candidate_pos = self.position(node);
                            let test_xy = test_path.xy
                                + target_trajectory.xy_offset(&gold_pos, &candidate_pos)
                                + descendant_trajectory.xy_offset(&descendant_pos, &test_descendant_pos);
                            let test_z = test_path.z
                                + target_trajectory.z_offset(&gold_pos, &candidate_pos)
                                + descendant_trajectory.z_offset(&descendant_pos, &test_descendant_pos);
                            if self.path_length_matches(&gold_path, test_xy, test_z) {
                                trace!("{} confirmed through {}", node, test_descendant);
                                confirmed.push(candidates.remove(k));
                            }
                        }
                    }
                }
                level = next;
            }
        }

        if confirmed.len() == 1 {
            return confirmed.pop();
        }
        let pool = if confirmed.is_empty() { candidates } else { confirmed };
        self.nearest_of(gold, &pool)
    }

    /// Closest node of `pool` to `target`; the first wins a tie.
    pub(super) fn nearest_of(&self, target: NodeRef, pool: &[NodeRef]) -> Option<NodeRef> {
        let mut best: Option<(NodeRef, f64)> = None;
        for &candidate in pool {
            let distance = self.distance(target, candidate);
            if best.map_or(true, |(_, d)| distance < d) {
                best = Some((candidate, distance));
            }
        }
        best.map(|(node, _)| node)
    }

    /// Stored trajectory of `ancestor` toward one child, with undetermined
    /// components resolved along the path to `target` and written back.
    pub(super) fn resolve_child_trajectory(&mut self, ancestor: NodeRef, left: bool, target: NodeRef) -> Trajectory {
        let stored = *self.secondary(ancestor).child_trajectory(left);
        if stored.is_resolved() {
            return stored;
        }
        let resolved = stored.or(&self.trajectory_for_path(ancestor, target));
        *self
            .tree_mut(ancestor.origin)
            .secondary_mut(ancestor.id)
            .child_trajectory_mut(left) = resolved;
        resolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::reduce::ReductionSettings;

    const FORK: &str = "1 1 0 0 0 1 -1\n2 1 10 0 0 1 1\n3 1 20 5 0 1 2\n4 1 20 -5 0 1 2\n";

    fn reconstruction(text: &str, config: &ThresholdConfig) -> Reconstruction {
        Reconstruction::from_swc_text(text, "tree.swc", &ReductionSettings::from(config)).unwrap()
    }

    #[test]
    fn test_path_ratio_degenerate() {
        assert!(path_ratio(0.0, 0.0).abs() < f64::EPSILON);
        assert!(path_ratio(1.0, 0.0).is_infinite());
        assert!((path_ratio(1.0, 4.0) - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_path_length_matches_local_threshold() {
        let config = ThresholdConfig::default();
        let recon = reconstruction(FORK, &config);
        let engine = MatchEngine::new(&recon, &recon, &config);

        let long = PathLengths::new(100.0, 100.0, 0.0);
        assert!(engine.path_length_matches(&long, 104.0, 0.0));
        assert!(!engine.path_length_matches(&long, 106.0, 0.0));

        // Short gold path: waived when the test path is short too
        let short = PathLengths::new(1.0, 1.0, 0.0);
        assert!(engine.path_length_matches(&short, 0.1, 0.0));
        // Otherwise the local threshold applies
        assert!(engine.path_length_matches(&short, 1.3, 0.0));
        assert!(!engine.path_length_matches(&short, 1.5, 0.0));
    }

    #[test]
    fn test_find_nearest_respects_thresholds_and_use() {
        let config = ThresholdConfig::default();
        let gold = reconstruction(FORK, &config);
        let test = reconstruction(
            "1 1 0 0 0 1 -1\n2 1 11 0 1.05 1 1\n3 1 20 5 0 1 2\n4 1 20 -5 0 1 2\n",
            &config,
        );
        let mut engine = MatchEngine::new(&gold, &test, &config);
        let head = NodeRef::gold(engine.gold.heads()[0]);

        let nearby = engine.find_nearest(head, true);
        assert_eq!(nearby.len(), 1);
        assert_eq!(nearby[0].origin, Origin::Test);

        engine.state.pair(head, nearby[0]);
        assert!(engine.find_nearest(head, true).is_empty());
        assert_eq!(engine.find_nearest(head, false).len(), 1);
    }

    #[test]
    fn test_match_path_difference_identical() {
        let config = ThresholdConfig::default();
        let recon = reconstruction(FORK, &config);
        let mut engine = MatchEngine::new(&recon, &recon, &config);
        let head = engine.gold.heads()[0];

        let diff = engine.match_path_difference(NodeRef::gold(head), NodeRef::test(head));
        assert!(diff.is_some_and(|d| d.abs() < 1e-9));
    }

    #[test]
    fn test_match_path_difference_rejects_long_detour() {
        let config = ThresholdConfig::default();
        let gold = reconstruction(FORK, &config);
        // Same end point, reached through a long detour
        let test = reconstruction(
            "1 1 0 0 0 1 -1\n5 1 5 30 0 1 1\n2 1 10 0 0 1 5\n3 1 20 5 0 1 2\n4 1 20 -5 0 1 2\n",
            &config,
        );
        let mut engine = MatchEngine::new(&gold, &test, &config);
        let head = NodeRef::gold(engine.gold.heads()[0]);
        let test_head = NodeRef::test(engine.test.heads()[0]);

        assert!(engine.match_path_difference(head, test_head).is_none());
        assert!(engine.closest_match(head).is_none());
    }

    #[test]
    fn test_nearest_of_first_wins_ties() {
        let config = ThresholdConfig::default();
        let recon = reconstruction(FORK, &config);
        let engine = MatchEngine::new(&recon, &recon, &config);
        let head = engine.gold.heads()[0];
        let (l, r) = engine.test.children(head).unwrap();

        let pool = [NodeRef::test(l), NodeRef::test(r)];
        assert_eq!(engine.nearest_of(NodeRef::gold(head), &pool), Some(NodeRef::test(l)));
        assert_eq!(engine.nearest_of(NodeRef::gold(head), &[]), None);
    }
}
