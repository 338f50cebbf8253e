//! Reduction of a raw SWC tree into the binary form used for matching.
//!
//! Each child of the soma root is processed independently, in this order:
//!
//! 1. **Binarisation.** Nodes with one child keep it as a left-only link.
//!    Nodes with more than two children repeatedly pair their two closest
//!    children (squared 3-D distance) under a synthetic node placed on the
//!    parent, until two remain. Ties keep the first pair found.
//! 2. **Trajectories.** Every bifurcation and leaf records the point at the
//!    spatial threshold toward its parent, and every bifurcation the point
//!    toward each child. XY and Z are resolved independently.
//! 3. **Continuation removal.** Link nodes are spliced out and their edge
//!    measurements accumulated into the surviving child.
//!
//! The result is compacted so only reachable nodes remain.

use std::f64::consts::PI;

use tracing::debug;

use crate::core::binary_tree::{BinaryTree, NodeRecord};
use crate::core::geometry::{interpolate_xy, interpolate_z};
use crate::core::raw_tree::{LinkPolicy, RawTree};
use crate::core::secondary::{PathLengths, Trajectory};
use crate::core::types::{NodeId, Side};

/// Parameters shared by reduction of the gold and test trees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReductionSettings {
    /// Factor applied to Z coordinates at parse time.
    pub scale_z: f64,
    pub xy_threshold: f64,
    pub z_threshold: f64,
    /// Whether Z contributes to path length.
    pub z_in_path: bool,
    pub link_policy: LinkPolicy,
}

impl Default for ReductionSettings {
    fn default() -> Self {
        Self {
            scale_z: 1.0,
            xy_threshold: 1.2,
            z_threshold: 1.0,
            z_in_path: false,
            link_policy: LinkPolicy::SameType,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TreeReducer {
    settings: ReductionSettings,
}

impl TreeReducer {
    #[must_use]
    pub const fn new(settings: ReductionSettings) -> Self {
        Self { settings }
    }

    #[must_use]
    pub const fn settings(&self) -> &ReductionSettings {
        &self.settings
    }

    /// Build the reduced binary tree for a raw tree.
    #[must_use]
    pub fn reduce(&self, raw: &RawTree) -> BinaryTree {
        let soma = NodeRecord::from(&raw.node(raw.root()).record);
        let mut tree = BinaryTree::new(soma);
        let root = tree.root();
        {
            let at_root = Trajectory::at(soma.position);
            let secondary = tree.secondary_mut(root);
            secondary.parent_trajectory = at_root;
            secondary.left_trajectory = at_root;
            secondary.right_trajectory = at_root;
        }

        let mut heads = Vec::with_capacity(raw.children(raw.root()).len());
        for &child in raw.children(raw.root()) {
            let head = self.binarize(raw, &mut tree, child);
            tree.set_child(root, Some(head), Side::Root);
            self.calculate_trajectories(&mut tree, head);
            heads.push(self.remove_continuations(&mut tree, head));
        }
        tree.set_heads(heads);

        let tree = tree.compact();
        debug!(
            "Reduced {} samples to {} binary nodes in {} trees",
            raw.len(),
            tree.len(),
            tree.heads().len()
        );
        tree
    }

    /// Copy the raw subtree under `raw_head` into `tree` as a binary
    /// subtree and return its head. The head is left detached.
    pub fn binarize(&self, raw: &RawTree, tree: &mut BinaryTree, raw_head: usize) -> NodeId {
        let head = tree.push(NodeRecord::from(&raw.node(raw_head).record));
        let mut stack = vec![(head, raw_head)];

        while let Some((node, raw_node)) = stack.pop() {
            let raw_children = raw.children(raw_node);
            let mut working: Vec<NodeId> = Vec::with_capacity(raw_children.len());
            for &raw_child in raw_children {
                let child = tree.push(NodeRecord::from(&raw.node(raw_child).record));
                stack.push((child, raw_child));
                working.push(child);
            }

            match working.len() {
                0 => {}
                1 => tree.set_left(node, Some(working[0])),
                _ => {
                    let synthetic = tree.node(node).record.synthetic_copy();
                    while working.len() > 2 {
                        let (i, j) = closest_pair(tree, &working);
                        let merged = tree.push(synthetic);
                        tree.set_left(merged, Some(working[i]));
                        tree.set_right(merged, Some(working[j]));
                        // j > i, so removing j first keeps i valid
                        working.remove(j);
                        working.remove(i);
                        working.push(merged);
                    }
                    tree.set_left(node, Some(working[0]));
                    tree.set_right(node, Some(working[1]));
                }
            }
        }
        head
    }

    /// Record parent and child trajectories for every bifurcation and leaf
    /// under `head`. Link nodes must still be present and `head` attached
    /// to the root.
    pub fn calculate_trajectories(&self, tree: &mut BinaryTree, head: NodeId) {
        let mut stack = vec![skip_links(tree, head)];

        while let Some(node) = stack.pop() {
            let parent_trajectory = self.parent_trajectory(tree, node);
            tree.secondary_mut(node).parent_trajectory = parent_trajectory;

            if let Some((left, right)) = tree.children(node) {
                let left_trajectory = self.child_trajectory(tree, node, left);
                let right_trajectory = self.child_trajectory(tree, node, right);
                let secondary = tree.secondary_mut(node);
                secondary.left_trajectory = left_trajectory;
                secondary.right_trajectory = right_trajectory;

                stack.push(skip_links(tree, left));
                stack.push(skip_links(tree, right));
            }
        }
    }

    /// Walk toward the root until each component leaves the threshold,
    /// falling back to the root's coordinates.
    fn parent_trajectory(&self, tree: &BinaryTree, node: NodeId) -> Trajectory {
        let origin = tree.position(node);
        let mut trajectory = Trajectory::default();
        let mut previous = origin;
        let mut current = node;

        while !trajectory.is_resolved() {
            let Some(parent) = tree.parent(current) else {
                trajectory.fill_from(&Trajectory::at(tree.position(current)));
                break;
            };
            current = parent;
            let here = tree.position(current);
            let at_root = tree.parent(current).is_none();

            if trajectory.xy.is_none() {
                if origin.xy_distance(&here) > self.settings.xy_threshold {
                    trajectory.xy = Some(interpolate_xy(&origin, &previous, &here, self.settings.xy_threshold));
                } else if at_root {
                    trajectory.xy = Some((here.x, here.y));
                }
            }
            if trajectory.z.is_none() {
                if origin.z_distance(&here) > self.settings.z_threshold {
                    trajectory.z = Some(interpolate_z(&origin, &previous, &here, self.settings.z_threshold));
                } else if at_root {
                    trajectory.z = Some(here.z);
                }
            }
            previous = here;
        }
        trajectory
    }

    /// Walk down left links from `child` until each component leaves the
    /// threshold, reaches a leaf, or meets another bifurcation. The last
    /// case stays undetermined.
    fn child_trajectory(&self, tree: &BinaryTree, node: NodeId, child: NodeId) -> Trajectory {
        let origin = tree.position(node);
        let mut trajectory = Trajectory::default();
        let mut xy_done = false;
        let mut z_done = false;
        let mut previous = origin;
        let mut current = child;

        loop {
            let here = tree.position(current);
            let leaf = tree.is_leaf(current);
            let forks = tree.right(current).is_some();

            if !xy_done {
                if origin.xy_distance(&here) > self.settings.xy_threshold {
                    trajectory.xy = Some(interpolate_xy(&origin, &previous, &here, self.settings.xy_threshold));
                    xy_done = true;
                } else if leaf {
                    trajectory.xy = Some((here.x, here.y));
                    xy_done = true;
                } else if forks {
                    xy_done = true;
                }
            }
            if !z_done {
                if origin.z_distance(&here) > self.settings.z_threshold {
                    trajectory.z = Some(interpolate_z(&origin, &previous, &here, self.settings.z_threshold));
                    z_done = true;
                } else if leaf {
                    trajectory.z = Some(here.z);
                    z_done = true;
                } else if forks {
                    z_done = true;
                }
            }
            if xy_done && z_done {
                return trajectory;
            }

            previous = here;
            match tree.left(current) {
                Some(next) => current = next,
                None => return trajectory,
            }
        }
    }

    /// Splice out every link node under `head`, folding its edge into the
    /// surviving child, and return the (possibly new) head.
    ///
    /// Edge measurements are only computed for nodes that do not have them
    /// yet, so running this again on a reduced tree changes nothing.
    pub fn remove_continuations(&self, tree: &mut BinaryTree, head: NodeId) -> NodeId {
        let root = tree.root();
        let mut head = head;
        self.calculate_path_data(tree, head);

        let mut stack = vec![head];
        while let Some(node) = stack.pop() {
            let Some(left) = tree.left(node) else {
                continue;
            };
            self.calculate_path_data(tree, left);

            if let Some(right) = tree.right(node) {
                self.calculate_path_data(tree, right);
                stack.push(right);
                stack.push(left);
                continue;
            }

            let removed = *tree.secondary(node);
            tree.secondary_mut(left).absorb(&removed);
            if node == head {
                head = left;
                tree.set_child(root, Some(left), Side::Root);
            } else if let Some(parent) = tree.parent(node) {
                let side = tree.side(node);
                tree.set_child(parent, Some(left), side);
            }
            stack.push(left);
        }
        head
    }

    /// Fill the edge measurements from `node`'s parent to `node` if they
    /// are still empty.
    fn calculate_path_data(&self, tree: &mut BinaryTree, node: NodeId) {
        let Some(parent) = tree.parent(node) else {
            return;
        };
        if tree.secondary(node).lengths != PathLengths::default() {
            return;
        }
        let from = tree.position(parent);
        let record = tree.node(node).record;
        let lengths = PathLengths::between(&from, &record.position, self.settings.z_in_path);

        let secondary = tree.secondary_mut(node);
        secondary.lengths = lengths;
        secondary.surface_area = lengths.total * PI * record.diameter();
        secondary.volume = lengths.total * PI * record.radius * record.radius;
    }
}

/// First node at or below `node` that is not a left-only link.
fn skip_links(tree: &BinaryTree, node: NodeId) -> NodeId {
    let mut current = node;
    while tree.node(current).is_link() {
        let Some(next) = tree.left(current) else {
            break;
        };
        current = next;
    }
    current
}

/// Indices `(i, j)`, `i < j`, of the two closest nodes in `working`.
fn closest_pair(tree: &BinaryTree, working: &[NodeId]) -> (usize, usize) {
    let mut best = (0, 1);
    let mut best_distance = f64::INFINITY;
    for i in 0..working.len() {
        let a = tree.position(working[i]);
        for j in (i + 1)..working.len() {
            let d = a.squared_distance(&tree.position(working[j]));
            if d < best_distance {
                best_distance = d;
                best = (i, j);
            }
        }
    }
    best
}
