//! Path-specific trajectories.
//!
//! A bifurcation whose child branch forks again within threshold has no
//! single trajectory toward that child. When a comparison follows a known
//! path down to a particular descendant, the trajectory is recomputed along
//! that path.

use crate::core::geometry::{interpolate_xy, interpolate_z};
use crate::core::secondary::Trajectory;
use crate::core::types::NodeRef;
use crate::matching::engine::MatchEngine;

impl MatchEngine<'_> {
    /// Trajectory from `ancestor` toward `descendant` along the path
    /// joining them. Stored child trajectories of intermediate nodes are
    /// used where known; otherwise each component is interpolated on the
    /// first segment leaving the threshold, or taken from `descendant` when
    /// the whole path stays within it.
    pub(super) fn trajectory_for_path(&self, ancestor: NodeRef, descendant: NodeRef) -> Trajectory {
        let mut path = Vec::new();
        let mut node = descendant;
        while node != ancestor {
            path.push(node);
            match self.parent(node) {
                Some(parent) => node = parent,
                None => return Trajectory::at(self.position(descendant)),
            }
        }
        let origin = self.position(ancestor);
        let xy_threshold = self.config.xy_threshold;
        let z_threshold = self.config.z_threshold;
        let mut trajectory = Trajectory::default();
        let mut steps = path.into_iter().rev();
        // Empty when `descendant` is `ancestor` itself
        let Some(mut current) = steps.next() else {
            return Trajectory::at(self.position(descendant));
        };

        for next in steps {
            if trajectory.is_resolved() {
                break;
            }
            let stored = *self.secondary(current).child_trajectory(self.side(next).is_left());
            trajectory.fill_from(&stored);

            let here = self.position(current);
            let there = self.position(next);
            if trajectory.xy.is_none() && origin.xy_distance(&there) > xy_threshold {
                trajectory.xy = Some(interpolate_xy(&origin, &here, &there, xy_threshold));
            }
            if trajectory.z.is_none() && origin.z_distance(&there) > z_threshold {
                trajectory.z = Some(interpolate_z(&origin, &here, &there, z_threshold));
            }
            current = next;
        }

        trajectory.or(&Trajectory::at(self.position(current)))
    }
}

#[cfg(test)]
mod tests {
    use crate::core::reconstruction::Reconstruction;
    use crate::core::reduce::ReductionSettings;
    use crate::core::types::NodeRef;
    use crate::matching::config::ThresholdConfig;
    use crate::matching::engine::MatchEngine;

    /// The head's left branch forks twice in quick succession.
    const NESTED: &str = "\
1 1 0 0 0 1 -1
2 1 10 0 0 1 1
3 1 10.5 0 0 1 2
4 1 10 -5 0 1 2
5 1 11.5 0 0 1 3
6 1 10.5 5 0 1 3
7 1 12 0 0 1 5
8 1 11.5 0.5 0 1 5
";

    #[test]
    fn test_trajectory_for_path_interpolates_past_forks() {
        let config = ThresholdConfig::default();
        let recon = Reconstruction::from_swc_text(NESTED, "nested.swc", &ReductionSettings::from(&config)).unwrap();
        let engine = MatchEngine::new(&recon, &recon, &config);
        let tree = &recon.tree;
        let head = tree.heads()[0];

        // The head's left branch forks within threshold: undetermined
        let (first, _) = tree.children(head).unwrap();
        assert!(tree.secondary(head).left_trajectory.xy.is_none());

        let (second, _) = tree.children(first).unwrap();
        let (far, _) = tree.children(second).unwrap();
        assert!((tree.position(far).x - 12.0).abs() < 1e-9);

        let trajectory = engine.trajectory_for_path(NodeRef::gold(head), NodeRef::gold(far));
        let (x, y) = trajectory.xy.unwrap();
        assert!((x - 11.2).abs() < 1e-9);
        assert!(y.abs() < 1e-9);
        assert!(trajectory.z.unwrap().abs() < 1e-9);
    }

    #[test]
    fn test_trajectory_for_path_within_threshold_uses_descendant() {
        let config = ThresholdConfig::default();
        let recon = Reconstruction::from_swc_text(NESTED, "nested.swc", &ReductionSettings::from(&config)).unwrap();
        let engine = MatchEngine::new(&recon, &recon, &config);
        let tree = &recon.tree;
        let head = tree.heads()[0];
        let (first, _) = tree.children(head).unwrap();

        let trajectory = engine.trajectory_for_path(NodeRef::gold(head), NodeRef::gold(first));
        assert_eq!(trajectory.xy, Some((10.5, 0.0)));

        // Not an ancestor: falls back to the descendant's own position
        let (_, sibling) = tree.children(head).unwrap();
        let unrelated = engine.trajectory_for_path(NodeRef::gold(sibling), NodeRef::gold(first));
        assert_eq!(unrelated.xy, Some((10.5, 0.0)));
    }
}
