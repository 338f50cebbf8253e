//! Per-edge measurements carried by every binary tree node.

use std::ops::{Add, AddAssign};

use serde::{Deserialize, Serialize};

use crate::core::geometry::Point3D;

/// Path length of an edge, with its XY and Z decomposition.
///
/// `total` is either the 3-D length or the XY length depending on whether
/// Z contributes to path length for the run.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PathLengths {
    pub total: f64,
    pub xy: f64,
    pub z: f64,
}

impl PathLengths {
    #[must_use]
    pub const fn new(total: f64, xy: f64, z: f64) -> Self {
        Self { total, xy, z }
    }

    /// Lengths of the straight segment between two points.
    #[must_use]
    pub fn between(from: &Point3D, to: &Point3D, z_in_path: bool) -> Self {
        let xy = from.xy_distance(to);
        let total = if z_in_path { from.distance(to) } else { xy };
        Self::new(total, xy, from.z_distance(to))
    }
}

impl Add for PathLengths {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.total + rhs.total, self.xy + rhs.xy, self.z + rhs.z)
    }
}

impl AddAssign for PathLengths {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

/// Point at the spatial threshold distance along a path.
///
/// The XY pair and the Z coordinate are resolved independently. A `None`
/// component is undetermined: the path forks within threshold and the
/// value depends on which branch a comparison follows.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Trajectory {
    pub xy: Option<(f64, f64)>,
    pub z: Option<f64>,
}

impl Trajectory {
    /// Fully resolved trajectory sitting on `point`.
    #[must_use]
    pub const fn at(point: Point3D) -> Self {
        Self {
            xy: Some((point.x, point.y)),
            z: Some(point.z),
        }
    }

    #[must_use]
    pub const fn is_resolved(&self) -> bool {
        self.xy.is_some() && self.z.is_some()
    }

    /// Fill undetermined components from `other`, keeping known ones.
    pub fn fill_from(&mut self, other: &Self) {
        if self.xy.is_none() {
            self.xy = other.xy;
        }
        if self.z.is_none() {
            self.z = other.z;
        }
    }

    /// Copy of `self` with undetermined components taken from `other`.
    #[must_use]
    pub fn or(mut self, other: &Self) -> Self {
        self.fill_from(other);
        self
    }

    /// Difference between the planar distances `gold -> trajectory` and
    /// `test -> trajectory`. Zero while the XY component is undetermined.
    #[must_use]
    pub fn xy_offset(&self, gold: &Point3D, test: &Point3D) -> f64 {
        self.xy.map_or(0.0, |(x, y)| {
            (gold.x - x).hypot(gold.y - y) - (test.x - x).hypot(test.y - y)
        })
    }

    /// Z counterpart of [`Trajectory::xy_offset`].
    #[must_use]
    pub fn z_offset(&self, gold: &Point3D, test: &Point3D) -> f64 {
        self.z.map_or(0.0, |z| (gold.z - z).abs() - (test.z - z).abs())
    }
}

/// Geometry of the (possibly collapsed) edge from a node to its parent.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SecondaryData {
    pub lengths: PathLengths,
    pub surface_area: f64,
    pub volume: f64,
    pub parent_trajectory: Trajectory,
    pub left_trajectory: Trajectory,
    pub right_trajectory: Trajectory,
}

impl SecondaryData {
    /// Accumulate another edge's measurements; trajectories are untouched.
    pub fn absorb(&mut self, other: &Self) {
        self.lengths += other.lengths;
        self.surface_area += other.surface_area;
        self.volume += other.volume;
    }

    /// Stored trajectory toward the left or right child.
    #[must_use]
    pub fn child_trajectory(&self, left: bool) -> &Trajectory {
        if left {
            &self.left_trajectory
        } else {
            &self.right_trajectory
        }
    }

    pub fn child_trajectory_mut(&mut self, left: bool) -> &mut Trajectory {
        if left {
            &mut self.left_trajectory
        } else {
            &mut self.right_trajectory
        }
    }
}
