//! Point and distance primitives shared by tree construction and matching.
//!
//! Distances come in three flavours: full 3-D Euclidean, planar (XY only),
//! and the absolute Z offset. Matching treats the XY plane and the Z axis
//! independently because imaging resolution differs between them.

use serde::{Deserialize, Serialize};

/// A point in 3-D space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point3D {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3D {
    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance in 3-D.
    #[must_use]
    pub fn distance(&self, other: &Self) -> f64 {
        self.squared_distance(other).sqrt()
    }

    #[must_use]
    pub fn squared_distance(&self, other: &Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        dx * dx + dy * dy + dz * dz
    }

    /// Distance projected onto the XY plane.
    #[must_use]
    pub fn xy_distance(&self, other: &Self) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Absolute difference along Z.
    #[must_use]
    pub fn z_distance(&self, other: &Self) -> f64 {
        (self.z - other.z).abs()
    }

    /// Vector from `self` to `other`.
    #[must_use]
    pub fn vector_to(&self, other: &Self) -> Self {
        Self::new(other.x - self.x, other.y - self.y, other.z - self.z)
    }

    #[must_use]
    pub fn norm(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Unit vector in the same direction, or `None` for the zero vector.
    #[must_use]
    pub fn normalize(&self) -> Option<Self> {
        let n = self.norm();
        if n <= f64::EPSILON {
            return None;
        }
        Some(Self::new(self.x / n, self.y / n, self.z / n))
    }

    #[must_use]
    pub fn dot(&self, other: &Self) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// Angle in radians between two vectors, or `None` if either is zero.
    #[must_use]
    pub fn angle(&self, other: &Self) -> Option<f64> {
        let a = self.normalize()?;
        let b = other.normalize()?;
        // Rounding can push the cosine just outside [-1, 1]
        Some(a.dot(&b).clamp(-1.0, 1.0).acos())
    }
}

/// Point on the XY segment `inner -> outer` lying at planar distance
/// `threshold` from `origin`.
///
/// `inner` is expected to be within the threshold and `outer` beyond it.
/// When both are equally far from the origin the segment carries no
/// information and `outer` is returned.
#[must_use]
pub fn interpolate_xy(origin: &Point3D, inner: &Point3D, outer: &Point3D, threshold: f64) -> (f64, f64) {
    let to_inner = origin.xy_distance(inner);
    let to_outer = origin.xy_distance(outer);
    let span = to_outer - to_inner;
    if span.abs() <= f64::EPSILON {
        return (outer.x, outer.y);
    }
    let proportion = (threshold - to_inner) / span;
    (
        inner.x + proportion * (outer.x - inner.x),
        inner.y + proportion * (outer.y - inner.y),
    )
}

/// Z counterpart of [`interpolate_xy`], using absolute Z offsets.
#[must_use]
pub fn interpolate_z(origin: &Point3D, inner: &Point3D, outer: &Point3D, threshold: f64) -> f64 {
    let to_inner = origin.z_distance(inner);
    let to_outer = origin.z_distance(outer);
    let span = to_outer - to_inner;
    if span.abs() <= f64::EPSILON {
        return outer.z;
    }
    let proportion = (threshold - to_inner) / span;
    inner.z + proportion * (outer.z - inner.z)
}
