//! Core data types for neuron reconstructions.
//!
//! This module provides the tree model the matching engine works on:
//!
//! - [`geometry::Point3D`]: 3-D point with Euclidean, planar and Z distances
//! - [`raw_tree::RawTree`]: parent-linked n-ary tree built from SWC samples
//! - [`binary_tree::BinaryTree`]: reduced, strictly binary arena tree
//! - [`secondary::SecondaryData`]: per-edge path lengths and trajectories
//! - [`reduce::TreeReducer`]: raw tree to binary tree conversion
//! - [`reconstruction::Reconstruction`]: a parsed and reduced input file
//!
//! ## Reduced Tree Shape
//!
//! | Node kind     | Children | Meaning                                   |
//! |---------------|----------|-------------------------------------------|
//! | Soma root     | heads    | Origin of every independent tree          |
//! | Bifurcation   | 2        | Branch point, possibly synthetic          |
//! | Termination   | 0        | Leaf                                      |
//!
//! Continuations (one child) never survive reduction; their path length,
//! surface area and volume are folded into the next surviving node.

pub mod binary_tree;
pub mod geometry;
pub mod raw_tree;
pub mod reconstruction;
pub mod reduce;
pub mod secondary;
pub mod types;
