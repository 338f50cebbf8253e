//! # diadem-metric
//!
//! A library for scoring neuron reconstructions with the DIADEM metric.
//!
//! Automated tracing algorithms turn microscope stacks into tree shaped
//! reconstructions of a neuron. To judge one, it is compared with a gold
//! standard traced by hand: the metric asks how many of the gold standard's
//! branch points and terminations the automated reconstruction reproduces,
//! in the right place and connected by paths of the right length.
//!
//! ## Features
//!
//! - **Tree reduction**: SWC samples reduced to bifurcations and
//!   terminations, with path length and trajectories kept per edge
//! - **Tolerant matching**: separate XY and Z distance thresholds, and
//!   relative path length checks back to a corresponding ancestor
//! - **Continuations**: branch points found shifted along a branch still
//!   score
//! - **Spur removal**: short terminal branches can be ignored as noise
//! - **Excess penalty**: test branches with no gold counterpart lower the
//!   score
//! - **Dataset presets**: thresholds for the five DIADEM challenge datasets
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use diadem_metric::{score_files, ThresholdConfig};
//!
//! let report = score_files(
//!     Path::new("gold.swc"),
//!     Path::new("test.swc"),
//!     &ThresholdConfig::default(),
//! )
//! .unwrap();
//!
//! println!("Score: {:.4}", report.final_score);
//! println!("Missed weight: {}", report.missed_weight());
//! ```
//!
//! ## Modules
//!
//! - [`core`]: Tree model, reduction and geometry
//! - [`matching`]: Matching engine, thresholds and scoring
//! - [`parsing`]: SWC reader
//! - [`cli`]: Command-line interface implementation

pub mod cli;
pub mod core;
pub mod matching;
pub mod parsing;
pub mod utils;

// Re-export commonly used types for convenience
pub use core::reconstruction::Reconstruction;
pub use core::types::*;
pub use matching::config::{Dataset, ThresholdConfig};
pub use matching::diagnosis::{ClassifiedNode, ScoreReport};
pub use matching::scoring::{score_files, score_reconstructions, ScoreError};
