//! Matching engine and scoring.
//!
//! This module provides the DIADEM scoring pipeline:
//!
//! - [`config::ThresholdConfig`]: spatial and path length tolerances, with
//!   the challenge dataset presets
//! - [`engine::MatchEngine`]: pairs gold nodes with test nodes
//! - [`diagnosis::ScoreReport`]: scores plus classified misses,
//!   continuations and excess nodes
//! - [`scoring::score_files`]: one gold/test pair from files to report
//!
//! ## Matching Algorithm
//!
//! 1. **Spurs**: short unmatched gold terminations are set aside, and
//!    bifurcations left with a single real branch become pass-throughs
//! 2. **Weights**: each gold node weighs as many terminations as it leads to
//! 3. **Direct matches**: gold nodes are visited depth-first and paired with
//!    a nearby test node whose path back to a corresponding ancestor has a
//!    similar length; ties are broken by descendant evidence
//! 4. **Continuations**: unmatched gold bifurcations found shifted along a
//!    test branch still score, and become distant matches when the shifted
//!    test bifurcation is close enough
//! 5. **Excess**: test terminations and bifurcations with no gold
//!    counterpart add weight to the denominator
//!
//! ## Scoring
//!
//! ```text
//! final = matched weight / (total gold weight + excess weight)
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use diadem_metric::matching::config::{Dataset, ThresholdConfig};
//! use diadem_metric::matching::scoring::score_files;
//!
//! let config = ThresholdConfig::for_dataset(Dataset::OlfactoryProjection);
//! let report = score_files(Path::new("gold.swc"), Path::new("test.swc"), &config).unwrap();
//!
//! println!("{}: {:.4}", report.test, report.final_score);
//! for miss in &report.misses {
//!     println!("  missed {} ({})", miss.location, miss.weight);
//! }
//! ```

pub mod config;
mod continuation;
pub mod diagnosis;
pub mod engine;
mod excess;
pub mod scoring;
pub mod spurs;
pub mod state;
mod termination;
mod trajectory;

pub use config::{Dataset, ThresholdConfig};
pub use diagnosis::{ClassifiedNode, ScoreReport};
pub use engine::{MatchEngine, MatchOutcome};
pub use scoring::{score_files, score_reconstructions, ScoreError};
