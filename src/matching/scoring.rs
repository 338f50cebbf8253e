//! Scoring entry points.
//!
//! [`score_files`] is the whole pipeline for one gold/test pair: validate
//! the inputs, parse and reduce both files with the run's settings, match,
//! and build the [`ScoreReport`].
//!
//! ## Example
//!
//! ```rust
//! use diadem_metric::core::reconstruction::Reconstruction;
//! use diadem_metric::core::reduce::ReductionSettings;
//! use diadem_metric::matching::config::ThresholdConfig;
//! use diadem_metric::matching::scoring::score_reconstructions;
//!
//! let swc = "1 1 0 0 0 1 -1\n2 3 10 0 0 1 1\n3 3 20 5 0 1 2\n4 3 20 -5 0 1 2\n";
//! let config = ThresholdConfig::default();
//! let settings = ReductionSettings::from(&config);
//! let gold = Reconstruction::from_swc_text(swc, "gold.swc", &settings).unwrap();
//! let test = Reconstruction::from_swc_text(swc, "test.swc", &settings).unwrap();
//!
//! let report = score_reconstructions(&gold, &test, &config);
//! assert!((report.final_score - 1.0).abs() < 1e-9);
//! ```

use std::path::Path;

use thiserror::Error;
use tracing::{debug, info};

use crate::core::reconstruction::Reconstruction;
use crate::core::reduce::ReductionSettings;
use crate::matching::config::{ConfigError, ThresholdConfig};
use crate::matching::diagnosis::ScoreReport;
use crate::matching::engine::MatchEngine;
use crate::parsing::swc::ParseError;
use crate::utils::validation::validate_input_file;

#[derive(Error, Debug)]
pub enum ScoreError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Score the test reconstruction at `test` against the gold standard at
/// `gold`.
///
/// # Errors
///
/// Returns `ScoreError::Config` for invalid thresholds, a missing input, a
/// directory input, or a file paired with a directory, and
/// `ScoreError::Parse` if either file cannot be read or parsed.
pub fn score_files(gold: &Path, test: &Path, config: &ThresholdConfig) -> Result<ScoreReport, ScoreError> {
    config.validate()?;
    if gold.is_dir() != test.is_dir() {
        return Err(ConfigError::MismatchedInputs {
            gold: gold.to_path_buf(),
            test: test.to_path_buf(),
        }
        .into());
    }
    validate_input_file(gold).map_err(ConfigError::from)?;
    validate_input_file(test).map_err(ConfigError::from)?;

    let settings = ReductionSettings::from(config);
    let gold = Reconstruction::from_file(gold, &settings)?;
    debug!("Gold {}: {} reduced nodes", gold.source, gold.tree.len());
    let test = Reconstruction::from_file(test, &settings)?;
    debug!("Test {}: {} reduced nodes", test.source, test.tree.len());

    Ok(score_reconstructions(&gold, &test, config))
}

/// Score two reconstructions already reduced with `config`'s settings.
#[must_use]
pub fn score_reconstructions(gold: &Reconstruction, test: &Reconstruction, config: &ThresholdConfig) -> ScoreReport {
    let outcome = MatchEngine::new(gold, test, config).run();
    let report = ScoreReport::new(&gold.source, &test.source, config, outcome);
    info!("{} vs {}: score {:.4}", report.test, report.gold, report.final_score);
    report
}
