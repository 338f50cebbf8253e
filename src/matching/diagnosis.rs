//! Score report and per-node classification.
//!
//! Every gold node that takes part in scoring ends up in exactly one of
//! three groups: direct matches, continuations (including distant matches),
//! or misses. Test nodes with no counterpart are reported as excess.
//!
//! | List              | Tree | Weight reported                        |
//! |-------------------|------|----------------------------------------|
//! | `misses`          | gold | node weight                            |
//! | `continuations`   | gold | node weight                            |
//! | `distant_matches` | gold | node weight                            |
//! | `excess_nodes`    | test | excess weight carried by the node      |

use serde::Serialize;

use crate::core::binary_tree::NodeRecord;
use crate::core::geometry::Point3D;
use crate::matching::config::{Dataset, ThresholdConfig};
use crate::matching::engine::MatchOutcome;

/// A reported node: its SWC id, where it is, and what it weighs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifiedNode {
    pub id: i64,
    /// Position as scored, with Z already scaled
    pub position: Point3D,
    /// Position in input units, as printed in reports
    pub location: String,
    pub weight: u32,
}

impl ClassifiedNode {
    #[must_use]
    pub fn new(record: &NodeRecord, weight: u32, scale_z: f64) -> Self {
        Self {
            id: record.id,
            position: record.position,
            location: format_position(&record.position, scale_z),
            weight,
        }
    }
}

/// Format a scored position in input units.
///
/// Z is divided back by `scale_z` and omitted when Z is ignored
/// (`scale_z == 0`). Coordinates keep at most three fractional digits.
#[must_use]
pub fn format_position(point: &Point3D, scale_z: f64) -> String {
    if scale_z == 0.0 {
        format!("{},{}", format_coordinate(point.x), format_coordinate(point.y))
    } else {
        format!(
            "{},{},{}",
            format_coordinate(point.x),
            format_coordinate(point.y),
            format_coordinate(point.z / scale_z)
        )
    }
}

fn format_coordinate(value: f64) -> String {
    let mut text = format!("{value:.3}");
    if text.contains('.') {
        let trimmed = text.trim_end_matches('0').trim_end_matches('.').len();
        text.truncate(trimmed);
    }
    if text == "-0" {
        text = "0".to_string();
    }
    text
}

/// Full result of scoring one test reconstruction against a gold standard.
#[derive(Debug, Clone, Serialize)]
pub struct ScoreReport {
    pub gold: String,
    pub test: String,
    pub dataset: Option<Dataset>,
    pub final_score: f64,
    /// Fraction of scorable gold nodes matched directly
    pub direct_match_score: f64,
    /// Weighted score before the excess penalty
    pub quality_score: f64,
    pub scorable_nodes: usize,
    pub direct_matches: usize,
    pub score_sum: f64,
    pub weight_sum: f64,
    pub excess_weight: f64,
    pub misses: Vec<ClassifiedNode>,
    pub continuations: Vec<ClassifiedNode>,
    pub distant_matches: Vec<ClassifiedNode>,
    pub excess_nodes: Vec<ClassifiedNode>,
}

impl ScoreReport {
    #[must_use]
    pub fn new(gold: &str, test: &str, config: &ThresholdConfig, outcome: MatchOutcome) -> Self {
        Self {
            gold: gold.to_string(),
            test: test.to_string(),
            dataset: config.dataset,
            final_score: outcome.final_score,
            direct_match_score: outcome.direct_match_score,
            quality_score: outcome.quality_score,
            scorable_nodes: outcome.scorable_nodes,
            direct_matches: outcome.direct_matches,
            score_sum: outcome.score_sum,
            weight_sum: outcome.weight_sum,
            excess_weight: outcome.excess_weight,
            misses: outcome.misses,
            continuations: outcome.continuations,
            distant_matches: outcome.distant_matches,
            excess_nodes: outcome.excess_nodes,
        }
    }

    /// Whether the test reconstruction reproduces every scorable gold node
    /// with nothing extra.
    #[must_use]
    pub fn is_perfect(&self) -> bool {
        self.misses.is_empty() && self.excess_nodes.is_empty() && (self.final_score - 1.0).abs() < 1e-9
    }

    /// Summed weight of the missed gold nodes.
    #[must_use]
    pub fn missed_weight(&self) -> u32 {
        self.misses.iter().map(|n| n.weight).sum()
    }
}
