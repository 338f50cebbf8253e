//! End-to-end scoring tests
//!
//! Each test builds small gold and test reconstructions, scores them, and
//! checks the scores and node classification against values worked out by
//! hand.

use std::io::Write;

use diadem_metric::core::reduce::ReductionSettings;
use diadem_metric::matching::config::ConfigError;
use diadem_metric::matching::engine::MatchEngine;
use diadem_metric::parsing::swc::ParseError;
use diadem_metric::{
    score_files, score_reconstructions, Dataset, Reconstruction, ScoreError, ScoreReport, ThresholdConfig,
};
use tempfile::NamedTempFile;

/// Soma, one bifurcation at (10, 0), two terminations.
const FORK: &str = "\
# id type x y z radius parent
1 1 0 0 0 5 -1
2 3 10 0 0 1 1
3 3 20 5 0 1 2
4 3 20 -5 0 1 2
";

fn load(text: &str, config: &ThresholdConfig) -> Reconstruction {
    Reconstruction::from_swc_text(text, "tree.swc", &ReductionSettings::from(config)).unwrap()
}

fn score(gold: &str, test: &str, config: &ThresholdConfig) -> ScoreReport {
    score_reconstructions(&load(gold, config), &load(test, config), config)
}

fn swc_file(text: &str) -> NamedTempFile {
    let mut file = NamedTempFile::with_suffix(".swc").unwrap();
    file.write_all(text.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn fork_with_bifurcation_at(x: f64) -> String {
    format!("1 1 0 0 0 5 -1\n2 3 {x} 0 0 1 1\n3 3 20 5 0 1 2\n4 3 20 -5 0 1 2\n")
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn test_identical_trees_score_one() {
    let report = score(FORK, FORK, &ThresholdConfig::default());

    assert!((report.final_score - 1.0).abs() < 1e-9);
    assert!((report.direct_match_score - 1.0).abs() < 1e-9);
    assert!((report.quality_score - 1.0).abs() < 1e-9);
    assert!((report.weight_sum - 4.0).abs() < 1e-9);
    assert!(report.misses.is_empty());
    assert!(report.excess_nodes.is_empty());
    assert!(report.is_perfect());
}

#[test]
fn test_identical_trees_score_one_for_every_dataset() {
    let text = "\
1 1 0 0 0 5 -1
2 3 40 0 2 1 1
3 3 80 30 4 1 2
4 3 90 -20 0 1 2
5 3 130 60 1 1 3
6 3 120 20 6 1 3
";
    for dataset in Dataset::ALL {
        let config = ThresholdConfig::for_dataset(dataset);
        let report = score(text, text, &config);
        assert!(
            (report.final_score - 1.0).abs() < 1e-9,
            "{dataset} scored {}",
            report.final_score
        );
    }
}

#[test]
fn test_displaced_tree_is_all_misses_and_excess() {
    let config = ThresholdConfig::default();
    let test = "1 1 0 0 0 5 -1\n2 3 12.2 0 0 1 1\n3 3 22.2 5 0 1 2\n4 3 22.2 -5 0 1 2\n";
    let report = score(FORK, test, &config);

    assert!(report.final_score.abs() < 1e-9);
    assert_eq!(report.direct_matches, 0);
    assert_eq!(report.misses.len(), 3);
    assert!((report.excess_weight - 2.0).abs() < 1e-9);
    assert_eq!(report.excess_nodes.len(), 2);
    assert!(report.misses.iter().any(|n| n.location == "10,0,0" && n.weight == 2));
}

#[test]
fn test_shifted_bifurcation_is_not_a_direct_match() {
    let config = ThresholdConfig::default();
    let test = fork_with_bifurcation_at(10.0 + config.xy_threshold + 1.0);
    let report = score(FORK, &test, &config);

    assert_eq!(report.direct_matches, 2);
    assert!((report.direct_match_score - 2.0 / 3.0).abs() < 1e-9);

    // The bifurcation is still accounted for, the terminations are matched
    assert_eq!(report.distant_matches.len(), 1);
    assert_eq!(report.distant_matches[0].id, 2);
    assert_eq!(report.distant_matches[0].location, "10,0,0");
    assert!(report.misses.is_empty());
    assert!(report.continuations.is_empty());
}

#[test]
fn test_nearby_shifted_bifurcation_is_distant_match() {
    let report = score(FORK, &fork_with_bifurcation_at(12.2), &ThresholdConfig::default());

    assert_eq!(report.distant_matches.len(), 1);
    assert_eq!(report.distant_matches[0].id, 2);
    assert!(report.continuations.is_empty());
    assert!(report.misses.is_empty());
    assert!((report.final_score - 1.0).abs() < 1e-9);
}

#[test]
fn test_far_shifted_bifurcation_is_continuation() {
    let report = score(FORK, &fork_with_bifurcation_at(15.0), &ThresholdConfig::default());

    assert_eq!(report.continuations.len(), 1);
    assert_eq!(report.continuations[0].weight, 2);
    assert!(report.distant_matches.is_empty());
    assert!(report.misses.is_empty());
    assert!((report.final_score - 1.0).abs() < 1e-9);
    assert!((report.direct_match_score - 2.0 / 3.0).abs() < 1e-9);
}

#[test]
fn test_extra_test_branches_are_excess() {
    let test = "\
1 1 0 0 0 5 -1
2 3 10 0 0 1 1
3 3 20 5 0 1 2
4 3 20 -5 0 1 2
8 3 30 -5 0 1 4
9 3 20 -15 0 1 4
10 3 15 -25 0 1 9
11 3 25 -25 0 1 9
";
    let report = score(FORK, test, &ThresholdConfig::default());

    assert!((report.quality_score - 1.0).abs() < 1e-9);
    assert!((report.excess_weight - 4.0).abs() < 1e-9);
    assert!((report.final_score - 0.5).abs() < 1e-9);

    let mut excess: Vec<(i64, u32)> = report.excess_nodes.iter().map(|n| (n.id, n.weight)).collect();
    excess.sort_unstable();
    assert_eq!(excess, vec![(9, 2), (10, 1), (11, 1)]);
}

#[test]
fn test_unweighted_scoring() {
    let config = ThresholdConfig {
        weighted: false,
        ..Default::default()
    };
    let test = "1 1 0 0 0 5 -1\n2 3 10 0 0 1 1\n3 3 20 5 0 1 2\n4 3 40 -30 0 1 2\n";
    let report = score(FORK, test, &config);

    assert!((report.weight_sum - 3.0).abs() < 1e-9);
    assert!((report.quality_score - 2.0 / 3.0).abs() < 1e-9);
    assert_eq!(report.misses.len(), 1);
    assert_eq!(report.misses[0].weight, 1);
}

// ============================================================================
// Spurs
// ============================================================================

const SPURRED: &str = "1 1 0 0 0 5 -1\n2 3 10 0 0 1 1\n3 3 20 5 0 1 2\n4 3 11 1 0 1 2\n";

#[test]
fn test_spur_removal_excludes_short_branch() {
    let config = ThresholdConfig {
        spur_threshold: 3.0,
        ..Default::default()
    };
    let report = score(SPURRED, SPURRED, &config);

    assert_eq!(report.scorable_nodes, 1);
    assert_eq!(report.direct_matches, 1);
    assert!((report.final_score - 1.0).abs() < 1e-9);
    assert!(report.excess_nodes.is_empty());
}

#[test]
fn test_spur_removal_disabled_scores_every_node() {
    let report = score(SPURRED, SPURRED, &ThresholdConfig::default());

    assert_eq!(report.scorable_nodes, 3);
    assert_eq!(report.direct_matches, 3);
    assert!((report.final_score - 1.0).abs() < 1e-9);
}

// ============================================================================
// Properties
// ============================================================================

#[test]
fn test_match_exclusivity() {
    let config = ThresholdConfig::default();
    let gold = load(FORK, &config);
    for test in [FORK.to_string(), fork_with_bifurcation_at(12.2), fork_with_bifurcation_at(15.0)] {
        let test = load(&test, &config);
        let outcome = MatchEngine::new(&gold, &test, &config).run();
        assert!(outcome.state.is_consistent());
    }
}

#[test]
fn test_larger_threshold_never_loses_direct_matches() {
    let test = "1 1 0 0 0 5 -1\n2 3 10 0 0 1 1\n3 3 20 7 0 1 2\n4 3 20 -5 0 1 2\n";
    let mut previous = 0;
    for xy_threshold in [0.5, 1.2, 2.5, 3.0, 4.0] {
        let config = ThresholdConfig {
            xy_threshold,
            ..Default::default()
        };
        let report = score(FORK, test, &config);
        assert!(
            report.direct_matches >= previous,
            "{} direct matches at {xy_threshold}, {previous} before",
            report.direct_matches
        );
        previous = report.direct_matches;
    }
    assert!(previous >= 2);
}

#[test]
fn test_scores_are_bounded() {
    let test = "\
1 1 0 0 0 5 -1
2 3 10 0 0 1 1
3 3 20 5 0 1 2
4 3 30 -20 0 1 2
5 3 40 -30 0 1 4
6 3 35 -10 0 1 4
";
    let report = score(FORK, test, &ThresholdConfig::default());
    for value in [report.final_score, report.direct_match_score, report.quality_score] {
        assert!((0.0..=1.0).contains(&value));
    }
    assert!(report.final_score <= report.quality_score);
}

// ============================================================================
// Rosettes
// ============================================================================

#[test]
fn test_rosette_termination_matches_for_neuromuscular_dataset() {
    let gold = "1 1 0 0 0 5 -1\n2 1 100 0 0 1 1\n3 1 200 60 0 1 2\n4 1 200 -60 0 1 2\n";
    let test = "\
1 1 0 0 0 5 -1
2 1 100 0 0 1 1
3 1 200 60 0 1 2
4 1 200 -60 0 1 2
5 1 203 -58 0 1 4
6 1 203 -62 0 1 4
";
    let config = ThresholdConfig::for_dataset(Dataset::NeuromuscularProjection);
    let report = score(gold, test, &config);

    assert_eq!(report.direct_matches, 3);
    assert!(report.excess_nodes.is_empty());
    assert!((report.final_score - 1.0).abs() < 1e-9);
    assert!(report.misses.is_empty());
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_score_files_end_to_end() {
    let gold = swc_file(FORK);
    let test = swc_file(&fork_with_bifurcation_at(15.0));

    let report = score_files(gold.path(), test.path(), &ThresholdConfig::default()).unwrap();
    assert!((report.final_score - 1.0).abs() < 1e-9);
    assert!(report.gold.ends_with(".swc"));
}

#[test]
fn test_malformed_line_reports_file_and_line() {
    let gold = swc_file(FORK);
    let test = swc_file("1 1 0 0 0 5 -1\n# comment\n2 3 10 0 0 1\n");

    let err = score_files(gold.path(), test.path(), &ThresholdConfig::default()).unwrap_err();
    match &err {
        ScoreError::Parse(ParseError::Format { line, .. }) => assert_eq!(*line, 3),
        other => panic!("Expected format error, got {other:?}"),
    }
    assert!(err.to_string().contains("line 3"));
}

#[test]
fn test_missing_root_is_an_error() {
    let gold = swc_file(FORK);
    let test = swc_file("2 3 10 0 0 1 1\n3 3 20 5 0 1 2\n");

    match score_files(gold.path(), test.path(), &ThresholdConfig::default()) {
        Err(ScoreError::Parse(ParseError::NoRoot { .. })) => {}
        other => panic!("Expected missing root, got {other:?}"),
    }
}

#[test]
fn test_missing_input_is_config_error() {
    let gold = swc_file(FORK);
    let missing = gold.path().with_file_name("does-not-exist.swc");

    match score_files(gold.path(), &missing, &ThresholdConfig::default()) {
        Err(ScoreError::Config(ConfigError::Input(_))) => {}
        other => panic!("Expected missing input error, got {other:?}"),
    }
}
