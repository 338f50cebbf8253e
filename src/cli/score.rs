//! Score command - compare a test reconstruction with its gold standard.
//!
//! Thresholds are assembled in layers: a dataset preset (or the defaults),
//! then an optional JSON config file, then individual flags.

use std::path::PathBuf;

use clap::Args;
use tracing::debug;

use crate::cli::OutputFormat;
use crate::matching::config::{Dataset, ThresholdConfig};
use crate::matching::diagnosis::{ClassifiedNode, ScoreReport};
use crate::matching::scoring::score_files;

/// Arguments for the score command
#[derive(Args)]
pub struct ScoreArgs {
    /// Gold standard reconstruction (SWC)
    #[arg(short = 'G', long, required = true)]
    pub gold: PathBuf,

    /// Test reconstruction to score (SWC)
    #[arg(short = 'T', long, required = true)]
    pub test: PathBuf,

    /// DIADEM challenge dataset preset (1-5, see `datasets`)
    #[arg(short = 'D', long)]
    pub dataset: Option<i64>,

    /// JSON file of threshold settings, applied over the preset
    #[arg(long)]
    pub config: Option<PathBuf>,

    // === Threshold overrides ===
    /// Maximum planar distance between matched nodes
    #[arg(short = 'x', long)]
    pub xy_threshold: Option<f64>,

    /// Maximum Z distance between matched nodes, in image planes
    #[arg(short = 'z', long)]
    pub z_threshold: Option<f64>,

    /// Maximum relative XY path length error
    #[arg(long)]
    pub xy_path_threshold: Option<f64>,

    /// Maximum relative Z path length error
    #[arg(long)]
    pub z_path_threshold: Option<f64>,

    /// Treat terminal branches shorter than this as spurs (0 disables)
    #[arg(short = 'r', long)]
    pub remove_spurs: Option<f64>,

    /// Include Z in path lengths
    #[arg(long)]
    pub z_path: bool,

    /// Weight every gold node equally
    #[arg(long)]
    pub unweighted: bool,

    // === Report options ===
    /// List missed gold nodes
    #[arg(short = 'm', long)]
    pub misses: bool,

    /// List gold nodes scored as continuations
    #[arg(short = 'c', long)]
    pub continuations: bool,

    /// List gold nodes matched at a distance
    #[arg(long)]
    pub distant_matches: bool,
}

impl ScoreArgs {
    /// Thresholds for this run: preset, then config file, then flags.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown dataset, an unreadable config file,
    /// or an invalid threshold.
    pub fn threshold_config(&self) -> anyhow::Result<ThresholdConfig> {
        let mut config = match self.dataset {
            Some(id) => ThresholdConfig::for_dataset(Dataset::from_id(id)?),
            None => ThresholdConfig::default(),
        };
        if let Some(path) = &self.config {
            config = config.overlay_json(path)?;
        }

        if let Some(xy) = self.xy_threshold {
            config.xy_threshold = xy;
        }
        if let Some(z) = self.z_threshold {
            // Given in image planes, like the presets
            config.z_threshold = if config.scale_z > 0.0 { z * config.scale_z } else { z };
        }
        if let Some(xy_path) = self.xy_path_threshold {
            config.xy_path_error_threshold = xy_path;
        }
        if let Some(z_path) = self.z_path_threshold {
            config.z_path_error_threshold = z_path;
        }
        if let Some(spurs) = self.remove_spurs {
            config.spur_threshold = spurs;
        }
        if self.z_path {
            config.z_in_path = true;
        }
        if self.unweighted {
            config.weighted = false;
        }

        config.validate()?;
        Ok(config)
    }
}

/// Execute the score command
///
/// # Errors
///
/// Returns an error if the thresholds are invalid or either input cannot be
/// read or parsed.
#[allow(clippy::needless_pass_by_value)]
pub fn run(args: ScoreArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    let config = args.threshold_config()?;
    debug!("Thresholds: {:?}", config);
    if verbose {
        if let Some(dataset) = config.dataset {
            eprintln!("Dataset {}: {}", dataset.id(), dataset);
        }
        eprintln!(
            "Thresholds: XY {}, Z {}, XY path {}, Z path {}",
            config.xy_threshold, config.z_threshold, config.xy_path_error_threshold, config.z_path_error_threshold
        );
    }

    let report = score_files(&args.gold, &args.test, &config)?;

    match format {
        OutputFormat::Text => print_text_report(&report, &args),
        OutputFormat::Json => print_json_report(&report, &args)?,
        OutputFormat::Tsv => print_tsv_report(&report, &args),
    }

    Ok(())
}

fn print_text_report(report: &ScoreReport, args: &ScoreArgs) {
    println!("Score: {:.6}", report.final_score);

    if args.misses {
        print_text_nodes("Nodes that were missed (position and weight)", &report.misses);
    }
    if args.continuations {
        print_text_nodes(
            "Continuation nodes (position and weight)",
            &report.continuations,
        );
    }
    if args.distant_matches {
        print_text_nodes("Distant matches (position and weight)", &report.distant_matches);
    }
    if args.misses {
        print_text_nodes(
            "Extra nodes in test reconstruction (position and weight)",
            &report.excess_nodes,
        );
    }
}

fn print_text_nodes(title: &str, nodes: &[ClassifiedNode]) {
    println!("\n{title}:");
    if nodes.is_empty() {
        println!("   none");
    }
    for node in nodes {
        println!("   ({}) {}", node.location, node.weight);
    }
}

fn print_json_report(report: &ScoreReport, args: &ScoreArgs) -> anyhow::Result<()> {
    let mut output = serde_json::json!({
        "gold": report.gold,
        "test": report.test,
        "dataset": report.dataset.map(Dataset::id),
        "score": {
            "final": report.final_score,
            "direct_match": report.direct_match_score,
            "quality": report.quality_score,
        },
        "gold_nodes": {
            "scorable": report.scorable_nodes,
            "direct_matches": report.direct_matches,
            "continuations": report.continuations.len(),
            "distant_matches": report.distant_matches.len(),
            "misses": report.misses.len(),
        },
        "weights": {
            "matched": report.score_sum,
            "total": report.weight_sum,
            "excess": report.excess_weight,
        },
    });

    if args.misses {
        output["misses"] = serde_json::json!(&report.misses);
        output["excess_nodes"] = serde_json::json!(&report.excess_nodes);
    }
    if args.continuations {
        output["continuations"] = serde_json::json!(&report.continuations);
    }
    if args.distant_matches {
        output["distant_matches"] = serde_json::json!(&report.distant_matches);
    }

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn print_tsv_report(report: &ScoreReport, args: &ScoreArgs) {
    println!("gold\ttest\tscore\tdirect_match_score\tquality_score\tscorable\tdirect\tcontinuations\tdistant\tmisses\texcess_weight");
    println!(
        "{}\t{}\t{:.6}\t{:.6}\t{:.6}\t{}\t{}\t{}\t{}\t{}\t{}",
        report.gold,
        report.test,
        report.final_score,
        report.direct_match_score,
        report.quality_score,
        report.scorable_nodes,
        report.direct_matches,
        report.continuations.len(),
        report.distant_matches.len(),
        report.misses.len(),
        report.excess_weight,
    );

    let print_nodes = |kind: &str, nodes: &[ClassifiedNode]| {
        for node in nodes {
            println!("#{kind}\t{}\t{}\t{}", node.id, node.location, node.weight);
        }
    };
    if args.misses {
        print_nodes("miss", &report.misses);
        print_nodes("excess", &report.excess_nodes);
    }
    if args.continuations {
        print_nodes("continuation", &report.continuations);
    }
    if args.distant_matches {
        print_nodes("distant", &report.distant_matches);
    }
}
