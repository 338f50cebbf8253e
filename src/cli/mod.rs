//! Command-line interface for diadem-metric.
//!
//! This module implements the CLI using clap. Available commands:
//!
//! - **score**: Score a test reconstruction against a gold standard
//! - **datasets**: List the DIADEM challenge dataset presets
//!
//! ## Usage
//!
//! ```text
//! # Score with default thresholds
//! diadem-metric score --gold gold.swc --test test.swc
//!
//! # Use the olfactory projection fiber preset and list the misses
//! diadem-metric score -G gold.swc -T test.swc --dataset 5 --misses
//!
//! # JSON output for scripting
//! diadem-metric score -G gold.swc -T test.swc --format json
//!
//! # Show the preset thresholds
//! diadem-metric datasets
//! ```

use clap::{Parser, Subcommand};

pub mod datasets;
pub mod score;

#[derive(Parser)]
#[command(name = "diadem-metric")]
#[command(author = "Krasnow Computational Neuroanatomy")]
#[command(version)]
#[command(about = "Score neuron reconstructions against a gold standard")]
#[command(
    long_about = "diadem-metric compares an automated neuron reconstruction with a manually traced gold standard of the same neuron.\n\nBoth reconstructions are read from SWC files and reduced to their branch points and terminations. The score is the weighted fraction of gold nodes found in the test reconstruction, penalised by test branches with no gold counterpart."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(short, long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Score a test reconstruction against a gold standard
    Score(score::ScoreArgs),

    /// List the DIADEM challenge dataset presets
    Datasets(datasets::DatasetsArgs),
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    Tsv,
}
