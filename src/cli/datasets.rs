//! Datasets command - list the calibrated threshold presets.

use clap::Args;

use crate::cli::OutputFormat;
use crate::matching::config::{Dataset, ThresholdConfig};

/// Arguments for the datasets command
#[derive(Args)]
pub struct DatasetsArgs {
    /// Show only this dataset (1-5)
    #[arg(long)]
    pub id: Option<i64>,
}

/// Execute the datasets command
///
/// # Errors
///
/// Returns an error if `--id` names no dataset or JSON output fails.
#[allow(clippy::needless_pass_by_value)]
pub fn run(args: DatasetsArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    let datasets = match args.id {
        Some(id) => vec![Dataset::from_id(id)?],
        None => Dataset::ALL.to_vec(),
    };

    match format {
        OutputFormat::Text => {
            let name_width = datasets.iter().map(|d| d.name().len()).max().unwrap_or(4).max(4);

            println!(
                "{:<3} {:<name_w$} {:>8} {:>8} {:>8} {:>8} {:>8} {:>6}",
                "ID",
                "Name",
                "XY",
                "Z",
                "Scale Z",
                "XY path",
                "Z path",
                "Spurs",
                name_w = name_width
            );
            println!("{}", "-".repeat(name_width + 56));

            for dataset in &datasets {
                let config = ThresholdConfig::for_dataset(*dataset);
                println!(
                    "{:<3} {:<name_w$} {:>8} {:>8} {:>8} {:>8} {:>8} {:>6}",
                    dataset.id(),
                    dataset.name(),
                    config.xy_threshold,
                    round(config.z_threshold),
                    config.scale_z,
                    config.xy_path_error_threshold,
                    config.z_path_error_threshold,
                    spur_label(&config),
                    name_w = name_width
                );
                if verbose {
                    let path = if config.z_in_path { "XYZ" } else { "XY" };
                    let rosettes = if dataset.has_rosettes() { ", rosette terminations" } else { "" };
                    println!("    └─ path lengths: {path}{rosettes}");
                }
            }
        }
        OutputFormat::Json => {
            let output: Vec<serde_json::Value> = datasets
                .iter()
                .map(|d| {
                    serde_json::json!({
                        "id": d.id(),
                        "name": d.name(),
                        "rosettes": d.has_rosettes(),
                        "thresholds": ThresholdConfig::for_dataset(*d),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Tsv => {
            println!("id\tname\txy_threshold\tz_threshold\tscale_z\txy_path_error\tz_path_error\tspur_threshold\tz_in_path");
            for dataset in &datasets {
                let config = ThresholdConfig::for_dataset(*dataset);
                println!(
                    "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
                    dataset.id(),
                    dataset.name(),
                    config.xy_threshold,
                    round(config.z_threshold),
                    config.scale_z,
                    config.xy_path_error_threshold,
                    config.z_path_error_threshold,
                    config.spur_threshold,
                    config.z_in_path
                );
            }
        }
    }

    Ok(())
}

/// Scaled Z thresholds pick up floating point noise (14 * 1.52).
fn round(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

fn spur_label(config: &ThresholdConfig) -> String {
    if config.removes_spurs() {
        format!("{}", config.spur_threshold)
    } else {
        "off".to_string()
    }
}
