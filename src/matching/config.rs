//! Threshold configuration and dataset presets.
//!
//! A [`ThresholdConfig`] is fixed for a scoring run. The five DIADEM
//! challenge datasets each come with calibrated thresholds:
//!
//! | Id | Dataset                          | XY     | Z scale | Z (scaled) | XY path | Z path | Spurs |
//! |----|----------------------------------|--------|---------|------------|---------|--------|-------|
//! | 1  | Cerebellar Climbing Fibers       | 37.33  | 8.8     | 4          | 0.075   | 0.18   | off   |
//! | 2  | Hippocampal CA3 Interneurons     | 11     | 1.52    | 14         | 0.08    | 100    | 23    |
//! | 3  | Neocortical Layer 6 Axons        | 4.76   | 3.4     | 5          | 0.07    | 0.18   | 17    |
//! | 4  | Neuromuscular Projection Fibers  | 32     | 0       | 1          | 0.04    | 100    | off   |
//! | 5  | Olfactory Projection Fibers      | 3.94   | 3.034   | 5          | 0.08    | 0.20   | 6     |
//!
//! Z thresholds are given in image planes and multiplied by the Z scale.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::raw_tree::LinkPolicy;
use crate::core::reduce::ReductionSettings;
use crate::utils::validation::ValidationError;

/// Slack added to the Z threshold to absorb floating point error.
pub const Z_TOLERANCE: f64 = 0.1;

/// Multiple of the spatial thresholds within which a continuation's common
/// test ancestor counts as a distant match.
pub const DISTANT_MATCH_FACTOR: f64 = 3.0;

/// Radius within which a neuromuscular termination may sit inside a
/// rosette of test samples.
pub const ROSETTE_THRESHOLD: f64 = 10.0;

/// Default XY threshold
pub const DEFAULT_XY_THRESHOLD: f64 = 1.2;
/// Default Z threshold
pub const DEFAULT_Z_THRESHOLD: f64 = 1.0;
/// Default relative path length error
pub const DEFAULT_PATH_ERROR_THRESHOLD: f64 = 0.05;
/// Relative error allowed when the gold path is shorter than the spatial
/// threshold but the test path is not
pub const DEFAULT_LOCAL_PATH_ERROR_THRESHOLD: f64 = 0.4;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Unknown dataset {0}; expected an id from 1 to 5")]
    UnknownDataset(i64),

    #[error("Invalid {name}: {value} (must be a non-negative number)")]
    InvalidThreshold { name: &'static str, value: f64 },

    #[error(transparent)]
    Input(#[from] ValidationError),

    #[error(
        "Gold standard and test inputs must be of the same kind: {} and {}",
        gold.display(),
        test.display()
    )]
    MismatchedInputs { gold: PathBuf, test: PathBuf },

    #[error("Failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// DIADEM challenge datasets with calibrated thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dataset {
    ClimbingFibers,
    Ca3Interneurons,
    Layer6Axons,
    NeuromuscularProjection,
    OlfactoryProjection,
}

impl Dataset {
    pub const ALL: [Self; 5] = [
        Self::ClimbingFibers,
        Self::Ca3Interneurons,
        Self::Layer6Axons,
        Self::NeuromuscularProjection,
        Self::OlfactoryProjection,
    ];

    /// Look up a dataset by its challenge number.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::UnknownDataset` for ids outside 1..=5.
    pub fn from_id(id: i64) -> Result<Self, ConfigError> {
        match id {
            1 => Ok(Self::ClimbingFibers),
            2 => Ok(Self::Ca3Interneurons),
            3 => Ok(Self::Layer6Axons),
            4 => Ok(Self::NeuromuscularProjection),
            5 => Ok(Self::OlfactoryProjection),
            other => Err(ConfigError::UnknownDataset(other)),
        }
    }

    #[must_use]
    pub const fn id(self) -> u8 {
        match self {
            Self::ClimbingFibers => 1,
            Self::Ca3Interneurons => 2,
            Self::Layer6Axons => 3,
            Self::NeuromuscularProjection => 4,
            Self::OlfactoryProjection => 5,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::ClimbingFibers => "Cerebellar Climbing Fibers",
            Self::Ca3Interneurons => "Hippocampal CA3 Interneurons",
            Self::Layer6Axons => "Neocortical Layer 6 Axons",
            Self::NeuromuscularProjection => "Neuromuscular Projection Fibers",
            Self::OlfactoryProjection => "Olfactory Projection Fibers",
        }
    }

    /// Whether terminations may end inside a rosette of test samples.
    #[must_use]
    pub const fn has_rosettes(self) -> bool {
        matches!(self, Self::NeuromuscularProjection)
    }

    /// Apply this dataset's thresholds on top of `config`.
    pub fn apply(self, config: &mut ThresholdConfig) {
        config.dataset = Some(self);
        match self {
            Self::ClimbingFibers => {
                config.xy_threshold = 37.33;
                config.scale_z = 8.8;
                config.z_threshold = 4.0 * config.scale_z;
                config.xy_path_error_threshold = 0.075;
                config.z_path_error_threshold = 0.18;
                config.z_in_path = true;
                config.spur_threshold = 0.0;
            }
            Self::Ca3Interneurons => {
                config.xy_threshold = 11.0;
                config.scale_z = 1.52;
                config.z_threshold = 14.0 * config.scale_z;
                config.xy_path_error_threshold = 0.08;
                // Z path error is unconstrained
                config.z_path_error_threshold = 100.0;
                config.z_in_path = false;
                config.spur_threshold = 23.0;
            }
            Self::Layer6Axons => {
                config.xy_threshold = 4.76;
                config.scale_z = 3.4;
                config.z_threshold = 5.0 * config.scale_z;
                config.xy_path_error_threshold = 0.07;
                config.z_path_error_threshold = 0.18;
                config.spur_threshold = 17.0;
            }
            Self::NeuromuscularProjection => {
                config.xy_threshold = 32.0;
                config.xy_path_error_threshold = 0.04;
                config.z_path_error_threshold = 100.0;
                // Z is flattened away entirely
                config.scale_z = 0.0;
                config.spur_threshold = 0.0;
            }
            Self::OlfactoryProjection => {
                config.xy_threshold = 3.94;
                config.scale_z = 3.034;
                config.z_threshold = 5.0 * config.scale_z;
                config.xy_path_error_threshold = 0.08;
                config.z_path_error_threshold = 0.20;
                config.z_in_path = true;
                config.spur_threshold = 6.0;
            }
        }
    }
}

impl std::fmt::Display for Dataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Thresholds and switches for one scoring run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    /// Maximum planar distance between matched nodes
    pub xy_threshold: f64,
    /// Maximum Z distance between matched nodes, in scaled units
    pub z_threshold: f64,
    /// Maximum relative XY path length error
    pub xy_path_error_threshold: f64,
    /// Maximum relative Z path length error
    pub z_path_error_threshold: f64,
    /// Relaxed relative error for paths shorter than the spatial threshold
    pub local_path_error_threshold: f64,
    /// Terminal branches shorter than this are spurs; 0 disables removal
    pub spur_threshold: f64,
    /// Weight nodes by the terminations below them instead of uniformly
    pub weighted: bool,
    /// Multiplier bringing Z into XY units
    pub scale_z: f64,
    /// Whether Z contributes to path length
    pub z_in_path: bool,
    /// Preset these thresholds came from, if any
    pub dataset: Option<Dataset>,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            xy_threshold: DEFAULT_XY_THRESHOLD,
            z_threshold: DEFAULT_Z_THRESHOLD,
            xy_path_error_threshold: DEFAULT_PATH_ERROR_THRESHOLD,
            z_path_error_threshold: DEFAULT_PATH_ERROR_THRESHOLD,
            local_path_error_threshold: DEFAULT_LOCAL_PATH_ERROR_THRESHOLD,
            spur_threshold: 0.0,
            weighted: true,
            scale_z: 1.0,
            z_in_path: false,
            dataset: None,
        }
    }
}

impl ThresholdConfig {
    /// Default thresholds overridden by a dataset preset.
    #[must_use]
    pub fn for_dataset(dataset: Dataset) -> Self {
        let mut config = Self::default();
        dataset.apply(&mut config);
        config
    }

    /// Load a config from JSON. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Read` if the file cannot be read and
    /// `ConfigError::Json` if it is not a valid config.
    pub fn load_json(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&text)?)
    }

    /// This config with the fields present in a JSON file replaced.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Read` if the file cannot be read and
    /// `ConfigError::Json` if it is not a JSON object of config fields.
    pub fn overlay_json(&self, path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let overrides: serde_json::Map<String, serde_json::Value> = serde_json::from_str(&text)?;
        let mut merged = serde_json::to_value(self)?;
        if let serde_json::Value::Object(fields) = &mut merged {
            fields.extend(overrides);
        }
        Ok(serde_json::from_value(merged)?)
    }

    /// Check that every threshold is a non-negative number.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidThreshold` naming the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let values = [
            ("xy_threshold", self.xy_threshold),
            ("z_threshold", self.z_threshold),
            ("xy_path_error_threshold", self.xy_path_error_threshold),
            ("z_path_error_threshold", self.z_path_error_threshold),
            ("local_path_error_threshold", self.local_path_error_threshold),
            ("spur_threshold", self.spur_threshold),
            ("scale_z", self.scale_z),
        ];
        for (name, value) in values {
            if value.is_nan() || value < 0.0 {
                return Err(ConfigError::InvalidThreshold { name, value });
            }
        }
        Ok(())
    }

    /// Whether spur removal is enabled.
    #[must_use]
    pub fn removes_spurs(&self) -> bool {
        self.spur_threshold > 0.0
    }

    /// Whether rosette-aware termination matching applies.
    #[must_use]
    pub fn has_rosettes(&self) -> bool {
        self.dataset.is_some_and(Dataset::has_rosettes)
    }
}

impl From<&ThresholdConfig> for ReductionSettings {
    /// Scoring links samples regardless of their structure type.
    fn from(config: &ThresholdConfig) -> Self {
        Self {
            scale_z: config.scale_z,
            xy_threshold: config.xy_threshold,
            z_threshold: config.z_threshold,
            z_in_path: config.z_in_path,
            link_policy: LinkPolicy::AnyType,
        }
    }
}
