//! Configuration surface for a reduction run.
//!
//! Every section carries its documented defaults through `Default`, so a
//! partial YAML file (or none at all) still yields a complete configuration:
//!
//! ```yaml
//! strategy: grid
//! scoring:
//!   alpha: 0.5
//!   beta: 0.3
//!   gamma: 0.2
//! grid:
//!   grid_size: 1.5
//!   selection_method: quality
//! ```

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::ConfigWarning;
use crate::reduction::{PositionMode, ResampleMode, SelectionMethod};

/// Allowed deviation of alpha + beta + gamma from 1.0 before warning.
pub const WEIGHT_SUM_TOLERANCE: f64 = 0.01;

/// Which reducer produces the match targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Best-scoring keyframe per occupied grid cell.
    #[default]
    Grid,
    /// Uniform resampling of the keyframe path.
    Resample,
}

impl std::str::FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "grid" => Ok(Strategy::Grid),
            "resample" => Ok(Strategy::Resample),
            other => Err(format!("unknown strategy '{}' (expected grid|resample)", other)),
        }
    }
}

/// Configuration for keyframe scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Weight of the position score.
    pub alpha: f64,
    /// Weight of the direction score.
    pub beta: f64,
    /// Weight of the quality score.
    pub gamma: f64,
    /// Gaussian spread of the position score in meters.
    pub sigma: f64,
    /// Fixed reference point for position scores.
    /// None uses the first keyframe's position.
    pub reference: Option<[f64; 3]>,
    /// How many top keyframes to keep in the score statistics.
    pub top_n: usize,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            alpha: 0.4,
            beta: 0.4,
            gamma: 0.2,
            sigma: 2.0,
            reference: None,
            top_n: 10,
        }
    }
}

impl ScoringConfig {
    pub fn weight_sum(&self) -> f64 {
        self.alpha + self.beta + self.gamma
    }
}

/// Configuration for the spatial grid reducer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Edge length of a grid cell in meters.
    pub grid_size: f64,
    pub selection_method: SelectionMethod,
    pub position_mode: PositionMode,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            grid_size: 2.0,
            selection_method: SelectionMethod::Balanced,
            position_mode: PositionMode::Keyframe,
        }
    }
}

/// Configuration for path resampling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResampleConfig {
    pub num_waypoints: usize,
    pub mode: ResampleMode,
}

impl Default for ResampleConfig {
    fn default() -> Self {
        Self {
            num_waypoints: 20,
            mode: ResampleMode::Arclength,
        }
    }
}

/// Configuration for matching waypoints back to keyframes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// Maximum accepted distance in meters.
    pub distance_threshold: f64,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            distance_threshold: 0.1,
        }
    }
}

/// Configuration for graph pruning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PruneConfig {
    /// Drop landmarks no retained keyframe observes.
    pub prune_landmarks: bool,
}

impl Default for PruneConfig {
    fn default() -> Self {
        Self {
            prune_landmarks: true,
        }
    }
}

/// Complete configuration for one pipeline run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub strategy: Strategy,
    pub scoring: ScoringConfig,
    pub grid: GridConfig,
    pub resample: ResampleConfig,
    pub matching: MatchConfig,
    pub prune: PruneConfig,
}

impl PipelineConfig {
    /// Parse a YAML document; missing fields take their defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).context("Failed to parse pipeline config")
    }

    /// Load a YAML config file.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
        serde_yaml::from_reader(file).with_context(|| format!("Failed to parse {:?}", path))
    }

    /// Collect non-blocking configuration warnings.
    pub fn check(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        let sum = self.scoring.weight_sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            warnings.push(ConfigWarning::WeightSum(sum));
        }
        if self.matching.distance_threshold <= 0.0 {
            warnings.push(ConfigWarning::NonPositiveThreshold(
                self.matching.distance_threshold,
            ));
        }

        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.strategy, Strategy::Grid);
        assert_eq!(cfg.scoring.alpha, 0.4);
        assert_eq!(cfg.scoring.beta, 0.4);
        assert_eq!(cfg.scoring.gamma, 0.2);
        assert_eq!(cfg.scoring.sigma, 2.0);
        assert_eq!(cfg.grid.grid_size, 2.0);
        assert_eq!(cfg.grid.selection_method, SelectionMethod::Balanced);
        assert_eq!(cfg.matching.distance_threshold, 0.1);
        assert_eq!(cfg.resample.mode, ResampleMode::Arclength);
        assert!(cfg.prune.prune_landmarks);
        assert!(cfg.check().is_empty());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
strategy: resample
scoring:
  alpha: 0.5
grid:
  selection_method: quality
  position_mode: grid_center
resample:
  num_waypoints: 7
  mode: index
"#;
        let cfg = PipelineConfig::from_yaml_str(yaml).unwrap();

        assert_eq!(cfg.strategy, Strategy::Resample);
        assert_eq!(cfg.scoring.alpha, 0.5);
        assert_eq!(cfg.scoring.beta, 0.4);
        assert_eq!(cfg.grid.selection_method, SelectionMethod::Quality);
        assert_eq!(cfg.grid.position_mode, PositionMode::GridCenter);
        assert_eq!(cfg.grid.grid_size, 2.0);
        assert_eq!(cfg.resample.num_waypoints, 7);
        assert_eq!(cfg.resample.mode, ResampleMode::Index);
    }

    #[test]
    fn test_check_reports_warnings() {
        let mut cfg = PipelineConfig::default();
        cfg.scoring.gamma = 0.5;
        cfg.matching.distance_threshold = 0.0;

        let warnings = cfg.check();
        assert_eq!(warnings.len(), 2);
        assert!(matches!(warnings[0], ConfigWarning::WeightSum(s) if (s - 1.3).abs() < 1e-9));
        assert_eq!(warnings[1], ConfigWarning::NonPositiveThreshold(0.0));
    }

    #[test]
    fn test_small_weight_deviation_is_tolerated() {
        let mut cfg = PipelineConfig::default();
        cfg.scoring.alpha = 0.405;
        assert!(cfg.check().is_empty());
    }

    #[test]
    fn test_unknown_strategy_rejected() {
        assert!("grid".parse::<Strategy>().is_ok());
        assert!("spiral".parse::<Strategy>().is_err());
    }
}
