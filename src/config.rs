//! Detection and batch-run configuration.
//!
//! Both structs deserialize from JSON; absent fields take the defaults
//! below.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DetectionError, Result};

/// What the extreme selector does when a feature has zero spread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegeneratePolicy {
    /// Report a z-score of 0.0 for that feature; it never qualifies.
    #[default]
    NonExtreme,
    /// Fail with [`DetectionError::DegenerateDistribution`].
    Reject,
}

/// Tunable parameters of the detection pipeline.
///
/// The 50 / 20 minimum-sample gates are fixed (see [`crate::detect`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Multiplier applied to the IQR when building acceptance bounds.
    pub iqr_multiplier: f64,
    /// Expected anomalous fraction of the filtered table.
    pub contamination: f64,
    /// Number of isolation trees.
    pub n_estimators: usize,
    /// Upper bound on the per-tree sample size.
    pub max_samples: usize,
    /// Seed for tree construction; identical seeds give identical labels.
    pub seed: u64,
    /// Strict lower bound a z-score must exceed to count as extreme.
    pub zscore_threshold: f64,
    pub degenerate_policy: DegeneratePolicy,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            iqr_multiplier: 3.0,
            contamination: 0.01,
            n_estimators: 200,
            max_samples: 256,
            seed: 42,
            zscore_threshold: 3.0,
            degenerate_policy: DegeneratePolicy::NonExtreme,
        }
    }
}

impl DetectionConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_degenerate_policy(mut self, policy: DegeneratePolicy) -> Self {
        self.degenerate_policy = policy;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.iqr_multiplier.is_finite() && self.iqr_multiplier > 0.0) {
            return Err(DetectionError::invalid("iqr_multiplier", "must be positive"));
        }
        if !(self.contamination > 0.0 && self.contamination <= 0.5) {
            return Err(DetectionError::invalid("contamination", "must be in (0, 0.5]"));
        }
        if self.n_estimators == 0 {
            return Err(DetectionError::invalid("n_estimators", "must be at least 1"));
        }
        if self.max_samples < 2 {
            return Err(DetectionError::invalid("max_samples", "must be at least 2"));
        }
        if !(self.zscore_threshold.is_finite() && self.zscore_threshold > 0.0) {
            return Err(DetectionError::invalid("zscore_threshold", "must be positive"));
        }
        Ok(())
    }
}

/// Settings for a batch run over a directory of yearly files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Directory holding `ACE_SW_Proton_Data_<year>` files.
    pub input_dir: PathBuf,
    /// Root for `Monthly_graphs/` and the master log.
    pub output_dir: PathBuf,
    /// Render per-month PNG charts.
    pub graphs: bool,
    /// Add the canonical header to header-less CSV inputs before loading.
    pub repair_headers: bool,
    pub log_file: String,
    pub file_prefix: String,
    pub detection: DetectionConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("CSV"),
            output_dir: PathBuf::from("."),
            graphs: true,
            repair_headers: false,
            log_file: "MASTER_ANOMALIES_LOG.txt".to_string(),
            file_prefix: "ACE_SW_Proton_Data_".to_string(),
            detection: DetectionConfig::default(),
        }
    }
}

impl RunConfig {
    /// Load a JSON config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: RunConfig = serde_json::from_str(&text)?;
        config.detection.validate()?;
        Ok(config)
    }

    pub fn graphs_dir(&self) -> PathBuf {
        self.output_dir.join("Monthly_graphs")
    }

    pub fn log_path(&self) -> PathBuf {
        self.output_dir.join(&self.log_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_published_parameters() {
        let c = DetectionConfig::default();
        assert_eq!(c.iqr_multiplier, 3.0);
        assert_eq!(c.contamination, 0.01);
        assert_eq!(c.n_estimators, 200);
        assert_eq!(c.max_samples, 256);
        assert_eq!(c.seed, 42);
        assert_eq!(c.zscore_threshold, 3.0);
        assert_eq!(c.degenerate_policy, DegeneratePolicy::NonExtreme);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn validate_rejects_bad_values() {
        let bad = [
            DetectionConfig {
                contamination: 0.0,
                ..Default::default()
            },
            DetectionConfig {
                contamination: 0.7,
                ..Default::default()
            },
            DetectionConfig {
                n_estimators: 0,
                ..Default::default()
            },
            DetectionConfig {
                max_samples: 1,
                ..Default::default()
            },
            DetectionConfig {
                iqr_multiplier: -1.0,
                ..Default::default()
            },
            DetectionConfig {
                zscore_threshold: f64::NAN,
                ..Default::default()
            },
        ];
        for config in bad {
            assert!(matches!(
                config.validate(),
                Err(DetectionError::InvalidParameter { .. })
            ));
        }
    }

    #[test]
    fn partial_json_fills_defaults() {
        let json = r#"{
            "input_dir": "data",
            "graphs": false,
            "detection": { "seed": 7, "degenerate_policy": "reject" }
        }"#;
        let config: RunConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.input_dir, PathBuf::from("data"));
        assert!(!config.graphs);
        assert_eq!(config.log_file, "MASTER_ANOMALIES_LOG.txt");
        assert_eq!(config.detection.seed, 7);
        assert_eq!(config.detection.n_estimators, 200);
        assert_eq!(config.detection.degenerate_policy, DegeneratePolicy::Reject);
    }

    #[test]
    fn from_file_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");
        std::fs::write(&path, r#"{ "detection": { "contamination": 2.0 } }"#).unwrap();
        assert!(RunConfig::from_file(&path).is_err());

        std::fs::write(&path, r#"{ "output_dir": "out" }"#).unwrap();
        let config = RunConfig::from_file(&path).unwrap();
        assert_eq!(config.log_path(), PathBuf::from("out/MASTER_ANOMALIES_LOG.txt"));
        assert_eq!(config.graphs_dir(), PathBuf::from("out/Monthly_graphs"));
    }
}
