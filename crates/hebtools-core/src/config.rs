use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

pub const DEFAULT_SIGMA: f64 = 4.0;
pub const DEFAULT_DATASET_FILE: &str = "wave_height.parquet";
pub const ROOT_ENV_VAR: &str = "HEBTOOLS_ROOT";

const DEFAULT_BUOYS: [&str; 3] = ["Roag_Wavegen", "Bragar_HebMarine2", "Siadar_HebMarine1"];

/// Width of the aggregation windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BucketSize {
    #[default]
    HalfHour,
    Hour,
    Seconds(u32),
}

impl BucketSize {
    pub fn seconds(&self) -> i64 {
        match self {
            BucketSize::HalfHour => 1800,
            BucketSize::Hour => 3600,
            BucketSize::Seconds(secs) => i64::from(*secs),
        }
    }

    pub fn label(&self) -> String {
        match self {
            BucketSize::HalfHour => "half_hour".to_string(),
            BucketSize::Hour => "hour".to_string(),
            BucketSize::Seconds(secs) => format!("{secs}s"),
        }
    }
}

/// Where the last aggregation window ends.
///
/// `CoverAll` stops at the first boundary at or after the final sample, so
/// every sample is counted exactly once. `LegacyRounded` stops at the final
/// sample rounded to the nearest boundary, inclusive, so a trailing window is
/// dropped whenever that sample rounds down. It keeps the rounded-last-boundary
/// rule only; window membership and the top-third rule are the same as
/// `CoverAll`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryPolicy {
    #[default]
    CoverAll,
    LegacyRounded,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    pub buoys: Vec<String>,
    pub root_path: PathBuf,
    pub dataset_file: String,
    pub bucket: BucketSize,
    pub boundary_policy: BoundaryPolicy,
    pub sigma: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            buoys: DEFAULT_BUOYS.iter().map(|b| b.to_string()).collect(),
            root_path: PathBuf::from("."),
            dataset_file: DEFAULT_DATASET_FILE.to_string(),
            bucket: BucketSize::default(),
            boundary_policy: BoundaryPolicy::default(),
            sigma: DEFAULT_SIGMA,
        }
    }
}

impl AnalysisConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: AnalysisConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Applies `HEBTOOLS_ROOT` when it is set.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(root) = std::env::var(ROOT_ENV_VAR) {
            if !root.trim().is_empty() {
                self.root_path = PathBuf::from(root);
            }
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.sigma.is_finite() || self.sigma <= 0.0 {
            return Err(PipelineError::Config(format!(
                "sigma must be a positive number, got {}",
                self.sigma
            )));
        }
        if self.bucket.seconds() <= 0 {
            return Err(PipelineError::Config(
                "bucket size must be at least one second".to_string(),
            ));
        }
        if self.dataset_file.trim().is_empty() {
            return Err(PipelineError::Config(
                "dataset_file must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn buoy_path(&self, buoy: &str) -> PathBuf {
        self.root_path.join(buoy)
    }

    /// Report path without extension, e.g. `<root>/wave_h_half_hour_set_Roag_Wavegen`.
    pub fn report_stem(&self, buoy: &str) -> PathBuf {
        self.root_path
            .join(format!("wave_h_{}_set_{}", self.bucket.label(), buoy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config = AnalysisConfig::from_toml_str("").unwrap();
        assert_eq!(config, AnalysisConfig::default());
        assert_eq!(config.bucket.seconds(), 1800);
        assert_eq!(config.sigma, 4.0);
        assert_eq!(config.buoys.len(), 3);
    }

    #[test]
    fn explicit_values_are_read() {
        let config = AnalysisConfig::from_toml_str(
            r#"
                buoys = ["Test_Buoy"]
                root_path = "/data/datawell"
                sigma = 3.5
                boundary_policy = "legacy_rounded"
                bucket = { seconds = 600 }
            "#,
        )
        .unwrap();

        assert_eq!(config.buoys, vec!["Test_Buoy".to_string()]);
        assert_eq!(config.bucket.seconds(), 600);
        assert_eq!(config.bucket.label(), "600s");
        assert_eq!(config.boundary_policy, BoundaryPolicy::LegacyRounded);
        assert_eq!(
            config.report_stem("Test_Buoy"),
            PathBuf::from("/data/datawell/wave_h_600s_set_Test_Buoy")
        );
    }

    #[test]
    fn non_positive_sigma_is_rejected() {
        let err = AnalysisConfig::from_toml_str("sigma = 0.0").unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }

    #[test]
    fn zero_second_bucket_is_rejected() {
        let err = AnalysisConfig::from_toml_str("bucket = { seconds = 0 }").unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(AnalysisConfig::from_toml_str("sigmaa = 4.0").is_err());
    }
}
