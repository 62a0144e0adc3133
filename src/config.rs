//! Scenario configuration loading and validation.

use crate::sampler::SamplerParams;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main test configuration loaded from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestConfig {
    pub name: String,
    pub description: String,
    pub base_url: String,
    pub duration_secs: u64,
    pub concurrency: u32,
    #[serde(default)]
    pub requests_per_second: Option<f64>,
    #[serde(default)]
    pub warmup_secs: u64,
    #[serde(default)]
    pub seed: Option<u64>, // Optional RNG seed for reproducible tests
    pub layers: Vec<LayerConfig>,
    #[serde(default = "default_raster_size")]
    pub raster_size: u32,
    #[serde(default = "default_min_resolution")]
    pub min_resolution: f64, // Finest supported zoom, meters per pixel
    #[serde(default = "default_image_format")]
    pub image_format: String,
    #[serde(default)]
    pub output_dir: Option<PathBuf>, // Save returned images here if set
}

/// Layer selection for testing. Names must match advertised layers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerConfig {
    pub name: String,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_weight() -> f64 {
    1.0
}

fn default_raster_size() -> u32 {
    256
}

fn default_min_resolution() -> f64 {
    0.05
}

fn default_image_format() -> String {
    "image/jpeg".to_string()
}

impl TestConfig {
    /// Load configuration from YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: TestConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Validate configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.duration_secs == 0 {
            anyhow::bail!("duration_secs must be > 0");
        }
        if self.concurrency == 0 {
            anyhow::bail!("concurrency must be > 0");
        }
        if self.layers.is_empty() {
            anyhow::bail!("at least one layer must be specified");
        }
        if self.raster_size == 0 {
            anyhow::bail!("raster_size must be > 0");
        }
        if self.min_resolution <= 0.0 {
            anyhow::bail!("min_resolution must be > 0");
        }
        if self.layers.iter().any(|l| l.weight <= 0.0) {
            anyhow::bail!("layer weights must be > 0");
        }
        Ok(())
    }

    /// Fixed sampling parameters shared by all requests in this run.
    pub fn sampler_params(&self) -> SamplerParams {
        SamplerParams {
            raster_size: self.raster_size,
            min_resolution: self.min_resolution,
            image_format: self.image_format.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_yaml() -> &'static str {
        r#"
name: browse
description: Simulated map browsing
base_url: http://localhost:8080
duration_secs: 60
concurrency: 8
layers:
  - name: hel:Karttasarja
"#
    }

    #[test]
    fn test_defaults_applied() {
        let config: TestConfig = serde_yaml::from_str(minimal_yaml()).unwrap();
        assert_eq!(config.raster_size, 256);
        assert_eq!(config.min_resolution, 0.05);
        assert_eq!(config.image_format, "image/jpeg");
        assert_eq!(config.layers[0].weight, 1.0);
        assert_eq!(config.warmup_secs, 0);
        assert!(config.seed.is_none());
        assert!(config.output_dir.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_duration() {
        let mut config: TestConfig = serde_yaml::from_str(minimal_yaml()).unwrap();
        config.duration_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_layers() {
        let mut config: TestConfig = serde_yaml::from_str(minimal_yaml()).unwrap();
        config.layers.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_resolution() {
        let mut config: TestConfig = serde_yaml::from_str(minimal_yaml()).unwrap();
        config.min_resolution = 0.0;
        assert!(config.validate().is_err());
    }
}
