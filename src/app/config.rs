//! Configuration Management

use crate::dataset::DatasetConfig;
use crate::encoding::EncoderConfig;
use crate::inference::{ProvidersConfig, ScreenConfig};
use crate::retry::RetryConfig;
use crate::runner::RunnerConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Image encoding limits
    pub encoder: EncoderConfig,
    /// Retry state machine parameters
    pub retry: RetryConfig,
    /// Degenerate/refusal reply detection
    pub screen: ScreenConfig,
    /// Pacing and output location
    pub runner: RunnerConfig,
    /// Case list and images
    pub dataset: DatasetConfig,
    /// Temperature × trial matrix
    pub experiment: ExperimentConfig,
    /// Per-provider model and endpoint settings
    pub providers: ProvidersConfig,
}

/// Experiment matrix configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// Sampling temperatures, run in order
    pub temperatures: Vec<f64>,
    /// Trials per temperature
    pub trials: u32,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            temperatures: vec![1.0],
            trials: 1,
        }
    }
}

fn check_scale(name: &str, value: f64) -> Result<(), crate::Error> {
    if value > 0.0 && value < 1.0 {
        Ok(())
    } else {
        Err(crate::Error::Config(format!("{} must be in (0, 1), got {}", name, value)))
    }
}

impl Config {
    /// Validate config values are within acceptable ranges.
    /// Returns Ok(()) if valid, or Err with a description of the first invalid field.
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.encoder.size_ceiling_bytes == 0 {
            return Err(crate::Error::Config("size_ceiling_bytes must be > 0".to_string()));
        }
        if self.encoder.max_steps == 0 {
            return Err(crate::Error::Config("encoder max_steps must be > 0".to_string()));
        }
        check_scale("step_factor", self.encoder.step_factor)?;
        if !(1..=100).contains(&self.encoder.jpeg_quality) {
            return Err(crate::Error::Config(format!(
                "jpeg_quality must be in [1, 100], got {}", self.encoder.jpeg_quality
            )));
        }

        if self.retry.max_attempts == 0 {
            return Err(crate::Error::Config("max_attempts must be > 0".to_string()));
        }
        check_scale("transient_scale", self.retry.transient_scale)?;
        check_scale("degenerate_scale", self.retry.degenerate_scale)?;
        check_scale("rejection_scale", self.retry.rejection_scale)?;

        if !self.runner.inter_case_delay_secs.is_finite() || self.runner.inter_case_delay_secs < 0.0 {
            return Err(crate::Error::Config(format!(
                "inter_case_delay_secs must be >= 0, got {}", self.runner.inter_case_delay_secs
            )));
        }

        if self.dataset.max_images_per_case == 0 {
            return Err(crate::Error::Config("max_images_per_case must be > 0".to_string()));
        }

        if self.experiment.temperatures.is_empty() {
            return Err(crate::Error::Config("at least one temperature is required".to_string()));
        }
        if let Some(t) = self.experiment.temperatures.iter().find(|t| !(0.0..=2.0).contains(*t)) {
            return Err(crate::Error::Config(format!("temperature must be in [0, 2], got {}", t)));
        }
        if self.experiment.trials == 0 {
            return Err(crate::Error::Config("trials must be > 0".to_string()));
        }

        for settings in [&self.providers.anthropic, &self.providers.openai, &self.providers.gemini] {
            if settings.model.trim().is_empty() {
                return Err(crate::Error::Config(format!(
                    "model for '{}' must not be empty", settings.label
                )));
            }
            if settings.label.trim().is_empty() {
                return Err(crate::Error::Config("provider label must not be empty".to_string()));
            }
        }
        Ok(())
    }

    /// Load config from file
    pub fn load(path: &Path) -> Result<Self, crate::Error> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content).map_err(|e| crate::Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load config from default location
    pub fn load_default() -> Result<Self, crate::Error> {
        let path = Self::default_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save config to file
    pub fn save(&self, path: &Path) -> Result<(), crate::Error> {
        let content = self.to_toml()?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Save to default location
    pub fn save_default(&self) -> Result<(), crate::Error> {
        self.save(&Self::default_path())
    }

    /// Get default config path
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .map(|h| h.join(".vision_bench").join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("config.toml"))
    }

    /// Generate TOML representation
    pub fn to_toml(&self) -> Result<String, crate::Error> {
        toml::to_string_pretty(self).map_err(|e| crate::Error::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.retry.max_attempts, 10);
        assert_eq!(config.retry.rejection_scale, 0.7);
        assert_eq!(config.encoder.size_ceiling_bytes, 20 * 1024 * 1024);
        assert_eq!(config.runner.inter_case_delay_secs, 15.0);
        assert_eq!(config.experiment.temperatures, vec![1.0]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let toml = Config::default().to_toml().unwrap();
        assert!(toml.contains("[encoder]"));
        assert!(toml.contains("[retry]"));
        assert!(toml.contains("[dataset]"));
        assert!(toml.contains("[providers.anthropic]"));
        assert!(!toml.contains("sk-"));
    }

    #[test]
    fn test_default_path() {
        let path = Config::default_path();
        assert!(path.to_string_lossy().contains("config.toml"));
    }

    #[test]
    fn test_config_roundtrip_serialization() {
        let original = Config::default();
        let toml_str = original.to_toml().unwrap();
        let deserialized: Config = toml::from_str(&toml_str).expect("Failed to deserialize");

        assert_eq!(original.retry.max_attempts, deserialized.retry.max_attempts);
        assert_eq!(original.dataset.id_column, deserialized.dataset.id_column);
        assert_eq!(original.providers.gemini.endpoint, deserialized.providers.gemini.endpoint);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [retry]
            rejection_scale = 0.5

            [experiment]
            temperatures = [0.0, 0.5, 1.0]
            trials = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.retry.rejection_scale, 0.5);
        assert_eq!(config.retry.max_attempts, 10);
        assert_eq!(config.experiment.trials, 3);
        assert_eq!(config.providers.anthropic.label, "claude");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_save_and_load() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("nested").join("config.toml");

        let mut original = Config::default();
        original.retry.max_attempts = 4;
        original.runner.inter_case_delay_secs = 0.0;
        original.experiment.temperatures = vec![0.2, 0.7];

        original.save(&config_path).expect("Failed to save config");
        assert!(config_path.exists());

        let loaded = Config::load(&config_path).expect("Failed to load config");
        assert_eq!(loaded.retry.max_attempts, 4);
        assert_eq!(loaded.runner.inter_case_delay_secs, 0.0);
        assert_eq!(loaded.experiment.temperatures, vec![0.2, 0.7]);
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = Config::load(Path::new("/tmp/nonexistent_vision_bench_12345.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_invalid_toml() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bad.toml");
        std::fs::write(&path, "[retry\nmax_attempts = ").unwrap();
        assert!(matches!(Config::load(&path), Err(crate::Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_out_of_range_values() {
        let mut config = Config::default();
        config.retry.rejection_scale = 1.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.retry.max_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.experiment.temperatures = vec![1.0, 2.5];
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.experiment.trials = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.encoder.size_ceiling_bytes = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.providers.openai.model = "  ".to_string();
        assert!(config.validate().is_err());
    }
}
