//! Engine configuration

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const CONFIG_FILE_NAME: &str = "collections.json";

/// Configuration threaded into the collection engine at construction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
	/// Theme used by collections that do not set their own
	pub default_theme: String,

	/// Distance between neighbouring sibling sort keys
	#[serde(default = "default_sibling_gap")]
	pub sibling_gap: i64,

	/// Transaction retry behaviour
	#[serde(default)]
	pub retry: RetryConfig,
}

/// Retry configuration for transient storage failures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
	/// Total attempts per transaction, including the first one
	pub max_attempts: u32,

	/// Base delay between attempts, multiplied by the attempt number
	pub backoff_ms: u64,
}

impl Default for RetryConfig {
	fn default() -> Self {
		Self {
			max_attempts: 5,
			backoff_ms: 25,
		}
	}
}

fn default_sibling_gap() -> i64 {
	1024
}

impl Default for EngineConfig {
	fn default() -> Self {
		Self {
			default_theme: "default".to_string(),
			sibling_gap: default_sibling_gap(),
			retry: RetryConfig::default(),
		}
	}
}

impl EngineConfig {
	/// Load configuration from a data directory, writing defaults if absent
	pub fn load_from(data_dir: &Path) -> Result<Self> {
		let config_path = data_dir.join(CONFIG_FILE_NAME);

		if config_path.exists() {
			info!("Loading config from {:?}", config_path);
			let json = fs::read_to_string(&config_path)?;
			let config: EngineConfig = serde_json::from_str(&json)?;
			config.validate()?;
			Ok(config)
		} else {
			warn!("No config found, creating default at {:?}", config_path);
			let config = Self::default();
			config.save(data_dir)?;
			Ok(config)
		}
	}

	/// Save configuration into a data directory
	pub fn save(&self, data_dir: &Path) -> Result<PathBuf> {
		fs::create_dir_all(data_dir)?;

		let config_path = data_dir.join(CONFIG_FILE_NAME);
		let json = serde_json::to_string_pretty(self)?;
		fs::write(&config_path, json)?;
		info!("Saved config to {:?}", config_path);
		Ok(config_path)
	}

	pub fn validate(&self) -> Result<()> {
		if self.default_theme.trim().is_empty() {
			return Err(anyhow!("default_theme cannot be empty"));
		}
		if self.sibling_gap <= 0 {
			return Err(anyhow!("sibling_gap must be positive, got {}", self.sibling_gap));
		}
		if self.retry.max_attempts == 0 {
			return Err(anyhow!("retry.max_attempts must be at least 1"));
		}
		Ok(())
	}

	pub fn with_default_theme(mut self, theme: impl Into<String>) -> Self {
		self.default_theme = theme.into();
		self
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;

	#[test]
	fn test_load_creates_default_file() {
		let temp = TempDir::new().unwrap();

		let config = EngineConfig::load_from(temp.path()).unwrap();
		assert_eq!(config, EngineConfig::default());
		assert!(temp.path().join(CONFIG_FILE_NAME).exists());
	}

	#[test]
	fn test_round_trip_through_disk() {
		let temp = TempDir::new().unwrap();
		let config = EngineConfig::default().with_default_theme("opus");
		config.save(temp.path()).unwrap();

		let loaded = EngineConfig::load_from(temp.path()).unwrap();
		assert_eq!(loaded.default_theme, "opus");
	}

	#[test]
	fn test_missing_optional_sections_use_defaults() {
		let temp = TempDir::new().unwrap();
		fs::write(
			temp.path().join(CONFIG_FILE_NAME),
			r#"{ "default_theme": "plain" }"#,
		)
		.unwrap();

		let loaded = EngineConfig::load_from(temp.path()).unwrap();
		assert_eq!(loaded.sibling_gap, 1024);
		assert_eq!(loaded.retry, RetryConfig::default());
	}

	#[test]
	fn test_validate_rejects_empty_theme() {
		let config = EngineConfig::default().with_default_theme("  ");
		assert!(config.validate().is_err());
	}

	#[test]
	fn test_validate_rejects_zero_attempts() {
		let mut config = EngineConfig::default();
		config.retry.max_attempts = 0;
		assert!(config.validate().is_err());
	}
}
