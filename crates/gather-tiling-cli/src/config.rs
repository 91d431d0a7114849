//! CLI configuration file.
//!
//! A single TOML file with optional `[planner]`, `[limits]` and `[logging]`
//! tables. Missing tables fall back to defaults; `GATHER_TILING_*`
//! environment variables are applied to the planner section after loading.

use anyhow::{Context, Result};
use gather_tiling::{PlannerConfig, ResourceLimits};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset.
    pub level: String,
    /// pretty, compact or json
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "warn".to_string(), format: "compact".to_string() }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub planner: PlannerConfig,
    pub limits: ResourceLimits,
    pub logging: LoggingConfig,
}

impl CliConfig {
    /// Defaults with environment overrides.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.finish()?;
        Ok(config)
    }

    /// Load a TOML file, then apply environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_toml(&contents)
            .with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(contents)?;
        config.finish()?;
        Ok(config)
    }

    fn finish(&mut self) -> Result<()> {
        self.planner.apply_env_overrides()?;
        self.planner.validate()?;
        if !matches!(self.logging.format.as_str(), "pretty" | "compact" | "json") {
            anyhow::bail!(
                "logging.format must be one of pretty, compact, json; got '{}'",
                self.logging.format
            );
        }
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("failed to serialize configuration")
    }
}
