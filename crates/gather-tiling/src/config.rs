//! Planner tuning configuration.
//!
//! Loads [`PlannerConfig`] from TOML with environment variable overrides via
//! `GATHER_TILING_*` prefixed variables.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::mode::TilingMode;

/// Minimum trailing-run bytes before vectorized access pays off, per access
/// width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SimdThresholds {
    pub bytes_1: i64,
    pub bytes_2: i64,
    pub bytes_4: i64,
    pub bytes_8: i64,
}

impl Default for SimdThresholds {
    fn default() -> Self {
        Self { bytes_1: 512, bytes_2: 512, bytes_4: 1024, bytes_8: 1024 }
    }
}

impl SimdThresholds {
    /// Threshold for an access width of `width` bytes.
    #[must_use]
    pub const fn for_width(&self, width: i32) -> i64 {
        match width {
            1 => self.bytes_1,
            2 => self.bytes_2,
            4 => self.bytes_4,
            _ => self.bytes_8,
        }
    }
}

/// Thresholds and buffer minimums used by mode selection and sizing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Width-indexed SIMD thresholds.
    pub simd_thresholds: SimdThresholds,

    /// Exclusive upper bound on the trailing run (bytes) for the
    /// axis-resident full load.
    pub simd_upper_bound_bytes: i64,

    /// Starting lane count for SIMT kernels.
    /// Override: `GATHER_TILING_MAX_LANES`
    pub max_lanes: i64,

    /// Lane count floor for SIMT kernels.
    /// Override: `GATHER_TILING_MIN_LANES`
    pub min_lanes: i64,

    /// Smallest useful index buffer, before alignment.
    pub min_index_buffer_bytes: i64,

    /// Smallest useful output buffer, before alignment.
    pub min_output_buffer_bytes: i64,

    /// Output size below which materializing the gathered table is not worth it.
    pub full_load_min_output_bytes: i64,

    /// Fixed workspace allowance reported with every plan.
    /// Override: `GATHER_TILING_WORKSPACE_BYTES`
    pub workspace_bytes: i64,

    /// Skip the selection cascade and size this mode directly.
    /// Override: `GATHER_TILING_FORCE_MODE` (`auto` clears it)
    pub force_mode: Option<TilingMode>,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            simd_thresholds: SimdThresholds::default(),
            simd_upper_bound_bytes: 2048,
            max_lanes: 2048,
            min_lanes: 128,
            min_index_buffer_bytes: 512,
            min_output_buffer_bytes: 512,
            full_load_min_output_bytes: 1024,
            workspace_bytes: 16 * 1024 * 1024,
            force_mode: None,
        }
    }
}

/// Errors that can occur when loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("invalid environment override {key}={value}: {reason}")]
    EnvOverride { key: String, value: String, reason: String },
}

impl PlannerConfig {
    /// Default configuration as a TOML string.
    pub fn default_toml() -> Result<String, ConfigError> {
        toml::to_string_pretty(&Self::default())
            .map_err(|e| ConfigError::Validation(format!("cannot serialize defaults: {e}")))
    }

    /// Load from a TOML file, apply environment overrides, validate.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Load from a TOML string, apply environment overrides, validate.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let mut cfg: PlannerConfig = toml::from_str(toml_str)?;
        cfg.apply_env_overrides()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Defaults plus environment overrides.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut cfg = Self::default();
        cfg.apply_env_overrides()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Check internal consistency of the thresholds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, lanes) in [("max_lanes", self.max_lanes), ("min_lanes", self.min_lanes)] {
            if lanes < 1 || !(lanes as u64).is_power_of_two() {
                return Err(ConfigError::Validation(format!(
                    "{name} must be a power of two, got {lanes}"
                )));
            }
        }
        if self.min_lanes > self.max_lanes {
            return Err(ConfigError::Validation(format!(
                "min_lanes ({}) must not exceed max_lanes ({})",
                self.min_lanes, self.max_lanes
            )));
        }
        let positive = [
            ("simd_thresholds.bytes_1", self.simd_thresholds.bytes_1),
            ("simd_thresholds.bytes_2", self.simd_thresholds.bytes_2),
            ("simd_thresholds.bytes_4", self.simd_thresholds.bytes_4),
            ("simd_thresholds.bytes_8", self.simd_thresholds.bytes_8),
            ("simd_upper_bound_bytes", self.simd_upper_bound_bytes),
            ("min_index_buffer_bytes", self.min_index_buffer_bytes),
            ("min_output_buffer_bytes", self.min_output_buffer_bytes),
            ("full_load_min_output_bytes", self.full_load_min_output_bytes),
        ];
        for (name, value) in positive {
            if value <= 0 {
                return Err(ConfigError::Validation(format!("{name} must be > 0, got {value}")));
            }
        }
        if self.workspace_bytes < 0 {
            return Err(ConfigError::Validation(format!(
                "workspace_bytes must be >= 0, got {}",
                self.workspace_bytes
            )));
        }
        Ok(())
    }

    /// Apply `GATHER_TILING_*` environment variable overrides.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(val) = std::env::var("GATHER_TILING_FORCE_MODE") {
            self.force_mode = if val.eq_ignore_ascii_case("auto") {
                None
            } else {
                Some(val.parse::<TilingMode>().map_err(|reason| ConfigError::EnvOverride {
                    key: "GATHER_TILING_FORCE_MODE".into(),
                    value: val.clone(),
                    reason,
                })?)
            };
        }

        if let Ok(val) = std::env::var("GATHER_TILING_MAX_LANES") {
            self.max_lanes = parse_env_i64("GATHER_TILING_MAX_LANES", &val)?;
        }

        if let Ok(val) = std::env::var("GATHER_TILING_MIN_LANES") {
            self.min_lanes = parse_env_i64("GATHER_TILING_MIN_LANES", &val)?;
        }

        if let Ok(val) = std::env::var("GATHER_TILING_WORKSPACE_BYTES") {
            self.workspace_bytes = parse_env_i64("GATHER_TILING_WORKSPACE_BYTES", &val)?;
        }

        Ok(())
    }
}

fn parse_env_i64(key: &str, val: &str) -> Result<i64, ConfigError> {
    val.parse::<i64>().map_err(|e| ConfigError::EnvOverride {
        key: key.into(),
        value: val.into(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for key in [
            "GATHER_TILING_FORCE_MODE",
            "GATHER_TILING_MAX_LANES",
            "GATHER_TILING_MIN_LANES",
            "GATHER_TILING_WORKSPACE_BYTES",
        ] {
            // SAFETY: env-mutating tests are serialized with #[serial].
            unsafe { std::env::remove_var(key) };
        }
    }

    #[test]
    fn default_config_is_valid() {
        assert!(PlannerConfig::default().validate().is_ok());
    }

    #[test]
    #[serial]
    fn default_toml_round_trips() {
        clear_env();
        let toml_str = PlannerConfig::default_toml().unwrap();
        let cfg = PlannerConfig::from_toml(&toml_str).unwrap();
        assert_eq!(cfg, PlannerConfig::default());
    }

    #[test]
    #[serial]
    fn partial_toml_keeps_defaults() {
        clear_env();
        let cfg = PlannerConfig::from_toml("max_lanes = 1024\nforce_mode = \"simt_generic\"\n")
            .unwrap();
        assert_eq!(cfg.max_lanes, 1024);
        assert_eq!(cfg.min_lanes, 128);
        assert_eq!(cfg.force_mode, Some(TilingMode::SimtGeneric));
    }

    #[test]
    fn thresholds_by_width() {
        let t = SimdThresholds::default();
        assert_eq!(t.for_width(1), 512);
        assert_eq!(t.for_width(4), 1024);
        assert_eq!(t.for_width(8), 1024);
    }

    #[test]
    fn validation_rejects_non_power_of_two_lanes() {
        let cfg = PlannerConfig { max_lanes: 1000, ..PlannerConfig::default() };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("power of two"), "{err}");
    }

    #[test]
    fn validation_rejects_inverted_lanes() {
        let cfg = PlannerConfig { min_lanes: 4096, ..PlannerConfig::default() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validation_rejects_zero_buffers() {
        let cfg = PlannerConfig { min_output_buffer_bytes: 0, ..PlannerConfig::default() };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("min_output_buffer_bytes"), "{err}");
    }

    #[test]
    #[serial]
    fn env_overrides_apply() {
        clear_env();
        unsafe {
            std::env::set_var("GATHER_TILING_FORCE_MODE", "two_dim_simt");
            std::env::set_var("GATHER_TILING_MAX_LANES", "512");
        }
        let cfg = PlannerConfig::from_env().unwrap();
        clear_env();
        assert_eq!(cfg.force_mode, Some(TilingMode::TwoDimSimt));
        assert_eq!(cfg.max_lanes, 512);
    }

    #[test]
    #[serial]
    fn env_auto_clears_forced_mode() {
        clear_env();
        unsafe { std::env::set_var("GATHER_TILING_FORCE_MODE", "auto") };
        let cfg = PlannerConfig::from_toml("force_mode = \"empty_axis\"\n").unwrap();
        clear_env();
        assert_eq!(cfg.force_mode, None);
    }

    #[test]
    #[serial]
    fn bad_env_value_is_reported() {
        clear_env();
        unsafe { std::env::set_var("GATHER_TILING_MIN_LANES", "many") };
        let err = PlannerConfig::from_env().unwrap_err();
        clear_env();
        assert!(matches!(err, ConfigError::EnvOverride { .. }));
    }
}
