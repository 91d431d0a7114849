//! Hardware resource limits of the execution kernel's target.
//!
//! The planner never queries hardware itself; whoever owns the device builds
//! one [`ResourceLimits`] per session and passes it into every call.

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::split::{align_down, align_up};

/// Execution units, scratch size and alignment granularity of a device.
///
/// Only constructible through validation: `execution_units >= 1`,
/// `alignment_bytes` a power of two, byte counts non-negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawResourceLimits", into = "RawResourceLimits")]
pub struct ResourceLimits {
    execution_units: i64,
    scratch_bytes: i64,
    alignment_bytes: i64,
    reserved_bytes: i64,
}

/// Unvalidated serde mirror of [`ResourceLimits`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct RawResourceLimits {
    execution_units: i64,
    scratch_bytes: i64,
    #[serde(default = "default_alignment")]
    alignment_bytes: i64,
    #[serde(default)]
    reserved_bytes: i64,
}

const fn default_alignment() -> i64 {
    32
}

impl TryFrom<RawResourceLimits> for ResourceLimits {
    type Error = ConfigError;

    fn try_from(raw: RawResourceLimits) -> Result<Self, Self::Error> {
        Self::new(raw.execution_units, raw.scratch_bytes, raw.alignment_bytes, raw.reserved_bytes)
    }
}

impl From<ResourceLimits> for RawResourceLimits {
    fn from(limits: ResourceLimits) -> Self {
        Self {
            execution_units: limits.execution_units,
            scratch_bytes: limits.scratch_bytes,
            alignment_bytes: limits.alignment_bytes,
            reserved_bytes: limits.reserved_bytes,
        }
    }
}

impl Default for ResourceLimits {
    /// Reference device: 48 units with 192 KiB of scratch each, 32-byte
    /// alignment, 8 KiB reserved for control structures.
    fn default() -> Self {
        Self { execution_units: 48, scratch_bytes: 196_608, alignment_bytes: 32, reserved_bytes: 8192 }
    }
}

impl ResourceLimits {
    /// Validate and build a limits record.
    pub fn new(
        execution_units: i64,
        scratch_bytes: i64,
        alignment_bytes: i64,
        reserved_bytes: i64,
    ) -> Result<Self, ConfigError> {
        if execution_units < 1 {
            return Err(ConfigError::Validation(format!(
                "execution_units must be >= 1, got {execution_units}"
            )));
        }
        if scratch_bytes < 0 {
            return Err(ConfigError::Validation(format!(
                "scratch_bytes must be >= 0, got {scratch_bytes}"
            )));
        }
        if alignment_bytes < 1 || !(alignment_bytes as u64).is_power_of_two() {
            return Err(ConfigError::Validation(format!(
                "alignment_bytes must be a power of two, got {alignment_bytes}"
            )));
        }
        if reserved_bytes < 0 {
            return Err(ConfigError::Validation(format!(
                "reserved_bytes must be >= 0, got {reserved_bytes}"
            )));
        }
        Ok(Self { execution_units, scratch_bytes, alignment_bytes, reserved_bytes })
    }

    /// Same device with a different scratch size.
    pub fn with_scratch_bytes(self, scratch_bytes: i64) -> Result<Self, ConfigError> {
        Self::new(self.execution_units, scratch_bytes, self.alignment_bytes, self.reserved_bytes)
    }

    /// Same device with a different unit count.
    pub fn with_execution_units(self, execution_units: i64) -> Result<Self, ConfigError> {
        Self::new(execution_units, self.scratch_bytes, self.alignment_bytes, self.reserved_bytes)
    }

    #[must_use]
    pub const fn execution_units(&self) -> i64 {
        self.execution_units
    }

    #[must_use]
    pub const fn scratch_bytes(&self) -> i64 {
        self.scratch_bytes
    }

    #[must_use]
    pub const fn alignment_bytes(&self) -> i64 {
        self.alignment_bytes
    }

    #[must_use]
    pub const fn reserved_bytes(&self) -> i64 {
        self.reserved_bytes
    }

    /// Scratch left after the reserved region, rounded down to alignment.
    #[must_use]
    pub const fn usable_scratch(&self) -> i64 {
        let free = self.scratch_bytes - self.reserved_bytes;
        if free <= 0 { 0 } else { align_down(free, self.alignment_bytes) }
    }

    /// Elements of `width` bytes resident at once with `buffering` copies.
    #[must_use]
    pub const fn resident_elements(&self, width: i64, buffering: i64) -> i64 {
        if width <= 0 || buffering <= 0 {
            return 0;
        }
        self.usable_scratch() / width / buffering
    }

    /// Round a byte count up to the alignment granularity.
    #[must_use]
    pub const fn align_up(&self, bytes: i64) -> i64 {
        align_up(bytes, self.alignment_bytes)
    }

    /// Round a byte count down to the alignment granularity.
    #[must_use]
    pub const fn align_down(&self, bytes: i64) -> i64 {
        align_down(bytes, self.alignment_bytes)
    }

    /// Elements of `width` bytes per alignment block (at least one).
    #[must_use]
    pub const fn block_elements(&self, width: i64) -> i64 {
        let n = self.alignment_bytes / width;
        if n < 1 { 1 } else { n }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        let d = ResourceLimits::default();
        assert_eq!(ResourceLimits::new(48, 196_608, 32, 8192).unwrap(), d);
    }

    #[test]
    fn usable_scratch_subtracts_reserved_and_aligns() {
        let limits = ResourceLimits::new(8, 1000, 32, 100).unwrap();
        assert_eq!(limits.usable_scratch(), 896);
    }

    #[test]
    fn usable_scratch_never_negative() {
        let limits = ResourceLimits::new(8, 100, 32, 4096).unwrap();
        assert_eq!(limits.usable_scratch(), 0);
    }

    #[test]
    fn resident_elements_accounts_for_double_buffering() {
        let limits = ResourceLimits::new(8, 4096, 32, 0).unwrap();
        assert_eq!(limits.resident_elements(4, 1), 1024);
        assert_eq!(limits.resident_elements(4, 2), 512);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(ResourceLimits::new(0, 1024, 32, 0).is_err());
        assert!(ResourceLimits::new(8, -1, 32, 0).is_err());
        assert!(ResourceLimits::new(8, 1024, 24, 0).is_err());
        assert!(ResourceLimits::new(8, 1024, 0, 0).is_err());
        assert!(ResourceLimits::new(8, 1024, 32, -5).is_err());
    }

    #[test]
    fn deserialize_validates() {
        let ok: ResourceLimits =
            toml::from_str("execution_units = 4\nscratch_bytes = 65536\n").unwrap();
        assert_eq!(ok.alignment_bytes(), 32);
        assert_eq!(ok.reserved_bytes(), 0);

        let bad = toml::from_str::<ResourceLimits>(
            "execution_units = 4\nscratch_bytes = 65536\nalignment_bytes = 48\n",
        );
        assert!(bad.is_err());
    }

    #[test]
    fn block_elements_never_zero() {
        let limits = ResourceLimits::new(1, 1024, 4, 0).unwrap();
        assert_eq!(limits.block_elements(8), 1);
        assert_eq!(limits.block_elements(2), 2);
    }
}
