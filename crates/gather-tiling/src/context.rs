//! Derived quantities shared by mode selection and sizing.

use crate::config::PlannerConfig;
use crate::dtype::improve_width;
use crate::error::CapacityError;
use crate::limits::ResourceLimits;
use crate::mode::TilingMode;
use crate::shape::ShapeFacts;

/// One planning call's view of shape, limits and thresholds.
///
/// The trailing run is re-expressed in units of the effective access width,
/// so `effective_inner() * effective_width()` is always the trailing-run
/// byte length.
#[derive(Debug, Clone, Copy)]
pub struct PlanContext<'a> {
    facts: &'a ShapeFacts,
    limits: &'a ResourceLimits,
    config: &'a PlannerConfig,
    width: i64,
    inner: i64,
    usable: i64,
}

impl<'a> PlanContext<'a> {
    #[must_use]
    pub fn new(facts: &'a ShapeFacts, limits: &'a ResourceLimits, config: &'a PlannerConfig) -> Self {
        let element_width = facts.element_width();
        let width = i64::from(improve_width(facts.inner_size(), element_width));
        let inner = facts.inner_size() * i64::from(element_width) / width;
        Self { facts, limits, config, width, inner, usable: limits.usable_scratch() }
    }

    #[must_use]
    pub const fn facts(&self) -> &'a ShapeFacts {
        self.facts
    }

    #[must_use]
    pub const fn limits(&self) -> &'a ResourceLimits {
        self.limits
    }

    #[must_use]
    pub const fn config(&self) -> &'a PlannerConfig {
        self.config
    }

    /// Access width chosen by the width advisor, in bytes.
    #[must_use]
    pub const fn effective_width(&self) -> i64 {
        self.width
    }

    /// Trailing run length in effective-width units.
    #[must_use]
    pub const fn effective_inner(&self) -> i64 {
        self.inner
    }

    /// Scratch bytes available to buffers.
    #[must_use]
    pub const fn usable_scratch(&self) -> i64 {
        self.usable
    }

    #[must_use]
    pub const fn index_width(&self) -> i64 {
        self.facts.index_width() as i64
    }

    #[must_use]
    pub const fn units(&self) -> i64 {
        self.limits.execution_units()
    }

    #[must_use]
    pub const fn alignment(&self) -> i64 {
        self.limits.alignment_bytes()
    }

    /// Bytes in one trailing run.
    #[must_use]
    pub const fn row_bytes(&self) -> i64 {
        self.inner * self.width
    }

    /// Output rows: `batch * outer * gather_size`.
    #[must_use]
    pub const fn rows(&self) -> i64 {
        self.facts.batch_size() * self.facts.outer_size() * self.facts.gather_size()
    }

    /// Output length in effective-width units.
    #[must_use]
    pub const fn output_elements(&self) -> i64 {
        self.rows() * self.inner
    }

    /// Input length in effective-width units.
    #[must_use]
    pub const fn input_elements(&self) -> i64 {
        self.facts.batch_size() * self.facts.outer_size() * self.facts.gather_dim_size() * self.inner
    }

    /// Average number of times each axis entry is gathered (integer ratio).
    #[must_use]
    pub const fn index_reuse(&self) -> i64 {
        let dim = self.facts.gather_dim_size();
        if dim == 0 { 0 } else { self.facts.gather_size() / dim }
    }

    #[must_use]
    pub const fn simd_threshold(&self) -> i64 {
        self.config.simd_thresholds.for_width(self.width as i32)
    }

    /// Minimum index buffer, aligned and large enough for one index.
    #[must_use]
    pub fn min_index_buffer(&self) -> i64 {
        self.limits.align_up(self.config.min_index_buffer_bytes.max(self.index_width()))
    }

    /// Minimum output buffer, aligned and large enough for one element.
    #[must_use]
    pub fn min_output_buffer(&self) -> i64 {
        self.limits.align_up(self.config.min_output_buffer_bytes.max(self.width))
    }

    /// Whether 32-bit offsets can overflow: the gathered slab or the output
    /// exceeds `i32::MAX` elements.
    #[must_use]
    pub fn needs_wide_address(&self) -> bool {
        let limit = i64::from(i32::MAX);
        self.facts.gather_dim_size().saturating_mul(self.inner) > limit || self.output_elements() > limit
    }

    /// Fail with a [`CapacityError`] unless `required` bytes fit.
    pub(crate) fn require(
        &self,
        mode: TilingMode,
        buffer: &'static str,
        required: i64,
    ) -> Result<(), CapacityError> {
        if required > self.usable {
            return Err(CapacityError { mode, buffer, required, available: self.usable });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inner_is_rescaled_to_effective_width() {
        let facts = ShapeFacts::new(1, 1, 16, 16, 512, 4, 4).unwrap();
        let limits = ResourceLimits::default();
        let config = PlannerConfig::default();
        let ctx = PlanContext::new(&facts, &limits, &config);
        assert_eq!(ctx.effective_width(), 8);
        assert_eq!(ctx.effective_inner(), 256);
        assert_eq!(ctx.row_bytes(), 2048);
    }

    #[test]
    fn minimum_buffers_are_aligned() {
        let facts = ShapeFacts::new(1, 1, 16, 16, 3, 1, 8).unwrap();
        let limits = ResourceLimits::new(4, 65536, 256, 0).unwrap();
        let config = PlannerConfig::default();
        let ctx = PlanContext::new(&facts, &limits, &config);
        assert_eq!(ctx.min_index_buffer(), 512);
        assert_eq!(ctx.min_output_buffer(), 512);
        let limits = ResourceLimits::new(4, 65536, 1024, 0).unwrap();
        let ctx = PlanContext::new(&facts, &limits, &config);
        assert_eq!(ctx.min_index_buffer(), 1024);
    }

    #[test]
    fn wide_address_from_output_size() {
        let facts = ShapeFacts::new(1, 1, 4, 1 << 20, 4096, 1, 4).unwrap();
        let limits = ResourceLimits::default();
        let config = PlannerConfig::default();
        let ctx = PlanContext::new(&facts, &limits, &config);
        // 4096 bytes widen to 8-byte units: 512 per row, 2^29 output units.
        assert!(!ctx.needs_wide_address());

        let facts = ShapeFacts::new(1, 1, 4, 1 << 23, 4096, 1, 4).unwrap();
        let ctx = PlanContext::new(&facts, &limits, &config);
        assert!(ctx.needs_wide_address());
    }

    #[test]
    fn require_reports_both_sides() {
        let facts = ShapeFacts::new(1, 1, 4, 4, 1, 4, 4).unwrap();
        let limits = ResourceLimits::new(4, 1024, 32, 0).unwrap();
        let config = PlannerConfig::default();
        let ctx = PlanContext::new(&facts, &limits, &config);
        let err = ctx.require(TilingMode::SimdGeneric, "index buffers", 4096).unwrap_err();
        assert_eq!(err.required, 4096);
        assert_eq!(err.available, 1024);
    }
}
