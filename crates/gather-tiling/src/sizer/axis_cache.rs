//! Last-axis gather of scalars with the whole gather axis cached in scratch.
//!
//! The axis stays resident while indices stream through. When a slice's full
//! index vector does not fit next to the output buffers the sizer switches to
//! split mode and streams indices in chunks as well.

use serde::{Deserialize, Serialize};

use super::{ModeSizing, ScratchLayout};
use crate::context::PlanContext;
use crate::error::{CapacityError, ShapeError, TilingResult};
use crate::mode::TilingMode;
use crate::split::even_split_granular;

const MODE: TilingMode = TilingMode::LastAxisGatherCache;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AxisCacheLayout {
    /// Aligned bytes of the resident gather axis.
    pub cache_bytes: i64,
    pub index_buffer_bytes: i64,
    /// Bytes of each of the two output buffers.
    pub output_buffer_bytes: i64,
    pub output_buffer_count: i64,
    /// Indices consumed per inner loop iteration.
    pub indices_per_loop: i64,
    /// Output columns produced per scratch pass.
    pub columns_per_pass: i64,
    /// Indices are streamed in chunks rather than loaded per slice.
    pub split_mode: bool,
}

impl AxisCacheLayout {
    #[must_use]
    pub const fn scratch_bytes(&self) -> i64 {
        self.cache_bytes + self.index_buffer_bytes + self.output_buffer_bytes * self.output_buffer_count
    }

    #[must_use]
    pub fn fields(&self) -> Vec<(&'static str, i64)> {
        vec![
            ("cache_bytes", self.cache_bytes),
            ("index_buffer_bytes", self.index_buffer_bytes),
            ("output_buffer_bytes", self.output_buffer_bytes),
            ("output_buffer_count", self.output_buffer_count),
            ("indices_per_loop", self.indices_per_loop),
            ("columns_per_pass", self.columns_per_pass),
            ("split_mode", i64::from(self.split_mode)),
        ]
    }
}

/// Aligned bytes needed to hold the gather axis.
#[must_use]
pub fn cache_bytes(ctx: &PlanContext<'_>) -> i64 {
    ctx.limits().align_up(ctx.facts().gather_dim_size().saturating_mul(ctx.effective_width()))
}

/// Cache plus one minimal index buffer and two minimal output buffers.
pub(crate) fn check_capacity(ctx: &PlanContext<'_>) -> Result<(), CapacityError> {
    let required = cache_bytes(ctx)
        .saturating_add(ctx.min_index_buffer())
        .saturating_add(2 * ctx.min_output_buffer());
    ctx.require(MODE, "axis cache with index and output buffers", required)
}

pub(crate) fn size(ctx: &PlanContext<'_>) -> TilingResult<ModeSizing> {
    if ctx.effective_inner() != 1 || ctx.facts().batch_size() != 1 {
        return Err(ShapeError::UnsupportedByMode {
            mode: MODE,
            reason: "requires a scalar trailing run and no batch dimensions",
        }
        .into());
    }
    check_capacity(ctx)?;

    let limits = ctx.limits();
    let width = ctx.effective_width();
    let index_width = ctx.index_width();
    let gather_size = ctx.facts().gather_size();
    let block = ctx.alignment();

    let total = ctx.facts().outer_size() * gather_size;
    let split = even_split_granular(total, ctx.units(), limits.block_elements(width));

    let cache = cache_bytes(ctx);
    let remaining = ctx.usable_scratch() - cache;
    let resident_indices = limits.align_up(gather_size.max(1) * index_width);

    let (split_mode, index_buffer_bytes, output_buffer_bytes, indices_per_loop) =
        if resident_indices + 2 * ctx.min_output_buffer() <= remaining {
            let out = limits.align_down((remaining - resident_indices) / 2);
            // No point in buffering more than one unit's share.
            let share = limits.align_up(split.per_unit.max(1) * width);
            let out = out.min(share.max(ctx.min_output_buffer()));
            (false, resident_indices, out, gather_size.max(1))
        } else {
            let chunk = ((remaining - 3 * block) / (index_width + 2 * width)).max(1);
            (true, limits.align_up(chunk * index_width), limits.align_up(chunk * width), chunk)
        };

    let layout = AxisCacheLayout {
        cache_bytes: cache,
        index_buffer_bytes,
        output_buffer_bytes,
        output_buffer_count: 2,
        indices_per_loop,
        columns_per_pass: output_buffer_bytes / width,
        split_mode,
    };
    tracing::trace!(
        cache,
        split_mode,
        indices_per_loop,
        columns_per_pass = layout.columns_per_pass,
        "sized last-axis cache"
    );
    Ok(ModeSizing { split, layout: ScratchLayout::LastAxisGatherCache(layout) })
}
