//! Per-lane scalar modes. Every output element is one lane's work; units take
//! whole lane sweeps.

use serde::{Deserialize, Serialize};

use super::{ModeSizing, ScratchLayout, require_single_slice};
use crate::context::PlanContext;
use crate::error::{CapacityError, TilingResult};
use crate::mode::TilingMode;
use crate::split::{even_split_granular, shrink_lanes};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SimtLayout {
    /// Lanes per sweep.
    pub lanes: i64,
    pub index_cache_bytes: i64,
    /// Indices held in the cache at once.
    pub index_cache_elements: i64,
    /// Output staging for two lane sweeps.
    pub staging_bytes: i64,
}

impl SimtLayout {
    #[must_use]
    pub const fn scratch_bytes(&self) -> i64 {
        self.index_cache_bytes + self.staging_bytes
    }

    #[must_use]
    pub fn fields(&self) -> Vec<(&'static str, i64)> {
        vec![
            ("lanes", self.lanes),
            ("index_cache_bytes", self.index_cache_bytes),
            ("index_cache_elements", self.index_cache_elements),
            ("staging_bytes", self.staging_bytes),
        ]
    }
}

/// One minimal index cache and one minimal staging buffer.
pub(crate) fn check_capacity(ctx: &PlanContext<'_>, mode: TilingMode) -> Result<(), CapacityError> {
    let required = ctx.min_index_buffer() + ctx.min_output_buffer();
    ctx.require(mode, "index cache and output staging", required)
}

pub(crate) fn size(ctx: &PlanContext<'_>, mode: TilingMode) -> TilingResult<ModeSizing> {
    if mode.is_two_dim() {
        require_single_slice(ctx, mode)?;
    }
    check_capacity(ctx, mode)?;

    let limits = ctx.limits();
    let config = ctx.config();
    let usable = ctx.usable_scratch();
    let index_width = ctx.index_width();

    let total = ctx.output_elements();
    let lanes = shrink_lanes(total, ctx.units(), config.max_lanes, config.min_lanes);
    let split = even_split_granular(total, ctx.units(), lanes);

    // Cache one slice's indices if they fit beside the minimal staging.
    let gather_size = ctx.facts().gather_size();
    let index_cache_bytes = limits
        .align_up(gather_size.max(1) * index_width)
        .clamp(ctx.min_index_buffer(), limits.align_down(usable - ctx.min_output_buffer()));
    let index_cache_elements = (index_cache_bytes / index_width).min(gather_size.max(1));

    let sweep = limits.align_up(2 * lanes * ctx.effective_width());
    let staging_bytes = (usable - index_cache_bytes).min(sweep.max(ctx.min_output_buffer()));

    tracing::trace!(%mode, lanes, index_cache_bytes, staging_bytes, "sized simt");
    let layout = SimtLayout { lanes, index_cache_bytes, index_cache_elements, staging_bytes };
    let layout = if mode.is_two_dim() {
        ScratchLayout::TwoDimSimt(layout)
    } else {
        ScratchLayout::SimtGeneric(layout)
    };
    Ok(ModeSizing { split, layout })
}
