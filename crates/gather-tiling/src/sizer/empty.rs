//! Empty gather axis: the kernel only fills the output.

use serde::{Deserialize, Serialize};

use super::{ModeSizing, ScratchLayout};
use crate::context::PlanContext;
use crate::error::{CapacityError, ShapeError, TilingResult};
use crate::mode::TilingMode;
use crate::split::even_split_granular;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EmptyAxisLayout {
    /// Bytes of the zero-filled staging buffer copied out repeatedly.
    pub fill_buffer_bytes: i64,
    /// Granularity of the per-unit byte ranges.
    pub block_bytes: i64,
}

impl EmptyAxisLayout {
    #[must_use]
    pub const fn scratch_bytes(&self) -> i64 {
        self.fill_buffer_bytes
    }

    #[must_use]
    pub fn fields(&self) -> Vec<(&'static str, i64)> {
        vec![("fill_buffer_bytes", self.fill_buffer_bytes), ("block_bytes", self.block_bytes)]
    }
}

/// An empty output needs no scratch; anything else needs one aligned block.
pub(crate) fn check_capacity(ctx: &PlanContext<'_>) -> Result<(), CapacityError> {
    if ctx.facts().output_bytes() == 0 {
        return Ok(());
    }
    ctx.require(TilingMode::EmptyAxis, "fill buffer", ctx.alignment())
}

pub(crate) fn size(ctx: &PlanContext<'_>) -> TilingResult<ModeSizing> {
    if ctx.facts().gather_dim_size() != 0 {
        return Err(ShapeError::UnsupportedByMode {
            mode: TilingMode::EmptyAxis,
            reason: "gather axis is not empty",
        }
        .into());
    }
    check_capacity(ctx)?;

    let total = ctx.facts().output_bytes();
    let split = even_split_granular(total, ctx.units(), ctx.alignment());
    let fill_buffer_bytes =
        if total == 0 { 0 } else { ctx.limits().align_up(split.per_unit).min(ctx.usable_scratch()) };

    tracing::trace!(total, units = split.units_used, fill_buffer_bytes, "sized empty axis");
    Ok(ModeSizing {
        split,
        layout: ScratchLayout::EmptyAxis(EmptyAxisLayout {
            fill_buffer_bytes,
            block_bytes: ctx.alignment(),
        }),
    })
}
