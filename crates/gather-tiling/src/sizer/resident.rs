//! Full-load modes: a region of the input is held in scratch and output rows
//! are assembled from it while indices stream.
//!
//! Three residencies share one sizing scheme:
//! - `WholeInput`: the entire source tensor (`FullAxisLoad`).
//! - `AxisSlab`: the gather axis with each row padded to alignment plus one
//!   pad slot, written through four output buffers.
//! - `GatheredTable`: the gather axis materialized once; output rows are
//!   copied straight out of it, so no output staging is needed (the
//!   after-axis variant of `GatherAxisFullLoad`).

use serde::{Deserialize, Serialize};

use super::{ModeSizing, ScratchLayout};
use crate::context::PlanContext;
use crate::error::{CapacityError, TilingResult};
use crate::mode::TilingMode;
use crate::split::even_split;

/// What part of the input is resident in scratch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Residency {
    WholeInput,
    AxisSlab,
    GatheredTable,
}

impl Residency {
    #[must_use]
    pub const fn mode(self) -> TilingMode {
        match self {
            Self::WholeInput => TilingMode::FullAxisLoad,
            Self::AxisSlab | Self::GatheredTable => TilingMode::GatherAxisFullLoad,
        }
    }

    /// Output buffers rotated while writing.
    #[must_use]
    pub const fn output_buffer_count(self) -> i64 {
        match self {
            Self::AxisSlab => 4,
            Self::WholeInput => 2,
            Self::GatheredTable => 0,
        }
    }

    const fn buffer_name(self) -> &'static str {
        match self {
            Self::WholeInput => "resident input",
            Self::AxisSlab => "resident axis slab",
            Self::GatheredTable => "gathered table",
        }
    }

    const fn code(self) -> i64 {
        match self {
            Self::WholeInput => 0,
            Self::AxisSlab => 1,
            Self::GatheredTable => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResidentLayout {
    pub residency: Residency,
    /// Bytes of the resident region.
    pub resident_bytes: i64,
    /// Distance between consecutive rows in the resident region and the
    /// output buffers.
    pub row_stride_bytes: i64,
    pub index_buffer_bytes: i64,
    pub output_buffer_bytes: i64,
    pub output_buffer_count: i64,
    /// Rows produced per inner loop iteration.
    pub rows_per_loop: i64,
}

impl ResidentLayout {
    #[must_use]
    pub const fn scratch_bytes(&self) -> i64 {
        self.resident_bytes + self.index_buffer_bytes + self.output_buffer_bytes * self.output_buffer_count
    }

    #[must_use]
    pub fn fields(&self) -> Vec<(&'static str, i64)> {
        vec![
            ("residency", self.residency.code()),
            ("resident_bytes", self.resident_bytes),
            ("row_stride_bytes", self.row_stride_bytes),
            ("index_buffer_bytes", self.index_buffer_bytes),
            ("output_buffer_bytes", self.output_buffer_bytes),
            ("output_buffer_count", self.output_buffer_count),
            ("rows_per_loop", self.rows_per_loop),
        ]
    }
}

/// Aligned bytes of the gathered table (`gather_dim * row`).
#[must_use]
pub fn table_bytes(ctx: &PlanContext<'_>) -> i64 {
    ctx.limits().align_up(ctx.facts().gather_dim_size().saturating_mul(ctx.row_bytes()))
}

fn row_stride(ctx: &PlanContext<'_>, residency: Residency) -> i64 {
    match residency {
        Residency::AxisSlab => ctx.limits().align_up(ctx.row_bytes()),
        Residency::WholeInput | Residency::GatheredTable => ctx.row_bytes(),
    }
}

fn resident_bytes(ctx: &PlanContext<'_>, residency: Residency) -> i64 {
    let facts = ctx.facts();
    match residency {
        Residency::WholeInput => ctx.limits().align_up(
            facts
                .batch_size()
                .saturating_mul(facts.outer_size())
                .saturating_mul(facts.gather_dim_size())
                .saturating_mul(ctx.row_bytes()),
        ),
        Residency::AxisSlab => {
            (facts.gather_dim_size() + 1).saturating_mul(row_stride(ctx, residency))
        }
        Residency::GatheredTable => table_bytes(ctx),
    }
}

/// Smallest output buffer: one padded row, never below the configured floor.
fn min_output_buffer(ctx: &PlanContext<'_>, residency: Residency) -> i64 {
    ctx.min_output_buffer().max(ctx.limits().align_up(row_stride(ctx, residency)))
}

/// Resident region plus a minimal index buffer and the minimal output buffers.
pub(crate) fn check_capacity(ctx: &PlanContext<'_>, residency: Residency) -> Result<(), CapacityError> {
    let required = resident_bytes(ctx, residency)
        .saturating_add(ctx.min_index_buffer())
        .saturating_add(residency.output_buffer_count().saturating_mul(min_output_buffer(ctx, residency)));
    ctx.require(residency.mode(), residency.buffer_name(), required)
}

pub(crate) fn size(ctx: &PlanContext<'_>, residency: Residency) -> TilingResult<ModeSizing> {
    check_capacity(ctx, residency)?;

    let limits = ctx.limits();
    let split = even_split(ctx.rows(), ctx.units());
    let stride = row_stride(ctx, residency);
    let count = residency.output_buffer_count();
    let resident = resident_bytes(ctx, residency);
    let remaining = ctx.usable_scratch() - resident;

    // One alignment pad per buffer is set aside so rounding never overflows.
    let per_row = ctx.index_width() + count * stride;
    let rows_per_loop = ((remaining - (count + 1) * ctx.alignment()) / per_row)
        .max(1)
        .min(split.per_unit.max(1));
    let output_buffer_bytes = if count == 0 { 0 } else { limits.align_up(rows_per_loop * stride) };

    let layout = ResidentLayout {
        residency,
        resident_bytes: resident,
        row_stride_bytes: stride,
        index_buffer_bytes: limits.align_up(rows_per_loop * ctx.index_width()),
        output_buffer_bytes,
        output_buffer_count: count,
        rows_per_loop,
    };
    tracing::trace!(?residency, resident, rows_per_loop, "sized full load");
    let layout = match residency.mode() {
        TilingMode::FullAxisLoad => ScratchLayout::FullAxisLoad(layout),
        _ => ScratchLayout::GatherAxisFullLoad(layout),
    };
    Ok(ModeSizing { split, layout })
}
