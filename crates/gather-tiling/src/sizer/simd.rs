//! Vectorized modes: rows long enough that each index moves a contiguous
//! run of at least the SIMD threshold.
//!
//! `TwoDimSimd` handles the single-slice case and may split each row into
//! column parts so that few indices still occupy every unit. `SimdGeneric`
//! splits whole output rows.

use serde::{Deserialize, Serialize};

use super::{ModeSizing, ScratchLayout, require_single_slice};
use crate::context::PlanContext;
use crate::error::{CapacityError, TilingResult};
use crate::mode::TilingMode;
use crate::split::{align_up, ceil_div, even_split};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SimdLayout {
    pub index_buffer_bytes: i64,
    pub index_buffer_count: i64,
    /// Bytes of each of the two data buffers.
    pub data_buffer_bytes: i64,
    pub data_buffer_count: i64,
    /// Indices loaded per index buffer fill.
    pub indices_per_loop: i64,
    /// Rows (or row parts) moved per data buffer fill.
    pub rows_per_loop: i64,
    /// Column parts each row is split into.
    pub column_parts: i64,
    /// Elements in every column part but the last.
    pub column_elements: i64,
    pub last_column_elements: i64,
    /// Elements moved per copy; below `column_elements` when one part does
    /// not fit a data buffer.
    pub chunk_elements: i64,
}

impl SimdLayout {
    #[must_use]
    pub const fn scratch_bytes(&self) -> i64 {
        self.index_buffer_bytes * self.index_buffer_count
            + self.data_buffer_bytes * self.data_buffer_count
    }

    #[must_use]
    pub fn fields(&self) -> Vec<(&'static str, i64)> {
        vec![
            ("index_buffer_bytes", self.index_buffer_bytes),
            ("index_buffer_count", self.index_buffer_count),
            ("data_buffer_bytes", self.data_buffer_bytes),
            ("data_buffer_count", self.data_buffer_count),
            ("indices_per_loop", self.indices_per_loop),
            ("rows_per_loop", self.rows_per_loop),
            ("column_parts", self.column_parts),
            ("column_elements", self.column_elements),
            ("last_column_elements", self.last_column_elements),
            ("chunk_elements", self.chunk_elements),
        ]
    }
}

/// One index buffer and two data buffers.
pub(crate) fn check_two_dim_capacity(ctx: &PlanContext<'_>) -> Result<(), CapacityError> {
    let required = ctx.min_index_buffer() + 2 * ctx.min_output_buffer();
    ctx.require(TilingMode::TwoDimSimd, "index and double-buffered data", required)
}

/// Two index buffers and two data buffers.
pub(crate) fn check_generic_capacity(ctx: &PlanContext<'_>) -> Result<(), CapacityError> {
    let required = 2 * ctx.min_index_buffer() + 2 * ctx.min_output_buffer();
    ctx.require(TilingMode::SimdGeneric, "double-buffered index and data", required)
}

struct Columns {
    parts: i64,
    elements: i64,
    last: i64,
}

/// Split a row into column parts when indices alone cannot occupy every
/// unit. Parts never drop below the SIMD threshold or one alignment block.
fn column_split(ctx: &PlanContext<'_>) -> Columns {
    let inner = ctx.effective_inner();
    let gather_size = ctx.facts().gather_size().max(1);
    let min_part_elements = (ctx.simd_threshold() / ctx.effective_width()).max(1);
    let max_parts = (inner / min_part_elements).max(1);
    let wanted = (ctx.units() / gather_size).clamp(1, max_parts);

    let block = ctx.limits().block_elements(ctx.effective_width());
    let elements = align_up(ceil_div(inner, wanted), block).min(inner);
    let parts = ceil_div(inner, elements);
    let last = inner - elements * (parts - 1);
    Columns { parts, elements, last }
}

/// Fill in loop counts for a given buffer budget.
fn layout_rows(
    ctx: &PlanContext<'_>,
    index_buffer_bytes: i64,
    index_buffer_count: i64,
    data_buffer_bytes: i64,
    columns: &Columns,
) -> SimdLayout {
    let width = ctx.effective_width();
    let indices_per_loop = (index_buffer_bytes / ctx.index_width()).max(1);
    let part_stride = ctx.limits().align_up(columns.elements * width);
    let (rows_per_loop, chunk_elements) = if part_stride <= data_buffer_bytes {
        ((data_buffer_bytes / part_stride).min(indices_per_loop).max(1), columns.elements)
    } else {
        (1, (data_buffer_bytes / width).max(1))
    };
    SimdLayout {
        index_buffer_bytes,
        index_buffer_count,
        data_buffer_bytes,
        data_buffer_count: 2,
        indices_per_loop,
        rows_per_loop,
        column_parts: columns.parts,
        column_elements: columns.elements,
        last_column_elements: columns.last,
        chunk_elements,
    }
}

pub(crate) fn size_two_dim(ctx: &PlanContext<'_>) -> TilingResult<ModeSizing> {
    require_single_slice(ctx, TilingMode::TwoDimSimd)?;
    check_two_dim_capacity(ctx)?;

    let columns = column_split(ctx);
    let split = even_split(ctx.facts().gather_size() * columns.parts, ctx.units());

    let index_buffer = ctx.min_index_buffer();
    let data_buffer = ctx.limits().align_down((ctx.usable_scratch() - index_buffer) / 2);
    let layout = layout_rows(ctx, index_buffer, 1, data_buffer, &columns);

    tracing::trace!(
        column_parts = columns.parts,
        column_elements = columns.elements,
        rows_per_loop = layout.rows_per_loop,
        "sized two-dimensional simd"
    );
    Ok(ModeSizing { split, layout: ScratchLayout::TwoDimSimd(layout) })
}

pub(crate) fn size_generic(ctx: &PlanContext<'_>) -> TilingResult<ModeSizing> {
    check_generic_capacity(ctx)?;

    let limits = ctx.limits();
    let usable = ctx.usable_scratch();
    let index_width = ctx.index_width();
    let split = even_split(ctx.rows(), ctx.units());

    // Indices for one unit's rows, bounded to a quarter of scratch.
    let wanted = split.per_unit.max(1).min((usable / 4) / index_width).max(1);
    let mut index_buffer = limits.align_up(wanted * index_width).max(ctx.min_index_buffer());
    let mut data_buffer = limits.align_down((usable - 2 * index_buffer) / 2);
    if data_buffer < ctx.min_output_buffer() {
        index_buffer = ctx.min_index_buffer();
        data_buffer = limits.align_down((usable - 2 * index_buffer) / 2);
    }

    let inner = ctx.effective_inner();
    let columns = Columns { parts: 1, elements: inner, last: inner };
    let layout = layout_rows(ctx, index_buffer, 2, data_buffer, &columns);

    tracing::trace!(
        index_buffer,
        data_buffer,
        rows_per_loop = layout.rows_per_loop,
        "sized generic simd"
    );
    Ok(ModeSizing { split, layout: ScratchLayout::SimdGeneric(layout) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlannerConfig;
    use crate::limits::ResourceLimits;
    use crate::shape::ShapeFacts;

    fn simd_layout(sizing: &ModeSizing) -> SimdLayout {
        match sizing.layout {
            ScratchLayout::TwoDimSimd(l) | ScratchLayout::SimdGeneric(l) => l,
            ref other => panic!("unexpected layout {other:?}"),
        }
    }

    #[test]
    fn few_indices_split_rows_into_columns() {
        // 4 indices over 48 units: rows of 16 KiB split into column parts.
        let facts = ShapeFacts::new(1, 1, 100, 4, 4096, 4, 4).unwrap();
        let limits = ResourceLimits::default();
        let config = PlannerConfig::default();
        let ctx = PlanContext::new(&facts, &limits, &config);
        let sizing = size_two_dim(&ctx).unwrap();
        let layout = simd_layout(&sizing);
        assert_eq!(layout.column_parts, 12);
        assert_eq!(
            layout.column_elements * (layout.column_parts - 1) + layout.last_column_elements,
            ctx.effective_inner()
        );
        assert_eq!(sizing.split.total, 4 * 12);
        assert_eq!(sizing.split.units_used, 48);
    }

    #[test]
    fn many_indices_keep_rows_whole() {
        let facts = ShapeFacts::new(1, 1, 1000, 1000, 512, 4, 4).unwrap();
        let limits = ResourceLimits::default();
        let config = PlannerConfig::default();
        let ctx = PlanContext::new(&facts, &limits, &config);
        let sizing = size_two_dim(&ctx).unwrap();
        let layout = simd_layout(&sizing);
        assert_eq!(layout.column_parts, 1);
        assert_eq!(layout.column_elements, 256);
        assert!(layout.rows_per_loop > 1);
        assert!(layout.scratch_bytes() <= ctx.usable_scratch());
    }

    #[test]
    fn generic_chunks_rows_larger_than_buffer() {
        // 256 KiB rows do not fit one data buffer.
        let facts = ShapeFacts::new(2, 16, 8, 4, 65536, 4, 4).unwrap();
        let limits = ResourceLimits::default();
        let config = PlannerConfig::default();
        let ctx = PlanContext::new(&facts, &limits, &config);
        let sizing = size_generic(&ctx).unwrap();
        let layout = simd_layout(&sizing);
        assert_eq!(layout.rows_per_loop, 1);
        assert!(layout.chunk_elements < layout.column_elements);
        assert!(layout.chunk_elements * ctx.effective_width() <= layout.data_buffer_bytes);
        assert!(layout.scratch_bytes() <= ctx.usable_scratch());
        assert_eq!(sizing.split.total, 2 * 16 * 4);
    }

    #[test]
    fn generic_needs_two_index_buffers() {
        let facts = ShapeFacts::new(2, 16, 8, 4, 1024, 4, 4).unwrap();
        let limits = ResourceLimits::new(48, 1536, 32, 0).unwrap();
        let config = PlannerConfig::default();
        let ctx = PlanContext::new(&facts, &limits, &config);
        assert!(check_two_dim_capacity(&ctx).is_ok());
        assert!(check_generic_capacity(&ctx).is_err());
    }
}
