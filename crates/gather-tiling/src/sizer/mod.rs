//! Per-mode sizers.
//!
//! Each sizer turns a selected mode into a [`WorkSplit`] and a scratch layout.
//! Sizers also own the capacity requirement of their mode; the selector calls
//! the same `check_capacity` functions so a selected mode always sizes.

pub mod axis_cache;
pub mod empty;
pub mod resident;
pub mod simd;
pub mod simt;

use serde::{Deserialize, Serialize};

use crate::context::PlanContext;
use crate::error::{ShapeError, TilingResult};
use crate::mode::{CascadeStep, ModeSelection, TilingMode};
use crate::split::WorkSplit;

pub use axis_cache::AxisCacheLayout;
pub use empty::EmptyAxisLayout;
pub use resident::{Residency, ResidentLayout};
pub use simd::SimdLayout;
pub use simt::SimtLayout;

/// Mode-specific scratch layout. Exactly one variant is live per plan.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ScratchLayout {
    EmptyAxis(EmptyAxisLayout),
    FullAxisLoad(ResidentLayout),
    LastAxisGatherCache(AxisCacheLayout),
    GatherAxisFullLoad(ResidentLayout),
    TwoDimSimd(SimdLayout),
    TwoDimSimt(SimtLayout),
    SimdGeneric(SimdLayout),
    SimtGeneric(SimtLayout),
}

impl ScratchLayout {
    /// Total scratch bytes the layout occupies on one unit.
    #[must_use]
    pub const fn scratch_bytes(&self) -> i64 {
        match self {
            Self::EmptyAxis(l) => l.scratch_bytes(),
            Self::FullAxisLoad(l) | Self::GatherAxisFullLoad(l) => l.scratch_bytes(),
            Self::LastAxisGatherCache(l) => l.scratch_bytes(),
            Self::TwoDimSimd(l) | Self::SimdGeneric(l) => l.scratch_bytes(),
            Self::TwoDimSimt(l) | Self::SimtGeneric(l) => l.scratch_bytes(),
        }
    }

    /// Named fields in the order the kernel reads them.
    #[must_use]
    pub fn fields(&self) -> Vec<(&'static str, i64)> {
        match self {
            Self::EmptyAxis(l) => l.fields(),
            Self::FullAxisLoad(l) | Self::GatherAxisFullLoad(l) => l.fields(),
            Self::LastAxisGatherCache(l) => l.fields(),
            Self::TwoDimSimd(l) | Self::SimdGeneric(l) => l.fields(),
            Self::TwoDimSimt(l) | Self::SimtGeneric(l) => l.fields(),
        }
    }

    /// Mode this layout belongs to.
    #[must_use]
    pub const fn mode(&self) -> TilingMode {
        match self {
            Self::EmptyAxis(_) => TilingMode::EmptyAxis,
            Self::FullAxisLoad(_) => TilingMode::FullAxisLoad,
            Self::LastAxisGatherCache(_) => TilingMode::LastAxisGatherCache,
            Self::GatherAxisFullLoad(_) => TilingMode::GatherAxisFullLoad,
            Self::TwoDimSimd(_) => TilingMode::TwoDimSimd,
            Self::TwoDimSimt(_) => TilingMode::TwoDimSimt,
            Self::SimdGeneric(_) => TilingMode::SimdGeneric,
            Self::SimtGeneric(_) => TilingMode::SimtGeneric,
        }
    }
}

/// Output of a sizer: how work is split and how scratch is laid out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeSizing {
    pub split: WorkSplit,
    pub layout: ScratchLayout,
}

/// Run the sizer of the selected mode.
pub fn size(ctx: &PlanContext<'_>, selection: &ModeSelection) -> TilingResult<ModeSizing> {
    let sizing = match selection.mode {
        TilingMode::EmptyAxis => empty::size(ctx)?,
        TilingMode::FullAxisLoad => resident::size(ctx, Residency::WholeInput)?,
        TilingMode::GatherAxisFullLoad => {
            let residency = match selection.step {
                CascadeStep::AfterAxisFullLoad => Residency::GatheredTable,
                _ => Residency::AxisSlab,
            };
            resident::size(ctx, residency)?
        }
        TilingMode::LastAxisGatherCache => axis_cache::size(ctx)?,
        TilingMode::TwoDimSimd => simd::size_two_dim(ctx)?,
        TilingMode::SimdGeneric => simd::size_generic(ctx)?,
        TilingMode::TwoDimSimt | TilingMode::SimtGeneric => simt::size(ctx, selection.mode)?,
    };
    debug_assert!(sizing.layout.scratch_bytes() <= ctx.usable_scratch());
    Ok(sizing)
}

/// Reject shapes outside a two-dimensional mode's family.
pub(crate) fn require_single_slice(ctx: &PlanContext<'_>, mode: TilingMode) -> Result<(), ShapeError> {
    let facts = ctx.facts();
    if facts.batch_size() != 1 || facts.outer_size() != 1 {
        return Err(ShapeError::UnsupportedByMode {
            mode,
            reason: "requires batch and outer sizes of 1",
        });
    }
    Ok(())
}
