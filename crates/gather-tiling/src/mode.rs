//! Mode selection: an ordered cascade of predicates over shape facts.
//!
//! Each predicate folds in the capacity check of the sizer it leads to, so a
//! mode is only selected when its sizer is known to succeed. The order is
//! fixed; the first predicate that holds wins and later ones are never
//! consulted.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::context::PlanContext;
use crate::sizer::{axis_cache, resident, simd, simt};

/// Kernel strategy for one gather call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TilingMode {
    /// Gather axis has length zero; the kernel only fills the output.
    EmptyAxis,
    /// Whole input resident in scratch. Only reachable by forcing.
    FullAxisLoad,
    /// Last-axis gather of scalars with the axis cached in scratch.
    LastAxisGatherCache,
    /// Gather axis (or the gathered table) resident in scratch.
    GatherAxisFullLoad,
    /// Rank-2 style problem with long rows, vectorized.
    TwoDimSimd,
    /// Rank-2 style problem, per-lane scalar access.
    TwoDimSimt,
    /// General problem with long rows, vectorized.
    SimdGeneric,
    /// Fallback: per-lane scalar access over the whole output.
    SimtGeneric,
}

impl TilingMode {
    pub const ALL: [Self; 8] = [
        Self::EmptyAxis,
        Self::FullAxisLoad,
        Self::LastAxisGatherCache,
        Self::GatherAxisFullLoad,
        Self::TwoDimSimd,
        Self::TwoDimSimt,
        Self::SimdGeneric,
        Self::SimtGeneric,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::EmptyAxis => "empty_axis",
            Self::FullAxisLoad => "full_axis_load",
            Self::LastAxisGatherCache => "last_axis_gather_cache",
            Self::GatherAxisFullLoad => "gather_axis_full_load",
            Self::TwoDimSimd => "two_dim_simd",
            Self::TwoDimSimt => "two_dim_simt",
            Self::SimdGeneric => "simd_generic",
            Self::SimtGeneric => "simt_generic",
        }
    }

    /// Modes whose kernels compute offsets in 32-bit arithmetic unless the
    /// dispatch key carries the wide-address flag.
    #[must_use]
    pub const fn uses_i32_offsets(self) -> bool {
        matches!(
            self,
            Self::LastAxisGatherCache
                | Self::TwoDimSimd
                | Self::TwoDimSimt
                | Self::SimdGeneric
                | Self::SimtGeneric
        )
    }

    /// Modes that only accept a single batch and outer slice.
    #[must_use]
    pub const fn is_two_dim(self) -> bool {
        matches!(self, Self::TwoDimSimd | Self::TwoDimSimt)
    }
}

impl fmt::Display for TilingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TilingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL.into_iter().find(|mode| mode.name() == wanted).ok_or_else(|| {
            let names: Vec<_> = Self::ALL.iter().map(|m| m.name()).collect();
            format!("unknown tiling mode '{s}' (expected one of: {})", names.join(", "))
        })
    }
}

/// Which cascade step produced a selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CascadeStep {
    EmptyAxis,
    TwoDimSimd,
    LastAxisCache,
    /// Gather-axis slab resident, output written from it.
    AxisResidentLoad,
    TwoDimSimt,
    /// Gathered table materialized once, then replicated.
    AfterAxisFullLoad,
    SimdGeneric,
    SimtFallback,
    /// Selection came from `force_mode`, not from the cascade.
    Forced,
}

impl CascadeStep {
    /// Steps in evaluation order.
    pub const CASCADE: [Self; 8] = [
        Self::EmptyAxis,
        Self::TwoDimSimd,
        Self::LastAxisCache,
        Self::AxisResidentLoad,
        Self::TwoDimSimt,
        Self::AfterAxisFullLoad,
        Self::SimdGeneric,
        Self::SimtFallback,
    ];

    /// Mode a step selects.
    #[must_use]
    pub const fn mode(self) -> Option<TilingMode> {
        match self {
            Self::EmptyAxis => Some(TilingMode::EmptyAxis),
            Self::TwoDimSimd => Some(TilingMode::TwoDimSimd),
            Self::LastAxisCache => Some(TilingMode::LastAxisGatherCache),
            Self::AxisResidentLoad | Self::AfterAxisFullLoad => {
                Some(TilingMode::GatherAxisFullLoad)
            }
            Self::TwoDimSimt => Some(TilingMode::TwoDimSimt),
            Self::SimdGeneric => Some(TilingMode::SimdGeneric),
            Self::SimtFallback => Some(TilingMode::SimtGeneric),
            Self::Forced => None,
        }
    }

    /// 1-based position in the cascade; 0 for forced selections.
    #[must_use]
    pub const fn ordinal(self) -> u8 {
        match self {
            Self::Forced => 0,
            Self::EmptyAxis => 1,
            Self::TwoDimSimd => 2,
            Self::LastAxisCache => 3,
            Self::AxisResidentLoad => 4,
            Self::TwoDimSimt => 5,
            Self::AfterAxisFullLoad => 6,
            Self::SimdGeneric => 7,
            Self::SimtFallback => 8,
        }
    }
}

/// Outcome of mode selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModeSelection {
    pub mode: TilingMode,
    pub step: CascadeStep,
}

impl ModeSelection {
    /// Whether the gathered table is materialized before replication.
    #[must_use]
    pub const fn materializes_table(&self) -> bool {
        matches!(self.step, CascadeStep::AfterAxisFullLoad)
    }
}

/// Truth value of every cascade predicate for one problem.
///
/// Diagnostic only: selection short-circuits, this evaluates everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PredicateTable {
    pub results: [(CascadeStep, bool); 8],
}

impl PredicateTable {
    /// First step whose predicate holds.
    #[must_use]
    pub fn first_match(&self) -> CascadeStep {
        self.results
            .iter()
            .find(|(_, holds)| *holds)
            .map_or(CascadeStep::SimtFallback, |(step, _)| *step)
    }
}

/// Runs the cascade against one [`PlanContext`].
#[derive(Debug, Clone, Copy)]
pub struct ModeSelector<'c, 'a> {
    ctx: &'c PlanContext<'a>,
}

impl<'c, 'a> ModeSelector<'c, 'a> {
    #[must_use]
    pub const fn new(ctx: &'c PlanContext<'a>) -> Self {
        Self { ctx }
    }

    /// Pick the mode. An empty gather axis always wins, even over a forced
    /// mode; otherwise a configured `force_mode` bypasses the cascade.
    #[must_use]
    pub fn select(&self) -> ModeSelection {
        if self.empty_axis() {
            return ModeSelection { mode: TilingMode::EmptyAxis, step: CascadeStep::EmptyAxis };
        }
        if let Some(mode) = self.ctx.config().force_mode {
            tracing::debug!(%mode, "tiling mode forced by configuration");
            return ModeSelection { mode, step: CascadeStep::Forced };
        }
        let step = CascadeStep::CASCADE
            .into_iter()
            .find(|step| self.holds(*step))
            .unwrap_or(CascadeStep::SimtFallback);
        let mode = step.mode().unwrap_or(TilingMode::SimtGeneric);
        tracing::debug!(%mode, step = step.ordinal(), "tiling mode selected");
        ModeSelection { mode, step }
    }

    /// Evaluate every predicate without short-circuiting.
    #[must_use]
    pub fn evaluate(&self) -> PredicateTable {
        PredicateTable { results: CascadeStep::CASCADE.map(|step| (step, self.holds(step))) }
    }

    /// Whether the predicate of `step` holds. `Forced` never holds.
    #[must_use]
    pub fn holds(&self, step: CascadeStep) -> bool {
        let holds = match step {
            CascadeStep::EmptyAxis => self.empty_axis(),
            CascadeStep::TwoDimSimd => self.two_dim_simd(),
            CascadeStep::LastAxisCache => self.last_axis_cache(),
            CascadeStep::AxisResidentLoad => self.axis_resident_load(),
            CascadeStep::TwoDimSimt => self.two_dim_simt(),
            CascadeStep::AfterAxisFullLoad => self.after_axis_full_load(),
            CascadeStep::SimdGeneric => self.simd_generic(),
            CascadeStep::SimtFallback => true,
            CascadeStep::Forced => false,
        };
        tracing::trace!(step = step.ordinal(), holds, "cascade predicate");
        holds
    }

    // ------------------------------------------------------------------
    // Predicates
    // ------------------------------------------------------------------

    /// No capacity folding here: an empty axis has no alternative mode, so a
    /// fill buffer that does not fit surfaces from the sizer.
    fn empty_axis(&self) -> bool {
        self.ctx.facts().gather_dim_size() == 0
    }

    fn single_slice(&self) -> bool {
        self.ctx.facts().batch_size() == 1 && self.ctx.facts().outer_size() == 1
    }

    /// Enough independent rows to occupy at least half the units.
    fn fills_units(&self) -> bool {
        self.ctx.rows() >= self.ctx.units() / 2
    }

    fn two_dim_simd(&self) -> bool {
        self.single_slice()
            && self.ctx.row_bytes() >= self.ctx.simd_threshold()
            && self.fills_units()
            && simd::check_two_dim_capacity(self.ctx).is_ok()
    }

    fn last_axis_cache(&self) -> bool {
        let ctx = self.ctx;
        let facts = ctx.facts();
        ctx.effective_inner() == 1
            && facts.batch_size() == 1
            && axis_cache::cache_bytes(ctx) <= ctx.usable_scratch() / 2
            && ctx.index_reuse() > 1
            && facts.gather_size() * ctx.effective_width() >= ctx.alignment()
            && axis_cache::check_capacity(ctx).is_ok()
    }

    fn axis_resident_load(&self) -> bool {
        let row_bytes = self.ctx.row_bytes();
        row_bytes > self.ctx.alignment()
            && row_bytes < self.ctx.config().simd_upper_bound_bytes
            && resident::check_capacity(self.ctx, resident::Residency::AxisSlab).is_ok()
    }

    fn two_dim_simt(&self) -> bool {
        self.single_slice()
            && simt::check_capacity(self.ctx, TilingMode::TwoDimSimt).is_ok()
    }

    fn after_axis_full_load(&self) -> bool {
        let ctx = self.ctx;
        let limit = i64::from(i32::MAX);
        self.single_slice()
            && resident::table_bytes(ctx) <= ctx.usable_scratch() / 2
            && ctx.input_elements() <= limit
            && ctx.output_elements() <= limit
            && ctx.facts().output_bytes() >= ctx.config().full_load_min_output_bytes
            && ctx.index_reuse() > 1
            && resident::check_capacity(ctx, resident::Residency::GatheredTable).is_ok()
    }

    fn simd_generic(&self) -> bool {
        self.ctx.row_bytes() >= self.ctx.simd_threshold()
            && self.fills_units()
            && simd::check_generic_capacity(self.ctx).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlannerConfig;
    use crate::limits::ResourceLimits;
    use crate::shape::ShapeFacts;

    fn select(facts: &ShapeFacts, limits: &ResourceLimits, config: &PlannerConfig) -> ModeSelection {
        let ctx = PlanContext::new(facts, limits, config);
        ModeSelector::new(&ctx).select()
    }

    #[test]
    fn mode_names_round_trip() {
        for mode in TilingMode::ALL {
            assert_eq!(mode.name().parse::<TilingMode>().unwrap(), mode);
        }
        assert_eq!("Two-Dim-SIMD".parse::<TilingMode>().unwrap(), TilingMode::TwoDimSimd);
        assert!("warp_gather".parse::<TilingMode>().is_err());
    }

    #[test]
    fn serde_names_match_display() {
        for mode in TilingMode::ALL {
            let json = serde_json::to_string(&mode).unwrap();
            assert_eq!(json, format!("\"{mode}\""));
        }
    }

    #[test]
    fn empty_axis_wins_over_forced_mode() {
        let facts = ShapeFacts::new(1, 4, 0, 8, 16, 4, 4).unwrap();
        let config =
            PlannerConfig { force_mode: Some(TilingMode::SimdGeneric), ..PlannerConfig::default() };
        let sel = select(&facts, &ResourceLimits::default(), &config);
        assert_eq!(sel.mode, TilingMode::EmptyAxis);
        assert_eq!(sel.step, CascadeStep::EmptyAxis);
    }

    #[test]
    fn forced_mode_skips_cascade() {
        let facts = ShapeFacts::new(1, 1, 64, 64, 4096, 4, 4).unwrap();
        let config =
            PlannerConfig { force_mode: Some(TilingMode::SimtGeneric), ..PlannerConfig::default() };
        let sel = select(&facts, &ResourceLimits::default(), &config);
        assert_eq!(sel, ModeSelection { mode: TilingMode::SimtGeneric, step: CascadeStep::Forced });
    }

    #[test]
    fn long_rank_two_rows_pick_two_dim_simd() {
        // 1000 x 4096 f32, gather 1000 rows.
        let facts = ShapeFacts::new(1, 1, 1000, 1000, 4096, 4, 4).unwrap();
        let sel = select(&facts, &ResourceLimits::default(), &PlannerConfig::default());
        assert_eq!(sel.mode, TilingMode::TwoDimSimd);
    }

    #[test]
    fn scalar_last_axis_with_reuse_picks_cache() {
        // outer 128, axis 64, 1024 indices, f32 scalars.
        let facts = ShapeFacts::new(1, 128, 64, 1024, 1, 4, 4).unwrap();
        let sel = select(&facts, &ResourceLimits::default(), &PlannerConfig::default());
        assert_eq!(sel.mode, TilingMode::LastAxisGatherCache);
        assert_eq!(sel.step, CascadeStep::LastAxisCache);
    }

    #[test]
    fn mid_rows_pick_axis_resident_load() {
        // 256-byte rows, 100-row axis fits easily.
        let facts = ShapeFacts::new(2, 8, 100, 50, 64, 4, 4).unwrap();
        let sel = select(&facts, &ResourceLimits::default(), &PlannerConfig::default());
        assert_eq!(sel.mode, TilingMode::GatherAxisFullLoad);
        assert_eq!(sel.step, CascadeStep::AxisResidentLoad);
    }

    #[test]
    fn tiny_scratch_falls_back_to_simt() {
        let facts = ShapeFacts::new(4, 4, 16, 16, 3, 1, 4).unwrap();
        let limits = ResourceLimits::new(8, 1024, 32, 0).unwrap();
        let sel = select(&facts, &limits, &PlannerConfig::default());
        assert_eq!(sel.mode, TilingMode::SimtGeneric);
        assert_eq!(sel.step, CascadeStep::SimtFallback);
    }

    #[test]
    fn selection_matches_first_true_predicate() {
        let shapes = [
            ShapeFacts::new(1, 1, 1000, 1000, 4096, 4, 4).unwrap(),
            ShapeFacts::new(1, 128, 64, 1024, 1, 4, 4).unwrap(),
            ShapeFacts::new(2, 8, 100, 50, 64, 4, 4).unwrap(),
            ShapeFacts::new(3, 5, 7, 9, 11, 2, 8).unwrap(),
        ];
        let limits = ResourceLimits::default();
        let config = PlannerConfig::default();
        for facts in &shapes {
            let ctx = PlanContext::new(facts, &limits, &config);
            let selector = ModeSelector::new(&ctx);
            assert_eq!(selector.select().step, selector.evaluate().first_match());
        }
    }
}
