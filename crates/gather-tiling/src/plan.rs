//! Plan assembly and the planner facade.
//!
//! [`TilingPlanner`] runs the stages in order: normalize, pick the access
//! width, select a mode, size it, encode the dispatch key, then assemble a
//! [`TilingPlan`].

use serde::{Deserialize, Serialize};

use crate::config::PlannerConfig;
use crate::context::PlanContext;
use crate::error::TilingResult;
use crate::key::TilingKey;
use crate::limits::ResourceLimits;
use crate::mode::{CascadeStep, ModeSelection, ModeSelector, TilingMode};
use crate::shape::{GatherRequest, ShapeFacts, normalize};
use crate::sizer::{self, ModeSizing, ScratchLayout};
use crate::split::WorkSplit;

/// Normalized shape scalars as the kernel sees them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShapeScalars {
    pub batch_size: i64,
    pub outer_size: i64,
    pub gather_dim_size: i64,
    pub gather_size: i64,
    /// Trailing run in effective-width units.
    pub inner_size: i64,
    pub element_width: i64,
    pub effective_width: i64,
    pub index_width: i64,
}

impl ShapeScalars {
    fn from_context(ctx: &PlanContext<'_>) -> Self {
        let facts = ctx.facts();
        Self {
            batch_size: facts.batch_size(),
            outer_size: facts.outer_size(),
            gather_dim_size: facts.gather_dim_size(),
            gather_size: facts.gather_size(),
            inner_size: ctx.effective_inner(),
            element_width: i64::from(facts.element_width()),
            effective_width: ctx.effective_width(),
            index_width: ctx.index_width(),
        }
    }
}

/// Everything the execution kernel needs for one gather call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TilingPlan {
    pub mode: TilingMode,
    pub step: CascadeStep,
    pub shape: ShapeScalars,
    pub split: WorkSplit,
    pub layout: ScratchLayout,
    pub dispatch_key: TilingKey,
    /// Device workspace allowance; constant, independent of the plan.
    pub workspace_bytes: i64,
}

impl TilingPlan {
    #[must_use]
    pub const fn units_used(&self) -> i64 {
        self.split.units_used
    }

    #[must_use]
    pub const fn per_unit_workload(&self) -> i64 {
        self.split.per_unit
    }

    #[must_use]
    pub const fn last_unit_workload(&self) -> i64 {
        self.split.last_unit
    }

    /// Scratch bytes one unit uses. Never above the usable scratch.
    #[must_use]
    pub const fn scratch_bytes(&self) -> i64 {
        self.layout.scratch_bytes()
    }

    /// Flat, ordered view of every numeric field the kernel reads.
    #[must_use]
    pub fn tiling_data(&self) -> Vec<(&'static str, i64)> {
        let s = &self.shape;
        let mut fields = vec![
            ("batch_size", s.batch_size),
            ("outer_size", s.outer_size),
            ("gather_dim_size", s.gather_dim_size),
            ("gather_size", s.gather_size),
            ("inner_size", s.inner_size),
            ("element_width", s.element_width),
            ("effective_width", s.effective_width),
            ("index_width", s.index_width),
            ("total_work", self.split.total),
            ("units_used", self.split.units_used),
            ("per_unit_workload", self.split.per_unit),
            ("last_unit_workload", self.split.last_unit),
        ];
        fields.extend(self.layout.fields());
        fields
    }

    /// [`Self::tiling_data`] values as little-endian `i64` words.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        self.tiling_data().into_iter().flat_map(|(_, value)| value.to_le_bytes()).collect()
    }
}

/// Assemble a plan from the outputs of the earlier stages.
#[must_use]
pub fn emit(
    ctx: &PlanContext<'_>,
    selection: ModeSelection,
    sizing: ModeSizing,
    dispatch_key: TilingKey,
) -> TilingPlan {
    TilingPlan {
        mode: selection.mode,
        step: selection.step,
        shape: ShapeScalars::from_context(ctx),
        split: sizing.split,
        layout: sizing.layout,
        dispatch_key,
        workspace_bytes: ctx.config().workspace_bytes,
    }
}

/// Stateless planner; holds only its configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TilingPlanner {
    config: PlannerConfig,
}

impl TilingPlanner {
    #[must_use]
    pub const fn new(config: PlannerConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub const fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Plan a raw request.
    pub fn plan(&self, request: &GatherRequest, limits: &ResourceLimits) -> TilingResult<TilingPlan> {
        let facts = normalize(request)?;
        self.plan_facts(&facts, limits)
    }

    /// Plan from already-normalized facts.
    pub fn plan_facts(&self, facts: &ShapeFacts, limits: &ResourceLimits) -> TilingResult<TilingPlan> {
        let ctx = PlanContext::new(facts, limits, &self.config);
        let selection = ModeSelector::new(&ctx).select();
        let sizing = sizer::size(&ctx, &selection)?;
        let key = TilingKey::for_selection(&ctx, &selection);
        let plan = emit(&ctx, selection, sizing, key);

        tracing::debug!(
            mode = %plan.mode,
            step = plan.step.ordinal(),
            units_used = plan.split.units_used,
            per_unit = plan.split.per_unit,
            scratch_bytes = plan.scratch_bytes(),
            dispatch_key = %plan.dispatch_key,
            "tiling plan ready"
        );
        Ok(plan)
    }

    /// Mode selection only, without sizing.
    #[must_use]
    pub fn select_mode(&self, facts: &ShapeFacts, limits: &ResourceLimits) -> ModeSelection {
        let ctx = PlanContext::new(facts, limits, &self.config);
        ModeSelector::new(&ctx).select()
    }
}

/// Plan with the default configuration.
pub fn plan(request: &GatherRequest, limits: &ResourceLimits) -> TilingResult<TilingPlan> {
    TilingPlanner::default().plan(request, limits)
}
