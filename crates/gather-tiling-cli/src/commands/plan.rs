//! `plan` command: compute a tiling plan for one gather shape.

use anyhow::{Context, Result, bail};
use clap::Args;
use gather_tiling::{
    DataType, GatherRequest, IndexType, ModeSelector, PlanContext, ResourceLimits, TilingMode,
    TilingPlanner, normalize,
};
use tracing::info;

use crate::config::CliConfig;
use crate::output::{OutputFormat, PlanReport, emit_json, render_plan};

/// Plan a gather invocation
#[derive(Args, Debug)]
pub struct PlanCommand {
    /// Shape of the source tensor, comma separated (e.g. 2,3,4)
    #[arg(long, value_name = "DIMS", allow_hyphen_values = true)]
    pub x_shape: Dims,

    /// Shape of the index tensor, comma separated; empty for a scalar index
    #[arg(long, value_name = "DIMS", allow_hyphen_values = true)]
    pub indices_shape: Dims,

    /// Gather axis; negative counts from the end
    #[arg(long, allow_hyphen_values = true)]
    pub axis: i64,

    /// Leading dimensions shared by x and indices
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    pub batch_dims: i64,

    /// Element type of the source tensor
    #[arg(long, default_value = "f32")]
    pub dtype: DataType,

    /// Element type of the index tensor
    #[arg(long, default_value = "i32")]
    pub index_dtype: IndexType,

    /// Indices may be negative
    #[arg(long)]
    pub negative_index: bool,

    /// Parallel execution units (overrides the config file)
    #[arg(long, value_name = "N")]
    pub units: Option<i64>,

    /// Per-unit scratch capacity in bytes (overrides the config file)
    #[arg(long, value_name = "N")]
    pub scratch_bytes: Option<i64>,

    /// Scratch alignment in bytes (overrides the config file)
    #[arg(long, value_name = "N")]
    pub alignment: Option<i64>,

    /// Scratch bytes reserved by the runtime (overrides the config file)
    #[arg(long, value_name = "N")]
    pub reserved_bytes: Option<i64>,

    /// Skip the cascade and use this mode ("auto" keeps the cascade)
    #[arg(long, value_name = "MODE")]
    pub force_mode: Option<String>,

    /// Output format (text, json)
    #[arg(long, default_value = "text")]
    pub format: OutputFormat,
}

impl PlanCommand {
    pub fn execute(&self, config: &CliConfig) -> Result<()> {
        let request = GatherRequest::new(
            self.x_shape.0.clone(),
            self.indices_shape.0.clone(),
            self.dtype,
            self.axis,
        )
        .with_batch_dims(self.batch_dims)
        .with_index_dtype(self.index_dtype)
        .with_negative_index(self.negative_index);

        let limits = self.limits(&config.limits)?;
        let mut planner_config = config.planner.clone();
        if let Some(mode) = self.forced_mode()? {
            planner_config.force_mode = mode;
        }
        let planner = TilingPlanner::new(planner_config);

        let facts = normalize(&request).context("Invalid gather shape")?;
        let plan = planner.plan_facts(&facts, &limits).context("Planning failed")?;
        info!(mode = %plan.mode, key = %plan.dispatch_key, "plan computed");

        let ctx = PlanContext::new(&facts, &limits, planner.config());
        let predicates = ModeSelector::new(&ctx).evaluate();
        let report =
            PlanReport { plan: &plan, predicates: &predicates, tiling_data: plan.tiling_data() };

        match self.format {
            OutputFormat::Json => emit_json(&report),
            OutputFormat::Text => {
                print!("{}", render_plan(&report));
                Ok(())
            }
        }
    }

    fn limits(&self, base: &ResourceLimits) -> Result<ResourceLimits> {
        let limits = ResourceLimits::new(
            self.units.unwrap_or(base.execution_units()),
            self.scratch_bytes.unwrap_or(base.scratch_bytes()),
            self.alignment.unwrap_or(base.alignment_bytes()),
            self.reserved_bytes.unwrap_or(base.reserved_bytes()),
        )
        .context("Invalid resource limits")?;
        Ok(limits)
    }

    /// `Some(None)` means "auto": clear any mode forced by the config.
    fn forced_mode(&self) -> Result<Option<Option<TilingMode>>> {
        let Some(raw) = self.force_mode.as_deref() else {
            return Ok(None);
        };
        if raw.trim().eq_ignore_ascii_case("auto") {
            return Ok(Some(None));
        }
        match raw.parse::<TilingMode>() {
            Ok(mode) => Ok(Some(Some(mode))),
            Err(reason) => bail!("invalid --force-mode: {reason}"),
        }
    }
}

/// Comma separated dimension list as given on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dims(pub Vec<i64>);

impl std::str::FromStr for Dims {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_dims(s).map(Self)
    }
}

/// Parse a comma separated dimension list. The empty string is a scalar.
pub fn parse_dims(s: &str) -> Result<Vec<i64>, String> {
    let s = s.trim().trim_start_matches('[').trim_end_matches(']');
    if s.trim().is_empty() {
        return Ok(Vec::new());
    }
    s.split(',')
        .map(|dim| {
            let dim = dim.trim();
            dim.parse::<i64>().map_err(|e| format!("invalid dimension '{dim}': {e}"))
        })
        .collect()
}
