//! Rendering of planner results.
//!
//! `--format json` emits one pretty-printed JSON document on stdout; text
//! output is meant for people and may change between releases.

use anyhow::{Context, Result};
use console::style;
use gather_tiling::{PredicateTable, TilingPlan};
use serde::Serialize;

/// Output format for CLI commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable text (default).
    #[default]
    Text,
    /// Machine-readable JSON.
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown format '{other}'. Expected one of: text, json")),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Plan plus the predicate table that produced it.
#[derive(Debug, Serialize)]
pub struct PlanReport<'a> {
    pub plan: &'a TilingPlan,
    pub predicates: &'a PredicateTable,
    pub tiling_data: Vec<(&'static str, i64)>,
}

pub fn emit_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{json}");
    Ok(())
}

pub fn render_plan(report: &PlanReport<'_>) -> String {
    let plan = report.plan;
    let mut out = String::new();
    let mut line = |s: String| {
        out.push_str(&s);
        out.push('\n');
    };

    line(format!("{} {}", style("Mode:").bold(), style(plan.mode).green().bold()));
    line(format!("  cascade step: {}", plan.step.ordinal()));
    line(format!("  dispatch key: {}", plan.dispatch_key));
    if let Some(decoded) = plan.dispatch_key.decode() {
        line(format!(
            "    width {} negative_index {} wide_address {} materialized {}",
            decoded.width,
            decoded.flags.negative_index,
            decoded.flags.wide_address,
            decoded.flags.materialized
        ));
    }

    let s = &plan.shape;
    line(String::new());
    line(format!("{}", style("Shape:").bold()));
    line(format!(
        "  batch {}  outer {}  axis {}  gather {}",
        s.batch_size, s.outer_size, s.gather_dim_size, s.gather_size
    ));
    line(format!(
        "  inner {} (element {} B, access {} B, index {} B)",
        s.inner_size, s.element_width, s.effective_width, s.index_width
    ));

    line(String::new());
    line(format!("{}", style("Work split:").bold()));
    line(format!(
        "  {} units x {} (last {}), total {}",
        plan.units_used(),
        plan.per_unit_workload(),
        plan.last_unit_workload(),
        plan.split.total
    ));

    line(String::new());
    line(format!("{} {} bytes", style("Scratch:").bold(), plan.scratch_bytes()));
    for (name, value) in plan.layout.fields() {
        line(format!("  {name:<24} {value}"));
    }
    line(format!("  workspace                {}", plan.workspace_bytes));

    line(String::new());
    line(format!("{}", style("Predicates:").bold()));
    for (step, holds) in report.predicates.results {
        let mark = if holds { style("yes").green() } else { style("no").dim() };
        let chosen = if step == plan.step { "  <- selected" } else { "" };
        line(format!("  {}. {:<20} {}{}", step.ordinal(), format!("{step:?}"), mark, chosen));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_parses_case_insensitively() {
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("text".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert!("yaml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn display_matches_parse() {
        for format in [OutputFormat::Text, OutputFormat::Json] {
            assert_eq!(format.to_string().parse::<OutputFormat>().unwrap(), format);
        }
    }
}
