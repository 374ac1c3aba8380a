//! Fit reporting
//!
//! Renders the `information` views of a fitted binning and the progress
//! lines a verbose fit prints. Level 0 is a status card, level 1 adds the
//! binning table, level 2 adds solver internals and the options document.

use chrono::Utc;
use console::{style, Emoji};
use serde::Serialize;

use crate::binning::config::BinningConfig;
use crate::binning::table::BinningTable;
use crate::solver::{FitStatus, MonotonicTrend, SolverStats};

static CHART: Emoji<'_, '_> = Emoji("📊 ", "");
static GEAR: Emoji<'_, '_> = Emoji("⚙️  ", "");
static SEARCH: Emoji<'_, '_> = Emoji("🔍 ", "");

/// Everything the information report draws from.
pub(crate) struct ReportContext<'a> {
    pub config: &'a BinningConfig,
    pub table: &'a BinningTable,
    pub stats: &'a SolverStats,
    pub trend: MonotonicTrend,
    pub fit_time_secs: f64,
}

/// Serializable snapshot of one fit.
#[derive(Debug, Clone, Serialize)]
pub struct FitSummary {
    /// Timestamp of the report (ISO 8601 format).
    pub timestamp: String,
    /// Crate version that produced the fit.
    pub version: String,
    /// Variable name.
    pub name: String,
    /// Variable kind.
    pub dtype: String,
    /// Terminal solver status.
    pub status: String,
    /// Number of final bins.
    pub n_bins: usize,
    /// Total information value, pseudo-bins included.
    pub iv: f64,
    /// Weighted records seen during the fit.
    pub n_records: f64,
    /// Wall-clock fit time in seconds.
    pub fit_time_secs: f64,
}

pub(crate) fn fit_summary(ctx: &ReportContext) -> FitSummary {
    FitSummary {
        timestamp: Utc::now().to_rfc3339(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        name: ctx.config.name.clone(),
        dtype: ctx.config.dtype.to_string(),
        status: ctx.stats.status.to_string(),
        n_bins: ctx.table.n_bins(),
        iv: ctx.table.iv,
        n_records: ctx.table.n_records,
        fit_time_secs: ctx.fit_time_secs,
    }
}

/// One indented progress line of a verbose fit.
pub(crate) fn log_stage(name: &str, message: &str) {
    let label = if name.is_empty() { "binning" } else { name };
    println!(
        "    {} {} {}",
        style("•").dim(),
        style(label).cyan(),
        message
    );
}

pub(crate) fn render_information(ctx: &ReportContext, level: i32) -> String {
    let mut out = String::new();
    let name = if ctx.config.name.is_empty() {
        "<unnamed>"
    } else {
        ctx.config.name.as_str()
    };
    let status = match ctx.stats.status {
        FitStatus::Optimal => style(ctx.stats.status.to_string()).green().bold(),
        FitStatus::Feasible | FitStatus::TimeLimit => {
            style(ctx.stats.status.to_string()).yellow().bold()
        }
        _ => style(ctx.stats.status.to_string()).red().bold(),
    };

    out.push_str(&format!(
        "    {}{}  {}\n",
        CHART,
        style("OPTIMAL BINNING").white().bold(),
        style(name).cyan()
    ));
    out.push_str(&format!("    {}\n", style("─".repeat(50)).dim()));
    out.push_str(&format!("      dtype    {}\n", ctx.config.dtype));
    out.push_str(&format!("      status   {status}\n"));
    out.push_str(&format!("      bins     {}\n", ctx.table.n_bins()));
    out.push_str(&format!("      iv       {:.5}\n", ctx.table.iv));
    out.push_str(&format!("      records  {}\n", ctx.table.n_records));
    out.push_str(&format!("      time     {:.4}s\n", ctx.fit_time_secs));

    if level >= 1 {
        out.push('\n');
        for line in ctx.table.render().to_string().lines() {
            out.push_str(&format!("    {line}\n"));
        }
    }

    if level >= 2 {
        out.push('\n');
        out.push_str(&format!(
            "    {}{}\n",
            SEARCH,
            style("SOLVER").white().bold()
        ));
        out.push_str(&format!("    {}\n", style("─".repeat(50)).dim()));
        out.push_str(&format!("      solver      {}\n", ctx.stats.solver));
        out.push_str(&format!("      trend       {}\n", ctx.trend));
        out.push_str(&format!("      prebins     {}\n", ctx.stats.n_prebins));
        out.push_str(&format!("      variables   {}\n", ctx.stats.n_variables));
        out.push_str(&format!("      constraints {}\n", ctx.stats.n_constraints));
        if let Some(nodes) = ctx.stats.nodes_explored {
            out.push_str(&format!("      nodes       {nodes}\n"));
        }
        if let Some(objective) = ctx.stats.objective {
            out.push_str(&format!("      objective   {objective:.5}\n"));
        }
        out.push_str(&format!(
            "      solve time  {:.4}s\n",
            ctx.stats.solve_time_secs
        ));

        out.push('\n');
        out.push_str(&format!(
            "    {}{}\n",
            GEAR,
            style("OPTIONS").white().bold()
        ));
        out.push_str(&format!("    {}\n", style("─".repeat(50)).dim()));
        let options = serde_json::to_string_pretty(ctx.config)
            .unwrap_or_else(|_| String::from("{}"));
        for line in options.lines() {
            out.push_str(&format!("      {line}\n"));
        }
    }

    out
}
