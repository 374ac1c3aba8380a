//! Optimal binning of a single variable against a binary target
//!
//! The pipeline: route samples into clean/special/missing subsets, generate
//! candidate splits, aggregate them into prebins, let the solver pick the
//! maximum-IV merge under the configured constraints, then refine with the
//! p-value merge pass and split rounding. The fitted state drives the
//! transform surface and the binning table.

pub mod config;
pub(crate) mod postprocess;
pub(crate) mod prebin;
pub(crate) mod stats;
pub mod table;
pub(crate) mod transform;

use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use crate::binning::config::{BinningConfig, VariableDtype};
use crate::binning::stats::ClassTotals;
use crate::binning::table::BinningTable;
use crate::binning::transform::BinLocation;
use crate::error::{self, BinningError, Result};
use crate::report::{self, FitSummary, ReportContext};
use crate::solver::model::{MergeModel, ModelBounds};
use crate::solver::{self, FitStatus, MonotonicTrend, SolverStats};

pub use transform::Metric;

/// Label of the bucket rare categories are lumped into.
const OTHER_LABEL: &str = "OTHER";

/// Optimal binning of one variable.
///
/// Construct with a [`BinningConfig`], fit against samples and a binary
/// target, then transform new values or inspect the [`BinningTable`].
pub struct OptimalBinning {
    config: BinningConfig,
    fitted: Option<FittedState>,
}

struct FittedState {
    /// Final split points (numerical fits only).
    splits: Vec<f64>,
    table: BinningTable,
    status: FitStatus,
    solver_stats: SolverStats,
    trend: MonotonicTrend,
    /// Category names per final bin (categorical fits only).
    category_groups: Vec<Vec<String>>,
    /// Observed category to final bin.
    level_bins: HashMap<String, usize>,
    /// Bin holding the rare-category bucket, when one exists.
    other_bin: Option<usize>,
    fit_time_secs: f64,
}

/// Partition produced by the optimiser before presentation.
struct OptimisedPartition {
    splits: Vec<f64>,
    cells: Vec<ClassTotals>,
    status: FitStatus,
    stats: SolverStats,
    trend: MonotonicTrend,
}

impl Default for OptimalBinning {
    fn default() -> Self {
        OptimalBinning {
            config: BinningConfig::default(),
            fitted: None,
        }
    }
}

impl OptimalBinning {
    /// Create a binning with a validated configuration.
    pub fn new(config: BinningConfig) -> Result<Self> {
        config.validate()?;
        Ok(OptimalBinning {
            config,
            fitted: None,
        })
    }

    /// Create a binning from a JSON options document.
    pub fn from_json(json: &str) -> Result<Self> {
        Self::new(BinningConfig::from_json(json)?)
    }

    pub fn config(&self) -> &BinningConfig {
        &self.config
    }

    /// Terminal solver status of the last fit, if any.
    pub fn status(&self) -> Option<FitStatus> {
        self.fitted.as_ref().map(|state| state.status)
    }

    /// Fit a numerical variable.
    pub fn fit(&mut self, x: &[f64], y: &[u8]) -> Result<()> {
        if self.config.dtype != VariableDtype::Numerical {
            return Err(error::data(
                "fit expects a numerical variable; use fit_categorical",
            ));
        }
        let started = Instant::now();
        let (raw_event, raw_nonevent) = stats::validate_target(y)?;
        let weights =
            stats::resolve_class_weights(&self.config.class_weight, raw_event, raw_nonevent);
        let partition = stats::partition_samples(x, y, &self.config.special_codes, weights)?;
        if partition.clean_x.is_empty() {
            return self.fit_degenerate(partition.special, partition.missing, started);
        }
        if self.config.verbose {
            report::log_stage(
                &self.config.name,
                &format!("prebinning {} clean samples", partition.clean_x.len()),
            );
        }

        let candidate_splits = match &self.config.user_splits {
            Some(user) => user.clone(),
            None => prebin::compute_splits(
                self.config.prebinning_method,
                &partition.clean_x,
                &partition.clean_y,
                self.config.max_n_prebins,
                self.config.min_prebin_size,
                weights,
            ),
        };
        let mut part = self.optimise(
            &partition.clean_x,
            &partition.clean_y,
            &candidate_splits,
            weights,
            partition.special,
            partition.missing,
        )?;

        if let Some(digits) = self.config.split_digits {
            part.splits = postprocess::apply_split_rounding(
                &part.splits,
                digits,
                &partition.clean_x,
                &partition.clean_y,
                weights,
                part.trend,
            );
            part.cells = stats::count_cells(
                &partition.clean_x,
                &partition.clean_y,
                &part.splits,
                weights,
            );
        }

        let table = BinningTable::build(
            self.config.name.clone(),
            self.config.dtype,
            table::interval_labels(&part.splits),
            &part.cells,
            partition.special,
            partition.missing,
        );
        if self.config.verbose {
            report::log_stage(
                &self.config.name,
                &format!(
                    "fitted {} bins, status {}, IV {:.5}",
                    table.n_bins(),
                    part.status,
                    table.iv
                ),
            );
        }
        self.fitted = Some(FittedState {
            splits: part.splits,
            table,
            status: part.status,
            solver_stats: part.stats,
            trend: part.trend,
            category_groups: Vec::new(),
            level_bins: HashMap::new(),
            other_bin: None,
            fit_time_secs: started.elapsed().as_secs_f64(),
        });
        Ok(())
    }

    /// Fit a categorical variable. `None` samples count as missing.
    pub fn fit_categorical(&mut self, x: &[Option<&str>], y: &[u8]) -> Result<()> {
        if self.config.dtype != VariableDtype::Categorical {
            return Err(error::data(
                "fit_categorical expects a categorical variable; use fit",
            ));
        }
        if x.len() != y.len() {
            return Err(error::data(format!(
                "x and y lengths differ: {} vs {}",
                x.len(),
                y.len()
            )));
        }
        let started = Instant::now();
        let (raw_event, raw_nonevent) = stats::validate_target(y)?;
        let weights =
            stats::resolve_class_weights(&self.config.class_weight, raw_event, raw_nonevent);

        let mut missing = ClassTotals::default();
        let mut levels: BTreeMap<String, ClassTotals> = BTreeMap::new();
        for (value, &target) in x.iter().zip(y) {
            match value {
                None => missing.add(target, weights),
                Some(name) => levels
                    .entry((*name).to_string())
                    .or_default()
                    .add(target, weights),
            }
        }
        if levels.is_empty() {
            return Err(error::data("no observed categories to bin"));
        }
        if self.config.verbose {
            report::log_stage(
                &self.config.name,
                &format!("ordering {} categories by event rate", levels.len()),
            );
        }

        // Rare categories fall into one shared bucket that competes like a
        // regular category.
        let cat_total: f64 = levels.values().map(|cell| cell.count()).sum();
        let mut kept: Vec<(String, ClassTotals)> = Vec::with_capacity(levels.len());
        let mut other = ClassTotals::default();
        let mut rare_levels: Vec<String> = Vec::new();
        for (name, cell) in levels {
            let is_rare = self
                .config
                .cat_cutoff
                .is_some_and(|cutoff| cell.count() / cat_total < cutoff);
            if is_rare {
                other.n_event += cell.n_event;
                other.n_nonevent += cell.n_nonevent;
                rare_levels.push(name);
            } else {
                kept.push((name, cell));
            }
        }
        if !rare_levels.is_empty() {
            kept.push((OTHER_LABEL.to_string(), other));
        }
        // Event-rate order; the BTreeMap pass already fixed name order for
        // ties, which the stable sort preserves.
        kept.sort_by(|a, b| {
            let rate_a = a.1.n_event / a.1.count();
            let rate_b = b.1.n_event / b.1.count();
            rate_a.partial_cmp(&rate_b).unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut sample_code: HashMap<String, usize> = kept
            .iter()
            .enumerate()
            .map(|(code, (name, _))| (name.clone(), code))
            .collect();
        if let Some(other_code) = kept.iter().position(|(name, _)| name == OTHER_LABEL) {
            for rare in &rare_levels {
                sample_code.insert(rare.clone(), other_code);
            }
        }
        let mut coded_x = Vec::with_capacity(x.len());
        let mut coded_y = Vec::with_capacity(x.len());
        for (value, &target) in x.iter().zip(y) {
            if let Some(name) = value {
                if let Some(&code) = sample_code.get(*name) {
                    coded_x.push(code as f64);
                    coded_y.push(target);
                }
            }
        }

        let candidate_splits = if kept.len() <= self.config.max_n_prebins {
            prebin::level_splits(kept.len())
        } else {
            prebin::compute_splits(
                self.config.prebinning_method,
                &coded_x,
                &coded_y,
                self.config.max_n_prebins,
                self.config.min_prebin_size,
                weights,
            )
        };
        let part = self.optimise(
            &coded_x,
            &coded_y,
            &candidate_splits,
            weights,
            ClassTotals::default(),
            missing,
        )?;

        // Final bin of each ordered category code.
        let mut groups: Vec<Vec<String>> = vec![Vec::new(); part.cells.len()];
        let mut level_bins = HashMap::new();
        let mut other_bin = None;
        for (code, (name, _)) in kept.iter().enumerate() {
            let bin = stats::bin_index(&part.splits, code as f64);
            groups[bin].push(name.clone());
            if name == OTHER_LABEL {
                other_bin = Some(bin);
            } else {
                level_bins.insert(name.clone(), bin);
            }
        }
        for rare in rare_levels {
            if let Some(bin) = other_bin {
                level_bins.insert(rare, bin);
            }
        }

        let table = BinningTable::build(
            self.config.name.clone(),
            self.config.dtype,
            table::group_labels(&groups),
            &part.cells,
            ClassTotals::default(),
            missing,
        );
        if self.config.verbose {
            report::log_stage(
                &self.config.name,
                &format!(
                    "fitted {} category groups, status {}, IV {:.5}",
                    table.n_bins(),
                    part.status,
                    table.iv
                ),
            );
        }
        self.fitted = Some(FittedState {
            splits: Vec::new(),
            table,
            status: part.status,
            solver_stats: part.stats,
            trend: part.trend,
            category_groups: groups,
            level_bins,
            other_bin,
            fit_time_secs: started.elapsed().as_secs_f64(),
        });
        Ok(())
    }

    /// Every record routed to a pseudo-bin: fall back to one catch-all bin
    /// spanning the whole axis.
    fn fit_degenerate(
        &mut self,
        special: ClassTotals,
        missing: ClassTotals,
        started: Instant,
    ) -> Result<()> {
        if self.config.verbose {
            report::log_stage(
                &self.config.name,
                "no clean samples; falling back to a single catch-all bin",
            );
        }
        let status = if self.config.min_n_bins.unwrap_or(1) <= 1 {
            FitStatus::Optimal
        } else {
            FitStatus::Infeasible
        };
        let cells = vec![ClassTotals::default()];
        let table = BinningTable::build(
            self.config.name.clone(),
            self.config.dtype,
            table::interval_labels(&[]),
            &cells,
            special,
            missing,
        );
        let solver_stats = SolverStats {
            solver: self.config.solver,
            status,
            n_prebins: 0,
            n_variables: 0,
            n_constraints: 0,
            nodes_explored: None,
            objective: None,
            solve_time_secs: 0.0,
        };
        self.fitted = Some(FittedState {
            splits: Vec::new(),
            table,
            status,
            solver_stats,
            trend: self.config.monotonic_trend.resolve_auto(&[], &[]),
            category_groups: Vec::new(),
            level_bins: HashMap::new(),
            other_bin: None,
            fit_time_secs: started.elapsed().as_secs_f64(),
        });
        Ok(())
    }

    /// Shared optimisation core: aggregate, solve, apply the p-value pass.
    fn optimise(
        &self,
        clean_x: &[f64],
        clean_y: &[u8],
        candidate_splits: &[f64],
        weights: (f64, f64),
        special: ClassTotals,
        missing: ClassTotals,
    ) -> Result<OptimisedPartition> {
        let (prebin_splits, prebins) =
            stats::aggregate_prebins(clean_x, clean_y, candidate_splits, weights);
        let clean_total: f64 = prebins.iter().map(|p| p.count).sum();
        let total_event: f64 = prebins.iter().map(|p| p.n_event).sum::<f64>()
            + special.n_event
            + missing.n_event;
        let total_nonevent: f64 = prebins.iter().map(|p| p.n_nonevent).sum::<f64>()
            + special.n_nonevent
            + missing.n_nonevent;

        let bounds = self.model_bounds(clean_total);
        let model = MergeModel::build(&prebins, bounds, total_event, total_nonevent);
        let trend = model.trend();
        if self.config.verbose {
            report::log_stage(
                &self.config.name,
                &format!(
                    "solving over {} prebins ({} trend)",
                    model.n_prebins(),
                    trend
                ),
            );
        }
        let outcome = solver::solve(
            &model,
            self.config.solver,
            self.config.mip_solver,
            self.config.time_limit,
        )?;

        let mut splits: Vec<f64> = outcome
            .selection
            .iter()
            .take(outcome.selection.len().saturating_sub(1))
            .map(|&(_, end)| prebin_splits[end])
            .collect();
        let mut cells = stats::count_cells(clean_x, clean_y, &splits, weights);

        if let Some(max_pvalue) = self.config.max_pvalue {
            let plan = postprocess::pvalue_merge_plan(
                &cells,
                max_pvalue,
                self.config.max_pvalue_policy,
                self.config.min_n_bins.unwrap_or(1),
            );
            if plan.len() < cells.len() {
                if self.config.verbose {
                    report::log_stage(
                        &self.config.name,
                        &format!("p-value pass merged {} bins", cells.len() - plan.len()),
                    );
                }
                (splits, cells) = apply_merge_plan(&plan, &splits, &cells);
            }
        }

        Ok(OptimisedPartition {
            splits,
            cells,
            status: outcome.status,
            stats: outcome.stats,
            trend,
        })
    }

    fn model_bounds(&self, clean_total: f64) -> ModelBounds {
        ModelBounds {
            min_n_bins: self.config.min_n_bins,
            max_n_bins: self.config.max_n_bins,
            min_bin_count: self.config.min_bin_size.map(|f| f * clean_total),
            max_bin_count: self.config.max_bin_size.map(|f| f * clean_total),
            min_bin_n_event: self.config.min_bin_n_event.map(|v| v as f64),
            max_bin_n_event: self.config.max_bin_n_event.map(|v| v as f64),
            min_bin_n_nonevent: self.config.min_bin_n_nonevent.map(|v| v as f64),
            max_bin_n_nonevent: self.config.max_bin_n_nonevent.map(|v| v as f64),
            trend: self.config.monotonic_trend,
            min_event_rate_diff: self.config.min_event_rate_diff,
        }
    }

    /// Map numerical samples to a bin metric.
    pub fn transform(&self, x: &[f64], metric: Metric) -> Result<Vec<f64>> {
        let state = self.state("transform")?;
        if self.config.dtype != VariableDtype::Numerical {
            return Err(error::data(
                "transform expects a numerical binning; use transform_categorical",
            ));
        }
        let values = metric_values(&state.table, metric);
        let splits = state.splits.as_slice();
        let specials = self.config.special_codes.as_slice();
        Ok(transform::map_samples(x, move |value| {
            match transform::locate(value, splits, specials) {
                BinLocation::Bin(bin) => values.bins[bin],
                BinLocation::Special => values.special,
                BinLocation::Missing => values.missing,
            }
        }))
    }

    /// Map numerical samples to their bin labels.
    pub fn transform_bins(&self, x: &[f64]) -> Result<Vec<String>> {
        let state = self.state("transform_bins")?;
        if self.config.dtype != VariableDtype::Numerical {
            return Err(error::data(
                "transform_bins expects a numerical binning; use transform_categorical",
            ));
        }
        let splits = state.splits.as_slice();
        let specials = self.config.special_codes.as_slice();
        let table = &state.table;
        Ok(transform::map_samples(x, move |value| {
            match transform::locate(value, splits, specials) {
                BinLocation::Bin(bin) => table.bins[bin].label.clone(),
                BinLocation::Special => table.special.label.clone(),
                BinLocation::Missing => table.missing.label.clone(),
            }
        }))
    }

    /// Map categorical samples to a bin metric. Unseen categories fall into
    /// the rare bucket when one exists, otherwise they count as missing.
    pub fn transform_categorical(&self, x: &[Option<&str>], metric: Metric) -> Result<Vec<f64>> {
        let state = self.state("transform_categorical")?;
        if self.config.dtype != VariableDtype::Categorical {
            return Err(error::data(
                "transform_categorical expects a categorical binning; use transform",
            ));
        }
        let values = metric_values(&state.table, metric);
        Ok(x.iter()
            .map(|value| match value {
                None => values.missing,
                Some(name) => match state.level_bins.get(*name) {
                    Some(&bin) => values.bins[bin],
                    None => state
                        .other_bin
                        .map_or(values.missing, |bin| values.bins[bin]),
                },
            })
            .collect())
    }

    /// Map categorical samples to their group labels. Unseen categories fall
    /// into the rare bucket when one exists, otherwise they count as missing.
    pub fn transform_categorical_bins(&self, x: &[Option<&str>]) -> Result<Vec<String>> {
        let state = self.state("transform_categorical_bins")?;
        if self.config.dtype != VariableDtype::Categorical {
            return Err(error::data(
                "transform_categorical_bins expects a categorical binning; use transform_bins",
            ));
        }
        let table = &state.table;
        Ok(x.iter()
            .map(|value| match value {
                None => table.missing.label.clone(),
                Some(name) => match state.level_bins.get(*name) {
                    Some(&bin) => table.bins[bin].label.clone(),
                    None => match state.other_bin {
                        Some(bin) => table.bins[bin].label.clone(),
                        None => table.missing.label.clone(),
                    },
                },
            })
            .collect())
    }

    /// Fit a numerical variable and transform the same samples.
    pub fn fit_transform(&mut self, x: &[f64], y: &[u8], metric: Metric) -> Result<Vec<f64>> {
        self.fit(x, y)?;
        self.transform(x, metric)
    }

    /// Fit a categorical variable and transform the same samples.
    pub fn fit_transform_categorical(
        &mut self,
        x: &[Option<&str>],
        y: &[u8],
        metric: Metric,
    ) -> Result<Vec<f64>> {
        self.fit_categorical(x, y)?;
        self.transform_categorical(x, metric)
    }

    /// Statistics of the fitted binning.
    pub fn binning_table(&self) -> Result<&BinningTable> {
        Ok(&self.state("binning_table")?.table)
    }

    /// Final split points of a numerical fit.
    pub fn splits(&self) -> Result<&[f64]> {
        let state = self.state("splits")?;
        if self.config.dtype == VariableDtype::Categorical {
            return Err(error::data(
                "split points are not defined for a categorical binning; use category_groups",
            ));
        }
        Ok(&state.splits)
    }

    /// Category names per final bin of a categorical fit.
    pub fn category_groups(&self) -> Result<&[Vec<String>]> {
        let state = self.state("category_groups")?;
        if self.config.dtype == VariableDtype::Numerical {
            return Err(error::data(
                "category groups are not defined for a numerical binning; use splits",
            ));
        }
        Ok(&state.category_groups)
    }

    /// Render the fit report. Levels 0, 1 and 2 add detail; higher levels
    /// clamp to 2.
    pub fn information(&self, print_level: i32) -> Result<String> {
        if print_level < 0 {
            return Err(error::value(
                "print_level",
                format!("must be 0, 1 or 2, got {print_level}"),
            ));
        }
        let state = self.state("information")?;
        let context = ReportContext {
            config: &self.config,
            table: &state.table,
            stats: &state.solver_stats,
            trend: state.trend,
            fit_time_secs: state.fit_time_secs,
        };
        Ok(report::render_information(&context, print_level.min(2)))
    }

    /// Serializable snapshot of the fit for export pipelines.
    pub fn fit_summary(&self) -> Result<FitSummary> {
        let state = self.state("fit_summary")?;
        let context = ReportContext {
            config: &self.config,
            table: &state.table,
            stats: &state.solver_stats,
            trend: state.trend,
            fit_time_secs: state.fit_time_secs,
        };
        Ok(report::fit_summary(&context))
    }

    fn state(&self, operation: &'static str) -> Result<&FittedState> {
        self.fitted
            .as_ref()
            .ok_or(BinningError::NotFitted { operation })
    }
}

/// Per-bin values of a metric plus the pseudo-bin values.
struct MetricValues {
    bins: Vec<f64>,
    special: f64,
    missing: f64,
}

fn metric_values(table: &BinningTable, metric: Metric) -> MetricValues {
    let k = table.n_bins();
    match metric {
        Metric::Woe => MetricValues {
            bins: table.bins.iter().map(|b| b.woe).collect(),
            special: table.special.woe,
            missing: table.missing.woe,
        },
        Metric::EventRate => MetricValues {
            bins: table.bins.iter().map(|b| b.event_rate).collect(),
            special: table.special.event_rate,
            missing: table.missing.event_rate,
        },
        Metric::Index => MetricValues {
            bins: (0..k).map(|i| i as f64).collect(),
            special: k as f64,
            missing: (k + 1) as f64,
        },
    }
}

fn apply_merge_plan(
    plan: &[(usize, usize)],
    splits: &[f64],
    cells: &[ClassTotals],
) -> (Vec<f64>, Vec<ClassTotals>) {
    let merged_splits = plan
        .iter()
        .take(plan.len().saturating_sub(1))
        .map(|&(_, end)| splits[end])
        .collect();
    let merged_cells = plan
        .iter()
        .map(|&(start, end)| {
            cells[start..=end]
                .iter()
                .fold(ClassTotals::default(), |acc, cell| ClassTotals {
                    n_event: acc.n_event + cell.n_event,
                    n_nonevent: acc.n_nonevent + cell.n_nonevent,
                })
        })
        .collect();
    (merged_splits, merged_cells)
}
