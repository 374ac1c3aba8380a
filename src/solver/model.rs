//! Backend-neutral merge-selection model
//!
//! Translates per-prebin statistics into the candidate-run model both solver
//! backends consume: a triangular matrix of statistics for every contiguous
//! prebin run, the feasibility filter from the structural bounds, and the
//! pairwise/triple compatibility predicates that encode the trend
//! constraints. Both backends share these predicates, so the two encodings
//! have the same feasible region.

use crate::binning::stats::woe_iv;
use crate::solver::trend::{MonotonicTrend, RATE_EPS};

/// Aggregated statistics for one prebin, the model's input unit.
#[derive(Debug, Clone, Copy)]
pub struct PrebinStats {
    /// Weighted sample count.
    pub count: f64,
    /// Weighted count of events (y = 1).
    pub n_event: f64,
    /// Weighted count of non-events (y = 0).
    pub n_nonevent: f64,
    /// n_event / count.
    pub event_rate: f64,
}

impl PrebinStats {
    pub fn new(n_event: f64, n_nonevent: f64) -> Self {
        let count = n_event + n_nonevent;
        PrebinStats {
            count,
            n_event,
            n_nonevent,
            event_rate: if count > 0.0 { n_event / count } else { 0.0 },
        }
    }
}

/// Statistics for a candidate run of merged prebins `start..=end`.
#[derive(Debug, Clone, Copy)]
pub struct RunStats {
    /// First prebin index (inclusive).
    pub start: usize,
    /// Last prebin index (inclusive).
    pub end: usize,
    /// Weighted sample count of the run.
    pub count: f64,
    /// Weighted events in the run.
    pub n_event: f64,
    /// Weighted non-events in the run.
    pub n_nonevent: f64,
    /// n_event / count.
    pub event_rate: f64,
    /// Weight of Evidence of the run against the fit totals.
    pub woe: f64,
    /// Information-value contribution of the run.
    pub iv: f64,
}

/// Structural bounds the selected partition must satisfy.
///
/// Count bounds are absolute weighted counts; the fraction options of the
/// public configuration are converted before the model is built.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModelBounds {
    pub min_n_bins: Option<usize>,
    pub max_n_bins: Option<usize>,
    pub min_bin_count: Option<f64>,
    pub max_bin_count: Option<f64>,
    pub min_bin_n_event: Option<f64>,
    pub max_bin_n_event: Option<f64>,
    pub min_bin_n_nonevent: Option<f64>,
    pub max_bin_n_nonevent: Option<f64>,
    pub trend: MonotonicTrend,
    pub min_event_rate_diff: f64,
}

/// The merge-selection model shared by the MIP and CP backends.
#[derive(Debug, Clone)]
pub struct MergeModel {
    /// Triangular run matrix: `runs[i][j - i]` is the run `i..=j`.
    runs: Vec<Vec<RunStats>>,
    n_prebins: usize,
    bounds: ModelBounds,
    /// Trend with `Auto` already resolved against the prebin rates.
    trend: MonotonicTrend,
    /// Change-point prebin for peak/valley trends.
    anchor: Option<usize>,
}

impl MergeModel {
    /// Build the model from prebin statistics and structural bounds.
    ///
    /// `total_event`/`total_nonevent` are the fit-wide totals (including
    /// pseudo-bins) used as WoE denominators. Run statistics use cumulative
    /// sums, one pass per start index.
    pub fn build(
        prebins: &[PrebinStats],
        mut bounds: ModelBounds,
        total_event: f64,
        total_nonevent: f64,
    ) -> Self {
        let n = prebins.len();
        let rates: Vec<f64> = prebins.iter().map(|p| p.event_rate).collect();
        let counts: Vec<f64> = prebins.iter().map(|p| p.count).collect();
        let trend = bounds.trend.resolve_auto(&rates, &counts);
        bounds.trend = trend;
        let anchor = trend.anchor(&rates);

        let mut runs = Vec::with_capacity(n);
        for i in 0..n {
            let mut row = Vec::with_capacity(n - i);
            let mut events = 0.0;
            let mut non_events = 0.0;
            let mut count = 0.0;
            for (j, prebin) in prebins.iter().enumerate().skip(i) {
                events += prebin.n_event;
                non_events += prebin.n_nonevent;
                count += prebin.count;
                let (woe, iv) = woe_iv(events, non_events, total_event, total_nonevent);
                row.push(RunStats {
                    start: i,
                    end: j,
                    count,
                    n_event: events,
                    n_nonevent: non_events,
                    event_rate: if count > 0.0 { events / count } else { 0.0 },
                    woe,
                    iv,
                });
            }
            runs.push(row);
        }

        MergeModel {
            runs,
            n_prebins: n,
            bounds,
            trend,
            anchor,
        }
    }

    pub fn n_prebins(&self) -> usize {
        self.n_prebins
    }

    /// Trend actually enforced (auto already resolved).
    pub fn trend(&self) -> MonotonicTrend {
        self.trend
    }

    /// Run statistics for prebins `start..=end`.
    pub fn run(&self, start: usize, end: usize) -> &RunStats {
        &self.runs[start][end - start]
    }

    /// Smallest admissible number of final bins.
    pub fn min_bins(&self) -> usize {
        self.bounds.min_n_bins.unwrap_or(1).max(1)
    }

    /// Largest admissible number of final bins.
    pub fn max_bins(&self) -> usize {
        self.bounds
            .max_n_bins
            .unwrap_or(self.n_prebins)
            .min(self.n_prebins.max(1))
    }

    /// Whether curvature (triple) constraints apply.
    pub fn has_curvature(&self) -> bool {
        matches!(self.trend, MonotonicTrend::Convex | MonotonicTrend::Concave)
    }

    /// Whether a run satisfies the per-bin count bounds.
    pub fn feasible(&self, run: &RunStats) -> bool {
        let b = &self.bounds;
        let ok_min = |v: f64, m: Option<f64>| m.is_none_or(|m| v + RATE_EPS >= m);
        let ok_max = |v: f64, m: Option<f64>| m.is_none_or(|m| v <= m + RATE_EPS);
        ok_min(run.count, b.min_bin_count)
            && ok_max(run.count, b.max_bin_count)
            && ok_min(run.n_event, b.min_bin_n_event)
            && ok_max(run.n_event, b.max_bin_n_event)
            && ok_min(run.n_nonevent, b.min_bin_n_nonevent)
            && ok_max(run.n_nonevent, b.max_bin_n_nonevent)
    }

    /// Whether `next` may directly follow `prev` in the final partition.
    pub fn pair_compatible(&self, prev: &RunStats, next: &RunStats) -> bool {
        debug_assert_eq!(prev.end + 1, next.start);
        if !self
            .trend
            .pair_ok(prev.event_rate, next.event_rate, prev.end, self.anchor)
        {
            return false;
        }
        if self.bounds.min_event_rate_diff > 0.0 {
            let diff = (next.event_rate - prev.event_rate).abs();
            if diff + RATE_EPS < self.bounds.min_event_rate_diff {
                return false;
            }
        }
        true
    }

    /// Whether three consecutive runs satisfy a curvature trend.
    pub fn triple_compatible(&self, first: &RunStats, mid: &RunStats, last: &RunStats) -> bool {
        self.trend
            .triple_ok(first.event_rate, mid.event_rate, last.event_rate)
    }

    /// Total information value of a selected partition.
    pub fn selection_iv(&self, selection: &[(usize, usize)]) -> f64 {
        selection
            .iter()
            .map(|&(start, end)| self.run(start, end).iv)
            .sum()
    }

    /// Size of the run-selection encoding: decision variables (feasible
    /// runs) and generated constraints (cover rows, binding bin-count
    /// bounds and incompatibility cuts).
    pub fn encoding_size(&self) -> (usize, usize) {
        let n = self.n_prebins;
        let n_variables = self
            .runs
            .iter()
            .flatten()
            .filter(|run| self.feasible(run))
            .count();

        let mut n_constraints = n;
        if self.min_bins() > 1 {
            n_constraints += 1;
        }
        if self.max_bins() < n {
            n_constraints += 1;
        }
        for boundary in 0..n.saturating_sub(1) {
            for start_a in 0..=boundary {
                let prev = self.run(start_a, boundary);
                if !self.feasible(prev) {
                    continue;
                }
                for end_b in (boundary + 1)..n {
                    let next = self.run(boundary + 1, end_b);
                    if self.feasible(next) && !self.pair_compatible(prev, next) {
                        n_constraints += 1;
                    }
                }
            }
        }
        if self.has_curvature() {
            for e1 in 0..n {
                for sa in 0..=e1 {
                    if !self.feasible(self.run(sa, e1)) {
                        continue;
                    }
                    for e2 in (e1 + 1)..n {
                        if !self.feasible(self.run(e1 + 1, e2)) {
                            continue;
                        }
                        for ec in (e2 + 1)..n {
                            if !self.feasible(self.run(e2 + 1, ec)) {
                                continue;
                            }
                            let first = self.run(sa, e1);
                            let mid = self.run(e1 + 1, e2);
                            let last = self.run(e2 + 1, ec);
                            if !self.triple_compatible(first, mid, last) {
                                n_constraints += 1;
                            }
                        }
                    }
                }
            }
        }
        (n_variables, n_constraints)
    }
}
