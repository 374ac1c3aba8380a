//! Post-solve refinement
//!
//! Two passes applied after the optimiser: merging adjacent bins whose event
//! rates are not significantly different under a chi-square two-sample test,
//! and rounding split points to a requested precision when that can be done
//! without corrupting the partition.

use std::cmp::Ordering;

use statrs::distribution::{ChiSquared, ContinuousCDF};

use crate::binning::config::PvaluePolicy;
use crate::binning::stats::{count_cells, ClassTotals};
use crate::solver::trend::MonotonicTrend;

/// p-value of independence for two adjacent bins' 2x2 contingency table.
///
/// Returns `None` when a margin is zero, where the statistic is undefined;
/// such pairs are never merged on significance grounds.
fn chi2_pvalue(left: &ClassTotals, right: &ClassTotals) -> Option<f64> {
    let a = left.n_nonevent;
    let b = left.n_event;
    let c = right.n_nonevent;
    let d = right.n_event;
    let n = a + b + c + d;
    let margins = (a + b) * (c + d) * (a + c) * (b + d);
    if margins <= 0.0 {
        return None;
    }
    let chi2 = n * (a * d - b * c).powi(2) / margins;
    let dist = ChiSquared::new(1.0).ok()?;
    Some(1.0 - dist.cdf(chi2))
}

/// Plan the p-value merges as contiguous runs over the input bins.
///
/// `consecutive` repeatedly merges the adjacent pair with the largest failing
/// p-value, retesting after every merge until a fixed point. `all` scores
/// every adjacent pair once against the initial statistics and merges the
/// failures in descending p-value order. Both stop at the bin-count floor.
pub(crate) fn pvalue_merge_plan(
    cells: &[ClassTotals],
    max_pvalue: f64,
    policy: PvaluePolicy,
    min_bins: usize,
) -> Vec<(usize, usize)> {
    let floor = min_bins.max(1);
    let mut runs: Vec<(usize, usize)> = (0..cells.len()).map(|i| (i, i)).collect();
    let mut merged: Vec<ClassTotals> = cells.to_vec();

    match policy {
        PvaluePolicy::Consecutive => {
            while merged.len() > floor {
                let mut worst: Option<(usize, f64)> = None;
                for i in 0..merged.len() - 1 {
                    if let Some(p) = chi2_pvalue(&merged[i], &merged[i + 1]) {
                        if p > max_pvalue && worst.is_none_or(|(_, wp)| p > wp) {
                            worst = Some((i, p));
                        }
                    }
                }
                let Some((i, _)) = worst else {
                    break;
                };
                merge_at(&mut runs, &mut merged, i);
            }
        }
        PvaluePolicy::All => {
            let mut failing: Vec<(usize, f64)> = (0..cells.len().saturating_sub(1))
                .filter_map(|i| {
                    chi2_pvalue(&cells[i], &cells[i + 1])
                        .filter(|&p| p > max_pvalue)
                        .map(|p| (i, p))
                })
                .collect();
            failing.sort_by(|a, b| {
                b.1.partial_cmp(&a.1)
                    .unwrap_or(Ordering::Equal)
                    .then(a.0.cmp(&b.0))
            });
            for (pair, _) in failing {
                if merged.len() <= floor {
                    break;
                }
                let left = run_containing(&runs, pair);
                let right = run_containing(&runs, pair + 1);
                if left != right {
                    merge_at(&mut runs, &mut merged, left);
                }
            }
        }
    }
    runs
}

/// Merge run `i` with its right neighbour.
fn merge_at(runs: &mut Vec<(usize, usize)>, merged: &mut Vec<ClassTotals>, i: usize) {
    runs[i].1 = runs[i + 1].1;
    runs.remove(i + 1);
    merged[i] = ClassTotals {
        n_event: merged[i].n_event + merged[i + 1].n_event,
        n_nonevent: merged[i].n_nonevent + merged[i + 1].n_nonevent,
    };
    merged.remove(i + 1);
}

fn run_containing(runs: &[(usize, usize)], bin: usize) -> usize {
    runs.partition_point(|&(_, end)| end < bin)
}

/// Round splits to `digits` decimals when the rounded boundaries keep the
/// partition intact.
///
/// Rounding may collapse neighbouring splits, empty a bin, or flip the trend
/// by moving samples across a boundary; each candidate precision is
/// re-counted and validated. Precision is raised one digit at a time up to
/// eight; if none works, the splits stay unrounded. Already-rounded splits
/// pass the first candidate unchanged, so the pass is idempotent.
pub(crate) fn apply_split_rounding(
    splits: &[f64],
    digits: u8,
    clean_x: &[f64],
    clean_y: &[u8],
    weights: (f64, f64),
    trend: MonotonicTrend,
) -> Vec<f64> {
    if splits.is_empty() {
        return Vec::new();
    }
    for candidate in digits..=8 {
        let factor = 10f64.powi(candidate as i32);
        let rounded: Vec<f64> = splits.iter().map(|&s| (s * factor).round() / factor).collect();
        if rounded.windows(2).any(|w| w[1] <= w[0]) {
            continue;
        }
        let cells = count_cells(clean_x, clean_y, &rounded, weights);
        if cells.iter().any(|c| c.count() == 0.0) {
            continue;
        }
        let rates: Vec<f64> = cells.iter().map(|c| c.n_event / c.count()).collect();
        // The change-point is re-anchored on the recounted rates.
        if trend.sequence_ok(&rates, &rates) {
            return rounded;
        }
    }
    splits.to_vec()
}
