//! Event/non-event statistics
//!
//! Weight of Evidence and information value with Laplace smoothing, target
//! validation, class-weight resolution, and the split of raw samples into
//! clean, special and missing subsets. Aggregation of clean samples into
//! prebin statistics lives here as well because it shares the bin-index
//! convention with the transformer.

use crate::binning::config::ClassWeight;
use crate::error::{self, Result};
use crate::solver::model::PrebinStats;

/// Laplace smoothing applied to both distributions before taking the ratio,
/// so bins with a zero class still get a finite WoE.
pub(crate) const SMOOTHING: f64 = 0.5;

/// WoE and IV contribution of a cell against the fit totals.
///
/// WoE is the log ratio of the non-event share to the event share, so a bin
/// with a high event rate gets a negative WoE. Both shares are smoothed.
pub(crate) fn woe_iv(
    n_event: f64,
    n_nonevent: f64,
    total_event: f64,
    total_nonevent: f64,
) -> (f64, f64) {
    let event_dist = (n_event + SMOOTHING) / (total_event + SMOOTHING);
    let nonevent_dist = (n_nonevent + SMOOTHING) / (total_nonevent + SMOOTHING);
    let woe = (nonevent_dist / event_dist).ln();
    let iv = (nonevent_dist - event_dist) * woe;
    (woe, iv)
}

/// Index of the bin holding `x` for ascending split points.
///
/// Bins are right-open: bin `i` covers `[splits[i - 1], splits[i])`, with the
/// outer bins unbounded. `partition_point` keeps this O(log k).
pub(crate) fn bin_index(splits: &[f64], x: f64) -> usize {
    splits.partition_point(|&s| s <= x)
}

/// Weighted event/non-event totals for one subset of samples.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ClassTotals {
    pub n_event: f64,
    pub n_nonevent: f64,
}

impl ClassTotals {
    pub(crate) fn add(&mut self, target: u8, weights: (f64, f64)) {
        if target == 1 {
            self.n_event += weights.1;
        } else {
            self.n_nonevent += weights.0;
        }
    }

    pub(crate) fn count(&self) -> f64 {
        self.n_event + self.n_nonevent
    }
}

/// Samples routed into the clean, special and missing subsets.
#[derive(Debug, Clone, Default)]
pub(crate) struct SamplePartition {
    pub clean_x: Vec<f64>,
    pub clean_y: Vec<u8>,
    pub special: ClassTotals,
    pub missing: ClassTotals,
}

/// Check the target is binary with both classes present.
///
/// Returns the raw `(n_event, n_nonevent)` counts.
pub(crate) fn validate_target(y: &[u8]) -> Result<(f64, f64)> {
    let mut n_event = 0.0;
    let mut n_nonevent = 0.0;
    for &value in y {
        match value {
            0 => n_nonevent += 1.0,
            1 => n_event += 1.0,
            other => {
                return Err(error::data(format!(
                    "target must be binary (0/1), found value {other}"
                )))
            }
        }
    }
    if n_event == 0.0 || n_nonevent == 0.0 {
        return Err(error::data(
            "target contains a single class; both events and non-events are required",
        ));
    }
    Ok((n_event, n_nonevent))
}

/// Resolve the class-weight option into `(w_nonevent, w_event)` multipliers.
pub(crate) fn resolve_class_weights(
    class_weight: &ClassWeight,
    n_event: f64,
    n_nonevent: f64,
) -> (f64, f64) {
    match class_weight {
        ClassWeight::None => (1.0, 1.0),
        // n_samples / (n_classes * n_class), the usual balanced heuristic.
        ClassWeight::Balanced => {
            let total = n_event + n_nonevent;
            (total / (2.0 * n_nonevent), total / (2.0 * n_event))
        }
        ClassWeight::Custom { w_nonevent, w_event } => (*w_nonevent, *w_event),
    }
}

/// Route each sample into the clean, special or missing subset.
///
/// NaN is missing; an exact match against a special code is special;
/// everything else is clean. Non-finite values outside the special codes are
/// rejected because split search cannot place them.
pub(crate) fn partition_samples(
    x: &[f64],
    y: &[u8],
    special_codes: &[f64],
    weights: (f64, f64),
) -> Result<SamplePartition> {
    if x.len() != y.len() {
        return Err(error::data(format!(
            "x and y lengths differ: {} vs {}",
            x.len(),
            y.len()
        )));
    }
    let mut partition = SamplePartition::default();
    for (&value, &target) in x.iter().zip(y) {
        if value.is_nan() {
            partition.missing.add(target, weights);
        } else if special_codes.contains(&value) {
            partition.special.add(target, weights);
        } else if !value.is_finite() {
            return Err(error::data(
                "x contains infinite values that are not special codes",
            ));
        } else {
            partition.clean_x.push(value);
            partition.clean_y.push(target);
        }
    }
    Ok(partition)
}

/// Weighted class totals per bin for a fixed set of splits. Unlike prebin
/// aggregation this keeps empty bins, so callers can detect them.
pub(crate) fn count_cells(
    clean_x: &[f64],
    clean_y: &[u8],
    splits: &[f64],
    weights: (f64, f64),
) -> Vec<ClassTotals> {
    let mut cells = vec![ClassTotals::default(); splits.len() + 1];
    for (&value, &target) in clean_x.iter().zip(clean_y) {
        cells[bin_index(splits, value)].add(target, weights);
    }
    cells
}

/// Aggregate clean samples into per-prebin statistics.
///
/// Prebins left empty by the candidate splits are folded into a neighbour by
/// dropping one of their boundaries, so every returned prebin holds at least
/// one sample. Returns the retained splits with the statistics.
pub(crate) fn aggregate_prebins(
    clean_x: &[f64],
    clean_y: &[u8],
    splits: &[f64],
    weights: (f64, f64),
) -> (Vec<f64>, Vec<PrebinStats>) {
    let n_bins = splits.len() + 1;
    let mut raw_counts = vec![0usize; n_bins];
    for &value in clean_x {
        raw_counts[bin_index(splits, value)] += 1;
    }

    let mut retained: Vec<f64> = splits
        .iter()
        .zip(&raw_counts)
        .filter(|&(_, &count)| count > 0)
        .map(|(&split, _)| split)
        .collect();
    // The trailing group is empty when the last prebin holds no samples and
    // its own boundary was retained; fold it into the bin on its left.
    if raw_counts[n_bins - 1] == 0 {
        retained.pop();
    }

    let mut totals = vec![ClassTotals::default(); retained.len() + 1];
    for (&value, &target) in clean_x.iter().zip(clean_y) {
        totals[bin_index(&retained, value)].add(target, weights);
    }
    let prebins = totals
        .iter()
        .map(|t| PrebinStats::new(t.n_event, t.n_nonevent))
        .collect();
    (retained, prebins)
}
