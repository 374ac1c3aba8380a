//! Candidate split generation
//!
//! Produces the fine-grained splits the optimiser merges. The default is a
//! best-first decision tree on Gini impurity: the leaf with the largest
//! impurity decrease splits first, until the prebin budget is reached or no
//! admissible split remains. Equal-frequency and equal-width generators are
//! available as cheaper alternatives. All split points fall on midpoints
//! between adjacent distinct values, so membership is stable under the
//! right-open bin convention.

use crate::binning::config::PrebinningMethod;

/// Tie margin when comparing impurity gains. Keeps the first candidate on
/// effectively equal gains, which makes split search deterministic.
const GAIN_EPS: f64 = 1e-10;

/// Generate candidate splits for clean samples.
pub(crate) fn compute_splits(
    method: PrebinningMethod,
    clean_x: &[f64],
    clean_y: &[u8],
    max_n_prebins: usize,
    min_prebin_size: f64,
    weights: (f64, f64),
) -> Vec<f64> {
    match method {
        PrebinningMethod::Cart => {
            cart_splits(clean_x, clean_y, max_n_prebins, min_prebin_size, weights)
        }
        PrebinningMethod::Quantile => quantile_splits(clean_x, max_n_prebins),
        PrebinningMethod::Uniform => uniform_splits(clean_x, max_n_prebins),
    }
}

/// Splits between consecutive ordinal codes `0..n_levels`.
pub(crate) fn level_splits(n_levels: usize) -> Vec<f64> {
    (1..n_levels).map(|i| i as f64 - 0.5).collect()
}

struct Leaf {
    /// Index range into the sorted samples.
    start: usize,
    end: usize,
    best: Option<SplitCandidate>,
}

struct SplitCandidate {
    /// Index of the first right-hand sample.
    position: usize,
    /// Midpoint between the straddling values.
    value: f64,
    gain: f64,
}

/// Best-first tree growth on Gini impurity.
fn cart_splits(
    clean_x: &[f64],
    clean_y: &[u8],
    max_n_prebins: usize,
    min_prebin_size: f64,
    weights: (f64, f64),
) -> Vec<f64> {
    let n = clean_x.len();
    if n < 2 {
        return Vec::new();
    }
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_unstable_by(|&a, &b| clean_x[a].total_cmp(&clean_x[b]));
    let sorted_x: Vec<f64> = order.iter().map(|&i| clean_x[i]).collect();
    let sorted_y: Vec<u8> = order.iter().map(|&i| clean_y[i]).collect();

    // Leaf-size floor in raw samples, at least one per side.
    let min_samples = ((min_prebin_size * n as f64).ceil() as usize).max(1);

    let mut leaves = vec![Leaf {
        start: 0,
        end: n,
        best: best_split(&sorted_x, &sorted_y, 0, n, min_samples, weights),
    }];
    let mut splits = Vec::new();
    while leaves.len() < max_n_prebins {
        let candidate = leaves
            .iter()
            .enumerate()
            .filter_map(|(i, leaf)| leaf.best.as_ref().map(|best| (i, best.gain)))
            // Strictly-greater comparison keeps the earliest leaf on ties.
            .fold(None, |acc: Option<(usize, f64)>, (i, gain)| match acc {
                Some((_, best_gain)) if gain <= best_gain + GAIN_EPS => acc,
                _ => Some((i, gain)),
            });
        let Some((index, _)) = candidate else {
            break;
        };
        let leaf = leaves.swap_remove(index);
        let Some(best) = leaf.best else {
            break;
        };
        splits.push(best.value);
        let position = best.position;
        leaves.push(Leaf {
            start: leaf.start,
            end: position,
            best: best_split(&sorted_x, &sorted_y, leaf.start, position, min_samples, weights),
        });
        leaves.push(Leaf {
            start: position,
            end: leaf.end,
            best: best_split(&sorted_x, &sorted_y, position, leaf.end, min_samples, weights),
        });
    }
    splits.sort_unstable_by(f64::total_cmp);
    splits
}

/// Best admissible split inside `start..end` of the sorted samples.
fn best_split(
    sorted_x: &[f64],
    sorted_y: &[u8],
    start: usize,
    end: usize,
    min_samples: usize,
    weights: (f64, f64),
) -> Option<SplitCandidate> {
    let len = end - start;
    if len < 2 * min_samples {
        return None;
    }
    let (w_nonevent, w_event) = weights;
    let total_event: f64 = sorted_y[start..end]
        .iter()
        .map(|&y| if y == 1 { w_event } else { 0.0 })
        .sum();
    let total_nonevent: f64 = sorted_y[start..end]
        .iter()
        .map(|&y| if y == 0 { w_nonevent } else { 0.0 })
        .sum();
    let total = total_event + total_nonevent;
    let parent = gini(total_event, total);

    let mut left_event = 0.0;
    let mut left_nonevent = 0.0;
    let mut best: Option<SplitCandidate> = None;
    for position in (start + 1)..end {
        let y = sorted_y[position - 1];
        if y == 1 {
            left_event += w_event;
        } else {
            left_nonevent += w_nonevent;
        }
        // Only boundaries between distinct values are valid split points.
        if sorted_x[position] <= sorted_x[position - 1] {
            continue;
        }
        let left_size = position - start;
        let right_size = end - position;
        if left_size < min_samples || right_size < min_samples {
            continue;
        }
        let left_total = left_event + left_nonevent;
        let right_event = total_event - left_event;
        let right_total = total - left_total;
        let gain = parent
            - (left_total / total) * gini(left_event, left_total)
            - (right_total / total) * gini(right_event, right_total);
        if gain > GAIN_EPS
            && best.as_ref().is_none_or(|b| gain > b.gain + GAIN_EPS)
        {
            best = Some(SplitCandidate {
                position,
                value: (sorted_x[position - 1] + sorted_x[position]) / 2.0,
                gain,
            });
        }
    }
    best
}

fn gini(events: f64, total: f64) -> f64 {
    if total <= 0.0 {
        return 0.0;
    }
    let p = events / total;
    1.0 - p * p - (1.0 - p) * (1.0 - p)
}

/// Equal-frequency splits with linear interpolation between order statistics.
fn quantile_splits(clean_x: &[f64], max_n_prebins: usize) -> Vec<f64> {
    let n = clean_x.len();
    if n < 2 {
        return Vec::new();
    }
    let mut sorted = clean_x.to_vec();
    sorted.sort_unstable_by(f64::total_cmp);
    let mut splits = Vec::new();
    for i in 1..max_n_prebins {
        let h = (n - 1) as f64 * i as f64 / max_n_prebins as f64;
        let lo = h.floor() as usize;
        let frac = h - lo as f64;
        let value = if lo + 1 < n {
            sorted[lo] + frac * (sorted[lo + 1] - sorted[lo])
        } else {
            sorted[lo]
        };
        // Heavy ties collapse neighbouring quantiles; keep each edge once.
        if splits.last().is_none_or(|&last| value > last) {
            splits.push(value);
        }
    }
    // A split at the minimum or maximum would leave an empty outer bin.
    splits.retain(|&s| s > sorted[0] && s <= sorted[n - 1]);
    splits
}

/// Equal-width splits across the observed range.
fn uniform_splits(clean_x: &[f64], max_n_prebins: usize) -> Vec<f64> {
    let Some(&first) = clean_x.first() else {
        return Vec::new();
    };
    let (min, max) = clean_x.iter().fold((first, first), |(lo, hi), &v| {
        (lo.min(v), hi.max(v))
    });
    if max <= min {
        return Vec::new();
    }
    let width = (max - min) / max_n_prebins as f64;
    (1..max_n_prebins)
        .map(|i| min + width * i as f64)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two well-separated clusters with opposite event rates.
    fn clustered_samples() -> (Vec<f64>, Vec<u8>) {
        let mut x = Vec::new();
        let mut y = Vec::new();
        for i in 0..50 {
            x.push(i as f64 * 0.1);
            y.push(u8::from(i % 10 == 0));
        }
        for i in 0..50 {
            x.push(10.0 + i as f64 * 0.1);
            y.push(u8::from(i % 10 != 0));
        }
        (x, y)
    }

    #[test]
    fn test_cart_separates_clusters() {
        let (x, y) = clustered_samples();
        let splits = compute_splits(PrebinningMethod::Cart, &x, &y, 20, 0.05, (1.0, 1.0));
        assert!(!splits.is_empty());
        // The dominant boundary lies in the gap between the clusters.
        assert!(splits.iter().any(|&s| s > 4.9 && s < 10.0));
        let mut sorted = splits.clone();
        sorted.sort_unstable_by(f64::total_cmp);
        assert_eq!(splits, sorted);
    }

    #[test]
    fn test_cart_respects_prebin_budget() {
        let (x, y) = clustered_samples();
        let splits = compute_splits(PrebinningMethod::Cart, &x, &y, 4, 0.05, (1.0, 1.0));
        assert!(splits.len() <= 3);
    }

    #[test]
    fn test_cart_min_size_blocks_small_leaves() {
        let (x, y) = clustered_samples();
        // Half the samples per leaf allows a single split at most.
        let splits = compute_splits(PrebinningMethod::Cart, &x, &y, 20, 0.5, (1.0, 1.0));
        assert!(splits.len() <= 1);
    }

    #[test]
    fn test_cart_is_deterministic() {
        let (x, y) = clustered_samples();
        let first = compute_splits(PrebinningMethod::Cart, &x, &y, 8, 0.05, (1.0, 1.0));
        let second = compute_splits(PrebinningMethod::Cart, &x, &y, 8, 0.05, (1.0, 1.0));
        assert_eq!(first, second);
    }

    #[test]
    fn test_cart_constant_feature_yields_no_splits() {
        let x = vec![3.0; 40];
        let y: Vec<u8> = (0..40).map(|i| u8::from(i % 2 == 0)).collect();
        assert!(compute_splits(PrebinningMethod::Cart, &x, &y, 10, 0.05, (1.0, 1.0)).is_empty());
    }

    #[test]
    fn test_quantile_splits_balance_mass() {
        let x: Vec<f64> = (0..100).map(|i| i as f64).collect();
        let y = vec![0u8; 100];
        let splits = compute_splits(PrebinningMethod::Quantile, &x, &y, 4, 0.05, (1.0, 1.0));
        assert_eq!(splits.len(), 3);
        assert!((splits[1] - 49.5).abs() < 1e-9);
    }

    #[test]
    fn test_quantile_collapses_heavy_ties() {
        let mut x = vec![1.0; 90];
        x.extend([2.0; 10]);
        let y = vec![0u8; 100];
        let splits = compute_splits(PrebinningMethod::Quantile, &x, &y, 10, 0.05, (1.0, 1.0));
        // All interior quantiles of the constant mass collapse to one edge.
        assert!(splits.len() <= 2);
        assert!(splits.iter().all(|&s| s > 1.0 && s <= 2.0));
    }

    #[test]
    fn test_uniform_splits_equal_width() {
        let x = vec![0.0, 10.0];
        let y = vec![0u8, 1];
        let splits = compute_splits(PrebinningMethod::Uniform, &x, &y, 5, 0.05, (1.0, 1.0));
        assert_eq!(splits, vec![2.0, 4.0, 6.0, 8.0]);
    }

    #[test]
    fn test_level_splits_fall_between_codes() {
        assert_eq!(level_splits(4), vec![0.5, 1.5, 2.5]);
        assert!(level_splits(1).is_empty());
    }
}
