//! Monotonic trend constraints on final-bin event rates
//!
//! A trend constrains the shape of the event-rate sequence across the ordered
//! final bins, which is what makes the fitted Weight of Evidence usable in
//! scorecards and defensible to regulators.

use serde::Serialize;

/// Tolerance for event-rate comparisons. Rates are quotients of weighted
/// counts, so adjacent runs built from the same prefix sums agree to well
/// below this.
pub(crate) const RATE_EPS: f64 = 1e-12;

/// Shape constraint for the event-rate sequence across final bins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum MonotonicTrend {
    /// No shape constraint; rates can vary freely.
    None,
    /// Event rate must not decrease with the feature value.
    Ascending,
    /// Event rate must not increase with the feature value.
    Descending,
    /// Second differences of the rate sequence are non-negative.
    Convex,
    /// Second differences of the rate sequence are non-positive.
    Concave,
    /// Rates rise to an apex, then fall.
    Peak,
    /// Rates fall to a trough, then rise.
    Valley,
    /// Infer ascending or descending from the unconstrained prebin trend.
    #[default]
    Auto,
}

impl MonotonicTrend {
    /// True when the trend needs a change-point anchor from the prebin rates.
    pub(crate) fn needs_anchor(self) -> bool {
        matches!(self, MonotonicTrend::Peak | MonotonicTrend::Valley)
    }

    /// Resolve `Auto` against the observed prebin rate sequence.
    ///
    /// The sign of the count-weighted least-squares slope of event rate on
    /// prebin position decides between ascending and descending; ties fall to
    /// ascending. Non-auto trends pass through unchanged.
    pub fn resolve_auto(self, rates: &[f64], counts: &[f64]) -> MonotonicTrend {
        if self != MonotonicTrend::Auto {
            return self;
        }
        if weighted_slope(rates, counts) >= 0.0 {
            MonotonicTrend::Ascending
        } else {
            MonotonicTrend::Descending
        }
    }

    /// Change-point anchor for peak/valley: the prebin holding the extreme
    /// rate (first occurrence on ties).
    pub(crate) fn anchor(self, rates: &[f64]) -> Option<usize> {
        match self {
            MonotonicTrend::Peak => argextreme(rates, |a, b| a > b),
            MonotonicTrend::Valley => argextreme(rates, |a, b| a < b),
            _ => None,
        }
    }

    /// Whether two adjacent bins with rates `prev` then `next`, sharing the
    /// prebin boundary `boundary`, respect this trend.
    pub(crate) fn pair_ok(self, prev: f64, next: f64, boundary: usize, anchor: Option<usize>) -> bool {
        match self {
            MonotonicTrend::None | MonotonicTrend::Convex | MonotonicTrend::Concave => true,
            MonotonicTrend::Ascending => next >= prev - RATE_EPS,
            MonotonicTrend::Descending => next <= prev + RATE_EPS,
            MonotonicTrend::Peak => match anchor {
                Some(t) if boundary < t => next >= prev - RATE_EPS,
                _ => next <= prev + RATE_EPS,
            },
            MonotonicTrend::Valley => match anchor {
                Some(t) if boundary < t => next <= prev + RATE_EPS,
                _ => next >= prev - RATE_EPS,
            },
            // Auto is resolved before any pair is tested.
            MonotonicTrend::Auto => true,
        }
    }

    /// Whether three consecutive bin rates respect a curvature trend.
    pub(crate) fn triple_ok(self, first: f64, mid: f64, last: f64) -> bool {
        match self {
            MonotonicTrend::Convex => (last - mid) - (mid - first) >= -RATE_EPS,
            MonotonicTrend::Concave => (last - mid) - (mid - first) <= RATE_EPS,
            _ => true,
        }
    }

    /// Validate a complete rate sequence against this trend. Used to re-check
    /// tables after boundary rounding.
    pub(crate) fn sequence_ok(self, rates: &[f64], anchors_from: &[f64]) -> bool {
        if rates.len() < 2 {
            return true;
        }
        let anchor = self.anchor(anchors_from);
        let pairs = rates.windows(2).enumerate().all(|(b, w)| {
            self.pair_ok(w[0], w[1], b, anchor)
        });
        let triples = rates
            .windows(3)
            .all(|w| self.triple_ok(w[0], w[1], w[2]));
        pairs && triples
    }
}

/// Count-weighted least-squares slope of `rates` against position.
fn weighted_slope(rates: &[f64], counts: &[f64]) -> f64 {
    let total: f64 = counts.iter().sum();
    if rates.len() < 2 || total <= 0.0 {
        return 0.0;
    }
    let mean_x: f64 = counts
        .iter()
        .enumerate()
        .map(|(i, w)| i as f64 * w)
        .sum::<f64>()
        / total;
    let mean_y: f64 = rates.iter().zip(counts).map(|(r, w)| r * w).sum::<f64>() / total;
    let mut num = 0.0;
    let mut den = 0.0;
    for (i, (r, w)) in rates.iter().zip(counts).enumerate() {
        let dx = i as f64 - mean_x;
        num += w * dx * (r - mean_y);
        den += w * dx * dx;
    }
    if den > 0.0 {
        num / den
    } else {
        0.0
    }
}

fn argextreme(values: &[f64], better: impl Fn(f64, f64) -> bool) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in values.iter().enumerate() {
        match best {
            None => best = Some((i, v)),
            Some((_, b)) if better(v, b) => best = Some((i, v)),
            _ => {}
        }
    }
    best.map(|(i, _)| i)
}

impl std::fmt::Display for MonotonicTrend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MonotonicTrend::None => write!(f, "none"),
            MonotonicTrend::Ascending => write!(f, "ascending"),
            MonotonicTrend::Descending => write!(f, "descending"),
            MonotonicTrend::Convex => write!(f, "convex"),
            MonotonicTrend::Concave => write!(f, "concave"),
            MonotonicTrend::Peak => write!(f, "peak"),
            MonotonicTrend::Valley => write!(f, "valley"),
            MonotonicTrend::Auto => write!(f, "auto"),
        }
    }
}

impl std::str::FromStr for MonotonicTrend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(MonotonicTrend::None),
            "ascending" | "asc" => Ok(MonotonicTrend::Ascending),
            "descending" | "desc" => Ok(MonotonicTrend::Descending),
            "convex" => Ok(MonotonicTrend::Convex),
            "concave" => Ok(MonotonicTrend::Concave),
            "peak" => Ok(MonotonicTrend::Peak),
            "valley" => Ok(MonotonicTrend::Valley),
            "auto" => Ok(MonotonicTrend::Auto),
            _ => Err(format!(
                "Unknown monotonic trend: '{}'. Use 'ascending', 'descending', 'convex', 'concave', 'peak', 'valley', 'auto', or 'none'.",
                s
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trend_from_str() {
        assert_eq!("none".parse::<MonotonicTrend>().unwrap(), MonotonicTrend::None);
        assert_eq!("ascending".parse::<MonotonicTrend>().unwrap(), MonotonicTrend::Ascending);
        assert_eq!("asc".parse::<MonotonicTrend>().unwrap(), MonotonicTrend::Ascending);
        assert_eq!("descending".parse::<MonotonicTrend>().unwrap(), MonotonicTrend::Descending);
        assert_eq!("convex".parse::<MonotonicTrend>().unwrap(), MonotonicTrend::Convex);
        assert_eq!("concave".parse::<MonotonicTrend>().unwrap(), MonotonicTrend::Concave);
        assert_eq!("peak".parse::<MonotonicTrend>().unwrap(), MonotonicTrend::Peak);
        assert_eq!("valley".parse::<MonotonicTrend>().unwrap(), MonotonicTrend::Valley);
        assert_eq!("auto".parse::<MonotonicTrend>().unwrap(), MonotonicTrend::Auto);
        assert!("sideways".parse::<MonotonicTrend>().is_err());
    }

    #[test]
    fn test_trend_display_round_trips() {
        for trend in [
            MonotonicTrend::None,
            MonotonicTrend::Ascending,
            MonotonicTrend::Descending,
            MonotonicTrend::Convex,
            MonotonicTrend::Concave,
            MonotonicTrend::Peak,
            MonotonicTrend::Valley,
            MonotonicTrend::Auto,
        ] {
            assert_eq!(trend.to_string().parse::<MonotonicTrend>().unwrap(), trend);
        }
    }

    #[test]
    fn test_auto_resolves_by_slope() {
        let counts = [10.0, 10.0, 10.0, 10.0];
        let rising = [0.1, 0.2, 0.4, 0.7];
        let falling = [0.7, 0.4, 0.2, 0.1];
        assert_eq!(
            MonotonicTrend::Auto.resolve_auto(&rising, &counts),
            MonotonicTrend::Ascending
        );
        assert_eq!(
            MonotonicTrend::Auto.resolve_auto(&falling, &counts),
            MonotonicTrend::Descending
        );
    }

    #[test]
    fn test_resolve_auto_leaves_explicit_trends() {
        let counts = [10.0, 10.0];
        let rates = [0.1, 0.9];
        assert_eq!(
            MonotonicTrend::Descending.resolve_auto(&rates, &counts),
            MonotonicTrend::Descending
        );
    }

    #[test]
    fn test_pair_ok_ascending() {
        let t = MonotonicTrend::Ascending;
        assert!(t.pair_ok(0.2, 0.4, 0, None));
        assert!(t.pair_ok(0.4, 0.4, 0, None));
        assert!(!t.pair_ok(0.4, 0.2, 0, None));
    }

    #[test]
    fn test_pair_ok_peak_switches_at_anchor() {
        let t = MonotonicTrend::Peak;
        // Anchor at prebin 3: boundaries before it ascend, after it descend.
        assert!(t.pair_ok(0.2, 0.5, 1, Some(3)));
        assert!(!t.pair_ok(0.5, 0.2, 1, Some(3)));
        assert!(t.pair_ok(0.5, 0.2, 4, Some(3)));
        assert!(!t.pair_ok(0.2, 0.5, 4, Some(3)));
    }

    #[test]
    fn test_triple_ok_curvature() {
        assert!(MonotonicTrend::Convex.triple_ok(0.5, 0.3, 0.4));
        assert!(!MonotonicTrend::Convex.triple_ok(0.1, 0.4, 0.5));
        assert!(MonotonicTrend::Concave.triple_ok(0.1, 0.4, 0.5));
        assert!(!MonotonicTrend::Concave.triple_ok(0.5, 0.3, 0.4));
    }

    #[test]
    fn test_sequence_ok_valley() {
        let rates = [0.6, 0.3, 0.1, 0.4, 0.8];
        assert!(MonotonicTrend::Valley.sequence_ok(&rates, &rates));
        assert!(!MonotonicTrend::Ascending.sequence_ok(&rates, &rates));
    }
}
