//! Value transformation
//!
//! Routes raw samples to fitted bins and maps them to a per-bin metric.
//! Routing order is fixed: NaN is missing, exact special-code matches are
//! special, everything else falls to a final bin through binary search over
//! the split points. Out-of-range values land in the outer bins, so transform
//! accepts inputs the fit never saw, infinities included.

use std::fmt;
use std::str::FromStr;

use rayon::prelude::*;
use serde::Serialize;

use crate::binning::stats::bin_index;

/// Sample counts above which transforms fan out across threads.
pub(crate) const PAR_THRESHOLD: usize = 8192;

/// Output metric of a transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Metric {
    /// Weight of Evidence of the assigned bin.
    #[default]
    Woe,
    /// Event rate of the assigned bin.
    EventRate,
    /// Zero-based bin index; specials and missing follow the final bins.
    Index,
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::Woe => write!(f, "woe"),
            Metric::EventRate => write!(f, "event_rate"),
            Metric::Index => write!(f, "index"),
        }
    }
}

impl FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "woe" => Ok(Metric::Woe),
            "event_rate" => Ok(Metric::EventRate),
            "index" => Ok(Metric::Index),
            _ => Err(format!(
                "Unknown metric: '{s}'. Use 'woe', 'event_rate' or 'index'"
            )),
        }
    }
}

/// Where a raw sample lands in a fitted numerical binning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinLocation {
    Bin(usize),
    Special,
    Missing,
}

pub(crate) fn locate(value: f64, splits: &[f64], special_codes: &[f64]) -> BinLocation {
    if value.is_nan() {
        BinLocation::Missing
    } else if special_codes.contains(&value) {
        BinLocation::Special
    } else {
        BinLocation::Bin(bin_index(splits, value))
    }
}

/// Apply `op` to every sample, in parallel above the threshold.
pub(crate) fn map_samples<T, F>(x: &[f64], op: F) -> Vec<T>
where
    T: Send,
    F: Fn(f64) -> T + Sync,
{
    if x.len() > PAR_THRESHOLD {
        x.par_iter().map(|&value| op(value)).collect()
    } else {
        x.iter().map(|&value| op(value)).collect()
    }
}
