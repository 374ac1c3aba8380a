//! Binning configuration
//!
//! Typed options with domain validation, plus a permissive raw layer for
//! JSON ingestion. The raw layer accepts loosely-typed values (enums as
//! strings, counts as JSON numbers) and converts them into the typed
//! configuration, distinguishing type errors (wrong JSON shape) from value
//! errors (right shape, out-of-domain value).

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{self, BinningError, Result};
use crate::solver::{MipSolverKind, MonotonicTrend, SolverKind};

/// Kind of variable being binned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum VariableDtype {
    #[default]
    Numerical,
    Categorical,
}

impl fmt::Display for VariableDtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariableDtype::Numerical => write!(f, "numerical"),
            VariableDtype::Categorical => write!(f, "categorical"),
        }
    }
}

impl FromStr for VariableDtype {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "numerical" => Ok(VariableDtype::Numerical),
            "categorical" => Ok(VariableDtype::Categorical),
            _ => Err(format!(
                "Unknown dtype: '{s}'. Use 'numerical' or 'categorical'"
            )),
        }
    }
}

/// Strategy used to generate candidate splits before optimisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum PrebinningMethod {
    /// Best-first decision-tree splitting on Gini impurity.
    #[default]
    Cart,
    /// Equal-frequency splits.
    Quantile,
    /// Equal-width splits.
    Uniform,
}

impl fmt::Display for PrebinningMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrebinningMethod::Cart => write!(f, "cart"),
            PrebinningMethod::Quantile => write!(f, "quantile"),
            PrebinningMethod::Uniform => write!(f, "uniform"),
        }
    }
}

impl FromStr for PrebinningMethod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cart" => Ok(PrebinningMethod::Cart),
            "quantile" => Ok(PrebinningMethod::Quantile),
            "uniform" => Ok(PrebinningMethod::Uniform),
            _ => Err(format!(
                "Unknown prebinning method: '{s}'. Use 'cart', 'quantile' or 'uniform'"
            )),
        }
    }
}

/// How the p-value merge pass picks candidate pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum PvaluePolicy {
    /// Test adjacent bins only, merging the weakest pair each round.
    #[default]
    Consecutive,
    /// Test all bin pairs against a frozen snapshot, merging adjacent
    /// failures in descending p-value order.
    All,
}

impl fmt::Display for PvaluePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PvaluePolicy::Consecutive => write!(f, "consecutive"),
            PvaluePolicy::All => write!(f, "all"),
        }
    }
}

impl FromStr for PvaluePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "consecutive" => Ok(PvaluePolicy::Consecutive),
            "all" => Ok(PvaluePolicy::All),
            _ => Err(format!(
                "Unknown p-value policy: '{s}'. Use 'consecutive' or 'all'"
            )),
        }
    }
}

/// Class weighting applied to event/non-event counts.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub enum ClassWeight {
    /// Unit weights.
    #[default]
    None,
    /// `n_samples / (n_classes * n_class)` per class.
    Balanced,
    /// Explicit multipliers for non-events and events.
    Custom { w_nonevent: f64, w_event: f64 },
}

/// Options controlling a single binning fit.
///
/// Construct with `Default::default()` and override fields, or parse a JSON
/// document through [`BinningConfig::from_json`]. `validate` runs when the
/// configuration enters an `OptimalBinning`, so invalid combinations surface
/// before any data work.
#[derive(Debug, Clone, Serialize)]
pub struct BinningConfig {
    /// Variable name used in reports.
    pub name: String,
    /// Variable kind.
    pub dtype: VariableDtype,
    /// Candidate-split generation strategy.
    pub prebinning_method: PrebinningMethod,
    /// Optimisation backend.
    pub solver: SolverKind,
    /// LP/MIP backend when `solver` is `mip`.
    pub mip_solver: MipSolverKind,
    /// Maximum number of prebins to generate.
    pub max_n_prebins: usize,
    /// Minimum fraction of clean samples per prebin.
    pub min_prebin_size: f64,
    /// Minimum number of final bins.
    pub min_n_bins: Option<usize>,
    /// Maximum number of final bins.
    pub max_n_bins: Option<usize>,
    /// Minimum fraction of clean samples per final bin.
    pub min_bin_size: Option<f64>,
    /// Maximum fraction of clean samples per final bin.
    pub max_bin_size: Option<f64>,
    /// Minimum events per final bin.
    pub min_bin_n_event: Option<usize>,
    /// Maximum events per final bin.
    pub max_bin_n_event: Option<usize>,
    /// Minimum non-events per final bin.
    pub min_bin_n_nonevent: Option<usize>,
    /// Maximum non-events per final bin.
    pub max_bin_n_nonevent: Option<usize>,
    /// Event-rate trend imposed across bins.
    pub monotonic_trend: MonotonicTrend,
    /// Minimum event-rate gap between consecutive bins.
    pub min_event_rate_diff: f64,
    /// Chi-square p-value threshold for the merge pass.
    pub max_pvalue: Option<f64>,
    /// Pair-selection policy for the p-value merge pass.
    pub max_pvalue_policy: PvaluePolicy,
    /// Minimum category frequency before lumping into the "other" group.
    pub cat_cutoff: Option<f64>,
    /// Fixed split points, bypassing prebinning.
    pub user_splits: Option<Vec<f64>>,
    /// Values routed to the special bin.
    pub special_codes: Vec<f64>,
    /// Decimal digits to round split points to.
    pub split_digits: Option<u8>,
    /// Class weighting.
    pub class_weight: ClassWeight,
    /// Solver wall-clock budget in seconds. Zero disables the limit.
    pub time_limit: f64,
    /// Print fit progress to the terminal.
    pub verbose: bool,
}

impl Default for BinningConfig {
    fn default() -> Self {
        BinningConfig {
            name: String::new(),
            dtype: VariableDtype::default(),
            prebinning_method: PrebinningMethod::default(),
            solver: SolverKind::default(),
            mip_solver: MipSolverKind::default(),
            max_n_prebins: 20,
            min_prebin_size: 0.05,
            min_n_bins: None,
            max_n_bins: None,
            min_bin_size: None,
            max_bin_size: None,
            min_bin_n_event: None,
            max_bin_n_event: None,
            min_bin_n_nonevent: None,
            max_bin_n_nonevent: None,
            monotonic_trend: MonotonicTrend::default(),
            min_event_rate_diff: 0.0,
            max_pvalue: None,
            max_pvalue_policy: PvaluePolicy::default(),
            cat_cutoff: None,
            user_splits: None,
            special_codes: Vec::new(),
            split_digits: None,
            class_weight: ClassWeight::default(),
            time_limit: 100.0,
            verbose: false,
        }
    }
}

impl BinningConfig {
    /// Parse a JSON options document.
    ///
    /// Malformed JSON, unknown keys and wrong value shapes report a type
    /// error; well-shaped but out-of-domain values report a value error.
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: RawBinningConfig =
            serde_json::from_str(json).map_err(|e| BinningError::ConfigType(e.to_string()))?;
        raw.into_config()
    }

    /// Check every option against its domain.
    pub fn validate(&self) -> Result<()> {
        if self.max_n_prebins < 2 {
            return Err(error::value(
                "max_n_prebins",
                format!("must be at least 2, got {}", self.max_n_prebins),
            ));
        }
        if !(self.min_prebin_size > 0.0 && self.min_prebin_size <= 0.5) {
            return Err(error::value(
                "min_prebin_size",
                format!("must be in (0, 0.5], got {}", self.min_prebin_size),
            ));
        }
        if let Some(min) = self.min_n_bins {
            if min < 1 {
                return Err(error::value("min_n_bins", "must be at least 1"));
            }
        }
        if let Some(max) = self.max_n_bins {
            if max < 1 {
                return Err(error::value("max_n_bins", "must be at least 1"));
            }
        }
        if let (Some(min), Some(max)) = (self.min_n_bins, self.max_n_bins) {
            if min > max {
                return Err(error::value(
                    "min_n_bins",
                    format!("must not exceed max_n_bins ({min} > {max})"),
                ));
            }
        }
        if let Some(size) = self.min_bin_size {
            if !(size > 0.0 && size <= 0.5) {
                return Err(error::value(
                    "min_bin_size",
                    format!("must be in (0, 0.5], got {size}"),
                ));
            }
        }
        if let Some(size) = self.max_bin_size {
            if !(size > 0.0 && size <= 1.0) {
                return Err(error::value(
                    "max_bin_size",
                    format!("must be in (0, 1], got {size}"),
                ));
            }
        }
        if let (Some(min), Some(max)) = (self.min_bin_size, self.max_bin_size) {
            if min > max {
                return Err(error::value(
                    "min_bin_size",
                    format!("must not exceed max_bin_size ({min} > {max})"),
                ));
            }
        }
        if let (Some(min), Some(max)) = (self.min_bin_n_event, self.max_bin_n_event) {
            if min > max {
                return Err(error::value(
                    "min_bin_n_event",
                    format!("must not exceed max_bin_n_event ({min} > {max})"),
                ));
            }
        }
        if let (Some(min), Some(max)) = (self.min_bin_n_nonevent, self.max_bin_n_nonevent) {
            if min > max {
                return Err(error::value(
                    "min_bin_n_nonevent",
                    format!("must not exceed max_bin_n_nonevent ({min} > {max})"),
                ));
            }
        }
        if !(0.0..=1.0).contains(&self.min_event_rate_diff) {
            return Err(error::value(
                "min_event_rate_diff",
                format!("must be in [0, 1], got {}", self.min_event_rate_diff),
            ));
        }
        if let Some(pvalue) = self.max_pvalue {
            if !(pvalue > 0.0 && pvalue <= 1.0) {
                return Err(error::value(
                    "max_pvalue",
                    format!("must be in (0, 1], got {pvalue}"),
                ));
            }
        }
        if let Some(cutoff) = self.cat_cutoff {
            if !(cutoff > 0.0 && cutoff <= 1.0) {
                return Err(error::value(
                    "cat_cutoff",
                    format!("must be in (0, 1], got {cutoff}"),
                ));
            }
        }
        if let Some(digits) = self.split_digits {
            if digits > 8 {
                return Err(error::value(
                    "split_digits",
                    format!("must be between 0 and 8, got {digits}"),
                ));
            }
        }
        if !(self.time_limit.is_finite() && self.time_limit >= 0.0) {
            return Err(error::value(
                "time_limit",
                format!("must be a non-negative finite number, got {}", self.time_limit),
            ));
        }
        if let Some(splits) = &self.user_splits {
            if self.dtype == VariableDtype::Categorical {
                return Err(error::value(
                    "user_splits",
                    "only supported for numerical variables",
                ));
            }
            if splits.is_empty() {
                return Err(error::value("user_splits", "must not be empty"));
            }
            if splits.iter().any(|s| !s.is_finite()) {
                return Err(error::value("user_splits", "splits must be finite"));
            }
            if splits.windows(2).any(|w| w[1] <= w[0]) {
                return Err(error::value(
                    "user_splits",
                    "splits must be strictly increasing",
                ));
            }
        }
        if !self.special_codes.is_empty() {
            if self.dtype == VariableDtype::Categorical {
                return Err(error::value(
                    "special_codes",
                    "only supported for numerical variables",
                ));
            }
            if self.special_codes.iter().any(|c| c.is_nan()) {
                return Err(error::value("special_codes", "codes must not be NaN"));
            }
        }
        if let ClassWeight::Custom { w_nonevent, w_event } = self.class_weight {
            if !(w_nonevent.is_finite() && w_nonevent > 0.0)
                || !(w_event.is_finite() && w_event > 0.0)
            {
                return Err(error::value(
                    "class_weight",
                    format!("weights must be positive, got 0: {w_nonevent}, 1: {w_event}"),
                ));
            }
        }
        Ok(())
    }
}

/// Loosely-typed configuration as it arrives from JSON.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RawBinningConfig {
    pub name: String,
    pub dtype: String,
    pub prebinning_method: String,
    pub solver: String,
    pub mip_solver: String,
    pub max_n_prebins: Option<f64>,
    pub min_prebin_size: Option<f64>,
    pub min_n_bins: Option<f64>,
    pub max_n_bins: Option<f64>,
    pub min_bin_size: Option<f64>,
    pub max_bin_size: Option<f64>,
    pub min_bin_n_event: Option<f64>,
    pub max_bin_n_event: Option<f64>,
    pub min_bin_n_nonevent: Option<f64>,
    pub max_bin_n_nonevent: Option<f64>,
    pub monotonic_trend: String,
    pub min_event_rate_diff: Option<f64>,
    pub max_pvalue: Option<f64>,
    pub max_pvalue_policy: String,
    pub cat_cutoff: Option<f64>,
    pub user_splits: Option<Vec<f64>>,
    pub special_codes: Vec<f64>,
    pub split_digits: Option<f64>,
    pub class_weight: Option<RawClassWeight>,
    pub time_limit: Option<f64>,
    pub verbose: bool,
}

impl Default for RawBinningConfig {
    fn default() -> Self {
        RawBinningConfig {
            name: String::new(),
            dtype: "numerical".to_string(),
            prebinning_method: "cart".to_string(),
            solver: "cp".to_string(),
            mip_solver: "highs".to_string(),
            max_n_prebins: None,
            min_prebin_size: None,
            min_n_bins: None,
            max_n_bins: None,
            min_bin_size: None,
            max_bin_size: None,
            min_bin_n_event: None,
            max_bin_n_event: None,
            min_bin_n_nonevent: None,
            max_bin_n_nonevent: None,
            monotonic_trend: "auto".to_string(),
            min_event_rate_diff: None,
            max_pvalue: None,
            max_pvalue_policy: "consecutive".to_string(),
            cat_cutoff: None,
            user_splits: None,
            special_codes: Vec::new(),
            split_digits: None,
            class_weight: None,
            time_limit: None,
            verbose: false,
        }
    }
}

/// Class weight as it arrives from JSON: a preset name or an explicit map.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawClassWeight {
    Name(String),
    Weights(BTreeMap<String, f64>),
}

impl RawBinningConfig {
    /// Convert into the typed configuration and validate it.
    pub fn into_config(self) -> Result<BinningConfig> {
        let class_weight = match self.class_weight {
            None => ClassWeight::None,
            Some(RawClassWeight::Name(name)) => match name.to_lowercase().as_str() {
                "balanced" => ClassWeight::Balanced,
                other => {
                    return Err(error::value(
                        "class_weight",
                        format!(
                            "Unknown class weight: '{other}'. Use 'balanced' or a \
                             {{\"0\": w, \"1\": w}} map"
                        ),
                    ))
                }
            },
            Some(RawClassWeight::Weights(map)) => {
                for key in map.keys() {
                    if key != "0" && key != "1" {
                        return Err(error::value(
                            "class_weight",
                            format!("weight keys must be '0' or '1', got '{key}'"),
                        ));
                    }
                }
                ClassWeight::Custom {
                    w_nonevent: map.get("0").copied().unwrap_or(1.0),
                    w_event: map.get("1").copied().unwrap_or(1.0),
                }
            }
        };

        let split_digits = match to_count("split_digits", self.split_digits)? {
            Some(digits) if digits <= 8 => Some(digits as u8),
            Some(digits) => {
                return Err(error::value(
                    "split_digits",
                    format!("must be between 0 and 8, got {digits}"),
                ))
            }
            None => None,
        };

        let config = BinningConfig {
            name: self.name,
            dtype: parse_option("dtype", &self.dtype)?,
            prebinning_method: parse_option("prebinning_method", &self.prebinning_method)?,
            solver: parse_option("solver", &self.solver)?,
            mip_solver: parse_option("mip_solver", &self.mip_solver)?,
            max_n_prebins: to_count("max_n_prebins", self.max_n_prebins)?.unwrap_or(20),
            min_prebin_size: self.min_prebin_size.unwrap_or(0.05),
            min_n_bins: to_count("min_n_bins", self.min_n_bins)?,
            max_n_bins: to_count("max_n_bins", self.max_n_bins)?,
            min_bin_size: self.min_bin_size,
            max_bin_size: self.max_bin_size,
            min_bin_n_event: to_count("min_bin_n_event", self.min_bin_n_event)?,
            max_bin_n_event: to_count("max_bin_n_event", self.max_bin_n_event)?,
            min_bin_n_nonevent: to_count("min_bin_n_nonevent", self.min_bin_n_nonevent)?,
            max_bin_n_nonevent: to_count("max_bin_n_nonevent", self.max_bin_n_nonevent)?,
            monotonic_trend: parse_option("monotonic_trend", &self.monotonic_trend)?,
            min_event_rate_diff: self.min_event_rate_diff.unwrap_or(0.0),
            max_pvalue: self.max_pvalue,
            max_pvalue_policy: parse_option("max_pvalue_policy", &self.max_pvalue_policy)?,
            cat_cutoff: self.cat_cutoff,
            user_splits: self.user_splits,
            special_codes: self.special_codes,
            split_digits,
            class_weight,
            time_limit: self.time_limit.unwrap_or(100.0),
            verbose: self.verbose,
        };
        config.validate()?;
        Ok(config)
    }
}

fn parse_option<T: FromStr<Err = String>>(param: &'static str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|reason| BinningError::ConfigValue { param, reason })
}

/// Convert a JSON number into a count, rejecting fractions and signs.
fn to_count(param: &'static str, value: Option<f64>) -> Result<Option<usize>> {
    match value {
        None => Ok(None),
        Some(v) if v >= 0.0 && v.fract() == 0.0 && v <= usize::MAX as f64 => Ok(Some(v as usize)),
        Some(v) => Err(error::value(
            param,
            format!("must be a non-negative integer, got {v}"),
        )),
    }
}
