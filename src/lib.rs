//! woebin: optimal binning for scorecard features
//!
//! Bins a numerical or categorical variable against a binary target by
//! prebinning, solving a maximum-IV merge-selection problem under
//! monotonicity and size constraints, then exposing Weight-of-Evidence
//! transforms and the binning table.
//!
//! ```
//! use woebin::{Metric, OptimalBinning};
//!
//! # fn main() -> woebin::Result<()> {
//! let x: Vec<f64> = (0..200).map(|i| i as f64).collect();
//! let y: Vec<u8> = (0..200).map(|i| u8::from(i >= 120)).collect();
//!
//! let mut binning = OptimalBinning::default();
//! binning.fit(&x, &y)?;
//! let woe = binning.transform(&x, Metric::Woe)?;
//! assert_eq!(woe.len(), x.len());
//! # Ok(())
//! # }
//! ```

pub mod binning;
pub mod error;
pub mod report;
pub mod solver;

pub use binning::config::{
    BinningConfig, ClassWeight, PrebinningMethod, PvaluePolicy, VariableDtype,
};
pub use binning::table::{Bin, BinningTable};
pub use binning::{Metric, OptimalBinning};
pub use error::{BinningError, Result};
pub use report::FitSummary;
pub use solver::{FitStatus, MipSolverKind, MonotonicTrend, SolverKind};
