//! Error types for the binning engine
//!
//! Configuration problems split into two kinds: a type error for an option of
//! the wrong fundamental kind (reachable through the JSON boundary) and a
//! value error for an option of the right kind outside its valid domain.
//! Solver infeasibility and time-outs are NOT errors; they surface through
//! [`crate::FitStatus`] so the fitted table stays usable.

use thiserror::Error;

/// All failures the engine can report.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BinningError {
    /// An option had the wrong fundamental kind (e.g. a list where a
    /// class-weight mapping is required, an integer where a string is).
    #[error("invalid option type: {0}")]
    ConfigType(String),

    /// An option had the right kind but an out-of-domain value.
    #[error("invalid value for '{param}': {reason}")]
    ConfigValue { param: &'static str, reason: String },

    /// The sample arrays cannot be fitted or transformed as given.
    #[error("incompatible data: {0}")]
    Data(String),

    /// A query or transform was invoked before a successful fit.
    #[error("binning is not fitted; call fit before '{operation}'")]
    NotFitted { operation: &'static str },

    /// A solver backend failed in a way not expressible as a fit status.
    #[error("solver failure: {0}")]
    Solver(String),
}

pub(crate) fn value(param: &'static str, reason: impl Into<String>) -> BinningError {
    BinningError::ConfigValue {
        param,
        reason: reason.into(),
    }
}

pub(crate) fn data(reason: impl Into<String>) -> BinningError {
    BinningError::Data(reason.into())
}

impl BinningError {
    /// True for the type-mismatch kind.
    pub fn is_type_error(&self) -> bool {
        matches!(self, BinningError::ConfigType(_))
    }

    /// True for the value-domain kind (configuration or data).
    pub fn is_value_error(&self) -> bool {
        matches!(
            self,
            BinningError::ConfigValue { .. } | BinningError::Data(_)
        )
    }

    /// True when an operation ran before `fit`.
    pub fn is_not_fitted(&self) -> bool {
        matches!(self, BinningError::NotFitted { .. })
    }
}

/// Convenience alias used across the crate.
pub type Result<T, E = BinningError> = std::result::Result<T, E>;
