//! Optimal merge selection
//!
//! Turns prebin statistics into the final bin partition. The model module
//! builds the candidate-run matrix and the shared feasibility/compatibility
//! predicates; the cp and mip modules search it with an exact
//! branch-and-bound and a mixed-integer formulation respectively. Both
//! backends agree on the feasible region, so they differ only in how they
//! explore it and how time limits surface.

pub(crate) mod cp;
pub(crate) mod mip;
pub(crate) mod model;
pub(crate) mod trend;

use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use serde::Serialize;

use crate::error::Result;
use crate::solver::mip::MipOutcome;
use crate::solver::model::MergeModel;

pub use trend::MonotonicTrend;

/// Terminal state of a fit, in the vocabulary solver logs use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FitStatus {
    /// The partition is proven optimal.
    Optimal,
    /// A valid partition was returned without an optimality proof.
    Feasible,
    /// No partition satisfies the constraints.
    Infeasible,
    /// The relaxation is unbounded; returned partitions are fallbacks.
    Unbounded,
    /// The time limit expired. The best incumbent is kept when one exists.
    TimeLimit,
    /// The solver failed to produce a usable answer.
    Undefined,
}

impl fmt::Display for FitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FitStatus::Optimal => "OPTIMAL",
            FitStatus::Feasible => "FEASIBLE",
            FitStatus::Infeasible => "INFEASIBLE",
            FitStatus::Unbounded => "UNBOUNDED",
            FitStatus::TimeLimit => "TIME_LIMIT",
            FitStatus::Undefined => "UNDEFINED",
        };
        write!(f, "{label}")
    }
}

impl FitStatus {
    /// Whether the status can carry a solver-produced partition. Time-limit
    /// fits keep the incumbent when the search found one.
    pub fn is_solution(&self) -> bool {
        matches!(self, FitStatus::Optimal | FitStatus::Feasible | FitStatus::TimeLimit)
    }
}

/// Search strategy for the merge-selection problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum SolverKind {
    /// Exact branch-and-bound. Deterministic and the default.
    #[default]
    Cp,
    /// Mixed-integer programming through `good_lp`.
    Mip,
}

impl fmt::Display for SolverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolverKind::Cp => write!(f, "cp"),
            SolverKind::Mip => write!(f, "mip"),
        }
    }
}

impl FromStr for SolverKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cp" => Ok(SolverKind::Cp),
            "mip" => Ok(SolverKind::Mip),
            _ => Err(format!("Unknown solver: '{s}'. Use 'cp' or 'mip'")),
        }
    }
}

/// Backend used when the solver is `mip`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum MipSolverKind {
    /// HiGHS, the default.
    #[default]
    Highs,
    /// microlp, a pure-Rust fallback.
    Microlp,
}

impl fmt::Display for MipSolverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MipSolverKind::Highs => write!(f, "highs"),
            MipSolverKind::Microlp => write!(f, "microlp"),
        }
    }
}

impl FromStr for MipSolverKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "highs" => Ok(MipSolverKind::Highs),
            "microlp" => Ok(MipSolverKind::Microlp),
            _ => Err(format!(
                "Unknown MIP solver: '{s}'. Use 'highs' or 'microlp'"
            )),
        }
    }
}

/// Timing and search statistics from one solve.
#[derive(Debug, Clone, Serialize)]
pub struct SolverStats {
    /// Solver strategy that ran.
    pub solver: SolverKind,
    /// Terminal status.
    pub status: FitStatus,
    /// Number of prebins the model was built over.
    pub n_prebins: usize,
    /// Decision variables in the run-selection encoding.
    pub n_variables: usize,
    /// Constraints in the encoding: cover rows, binding bin-count bounds
    /// and incompatibility cuts.
    pub n_constraints: usize,
    /// Branch-and-bound nodes explored (`cp` only).
    pub nodes_explored: Option<u64>,
    /// Objective value (total IV) of the solver's partition. Absent when
    /// the selection is a fallback rather than a solver answer.
    pub objective: Option<f64>,
    /// Wall-clock time spent in the solver.
    pub solve_time_secs: f64,
}

/// Result of the merge selection: the chosen runs plus bookkeeping.
#[derive(Debug, Clone)]
pub(crate) struct SolveOutcome {
    /// Selected `(start, end)` prebin runs, in order. Failure statuses carry
    /// the single all-spanning fallback run.
    pub selection: Vec<(usize, usize)>,
    pub status: FitStatus,
    pub stats: SolverStats,
}

/// Run the configured backend over the model and normalise the outcome.
pub(crate) fn solve(
    model: &MergeModel,
    kind: SolverKind,
    mip_backend: MipSolverKind,
    time_limit: f64,
) -> Result<SolveOutcome> {
    debug_assert!(model.n_prebins() > 0);
    let started = Instant::now();

    // A single prebin admits exactly one partition; no backend run needed.
    if model.n_prebins() == 1 {
        let only = vec![(0, 0)];
        let (status, objective) = if model.feasible(model.run(0, 0)) && model.min_bins() <= 1 {
            (FitStatus::Optimal, Some(model.selection_iv(&only)))
        } else {
            (FitStatus::Infeasible, None)
        };
        let (n_variables, n_constraints) = model.encoding_size();
        let stats = SolverStats {
            solver: kind,
            status,
            n_prebins: 1,
            n_variables,
            n_constraints,
            nodes_explored: None,
            objective,
            solve_time_secs: started.elapsed().as_secs_f64(),
        };
        return Ok(SolveOutcome {
            selection: only,
            status,
            stats,
        });
    }

    let fallback = || vec![(0, model.n_prebins() - 1)];

    let (selection, status, nodes, objective) = match kind {
        SolverKind::Cp => {
            let outcome = cp::solve_cp(model, time_limit);
            let nodes = Some(outcome.nodes);
            match (outcome.timed_out, outcome.selection) {
                (false, Some(selection)) => {
                    let iv = model.selection_iv(&selection);
                    (selection, FitStatus::Optimal, nodes, Some(iv))
                }
                (true, Some(selection)) => {
                    let iv = model.selection_iv(&selection);
                    (selection, FitStatus::TimeLimit, nodes, Some(iv))
                }
                (false, None) => (fallback(), FitStatus::Infeasible, nodes, None),
                (true, None) => (fallback(), FitStatus::Undefined, nodes, None),
            }
        }
        SolverKind::Mip => match mip::solve_mip(model, mip_backend, time_limit)? {
            MipOutcome::Optimal(selection) => {
                let iv = model.selection_iv(&selection);
                (selection, FitStatus::Optimal, None, Some(iv))
            }
            MipOutcome::Infeasible => (fallback(), FitStatus::Infeasible, None, None),
            MipOutcome::Unbounded => (fallback(), FitStatus::Unbounded, None, None),
            MipOutcome::TimeLimit => (fallback(), FitStatus::TimeLimit, None, None),
            MipOutcome::Undefined => (fallback(), FitStatus::Undefined, None, None),
        },
    };

    let (n_variables, n_constraints) = model.encoding_size();
    let stats = SolverStats {
        solver: kind,
        status,
        n_prebins: model.n_prebins(),
        n_variables,
        n_constraints,
        nodes_explored: nodes,
        objective,
        solve_time_secs: started.elapsed().as_secs_f64(),
    };
    Ok(SolveOutcome {
        selection,
        status,
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::model::{ModelBounds, PrebinStats};

    fn sloped_prebins() -> Vec<PrebinStats> {
        vec![
            PrebinStats::new(10.0, 90.0),
            PrebinStats::new(40.0, 60.0),
            PrebinStats::new(70.0, 30.0),
        ]
    }

    fn build(bounds: ModelBounds) -> MergeModel {
        MergeModel::build(&sloped_prebins(), bounds, 120.0, 180.0)
    }

    #[test]
    fn test_solver_kind_round_trip() {
        for kind in [SolverKind::Cp, SolverKind::Mip] {
            assert_eq!(kind.to_string().parse::<SolverKind>().unwrap(), kind);
        }
        assert!("simplex".parse::<SolverKind>().is_err());
    }

    #[test]
    fn test_mip_solver_kind_round_trip() {
        for kind in [MipSolverKind::Highs, MipSolverKind::Microlp] {
            assert_eq!(kind.to_string().parse::<MipSolverKind>().unwrap(), kind);
        }
        assert!("cbc".parse::<MipSolverKind>().is_err());
    }

    #[test]
    fn test_status_display_uppercase() {
        assert_eq!(FitStatus::Optimal.to_string(), "OPTIMAL");
        assert_eq!(FitStatus::TimeLimit.to_string(), "TIME_LIMIT");
        assert!(FitStatus::Optimal.is_solution());
        assert!(!FitStatus::Infeasible.is_solution());
    }

    #[test]
    fn test_backends_agree_on_small_model() {
        let bounds = ModelBounds {
            trend: MonotonicTrend::Ascending,
            max_n_bins: Some(2),
            ..ModelBounds::default()
        };
        let model = build(bounds);
        let cp = solve(&model, SolverKind::Cp, MipSolverKind::Highs, 0.0).unwrap();
        let mip = solve(&model, SolverKind::Mip, MipSolverKind::Highs, 0.0).unwrap();
        assert_eq!(cp.status, FitStatus::Optimal);
        assert_eq!(mip.status, FitStatus::Optimal);
        let cp_iv = model.selection_iv(&cp.selection);
        let mip_iv = model.selection_iv(&mip.selection);
        assert!((cp_iv - mip_iv).abs() < 1e-9);
        // 6 runs, 3 cover rows plus the binding max-bins bound.
        assert_eq!(cp.stats.n_variables, 6);
        assert_eq!(cp.stats.n_constraints, 4);
        assert!((cp.stats.objective.unwrap() - cp_iv).abs() < 1e-12);
        assert!((mip.stats.objective.unwrap() - mip_iv).abs() < 1e-12);
    }

    #[test]
    fn test_single_prebin_short_circuits() {
        let prebins = vec![PrebinStats::new(30.0, 70.0)];
        let model = MergeModel::build(&prebins, ModelBounds::default(), 30.0, 70.0);
        let outcome = solve(&model, SolverKind::Cp, MipSolverKind::Highs, 0.0).unwrap();
        assert_eq!(outcome.status, FitStatus::Optimal);
        assert_eq!(outcome.selection, vec![(0, 0)]);
        assert!(outcome.stats.nodes_explored.is_none());
        assert!(outcome.stats.objective.is_some());

        let floor = ModelBounds {
            min_n_bins: Some(2),
            ..ModelBounds::default()
        };
        let model = MergeModel::build(&prebins, floor, 30.0, 70.0);
        let outcome = solve(&model, SolverKind::Mip, MipSolverKind::Highs, 0.0).unwrap();
        assert_eq!(outcome.status, FitStatus::Infeasible);
        assert_eq!(outcome.selection, vec![(0, 0)]);
        assert!(outcome.stats.objective.is_none());
    }

    #[test]
    fn test_infeasible_falls_back_to_single_run() {
        let bounds = ModelBounds {
            min_n_bins: Some(2),
            min_bin_count: Some(250.0),
            trend: MonotonicTrend::None,
            ..ModelBounds::default()
        };
        let model = build(bounds);
        let outcome = solve(&model, SolverKind::Cp, MipSolverKind::Highs, 0.0).unwrap();
        assert_eq!(outcome.status, FitStatus::Infeasible);
        assert_eq!(outcome.selection, vec![(0, 2)]);
        assert_eq!(outcome.stats.n_prebins, 3);
        assert!(outcome.stats.nodes_explored.is_some());
        assert!(outcome.stats.objective.is_none());
    }
}
