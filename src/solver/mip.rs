//! Mixed-integer backend
//!
//! Encodes bin selection as an exact-cover problem: one binary variable per
//! feasible candidate run, every prebin covered by exactly one selected run,
//! and incompatibility cuts forbidding adjacent (or, for curvature trends,
//! consecutive triple) selections that violate the trend. The objective
//! maximises total information value. Solved through `good_lp` with either
//! the HiGHS or the microlp backend.
//!
//! Neither backend exposes cooperative cancellation, so the time limit is
//! enforced from outside: the solve runs on a worker thread and the caller
//! waits on a channel with a timeout. An expired deadline abandons the worker
//! and reports a time-limit outcome without an incumbent.

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use good_lp::solvers::highs::highs;
use good_lp::solvers::microlp::microlp;
use good_lp::{
    constraint, variable, Constraint, Expression, ProblemVariables, ResolutionError, Solution,
    SolverModel, Variable,
};

use crate::error::{BinningError, Result};
use crate::solver::model::MergeModel;
use crate::solver::MipSolverKind;

/// Terminal state of one MIP solve.
#[derive(Debug, Clone)]
pub(crate) enum MipOutcome {
    /// Proven optimal partition as `(start, end)` prebin runs.
    Optimal(Vec<(usize, usize)>),
    Infeasible,
    Unbounded,
    /// Deadline expired before the solver returned.
    TimeLimit,
    /// The solver returned values that do not form a valid partition.
    Undefined,
}

/// Solve the merge-selection problem, honouring the time limit.
///
/// A zero time limit disables the deadline and solves on the calling thread.
pub(crate) fn solve_mip(
    model: &MergeModel,
    backend: MipSolverKind,
    time_limit: f64,
) -> Result<MipOutcome> {
    if time_limit <= 0.0 {
        return solve_inline(model, backend);
    }
    let (tx, rx) = mpsc::channel();
    let worker_model = model.clone();
    thread::spawn(move || {
        let _ = tx.send(solve_inline(&worker_model, backend));
    });
    match rx.recv_timeout(Duration::from_secs_f64(time_limit.min(1e9))) {
        Ok(result) => result,
        Err(mpsc::RecvTimeoutError::Timeout) => Ok(MipOutcome::TimeLimit),
        Err(mpsc::RecvTimeoutError::Disconnected) => Err(BinningError::Solver(
            "solver worker terminated before producing a result".to_string(),
        )),
    }
}

fn solve_inline(model: &MergeModel, backend: MipSolverKind) -> Result<MipOutcome> {
    let n = model.n_prebins();
    let mut vars = ProblemVariables::new();
    let mut z: Vec<Vec<Option<Variable>>> = Vec::with_capacity(n);
    let mut covered = vec![false; n];
    let mut objective = Expression::default();
    for start in 0..n {
        let mut row = Vec::with_capacity(n - start);
        for end in start..n {
            let run = model.run(start, end);
            if model.feasible(run) {
                let var = vars.add(variable().binary());
                objective += run.iv * var;
                for flag in &mut covered[start..=end] {
                    *flag = true;
                }
                row.push(Some(var));
            } else {
                row.push(None);
            }
        }
        z.push(row);
    }
    // A prebin no feasible run covers makes the exact cover unsatisfiable.
    if covered.iter().any(|&flag| !flag) {
        return Ok(MipOutcome::Infeasible);
    }

    let constraints = build_constraints(model, &z);
    match backend {
        MipSolverKind::Highs => {
            let mut problem = vars.maximise(objective).using(highs);
            for c in constraints {
                problem = problem.with(c);
            }
            match problem.solve() {
                Ok(solution) => Ok(extract_selection(model, &z, |v| solution.value(v))),
                Err(error) => map_resolution_error(error),
            }
        }
        MipSolverKind::Microlp => {
            let mut problem = vars.maximise(objective).using(microlp);
            for c in constraints {
                problem = problem.with(c);
            }
            match problem.solve() {
                Ok(solution) => Ok(extract_selection(model, &z, |v| solution.value(v))),
                Err(error) => map_resolution_error(error),
            }
        }
    }
}

fn build_constraints(model: &MergeModel, z: &[Vec<Option<Variable>>]) -> Vec<Constraint> {
    let n = model.n_prebins();
    let mut constraints = Vec::new();

    // Exact cover: each prebin belongs to exactly one selected run.
    for p in 0..n {
        let mut cover = Expression::default();
        for start in 0..=p {
            for end in p..n {
                if let Some(var) = z[start][end - start] {
                    cover += var;
                }
            }
        }
        constraints.push(constraint!(cover == 1.0));
    }

    // Bin-count bounds, only when they actually bind.
    let mut count = Expression::default();
    for row in z {
        for var in row.iter().flatten() {
            count += *var;
        }
    }
    if model.min_bins() > 1 {
        constraints.push(constraint!(count.clone() >= model.min_bins() as f64));
    }
    if model.max_bins() < n {
        constraints.push(constraint!(count <= model.max_bins() as f64));
    }

    // Adjacent runs violating the trend cannot both be selected. Exact cover
    // makes consecutive selected runs adjacent, so these cuts are enough.
    for boundary in 0..n.saturating_sub(1) {
        for start_a in 0..=boundary {
            let Some(za) = z[start_a][boundary - start_a] else {
                continue;
            };
            for end_b in (boundary + 1)..n {
                let Some(zb) = z[boundary + 1][end_b - boundary - 1] else {
                    continue;
                };
                let prev = model.run(start_a, boundary);
                let next = model.run(boundary + 1, end_b);
                if !model.pair_compatible(prev, next) {
                    constraints.push(constraint!(za + zb <= 1.0));
                }
            }
        }
    }

    // Curvature needs the second difference, so cuts span three consecutive
    // runs.
    if model.has_curvature() {
        for e1 in 0..n {
            for sa in 0..=e1 {
                let Some(za) = z[sa][e1 - sa] else {
                    continue;
                };
                for e2 in (e1 + 1)..n {
                    let Some(zb) = z[e1 + 1][e2 - e1 - 1] else {
                        continue;
                    };
                    for ec in (e2 + 1)..n {
                        let Some(zc) = z[e2 + 1][ec - e2 - 1] else {
                            continue;
                        };
                        let first = model.run(sa, e1);
                        let mid = model.run(e1 + 1, e2);
                        let last = model.run(e2 + 1, ec);
                        if !model.triple_compatible(first, mid, last) {
                            constraints.push(constraint!(za + zb + zc <= 2.0));
                        }
                    }
                }
            }
        }
    }

    constraints
}

/// Read the selection out of a solution and check it tiles the prebins.
///
/// The check guards against a backend reporting success on a relaxed or
/// otherwise invalid assignment.
fn extract_selection(
    model: &MergeModel,
    z: &[Vec<Option<Variable>>],
    value: impl Fn(Variable) -> f64,
) -> MipOutcome {
    let mut selection = Vec::new();
    for (start, row) in z.iter().enumerate() {
        for (offset, var) in row.iter().enumerate() {
            if let Some(var) = var {
                if value(*var) > 0.5 {
                    selection.push((start, start + offset));
                }
            }
        }
    }
    selection.sort_unstable();
    if tiles_exactly(model, &selection) {
        MipOutcome::Optimal(selection)
    } else {
        MipOutcome::Undefined
    }
}

fn tiles_exactly(model: &MergeModel, selection: &[(usize, usize)]) -> bool {
    let Some(&(first_start, _)) = selection.first() else {
        return false;
    };
    let Some(&(_, last_end)) = selection.last() else {
        return false;
    };
    first_start == 0
        && last_end + 1 == model.n_prebins()
        && selection.windows(2).all(|w| w[0].1 + 1 == w[1].0)
        && selection.len() >= model.min_bins()
        && selection.len() <= model.max_bins()
}

fn map_resolution_error(error: ResolutionError) -> Result<MipOutcome> {
    match error {
        ResolutionError::Infeasible => Ok(MipOutcome::Infeasible),
        ResolutionError::Unbounded => Ok(MipOutcome::Unbounded),
        other => Err(BinningError::Solver(other.to_string())),
    }
}
