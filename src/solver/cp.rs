//! Constraint-programming backend
//!
//! Exact depth-first branch-and-bound over contiguous prebin runs. Positions
//! are extended left to right, candidate run ends in increasing order, so the
//! search is fully deterministic: ties keep the first incumbent found. A
//! dynamic-programming bound over feasible runs (ignoring trend and count
//! constraints, which only shrink the feasible region) prunes branches that
//! cannot beat the incumbent.
//!
//! Merging runs can raise total information value once smoothing is applied,
//! so the bound must consider every run length rather than summing
//! finest-partition contributions.

use std::time::{Duration, Instant};

use crate::solver::model::MergeModel;

/// Nodes explored between deadline checks.
const DEADLINE_CHECK_INTERVAL: u64 = 1024;

/// Terminal state of one branch-and-bound search.
#[derive(Debug, Clone)]
pub(crate) struct CpOutcome {
    /// Best partition found, if any.
    pub selection: Option<Vec<(usize, usize)>>,
    /// Whether the deadline expired before the search space was exhausted.
    pub timed_out: bool,
    /// Search nodes explored.
    pub nodes: u64,
}

/// Search for the maximum-IV partition. A zero time limit disables the
/// deadline.
pub(crate) fn solve_cp(model: &MergeModel, time_limit: f64) -> CpOutcome {
    let n = model.n_prebins();

    // ub[p]: best possible IV from prebin p onwards, over feasible runs only.
    // Minus infinity marks positions with no feasible completion.
    let mut ub = vec![0.0; n + 1];
    for position in (0..n).rev() {
        let mut bound = f64::NEG_INFINITY;
        for end in position..n {
            let run = model.run(position, end);
            if model.feasible(run) {
                bound = bound.max(run.iv + ub[end + 1]);
            }
        }
        ub[position] = bound;
    }
    if !ub[0].is_finite() {
        return CpOutcome {
            selection: None,
            timed_out: false,
            nodes: 0,
        };
    }

    let deadline =
        (time_limit > 0.0).then(|| Instant::now() + Duration::from_secs_f64(time_limit.min(1e9)));
    let mut search = Search {
        model,
        ub,
        deadline,
        timed_out: false,
        nodes: 0,
        path: Vec::with_capacity(n),
        best: None,
    };
    search.dfs(0, 0.0);
    CpOutcome {
        selection: search.best.map(|(_, selection)| selection),
        timed_out: search.timed_out,
        nodes: search.nodes,
    }
}

struct Search<'a> {
    model: &'a MergeModel,
    ub: Vec<f64>,
    deadline: Option<Instant>,
    timed_out: bool,
    nodes: u64,
    path: Vec<(usize, usize)>,
    best: Option<(f64, Vec<(usize, usize)>)>,
}

impl Search<'_> {
    /// Count the node and poll the deadline at a fixed interval.
    fn deadline_expired(&mut self) -> bool {
        self.nodes += 1;
        if self.timed_out {
            return true;
        }
        if self.nodes % DEADLINE_CHECK_INTERVAL == 0 {
            if let Some(deadline) = self.deadline {
                if Instant::now() >= deadline {
                    self.timed_out = true;
                }
            }
        }
        self.timed_out
    }

    fn dfs(&mut self, position: usize, acc_iv: f64) {
        if self.deadline_expired() {
            return;
        }
        let model = self.model;
        let n = model.n_prebins();
        if position == n {
            // Strict improvement keeps the first incumbent on ties.
            if self.path.len() >= model.min_bins()
                && self.best.as_ref().is_none_or(|(best_iv, _)| acc_iv > *best_iv)
            {
                self.best = Some((acc_iv, self.path.clone()));
            }
            return;
        }
        if self.path.len() == model.max_bins() {
            return;
        }
        // Even an all-singleton completion cannot reach the minimum count.
        if self.path.len() + (n - position) < model.min_bins() {
            return;
        }
        if let Some((best_iv, _)) = &self.best {
            if acc_iv + self.ub[position] <= *best_iv {
                return;
            }
        }

        let prev = self.path.last().map(|&(s, e)| model.run(s, e));
        let prev_prev = self.path.len().checked_sub(2).map(|i| {
            let (s, e) = self.path[i];
            model.run(s, e)
        });
        for end in position..n {
            let run = model.run(position, end);
            if !model.feasible(run) {
                continue;
            }
            if let Some(prev) = prev {
                if !model.pair_compatible(prev, run) {
                    continue;
                }
                if model.has_curvature() {
                    if let Some(prev_prev) = prev_prev {
                        if !model.triple_compatible(prev_prev, prev, run) {
                            continue;
                        }
                    }
                }
            }
            self.path.push((position, end));
            self.dfs(end + 1, acc_iv + run.iv);
            self.path.pop();
            if self.timed_out {
                return;
            }
        }
    }
}
