//! Search budget and statistics.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::config::TerminationConfig;

/// Step and wall-clock budget shared by every attempt of one solve.
///
/// Checked between search steps; once exhausted it stays exhausted.
#[derive(Debug, Clone)]
pub struct Budget {
    step_limit: Option<u64>,
    deadline: Option<Instant>,
    steps: u64,
    exhausted: bool,
}

impl Budget {
    /// Starts a budget from a termination config.
    pub fn new(termination: &TerminationConfig) -> Self {
        Self {
            step_limit: termination.step_count_limit,
            deadline: termination.time_limit().map(|limit| Instant::now() + limit),
            steps: 0,
            exhausted: false,
        }
    }

    /// A budget that never runs out.
    pub fn unlimited() -> Self {
        Self::new(&TerminationConfig::default())
    }

    /// Consumes one step. Returns `false` once the budget is spent.
    pub fn step(&mut self) -> bool {
        if self.exhausted {
            return false;
        }
        let over_steps = self.step_limit.is_some_and(|limit| self.steps >= limit);
        let over_time = self.deadline.is_some_and(|d| Instant::now() >= d);
        if over_steps || over_time {
            self.exhausted = true;
            return false;
        }
        self.steps += 1;
        true
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Steps consumed so far.
    pub fn steps(&self) -> u64 {
        self.steps
    }
}

/// Solver-level statistics.
///
/// Tracks aggregate metrics across all attempts of a solve.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SolverStats {
    /// Search steps taken.
    pub step_count: u64,
    /// Candidate moves evaluated with the placement predicate.
    pub moves_evaluated: u64,
    /// Candidate moves that passed the predicate.
    pub moves_accepted: u64,
    /// Complete plans rejected for missing requirements.
    pub backtracks: u64,
    /// Attempts run (one per requested solution, unless the budget ran out).
    pub attempts: u32,
    /// Placements removed by balance repair.
    pub repairs: u64,
    /// Wall-clock time of the solve in milliseconds.
    pub elapsed_ms: u64,
}

impl SolverStats {
    /// Records a move evaluation and whether it was accepted.
    pub fn record_move(&mut self, accepted: bool) {
        self.moves_evaluated += 1;
        if accepted {
            self.moves_accepted += 1;
        }
    }

    /// Returns the acceptance rate (accepted / evaluated).
    pub fn acceptance_rate(&self) -> f64 {
        if self.moves_evaluated == 0 {
            0.0
        } else {
            self.moves_accepted as f64 / self.moves_evaluated as f64
        }
    }

    pub(crate) fn finish(&mut self, budget: &Budget, elapsed: Duration) {
        self.step_count = budget.steps();
        self.elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
    }
}
