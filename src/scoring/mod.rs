//! Objective scoring and cohort statistics.
//!
//! [`ObjectiveScorer`] scores a single resident's plan; the solver uses it
//! to rank candidate moves. [`CohortStatistics`] aggregates scores and
//! posting utilization for the output bundle.

mod objective;
mod stats;

pub use objective::{ObjectiveScorer, ScoreBreakdown};
pub use stats::{normalize_scores, CohortStatistics, PostingUtilization, ResidentScore};
