//! Cohort statistics.
//!
//! Computes per-resident scores, cohort normalization and per-posting
//! utilization from a rotation state.
//!
//! # Metrics
//!
//! | Metric | Definition |
//! |--------|-----------|
//! | Raw score | Sum of a resident's objective components |
//! | Normalized score | `100 × raw / best`, clamped to 0..=100 (min–max when best ≤ 0) |
//! | Aggregate objective | Sum of raw scores |
//! | Fill rate | Filled posting-blocks / capacity posting-blocks |
//! | OFF blocks | Open, non-leave blocks across the cohort |

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::objective::{ObjectiveScorer, ScoreBreakdown};
use crate::models::{RotationProblem, RotationState, BLOCKS_PER_YEAR};

/// Score of one resident.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResidentScore {
    pub raw: f64,
    /// Raw score scaled against the cohort's best (0..=100).
    pub normalized: f64,
    pub breakdown: ScoreBreakdown,
}

/// Fill of one posting across the year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostingUtilization {
    /// Per-block capacity.
    pub capacity: u32,
    /// Residents per block (index 0 = block 1).
    pub filled: [u32; BLOCKS_PER_YEAR as usize],
    /// Filled posting-blocks over capacity posting-blocks (0.0..=1.0 when feasible).
    pub fill_rate: f64,
}

/// Cohort-level statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CohortStatistics {
    /// Per-resident scores, in id order.
    pub scores: BTreeMap<String, ResidentScore>,
    /// Sum of raw scores.
    pub aggregate_objective: f64,
    /// Highest raw score in the cohort.
    pub best_raw: f64,
    /// Per-posting utilization, in code order.
    pub utilization: BTreeMap<String, PostingUtilization>,
    /// Mean fill rate over postings with capacity.
    pub avg_fill_rate: f64,
    /// Open, non-leave blocks across the cohort.
    pub off_blocks: usize,
    /// Blocks holding a posting across the cohort.
    pub filled_blocks: usize,
}

impl CohortStatistics {
    /// Computes statistics for a state.
    pub fn calculate(problem: &RotationProblem, state: &RotationState) -> Self {
        let breakdowns = ObjectiveScorer::new(problem).score_state(state);
        let raws: Vec<f64> = breakdowns.values().map(ScoreBreakdown::total).collect();
        let normalized = normalize_scores(&raws);

        let scores: BTreeMap<String, ResidentScore> = breakdowns
            .into_iter()
            .zip(normalized)
            .map(|((id, breakdown), normalized)| {
                (
                    id,
                    ResidentScore {
                        raw: breakdown.total(),
                        normalized,
                        breakdown,
                    },
                )
            })
            .collect();

        let aggregate_objective = raws.iter().sum();
        let best_raw = raws.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let best_raw = if best_raw.is_finite() { best_raw } else { 0.0 };

        let occupancy = state.occupancy();
        let utilization: BTreeMap<String, PostingUtilization> = problem
            .catalogue()
            .iter()
            .map(|posting| {
                let filled = occupancy.per_block(&posting.code);
                let total: u64 = filled.iter().copied().map(u64::from).sum();
                let slots = u64::from(posting.max_residents) * u64::from(BLOCKS_PER_YEAR);
                let fill_rate = if slots == 0 {
                    0.0
                } else {
                    total as f64 / slots as f64
                };
                (
                    posting.code.clone(),
                    PostingUtilization {
                        capacity: posting.max_residents,
                        filled,
                        fill_rate,
                    },
                )
            })
            .collect();

        let rated: Vec<f64> = utilization
            .values()
            .filter(|u| u.capacity > 0)
            .map(|u| u.fill_rate)
            .collect();
        let avg_fill_rate = if rated.is_empty() {
            0.0
        } else {
            rated.iter().sum::<f64>() / rated.len() as f64
        };

        Self {
            scores,
            aggregate_objective,
            best_raw,
            utilization,
            avg_fill_rate,
            off_blocks: state.off_blocks().len(),
            filled_blocks: state.filled_count(),
        }
    }

    /// Normalized score of a resident.
    pub fn normalized(&self, resident_id: &str) -> Option<f64> {
        self.scores.get(resident_id).map(|s| s.normalized)
    }
}

/// Scales raw scores so the best scorer reads 100.
///
/// With a positive best, `100 × raw / best` clamped to 0..=100. Otherwise
/// min–max scaling; a cohort of equal scores reads 100 throughout.
pub fn normalize_scores(raws: &[f64]) -> Vec<f64> {
    let Some(best) = raws.iter().copied().reduce(f64::max) else {
        return Vec::new();
    };
    if best > 0.0 {
        return raws
            .iter()
            .map(|raw| (100.0 * raw / best).clamp(0.0, 100.0))
            .collect();
    }
    let worst = raws.iter().copied().fold(best, f64::min);
    let span = best - worst;
    raws.iter()
        .map(|raw| {
            if span <= f64::EPSILON {
                100.0
            } else {
                100.0 * (raw - worst) / span
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Posting, ProblemInput, Resident, YearPlan};

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_normalize_against_best() {
        let n = normalize_scores(&[340.0, 170.0, -10.0]);
        assert!(approx(n[0], 100.0));
        assert!(approx(n[1], 50.0));
        assert!(approx(n[2], 0.0));
    }

    #[test]
    fn test_normalize_non_positive_best() {
        let n = normalize_scores(&[-10.0, -30.0, -20.0]);
        assert!(approx(n[0], 100.0));
        assert!(approx(n[1], 0.0));
        assert!(approx(n[2], 50.0));

        assert_eq!(normalize_scores(&[0.0, 0.0]), vec![100.0, 100.0]);
        assert!(normalize_scores(&[]).is_empty());
    }

    #[test]
    fn test_statistics() {
        let input = ProblemInput::new(2025)
            .with_resident(Resident::new("R1", 1))
            .with_resident(Resident::new("R2", 2))
            .with_posting(Posting::core("ED (SGH)").with_capacity(2))
            .with_posting(Posting::core("GM (TTSH)").with_capacity(0));
        let problem = RotationProblem::from_input(input).unwrap();
        let state = RotationState::new()
            .with_plan("R1", YearPlan::from_codes(&["ED (SGH)", "ED (SGH)"]))
            .with_plan("R2", YearPlan::from_codes(&["ED (SGH)"]));

        let stats = CohortStatistics::calculate(&problem, &state);
        // R1: seniority 2; R2: seniority 2, elective shortfall -20
        assert!(approx(stats.scores["R1"].raw, 2.0));
        assert!(approx(stats.scores["R2"].raw, -18.0));
        assert!(approx(stats.best_raw, 2.0));
        assert!(approx(stats.normalized("R1").unwrap(), 100.0));
        assert!(approx(stats.normalized("R2").unwrap(), 0.0));
        assert!(approx(stats.aggregate_objective, -16.0));

        let ed = &stats.utilization["ED (SGH)"];
        assert_eq!(ed.filled[0], 2);
        assert_eq!(ed.filled[1], 1);
        assert!(approx(ed.fill_rate, 3.0 / 24.0));
        assert!(approx(stats.avg_fill_rate, 3.0 / 24.0));
        assert_eq!(stats.filled_blocks, 3);
        assert_eq!(stats.off_blocks, 21);
    }

    #[test]
    fn test_utilization_with_huge_capacity() {
        let input = ProblemInput::new(2025)
            .with_resident(Resident::new("R1", 1))
            .with_posting(Posting::core("ED (SGH)").with_capacity(u32::MAX));
        let problem = RotationProblem::from_input(input).unwrap();
        let state = RotationState::new().with_plan("R1", YearPlan::from_codes(&["ED (SGH)"]));

        let stats = CohortStatistics::calculate(&problem, &state);
        let ed = &stats.utilization["ED (SGH)"];
        assert_eq!(ed.capacity, u32::MAX);
        assert!(ed.fill_rate > 0.0 && ed.fill_rate < 1e-9);
    }
}
