//! Bounded, deduplicated set of the best solutions.

use serde::{Deserialize, Serialize};

use crate::models::RotationState;

/// One complete (or budget-truncated) attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedSolution {
    /// Attempt that produced the state (0 = deterministic order).
    pub attempt: usize,
    /// Aggregate objective of the state.
    pub objective: f64,
    /// Whether the budget ran out during the attempt.
    pub truncated: bool,
    /// Current-year plans.
    pub plans: RotationState,
}

/// Keeps the top `capacity` distinct solutions.
///
/// Ordered by objective (descending), ties by attempt index. A state equal
/// to one already held is dropped, keeping the earlier attempt.
#[derive(Debug, Clone, Default)]
pub struct RankedSolutions {
    capacity: usize,
    entries: Vec<RankedSolution>,
}

impl RankedSolutions {
    /// Creates an empty set holding at most `capacity` (at least 1) solutions.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Vec::new(),
        }
    }

    /// Offers a solution. Returns whether it was kept.
    pub fn offer(&mut self, solution: RankedSolution) -> bool {
        if self.entries.iter().any(|e| e.plans == solution.plans) {
            return false;
        }
        let pos = self
            .entries
            .iter()
            .position(|e| {
                solution
                    .objective
                    .total_cmp(&e.objective)
                    .then_with(|| e.attempt.cmp(&solution.attempt))
                    .is_gt()
            })
            .unwrap_or(self.entries.len());
        if pos >= self.capacity {
            return false;
        }
        self.entries.insert(pos, solution);
        self.entries.truncate(self.capacity);
        true
    }

    /// Best solution held.
    pub fn best(&self) -> Option<&RankedSolution> {
        self.entries.first()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RankedSolution> {
        self.entries.iter()
    }

    /// Solutions in rank order.
    pub fn into_vec(self) -> Vec<RankedSolution> {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::YearPlan;

    fn solution(attempt: usize, objective: f64, code: &str) -> RankedSolution {
        RankedSolution {
            attempt,
            objective,
            truncated: false,
            plans: RotationState::new().with_plan("R1", YearPlan::from_codes(&[code])),
        }
    }

    #[test]
    fn test_orders_by_objective_then_attempt() {
        let mut ranked = RankedSolutions::new(3);
        assert!(ranked.offer(solution(0, 10.0, "A")));
        assert!(ranked.offer(solution(1, 30.0, "B")));
        assert!(ranked.offer(solution(2, 10.0, "C")));

        let order: Vec<usize> = ranked.iter().map(|s| s.attempt).collect();
        assert_eq!(order, vec![1, 0, 2]);
        assert_eq!(ranked.best().unwrap().attempt, 1);
    }

    #[test]
    fn test_bounded_capacity() {
        let mut ranked = RankedSolutions::new(2);
        ranked.offer(solution(0, 10.0, "A"));
        ranked.offer(solution(1, 20.0, "B"));
        assert!(!ranked.offer(solution(2, 5.0, "C")));
        assert!(ranked.offer(solution(3, 25.0, "D")));
        let order: Vec<usize> = ranked.iter().map(|s| s.attempt).collect();
        assert_eq!(order, vec![3, 1]);
    }

    #[test]
    fn test_duplicates_dropped() {
        let mut ranked = RankedSolutions::new(3);
        assert!(ranked.offer(solution(0, 10.0, "A")));
        assert!(!ranked.offer(solution(1, 10.0, "A")));
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked.into_vec()[0].attempt, 0);
    }

    #[test]
    fn test_zero_capacity_keeps_one() {
        let mut ranked = RankedSolutions::new(0);
        assert!(ranked.is_empty());
        ranked.offer(solution(0, 1.0, "A"));
        assert_eq!(ranked.len(), 1);
    }
}
