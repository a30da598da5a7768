//! Rotation solver.
//!
//! # Algorithm
//!
//! 1. Keep pinned residents' plans as they are; clear every other
//!    resident's current-year postings (leave stays).
//! 2. Order residents by seniority. The first attempt breaks ties by id,
//!    later attempts by a seeded shuffle.
//! 3. Fill each resident's open blocks with a depth-first search over
//!    ranked candidate placements ([`search`]). Terminal-year residents
//!    backtrack until ED, GRM and CCR are placed, within a bounded number
//!    of complete plans.
//!    If a terminal-year resident still misses one, the attempt is
//!    replayed with every terminal requirement placed first across the
//!    cohort ([`seeding`]) and the replay is kept when it misses fewer.
//! 4. When deviation overrides are supplied, repair half-year imbalance by
//!    removing the cheapest offending placements, then refill with the
//!    balance rule enforced ([`repair`]).
//! 5. Rank attempts by aggregate objective and keep the top K.
//!
//! One step and time budget bounds the whole solve. On exhaustion the best
//! state found so far is returned with [`SolveStatus::Partial`].
//!
//! # Reference
//! Pinedo (2016), "Scheduling", Ch. 4: Priority Dispatching

mod budget;
mod ranked;
mod repair;
mod search;
mod seeding;

pub use budget::{Budget, SolverStats};
pub use ranked::{RankedSolution, RankedSolutions};

use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::config::SolverConfig;
use crate::dispatching::{DispatchContext, RuleEngine, TieBreaker};
use crate::error::RotationError;
use crate::models::{RotationProblem, RotationState};
use crate::report::RotationOutput;
use crate::scoring::ObjectiveScorer;
use search::{plan_resident, Workspace};
use seeding::{seed_requirements, Seeding};

/// How far the search got.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveStatus {
    /// Every resident was planned.
    Complete,
    /// The budget ran out; some residents may be left unplanned.
    Partial,
}

/// Result of a solve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolveOutcome {
    pub status: SolveStatus,
    /// Whether the budget ran out at any point of the solve.
    pub budget_exhausted: bool,
    /// Output bundle for the best solution.
    pub output: RotationOutput,
    /// Distinct solutions in rank order; the first is `output`'s state.
    pub solutions: Vec<RankedSolution>,
    pub stats: SolverStats,
}

impl SolveOutcome {
    pub fn is_complete(&self) -> bool {
        self.status == SolveStatus::Complete
    }

    /// Ranked solutions after the best one.
    pub fn alternates(&self) -> &[RankedSolution] {
        self.solutions.get(1..).unwrap_or(&[])
    }
}

/// Priority-driven constructive solver with bounded backtracking.
///
/// # Example
///
/// ```
/// use u_rotation::models::{Posting, ProblemInput, Resident, RotationProblem};
/// use u_rotation::solver::Solver;
///
/// let input = ProblemInput::new(2025)
///     .with_posting(Posting::core("ED (SGH)").with_capacity(2))
///     .with_posting(Posting::core("GRM (CGH)").with_capacity(2).with_duration(2))
///     .with_posting(Posting::core("GM (SGH)").with_capacity(2).with_duration(3))
///     .with_posting(Posting::elective("Cardio (NUH)").with_capacity(2))
///     .with_resident(Resident::new("R1", 3))
///     .with_resident(Resident::new("R2", 1));
/// let problem = RotationProblem::from_input(input).unwrap();
///
/// let outcome = Solver::new().solve(&problem).unwrap();
/// assert!(outcome.is_complete());
/// assert!(outcome.output.is_feasible());
/// ```
#[derive(Debug, Clone, Default)]
pub struct Solver {
    config: SolverConfig,
}

impl Solver {
    /// Creates a solver with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the configuration.
    pub fn with_config(mut self, config: SolverConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Solves a problem.
    ///
    /// # Errors
    /// [`RotationError::Invariant`] if a pinned resident's plan changed.
    pub fn solve(&self, problem: &RotationProblem) -> Result<SolveOutcome, RotationError> {
        let started = Instant::now();
        let wanted = self.config.search.solutions.max(1);
        let mut budget = Budget::new(&self.config.termination);
        let mut stats = SolverStats::default();
        let mut ranked = RankedSolutions::new(wanted);
        let scorer = ObjectiveScorer::new(problem);

        info!(
            event = "solve_start",
            residents = problem.residents().len(),
            postings = problem.catalogue().len(),
            pinned = problem.pins().len(),
            solutions = wanted,
        );

        for attempt in 0..wanted {
            if budget.is_exhausted() {
                break;
            }
            let (plans, truncated) = self.run_attempt(problem, attempt, &mut budget, &mut stats);
            verify_pins(problem, &plans)?;
            stats.attempts += 1;

            let objective = scorer.aggregate(&plans);
            debug!(event = "attempt_end", attempt, objective, truncated);
            ranked.offer(RankedSolution {
                attempt,
                objective,
                truncated,
                plans,
            });
        }

        stats.finish(&budget, started.elapsed());
        let budget_exhausted = budget.is_exhausted();
        let solutions = ranked.into_vec();
        let best = solutions
            .first()
            .ok_or_else(|| RotationError::Invariant("no attempt produced a state".to_string()))?;
        let status = if best.truncated {
            SolveStatus::Partial
        } else {
            SolveStatus::Complete
        };
        if budget_exhausted {
            warn!(
                event = "budget_exhausted",
                steps = stats.step_count,
                elapsed_ms = stats.elapsed_ms,
                "search budget exhausted, returning best state found"
            );
        }

        let output = RotationOutput::assemble(problem, &best.plans);
        info!(
            event = "solve_end",
            status = ?status,
            score = output.statistics.aggregate_objective,
            off_blocks = output.statistics.off_blocks,
            violations = output.violations.len(),
            steps = stats.step_count,
            moves_evaluated = stats.moves_evaluated,
        );

        Ok(SolveOutcome {
            status,
            budget_exhausted,
            output,
            solutions,
            stats,
        })
    }

    fn run_attempt(
        &self,
        problem: &RotationProblem,
        attempt: usize,
        budget: &mut Budget,
        stats: &mut SolverStats,
    ) -> (RotationState, bool) {
        let mut start = problem.initial_state().clone();
        for resident in problem.residents() {
            if problem.is_pinned(&resident.id) {
                continue;
            }
            if let Some(plan) = start.plan_mut(&resident.id) {
                plan.clear_postings();
            }
        }

        let order = self.resident_order(problem, attempt);
        let mut ws = Workspace::new(problem, start.clone());
        let mut pass = self.plan_all(&mut ws, &order, attempt, budget, stats);

        if !pass.truncated && pass.deficits > 0 {
            let limit = self
                .config
                .search
                .max_backtracks_per_resident
                .saturating_mul(u32::try_from(order.len()).unwrap_or(u32::MAX));
            let mut seeded = Workspace::new(problem, start);
            let seeding = seed_requirements(&mut seeded, &order, budget, stats, limit);
            debug!(
                event = "requirements_seeded",
                attempt,
                outcome = ?seeding,
                deficits = pass.deficits,
            );
            if seeding == Seeding::Placed {
                let replanned = self.plan_all(&mut seeded, &order, attempt, budget, stats);
                if !replanned.truncated && replanned.deficits < pass.deficits {
                    ws = seeded;
                    pass = replanned;
                }
            }
        }

        let mut truncated = pass.truncated;
        if !truncated && problem.balance_enabled() && repair::rebalance(&mut ws, stats) > 0 {
            ws.set_balance(true);
            truncated = self.plan_all(&mut ws, &order, attempt, budget, stats).truncated;
        }

        (ws.into_state(), truncated)
    }

    /// Plans residents in `order`, stopping early when the budget runs out.
    fn plan_all(
        &self,
        ws: &mut Workspace<'_>,
        order: &[usize],
        attempt: usize,
        budget: &mut Budget,
        stats: &mut SolverStats,
    ) -> Pass {
        let problem = ws.problem();
        let max_backtracks = self.config.search.max_backtracks_per_resident;
        let mut deficits = 0;
        for &idx in order {
            let resident = &problem.residents()[idx];
            if problem.is_pinned(&resident.id) {
                continue;
            }
            let outcome = plan_resident(ws, resident, budget, stats, max_backtracks);
            debug!(
                event = "resident_planned",
                attempt,
                resident = %resident.id,
                year = resident.year,
                filled = ws.state().plan(&resident.id).map_or(0, |p| p.filled_count()),
                deficits = outcome.deficits,
                backtracks = outcome.backtracks,
            );
            deficits += outcome.deficits;
            if outcome.truncated {
                return Pass {
                    truncated: true,
                    deficits,
                };
            }
        }
        Pass {
            truncated: false,
            deficits,
        }
    }

    fn resident_order(&self, problem: &RotationProblem, attempt: usize) -> Vec<usize> {
        let residents = problem.residents();
        if attempt == 0 {
            RuleEngine::seniority(TieBreaker::ById).sort_indices(residents, &DispatchContext::default())
        } else {
            let seed = self.config.seed().wrapping_add(attempt as u64);
            let context = DispatchContext::seeded(seed, residents.iter().map(|r| r.id.as_str()));
            RuleEngine::seniority(TieBreaker::Seeded).sort_indices(residents, &context)
        }
    }
}

/// Result of one planning pass over the cohort.
#[derive(Debug, Clone, Copy)]
struct Pass {
    truncated: bool,
    /// Missing terminal-year requirements left by the pass.
    deficits: usize,
}

fn verify_pins(problem: &RotationProblem, plans: &RotationState) -> Result<(), RotationError> {
    for id in problem.pins() {
        if plans.plan(id) != problem.initial_state().plan(id) {
            return Err(RotationError::Invariant(format!(
                "pinned resident {id} was modified by the solver"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::{check, CheckScope};
    use crate::models::{HistoryEntry, LeaveRecord, Posting, Preference, ProblemInput, Resident, Slot, ViolationCode};

    fn cohort() -> ProblemInput {
        ProblemInput::new(2025)
            .with_posting(Posting::core("ED (SGH)").with_capacity(2))
            .with_posting(Posting::core("GRM (CGH)").with_capacity(2).with_duration(2))
            .with_posting(Posting::core("GM (SGH)").with_capacity(2).with_duration(3))
            .with_posting(Posting::core("GM (TTSH)").with_capacity(3))
            .with_posting(Posting::core("MICU (NUH)").with_capacity(1).with_duration(2))
            .with_posting(Posting::elective("Cardio (NUH)").with_capacity(2))
            .with_posting(Posting::elective("Derm (NSC)").with_capacity(2))
            .with_resident(Resident::new("R1", 3))
            .with_resident(Resident::new("R2", 3))
            .with_resident(Resident::new("R3", 2))
            .with_resident(Resident::new("R4", 1))
            .with_preference(Preference::new("R3", 1, "Cardio (NUH)"))
            .with_preference(Preference::new("R1", 1, "Derm (NSC)"))
    }

    fn problem(input: ProblemInput) -> RotationProblem {
        RotationProblem::from_input(input).unwrap()
    }

    #[test]
    fn test_solver_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Solver>();
    }

    #[test]
    fn test_solve_produces_feasible_complete_plan() {
        let p = problem(cohort());
        let outcome = Solver::new().solve(&p).unwrap();

        assert_eq!(outcome.status, SolveStatus::Complete);
        assert!(!outcome.budget_exhausted);
        assert!(outcome.output.violations.is_empty(), "{:?}", outcome.output.violations);
        assert!(check(&p, &outcome.output.plans, CheckScope::All).is_empty());
        assert_eq!(outcome.solutions.len(), 1);
        assert_eq!(outcome.stats.attempts, 1);
        assert!(outcome.stats.moves_evaluated > 0);
        for id in ["R1", "R2"] {
            let r = outcome.output.resident(id).unwrap();
            assert!(r.ccr_completed, "{id} has no CCR");
            assert_eq!(r.core_blocks.get("ED"), Some(&1));
        }
    }

    #[test]
    fn test_solve_is_deterministic() {
        let p = problem(cohort());
        let solver = Solver::new().with_config(SolverConfig::new().with_solutions(3).with_random_seed(7));
        let a = solver.solve(&p).unwrap();
        let b = solver.solve(&p).unwrap();
        assert_eq!(a.output.plans, b.output.plans);
        assert_eq!(a.solutions, b.solutions);
    }

    #[test]
    fn test_pinned_resident_unchanged() {
        let input = cohort()
            .with_history(HistoryEntry::new("R4", 2025, 1, "Derm (NSC)").current())
            .with_history(HistoryEntry::new("R4", 2025, 2, "Cardio (NUH)").current())
            .with_pinned("R4");
        let p = problem(input);
        let outcome = Solver::new().solve(&p).unwrap();

        assert_eq!(outcome.output.plans.plan("R4"), p.initial_state().plan("R4"));
        assert_eq!(outcome.output.plans.plan("R4").unwrap().filled_count(), 2);
    }

    #[test]
    fn test_committed_postings_of_unpinned_residents_are_replanned() {
        let input = cohort().with_history(HistoryEntry::new("R4", 2025, 7, "GM (TTSH)").current());
        let p = problem(input);
        let outcome = Solver::new().solve(&p).unwrap();
        assert!(outcome.output.plans.plan("R4").unwrap().filled_count() > 1);
    }

    #[test]
    fn test_leave_is_kept() {
        let input = cohort().with_leave(LeaveRecord {
            resident_id: "R2".into(),
            block: 9,
            leave_type: "maternity".into(),
        });
        let p = problem(input);
        let outcome = Solver::new().solve(&p).unwrap();
        assert_eq!(
            outcome.output.plans.plan("R2").unwrap().slot(9),
            Some(&Slot::Leave("maternity".into()))
        );
    }

    #[test]
    fn test_step_budget_yields_partial() {
        let p = problem(cohort());
        let solver = Solver::new().with_config(SolverConfig::new().with_step_limit(5).with_solutions(3));
        let outcome = solver.solve(&p).unwrap();

        assert_eq!(outcome.status, SolveStatus::Partial);
        assert!(outcome.budget_exhausted);
        assert_eq!(outcome.stats.attempts, 1);
        assert!(outcome
            .output
            .violations
            .iter()
            .all(|v| v.code != ViolationCode::CapacityExceeded));
    }

    #[test]
    fn test_top_k_solutions_ranked_and_distinct() {
        let p = problem(cohort());
        let solver = Solver::new().with_config(SolverConfig::new().with_solutions(4).with_random_seed(3));
        let outcome = solver.solve(&p).unwrap();

        assert!(!outcome.solutions.is_empty() && outcome.solutions.len() <= 4);
        for pair in outcome.solutions.windows(2) {
            assert!(pair[0].objective >= pair[1].objective);
            assert_ne!(pair[0].plans, pair[1].plans);
        }
        assert_eq!(outcome.output.plans, outcome.solutions[0].plans);
        assert_eq!(outcome.alternates().len(), outcome.solutions.len() - 1);
    }

    #[test]
    fn test_scarce_aligned_capacity_still_meets_terminal_requirements() {
        // Six pairs and six triples only fit if every placement is aligned;
        // planning one resident at a time misaligns an early GRM.
        let mut input = ProblemInput::new(2025)
            .with_posting(Posting::core("ED (SGH)").with_capacity(1))
            .with_posting(Posting::core("GRM (CGH)").with_capacity(1).with_duration(2))
            .with_posting(Posting::core("GM (SGH)").with_capacity(1).with_duration(3))
            .with_posting(Posting::core("GM (NUH)").with_capacity(1).with_duration(3));
        for i in 1..=6 {
            input = input.with_resident(Resident::new(format!("R{i}"), 3));
        }
        let p = problem(input);
        let outcome = Solver::new().solve(&p).unwrap();

        assert_eq!(outcome.status, SolveStatus::Complete);
        assert!(outcome.output.violations.is_empty(), "{:?}", outcome.output.violations);
        for resident in &outcome.output.residents {
            assert!(resident.ccr_completed, "{} has no CCR", resident.id);
            assert_eq!(resident.core_blocks.get("GRM"), Some(&2), "{}", resident.id);
        }
    }

    #[test]
    fn test_spanning_placement_from_history_is_finished() {
        let input = ProblemInput::new(2025)
            .with_posting(Posting::core("GRM (CGH)").with_capacity(2).with_duration(2).spanning_years())
            .with_posting(Posting::core("GM (TTSH)").with_capacity(2))
            .with_resident(Resident::new("R1", 2))
            .with_history(HistoryEntry::new("R1", 2024, 12, "GRM (CGH)"));
        let p = problem(input);
        let outcome = Solver::new().solve(&p).unwrap();

        assert!(outcome.output.violations.is_empty(), "{:?}", outcome.output.violations);
        assert_eq!(outcome.output.plans.plan("R1").unwrap().posting_at(1), Some("GRM (CGH)"));
    }

    #[test]
    fn test_balance_overrides_respected() {
        // R1 and R2 are on leave for blocks 2-6, so a first pass crowds
        // Cardio into block 1 of the first half-year.
        let mut input = ProblemInput::new(2025)
            .with_posting(Posting::core("GM (TTSH)").with_capacity(6))
            .with_posting(Posting::elective("Cardio (NUH)").with_capacity(6))
            .with_deviation_override("Cardio (NUH)", 1);
        for id in ["R1", "R2", "R3"] {
            input = input
                .with_resident(Resident::new(id, 1))
                .with_preference(Preference::new(id, 1, "Cardio (NUH)"));
        }
        for id in ["R1", "R2"] {
            for block in 2..=6 {
                input = input.with_leave(LeaveRecord {
                    resident_id: id.into(),
                    block,
                    leave_type: "annual".into(),
                });
            }
        }
        let p = problem(input);
        let outcome = Solver::new().solve(&p).unwrap();

        assert!(outcome.stats.repairs > 0);
        assert!(outcome
            .output
            .violations
            .iter()
            .all(|v| v.code != ViolationCode::ImbalancedPosting));
        let counts = outcome.output.plans.occupancy().per_block("Cardio (NUH)");
        assert!(crate::constraints::window_deviation(&counts, (1, 6)) <= 1);
    }
}
