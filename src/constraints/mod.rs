//! Constraint engine.
//!
//! Pure rule predicates over a [`RotationState`] snapshot. Failure is
//! always a returned [`Violation`] list; nothing here mutates state.
//!
//! # Rules
//!
//! | Code | Scope | Rule |
//! |------|-------|------|
//! | `CAPACITY_EXCEEDED` | cohort | filled ≤ `max_residents` per posting-block |
//! | `NON_CONTIGUOUS_PLACEMENT` | resident | placements cover their full duration |
//! | `MICU_RCCM_NOT_CONTIGUOUS` | resident | MICU/RCCM blocks form one run per year |
//! | `SPANS_YEAR_BOUNDARY` | resident | no placement covers blocks 6 and 7 |
//! | `WRONG_ED_GRM_COUNT` | resident | ED and GRM placed exactly once |
//! | `CCR_NOT_SATISFIED` / `CCR_OVER_SATISFIED` | resident | exactly one CCR placement |
//! | `IMBALANCED_POSTING` | cohort | half-year spread within tolerance |
//! | `BLOCK_ON_LEAVE` | edit | no posting on a leave block |
//!
//! Placements are derived from a resident's career timeline, so the
//! cardinality rules see history as well as the current year.

mod placement;
pub mod rules;

pub use placement::{
    check_continuation, check_placement, placement_blocks, with_placement, PlacementContext,
};
pub use rules::{
    missing_requirements, requirement_deficits, resident_violations, window_deviation, Requirement,
    HALF_YEAR_WINDOWS,
};

use crate::models::{RotationProblem, RotationState, Violation};

/// Residents a check covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckScope<'a> {
    /// Every resident plus the cohort rules (capacity, balance).
    All,
    /// One resident's single-resident rules only.
    Resident(&'a str),
}

/// Checks a state against the hard rules.
///
/// Balance is only checked for [`CheckScope::All`] and only when
/// deviation overrides were supplied.
pub fn check(problem: &RotationProblem, state: &RotationState, scope: CheckScope<'_>) -> Vec<Violation> {
    match scope {
        CheckScope::All => {
            let occupancy = state.occupancy();
            let mut out = rules::capacity_violations(problem.catalogue(), &occupancy);
            for resident in problem.residents() {
                if let Some(plan) = state.plan(&resident.id) {
                    out.extend(resident_violations(problem, resident, plan));
                }
            }
            out.extend(rules::balance_violations(problem, &occupancy));
            out
        }
        CheckScope::Resident(id) => match (problem.resident(id), state.plan(id)) {
            (Some(resident), Some(plan)) => resident_violations(problem, resident, plan),
            _ => Vec::new(),
        },
    }
}

/// Violations in `after` that `baseline` does not already carry.
///
/// Multiset difference: a violation present twice after but once before
/// is reported once.
pub fn introduced(baseline: &[Violation], after: Vec<Violation>) -> Vec<Violation> {
    let mut remaining: Vec<&Violation> = baseline.iter().collect();
    after
        .into_iter()
        .filter(|v| match remaining.iter().position(|b| *b == v) {
            Some(pos) => {
                remaining.swap_remove(pos);
                false
            }
            None => true,
        })
        .collect()
}
