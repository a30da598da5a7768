//! OFF-block diagnostics.
//!
//! For every open block, lists the postings a resident could still have
//! been placed in and, for the rest, the rules that stand in the way. The
//! same placement predicate the solver uses decides feasibility, so a
//! posting reported feasible here is one the solver would also accept.
//!
//! A posting of duration `D` can cover block `b` from any start in
//! `b − D + 1 ..= b`. The posting is feasible when any such start passes;
//! otherwise its reasons are the distinct violations across starts, led by
//! the one for the start at `b` itself.

use crate::constraints::{check_placement, PlacementContext};
use crate::models::{OffBlockExplanation, Occupancy, Resident, RotationProblem, RotationState, Violation};

/// Explains every OFF block of every resident, in resident then block order.
pub fn explain_off_blocks(problem: &RotationProblem, state: &RotationState) -> Vec<OffBlockExplanation> {
    let occupancy = state.occupancy();
    let mut out = Vec::new();
    for resident in problem.residents() {
        let Some(plan) = state.plan(&resident.id) else {
            continue;
        };
        for block in plan.open_blocks() {
            out.push(explain(problem, resident, state, &occupancy, block));
        }
    }
    out
}

/// Explains one block of one resident.
///
/// Returns `None` for unknown residents or blocks that are not OFF.
pub fn explain_block(
    problem: &RotationProblem,
    state: &RotationState,
    resident_id: &str,
    block: u8,
) -> Option<OffBlockExplanation> {
    let resident = problem.resident(resident_id)?;
    if !state.plan(resident_id)?.is_open(block) {
        return None;
    }
    Some(explain(problem, resident, state, &state.occupancy(), block))
}

fn explain(
    problem: &RotationProblem,
    resident: &Resident,
    state: &RotationState,
    occupancy: &Occupancy,
    block: u8,
) -> OffBlockExplanation {
    let mut explanation = OffBlockExplanation {
        resident_id: resident.id.clone(),
        block,
        feasible: Vec::new(),
        infeasible: Default::default(),
    };
    let Some(plan) = state.plan(&resident.id) else {
        return explanation;
    };
    let ctx = PlacementContext::new(problem, resident, plan, occupancy).with_balance(true);

    for posting in problem.catalogue().eligible_for(resident.year) {
        let earliest = block.saturating_sub(posting.duration() - 1).max(1);
        let starts = std::iter::once(block).chain(earliest..block);

        let mut reasons: Vec<Violation> = Vec::new();
        let mut feasible = false;
        for start in starts {
            match check_placement(&ctx, posting, start) {
                Ok(()) => {
                    feasible = true;
                    break;
                }
                Err(violation) => {
                    if !reasons.contains(&violation) {
                        reasons.push(violation);
                    }
                }
            }
        }

        if feasible {
            explanation.feasible.push(posting.code.clone());
        } else {
            explanation.infeasible.insert(posting.code.clone(), reasons);
        }
    }
    explanation
}
