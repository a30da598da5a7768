//! Cohort requirement seeding.
//!
//! Residents are planned one at a time, so an early resident can take the
//! last aligned slot a later terminal-year resident needs for ED, GRM or
//! CCR. Seeding places every missing terminal-year requirement first, across
//! residents, with a backtracking search:
//!
//! - each (resident, requirement) pair is a variable;
//! - its values are the feasible `(posting, start)` placements under the
//!   current occupancy, earliest start first;
//! - the open variable with the fewest values is assigned next, and a
//!   variable with none fails the branch.
//!
//! Dead ends are bounded; past the bound the search gives up.
//!
//! # Reference
//! Russell & Norvig (2020), "Artificial Intelligence", Ch. 6: minimum
//! remaining values

use super::budget::{Budget, SolverStats};
use super::search::Workspace;
use crate::constraints::{
    check_placement, missing_requirements, placement_blocks, PlacementContext, Requirement,
};
use crate::models::{Posting, Resident, Slot, BLOCKS_PER_YEAR};

/// How seeding ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Seeding {
    /// Every missing requirement was placed.
    Placed,
    /// No joint placement was found within the dead-end bound.
    Failed,
    /// The budget ran out.
    Truncated,
}

#[derive(Debug, Clone, Copy)]
struct Variable<'p> {
    resident: &'p Resident,
    requirement: Requirement,
    /// Blocks from 1 kept for a carried-over spanning placement.
    reserved: u8,
}

struct Control<'b> {
    budget: &'b mut Budget,
    stats: &'b mut SolverStats,
    dead_ends: u32,
    limit: u32,
}

/// Places the missing requirements of every unpinned terminal-year
/// resident in `order`.
///
/// On [`Seeding::Placed`] the workspace holds exactly the requirement
/// placements on top of its starting state. On [`Seeding::Failed`] it is
/// back to its starting state. On [`Seeding::Truncated`] it holds a partial
/// assignment and should be discarded.
pub(crate) fn seed_requirements(
    ws: &mut Workspace<'_>,
    order: &[usize],
    budget: &mut Budget,
    stats: &mut SolverStats,
    limit: u32,
) -> Seeding {
    let problem = ws.problem();
    let mut variables = Vec::new();
    for &idx in order {
        let resident = &problem.residents()[idx];
        if problem.is_pinned(&resident.id) {
            continue;
        }
        let Some(plan) = ws.state().plan(&resident.id) else {
            continue;
        };
        let reserved = problem
            .carried_placement(&resident.id)
            .map_or(0, |(_, owed)| owed);
        for requirement in missing_requirements(problem, resident, plan) {
            variables.push(Variable {
                resident,
                requirement,
                reserved,
            });
        }
    }

    let mut open = vec![true; variables.len()];
    let mut control = Control {
        budget,
        stats,
        dead_ends: 0,
        limit,
    };
    assign(ws, &variables, &mut open, &mut control)
}

fn assign<'p>(
    ws: &mut Workspace<'p>,
    variables: &[Variable<'p>],
    open: &mut [bool],
    ctl: &mut Control<'_>,
) -> Seeding {
    let mut choice: Option<(usize, Vec<(&'p Posting, u8)>)> = None;
    for (idx, var) in variables.iter().enumerate() {
        if !open[idx] {
            continue;
        }
        let values = candidate_values(ws, var, ctl.stats);
        if values.is_empty() {
            ctl.dead_ends += 1;
            return Seeding::Failed;
        }
        if choice.as_ref().map_or(true, |(_, best)| values.len() < best.len()) {
            choice = Some((idx, values));
        }
    }
    let Some((idx, values)) = choice else {
        return Seeding::Placed;
    };

    let resident = variables[idx].resident;
    open[idx] = false;
    for (posting, start) in values {
        if !ctl.budget.step() {
            return Seeding::Truncated;
        }
        place(ws, resident, posting, start, Slot::Posting(posting.code.clone()));
        match assign(ws, variables, open, ctl) {
            Seeding::Failed => {}
            done => return done,
        }
        place(ws, resident, posting, start, Slot::Open);
        ctl.stats.backtracks += 1;
        if ctl.dead_ends >= ctl.limit {
            break;
        }
    }
    open[idx] = true;
    Seeding::Failed
}

fn candidate_values<'p>(
    ws: &Workspace<'p>,
    var: &Variable<'p>,
    stats: &mut SolverStats,
) -> Vec<(&'p Posting, u8)> {
    let problem = ws.problem();
    let Some(plan) = ws.state().plan(&var.resident.id) else {
        return Vec::new();
    };
    let ctx = PlacementContext::new(problem, var.resident, plan, ws.occupancy());

    let mut values = Vec::new();
    for start in (var.reserved + 1)..=BLOCKS_PER_YEAR {
        if !plan.is_open(start) {
            continue;
        }
        for posting in problem
            .catalogue()
            .eligible_for(var.resident.year)
            .filter(|p| var.requirement.is_met_by(p))
        {
            let accepted = check_placement(&ctx, posting, start).is_ok();
            stats.record_move(accepted);
            if accepted {
                values.push((posting, start));
            }
        }
    }
    values
}

fn place(ws: &mut Workspace<'_>, resident: &Resident, posting: &Posting, start: u8, slot: Slot) {
    for block in placement_blocks(posting, start) {
        ws.set_slot(&resident.id, block, slot.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::requirement_deficits;
    use crate::models::{HistoryEntry, ProblemInput, RotationProblem};

    fn scarce_cohort() -> RotationProblem {
        let mut input = ProblemInput::new(2025)
            .with_posting(Posting::core("ED (SGH)").with_capacity(1))
            .with_posting(Posting::core("GRM (CGH)").with_capacity(1).with_duration(2))
            .with_posting(Posting::core("GM (SGH)").with_capacity(1).with_duration(3))
            .with_posting(Posting::core("GM (NUH)").with_capacity(1).with_duration(3));
        for i in 1..=6 {
            input = input.with_resident(Resident::new(format!("R{i}"), 3));
        }
        RotationProblem::from_input(input).unwrap()
    }

    fn seed(problem: &RotationProblem, limit: u32) -> (Seeding, Workspace<'_>) {
        let mut ws = Workspace::new(problem, problem.initial_state().clone());
        let order: Vec<usize> = (0..problem.residents().len()).collect();
        let mut budget = Budget::unlimited();
        let mut stats = SolverStats::default();
        let outcome = seed_requirements(&mut ws, &order, &mut budget, &mut stats, limit);
        (outcome, ws)
    }

    #[test]
    fn test_places_every_requirement_under_scarce_capacity() {
        let p = scarce_cohort();
        let (outcome, ws) = seed(&p, 64);

        assert_eq!(outcome, Seeding::Placed);
        for resident in p.residents() {
            let plan = ws.state().plan(&resident.id).unwrap();
            assert_eq!(requirement_deficits(&p, resident, plan), 0, "{}", resident.id);
            // ED, GRM pair and CCR triple
            assert_eq!(plan.filled_count(), 6);
        }
        assert_eq!(ws.occupancy(), &ws.state().occupancy());
        for (_, counts) in ws.occupancy().iter() {
            assert!(counts.iter().all(|&n| n <= 1));
        }
    }

    #[test]
    fn test_impossible_cohort_restores_state() {
        // seven GRM pairs cannot fit twelve single-capacity blocks
        let p = RotationProblem::from_input(
            (1..=7).fold(
                ProblemInput::new(2025)
                    .with_posting(Posting::core("ED (SGH)").with_capacity(7))
                    .with_posting(Posting::core("GRM (CGH)").with_capacity(1).with_duration(2))
                    .with_posting(Posting::core("GM (SGH)").with_capacity(7).with_duration(3)),
                |input, i| input.with_resident(Resident::new(format!("R{i}"), 3)),
            ),
        )
        .unwrap();
        let (outcome, ws) = seed(&p, 8);

        assert_eq!(outcome, Seeding::Failed);
        assert_eq!(ws.state(), p.initial_state());
        assert_eq!(ws.occupancy(), &p.initial_state().occupancy());
    }

    #[test]
    fn test_met_requirements_and_carried_blocks_left_alone() {
        let p = RotationProblem::from_input(
            ProblemInput::new(2025)
                .with_posting(Posting::core("ED (SGH)").with_capacity(2))
                .with_posting(Posting::core("GRM (CGH)").with_capacity(2).with_duration(2).spanning_years())
                .with_posting(Posting::core("GM (SGH)").with_capacity(2).with_duration(3))
                .with_resident(Resident::new("R1", 3))
                .with_history(HistoryEntry::new("R1", 2024, 12, "GRM (CGH)")),
        )
        .unwrap();
        let (outcome, ws) = seed(&p, 64);
        let plan = ws.state().plan("R1").unwrap();

        assert_eq!(outcome, Seeding::Placed);
        assert!(plan.is_open(1));
        assert_eq!(plan.filled_count(), 4);
        assert!(plan.iter().all(|(_, slot)| slot.posting() != Some("GRM (CGH)")));
    }
}
