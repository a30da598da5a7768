//! Per-resident depth-first search.
//!
//! A resident's open blocks are filled left to right. Each open block is a
//! [`Frame`] holding its ranked candidate moves; taking a move pushes the
//! frame for the next open block. Every slot change is recorded on a trail
//! so backtracking restores both the plan and the occupancy counts exactly.
//!
//! The first complete plan is the greedy one. Terminal-year residents whose
//! plan still misses ED, GRM or CCR keep searching, up to a bounded number
//! of complete plans; the best plan seen (fewest missing requirements, then
//! highest score) is kept.

use tracing::trace;

use super::budget::{Budget, SolverStats};
use crate::constraints::{
    check_continuation, check_placement, requirement_deficits, with_placement, PlacementContext,
};
use crate::models::{Occupancy, Resident, RotationProblem, RotationState, Slot, YearPlan};
use crate::scoring::ObjectiveScorer;

/// Mutable search state: plans plus occupancy kept in step.
#[derive(Debug, Clone)]
pub(crate) struct Workspace<'p> {
    problem: &'p RotationProblem,
    state: RotationState,
    occupancy: Occupancy,
    enforce_balance: bool,
    trail: Vec<Change>,
}

/// One undoable slot change.
#[derive(Debug, Clone)]
struct Change {
    block: u8,
    previous: Slot,
}

impl<'p> Workspace<'p> {
    pub(crate) fn new(problem: &'p RotationProblem, state: RotationState) -> Self {
        let occupancy = state.occupancy();
        Self {
            problem,
            state,
            occupancy,
            enforce_balance: false,
            trail: Vec::new(),
        }
    }

    pub(crate) fn problem(&self) -> &'p RotationProblem {
        self.problem
    }

    pub(crate) fn state(&self) -> &RotationState {
        &self.state
    }

    pub(crate) fn occupancy(&self) -> &Occupancy {
        &self.occupancy
    }

    pub(crate) fn into_state(self) -> RotationState {
        self.state
    }

    /// Turns the balance check of the placement predicate on or off.
    pub(crate) fn set_balance(&mut self, enforce: bool) {
        self.enforce_balance = enforce;
    }

    fn plan(&self, resident_id: &str) -> Option<&YearPlan> {
        self.state.plan(resident_id)
    }

    /// Sets one slot and updates occupancy. Returns the previous slot.
    pub(crate) fn set_slot(&mut self, resident_id: &str, block: u8, slot: Slot) -> Option<Slot> {
        let plan = self.state.plan_mut(resident_id)?;
        let previous = plan.set(block, slot.clone())?;
        self.occupancy.replace(block, &previous, &slot);
        Some(previous)
    }

    /// Overwrites a resident's plan slot by slot.
    pub(crate) fn replace_plan(&mut self, resident_id: &str, plan: &YearPlan) {
        for (block, slot) in plan.iter() {
            let unchanged = self
                .plan(resident_id)
                .and_then(|current| current.slot(block))
                .is_some_and(|current| current == slot);
            if !unchanged {
                self.set_slot(resident_id, block, slot.clone());
            }
        }
    }

    fn apply(&mut self, resident_id: &str, mv: &Move) {
        if let Move::Place {
            posting,
            start,
            duration,
        } = mv
        {
            for block in *start..start + duration {
                if let Some(previous) = self.set_slot(resident_id, block, Slot::Posting(posting.clone())) {
                    self.trail.push(Change { block, previous });
                }
            }
        }
    }

    fn rollback(&mut self, resident_id: &str, mark: usize) {
        while self.trail.len() > mark {
            let Some(change) = self.trail.pop() else {
                break;
            };
            self.set_slot(resident_id, change.block, change.previous);
        }
    }
}

/// A decision at one open block.
#[derive(Debug, Clone, PartialEq)]
enum Move {
    /// Place `posting` over `start..start + duration`.
    Place { posting: String, start: u8, duration: u8 },
    /// Leave the block OFF.
    Off { block: u8 },
}

impl Move {
    /// First block after the move.
    fn next_from(&self) -> u8 {
        match self {
            Move::Place { start, duration, .. } => start + duration,
            Move::Off { block } => block + 1,
        }
    }
}

/// Search node for one open block.
#[derive(Debug)]
struct Frame {
    block: u8,
    candidates: Vec<Move>,
    cursor: usize,
    /// Trail length before any of this frame's moves.
    trail_mark: usize,
}

impl Frame {
    fn next_move(&mut self) -> Option<Move> {
        let mv = self.candidates.get(self.cursor).cloned();
        if mv.is_some() {
            self.cursor += 1;
        }
        mv
    }
}

/// Where a resident's search stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// No move taken yet.
    Open,
    /// Descending through open blocks.
    Placing,
    /// Backtracking after a plan that misses requirements.
    Constrained,
}

/// A complete plan reached by the search.
#[derive(Debug, Clone)]
struct Leaf {
    deficits: usize,
    score: f64,
    plan: YearPlan,
}

impl Leaf {
    fn capture(ws: &Workspace<'_>, scorer: &ObjectiveScorer<'_>, resident: &Resident) -> Self {
        let plan = ws.plan(&resident.id).cloned().unwrap_or_default();
        Self {
            deficits: requirement_deficits(ws.problem, resident, &plan),
            score: scorer.score(resident, &plan).total(),
            plan,
        }
    }

    fn better_than(&self, other: &Leaf) -> bool {
        self.deficits < other.deficits || (self.deficits == other.deficits && self.score > other.score)
    }
}

/// Result of planning one resident.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ResidentOutcome {
    /// Missing terminal-year requirements in the kept plan.
    pub deficits: usize,
    /// Complete plans rejected before the kept one.
    pub backtracks: u32,
    /// Whether the budget ran out during the search.
    pub truncated: bool,
}

/// Fills a resident's open blocks.
///
/// Blocks already holding a posting or leave are left alone. When the
/// budget runs out before any complete plan is reached, the placements
/// made so far are kept.
pub(crate) fn plan_resident(
    ws: &mut Workspace<'_>,
    resident: &Resident,
    budget: &mut Budget,
    stats: &mut SolverStats,
    max_backtracks: u32,
) -> ResidentOutcome {
    let scorer = ObjectiveScorer::new(ws.problem);
    let id = resident.id.as_str();
    ws.trail.clear();

    let mut stack: Vec<Frame> = Vec::new();
    let mut best: Option<Leaf> = None;
    let mut backtracks = 0u32;
    let mut truncated = false;
    let mut phase = Phase::Open;

    match ws.plan(id).and_then(|p| p.next_open_from(1)) {
        Some(block) => {
            let candidates = candidate_moves(ws, &scorer, resident, block, stats);
            stack.push(Frame {
                block,
                candidates,
                cursor: 0,
                trail_mark: 0,
            });
        }
        None => best = Some(Leaf::capture(ws, &scorer, resident)),
    }

    while let Some(top) = stack.last_mut() {
        if !budget.step() {
            truncated = true;
            break;
        }
        let mark = top.trail_mark;
        let next = top.next_move();
        let block = top.block;
        ws.rollback(id, mark);

        let Some(mv) = next else {
            trace!(resident = %id, block, phase = ?phase, "frame exhausted");
            stack.pop();
            continue;
        };
        ws.apply(id, &mv);
        if phase == Phase::Open {
            phase = Phase::Placing;
        }

        match ws.plan(id).and_then(|p| p.next_open_from(mv.next_from())) {
            Some(next_block) => {
                let candidates = candidate_moves(ws, &scorer, resident, next_block, stats);
                stack.push(Frame {
                    block: next_block,
                    candidates,
                    cursor: 0,
                    trail_mark: ws.trail.len(),
                });
            }
            None => {
                let leaf = Leaf::capture(ws, &scorer, resident);
                let satisfied = leaf.deficits == 0;
                if best.as_ref().map_or(true, |b| leaf.better_than(b)) {
                    best = Some(leaf);
                }
                if satisfied || backtracks >= max_backtracks {
                    break;
                }
                backtracks += 1;
                phase = Phase::Constrained;
                trace!(resident = %id, backtracks, phase = ?phase, "plan misses requirements");
            }
        }
    }

    trace!(resident = %id, phase = ?phase, truncated, "search finished");
    ws.trail.clear();
    if let Some(leaf) = &best {
        ws.replace_plan(id, &leaf.plan);
    }
    stats.backtracks += u64::from(backtracks);

    let deficits = match &best {
        Some(leaf) => leaf.deficits,
        None => ws
            .plan(id)
            .map_or(0, |plan| requirement_deficits(ws.problem, resident, plan)),
    };
    ResidentOutcome {
        deficits,
        backtracks,
        truncated,
    }
}

/// Ranked moves for `block`: feasible placements starting there, best
/// marginal objective first, then best marginal preference, then code;
/// leaving the block OFF comes last.
///
/// At block 1 a feasible continuation of a spanning placement carried over
/// from the previous year is the only move.
fn candidate_moves(
    ws: &Workspace<'_>,
    scorer: &ObjectiveScorer<'_>,
    resident: &Resident,
    block: u8,
    stats: &mut SolverStats,
) -> Vec<Move> {
    let off = Move::Off { block };
    let Some(plan) = ws.plan(&resident.id) else {
        return vec![off];
    };
    let ctx = PlacementContext::new(ws.problem, resident, plan, &ws.occupancy).with_balance(ws.enforce_balance);

    if block == 1 {
        if let Some((posting, owed)) = ws.problem.carried_placement(&resident.id) {
            let accepted = check_continuation(&ctx, posting, owed).is_ok();
            stats.record_move(accepted);
            if accepted {
                return vec![Move::Place {
                    posting: posting.code.clone(),
                    start: 1,
                    duration: owed,
                }];
            }
        }
    }

    let base = scorer.score(resident, plan);

    let mut ranked: Vec<(f64, f64, Move)> = Vec::new();
    for posting in ws.problem.catalogue().eligible_for(resident.year) {
        let accepted = check_placement(&ctx, posting, block).is_ok();
        stats.record_move(accepted);
        if !accepted {
            continue;
        }
        let after = scorer.score(resident, &with_placement(plan, posting, block));
        ranked.push((
            after.total() - base.total(),
            after.preference - base.preference,
            Move::Place {
                posting: posting.code.clone(),
                start: block,
                duration: posting.duration(),
            },
        ));
    }

    ranked.sort_by(|a, b| {
        b.0.total_cmp(&a.0)
            .then_with(|| b.1.total_cmp(&a.1))
            .then_with(|| move_code(&a.2).cmp(move_code(&b.2)))
    });

    let mut moves: Vec<Move> = ranked.into_iter().map(|(_, _, mv)| mv).collect();
    moves.push(off);
    moves
}

fn move_code(mv: &Move) -> &str {
    match mv {
        Move::Place { posting, .. } => posting,
        Move::Off { .. } => "",
    }
}
