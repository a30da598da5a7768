//! Placement predicate.
//!
//! Tests whether one tentative placement may be added to a resident's
//! current plan. The solver uses it to generate candidate moves and the
//! diagnostics generator uses it to explain OFF blocks, so both agree on
//! what "feasible" means.

use std::ops::RangeInclusive;

use super::introduced;
use super::rules::{resident_violations, window_deviation, window_of};
use crate::models::{
    Occupancy, Posting, Resident, RotationProblem, Slot, Violation, ViolationCode, YearPlan,
    BLOCKS_PER_YEAR, MID_YEAR_BLOCK,
};

/// Snapshot a placement is checked against.
#[derive(Debug, Clone)]
pub struct PlacementContext<'a> {
    problem: &'a RotationProblem,
    resident: &'a Resident,
    plan: &'a YearPlan,
    occupancy: &'a Occupancy,
    enforce_balance: bool,
    baseline: Vec<Violation>,
}

impl<'a> PlacementContext<'a> {
    /// Creates a context. `occupancy` must already include `plan`.
    pub fn new(
        problem: &'a RotationProblem,
        resident: &'a Resident,
        plan: &'a YearPlan,
        occupancy: &'a Occupancy,
    ) -> Self {
        Self {
            problem,
            resident,
            plan,
            occupancy,
            enforce_balance: false,
            baseline: resident_violations(problem, resident, plan),
        }
    }

    /// Enables the balance check (only effective when overrides are supplied).
    pub fn with_balance(mut self, enforce: bool) -> Self {
        self.enforce_balance = enforce && self.problem.balance_enabled();
        self
    }

    /// Violations the plan already carries before the placement.
    pub fn baseline(&self) -> &[Violation] {
        &self.baseline
    }
}

/// Blocks a placement of `posting` starting at `start` would cover.
///
/// May extend past block 12; [`check_placement`] rejects such placements.
pub fn placement_blocks(posting: &Posting, start: u8) -> RangeInclusive<u8> {
    run_blocks(start, posting.duration())
}

/// `plan` with `posting` placed from `start`.
pub fn with_placement(plan: &YearPlan, posting: &Posting, start: u8) -> YearPlan {
    with_run(plan, posting, start, posting.duration())
}

/// `plan` with `posting` over `len` blocks from `start`.
fn with_run(plan: &YearPlan, posting: &Posting, start: u8, len: u8) -> YearPlan {
    let mut tentative = plan.clone();
    for block in run_blocks(start, len) {
        tentative.set(block, Slot::Posting(posting.code.clone()));
    }
    tentative
}

fn run_blocks(start: u8, len: u8) -> RangeInclusive<u8> {
    start..=start.saturating_add(len.max(1) - 1)
}

/// Checks one tentative placement.
///
/// Order: fit into open blocks of the year, mid-year boundary, capacity,
/// balance (when enforced), then the single-resident rules on the
/// tentative plan. Only violations the placement introduces are reported.
///
/// # Errors
/// The first violation found.
pub fn check_placement(
    ctx: &PlacementContext<'_>,
    posting: &Posting,
    start: u8,
) -> Result<(), Violation> {
    check_run(ctx, posting, start, posting.duration())
}

/// Checks the blocks 1..=`owed` that finish a spanning placement carried
/// over from the previous year.
///
/// Same checks as [`check_placement`]; a short run is only accepted here
/// because the prior-year blocks complete it.
///
/// # Errors
/// The first violation found.
pub fn check_continuation(
    ctx: &PlacementContext<'_>,
    posting: &Posting,
    owed: u8,
) -> Result<(), Violation> {
    check_run(ctx, posting, 1, owed)
}

fn check_run(
    ctx: &PlacementContext<'_>,
    posting: &Posting,
    start: u8,
    duration: u8,
) -> Result<(), Violation> {
    let blocks = run_blocks(start, duration);
    let code = posting.code.as_str();

    let fits = start >= 1
        && *blocks.end() <= BLOCKS_PER_YEAR
        && blocks.clone().all(|b| ctx.plan.is_open(b));
    if !fits {
        return Err(Violation::new(
            ViolationCode::NonContiguousPlacement,
            format!("{code} needs {duration} consecutive open blocks from block {start}"),
        )
        .for_resident(&ctx.resident.id)
        .for_posting(code)
        .at_blocks(blocks.filter(|b| *b <= BLOCKS_PER_YEAR).collect()));
    }

    if blocks.contains(&MID_YEAR_BLOCK) && blocks.contains(&(MID_YEAR_BLOCK + 1)) {
        return Err(Violation::new(
            ViolationCode::SpansYearBoundary,
            format!(
                "{code} from block {start} would run across blocks {MID_YEAR_BLOCK} and {}",
                MID_YEAR_BLOCK + 1
            ),
        )
        .for_resident(&ctx.resident.id)
        .for_posting(code)
        .at_blocks(blocks.collect()));
    }

    let full: Vec<u8> = blocks
        .clone()
        .filter(|&b| ctx.occupancy.get(code, b) >= posting.max_residents)
        .collect();
    if !full.is_empty() {
        return Err(Violation::new(
            ViolationCode::CapacityExceeded,
            format!(
                "{code} is full ({} residents) in block(s) {full:?}",
                posting.max_residents
            ),
        )
        .for_resident(&ctx.resident.id)
        .for_posting(code)
        .at_blocks(full));
    }

    if ctx.enforce_balance {
        if let Some(tolerance) = ctx.problem.deviation_for(code) {
            let before = ctx.occupancy.per_block(code);
            let mut after = before;
            for b in blocks.clone() {
                after[b as usize - 1] += 1;
            }
            let mut windows: Vec<(u8, u8)> = blocks.clone().map(window_of).collect();
            windows.dedup();
            for window in windows {
                let old = window_deviation(&before, window);
                let new = window_deviation(&after, window);
                if new > tolerance && new > old {
                    return Err(Violation::new(
                        ViolationCode::ImbalancedPosting,
                        format!(
                            "{code} would vary by {new} across blocks {}-{} (tolerance {tolerance})",
                            window.0, window.1
                        ),
                    )
                    .for_resident(&ctx.resident.id)
                    .for_posting(code)
                    .at_blocks(blocks.collect()));
                }
            }
        }
    }

    let tentative = with_run(ctx.plan, posting, start, duration);
    let after = resident_violations(ctx.problem, ctx.resident, &tentative);
    match introduced(&ctx.baseline, after).into_iter().next() {
        Some(violation) => Err(violation),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{HistoryEntry, ProblemInput, RotationState};

    fn problem() -> RotationProblem {
        let input = ProblemInput::new(2025)
            .with_resident(Resident::new("R1", 2))
            .with_resident(Resident::new("R2", 3))
            .with_posting(Posting::core("ED (SGH)").with_capacity(2))
            .with_posting(Posting::core("GRM (CGH)").with_duration(2).with_capacity(2))
            .with_posting(Posting::core("GM (TTSH)").with_capacity(5))
            .with_posting(Posting::core("GM (SGH)").with_capacity(2))
            .with_posting(Posting::core("GM (NUH)").with_capacity(2))
            .with_posting(Posting::core("MICU (TTSH)").with_capacity(2))
            .with_posting(Posting::elective("Cardio (NUH)").with_capacity(3))
            .with_history(HistoryEntry::new("R1", 2024, 2, "GM (SGH)"));
        RotationProblem::from_input(input).unwrap()
    }

    fn state_with_full_ttsh() -> RotationState {
        let mut state = RotationState::new();
        for i in 0..5 {
            state.insert(format!("X{i}"), YearPlan::from_codes(&["", "", "GM (TTSH)"]));
        }
        state.insert("R1", YearPlan::new());
        state
    }

    #[test]
    fn test_capacity_full_block_rejected() {
        let p = problem();
        let state = state_with_full_ttsh();
        let occ = state.occupancy();
        let r1 = p.resident("R1").unwrap();
        let plan = YearPlan::new();
        let ctx = PlacementContext::new(&p, r1, &plan, &occ);
        let ttsh = p.catalogue().get("GM (TTSH)").unwrap();

        let err = check_placement(&ctx, ttsh, 3).unwrap_err();
        assert_eq!(err.code, ViolationCode::CapacityExceeded);
        assert_eq!(err.blocks, vec![3]);
        assert!(check_placement(&ctx, ttsh, 4).is_ok());
    }

    #[test]
    fn test_needs_open_run_within_year() {
        let p = problem();
        let occ = Occupancy::default();
        let r1 = p.resident("R1").unwrap();
        let plan = YearPlan::from_codes(&["", "Cardio (NUH)"]);
        let ctx = PlacementContext::new(&p, r1, &plan, &occ);
        let grm = p.catalogue().get("GRM (CGH)").unwrap();

        assert_eq!(
            check_placement(&ctx, grm, 1).unwrap_err().code,
            ViolationCode::NonContiguousPlacement
        );
        assert_eq!(
            check_placement(&ctx, grm, 12).unwrap_err().code,
            ViolationCode::NonContiguousPlacement
        );
        assert_eq!(
            check_placement(&ctx, grm, 6).unwrap_err().code,
            ViolationCode::SpansYearBoundary
        );
        assert!(check_placement(&ctx, grm, 7).is_ok());
    }

    #[test]
    fn test_reports_only_introduced_rule_breaks() {
        let p = problem();
        let occ = Occupancy::default();
        let r2 = p.resident("R2").unwrap();
        let plan = YearPlan::new();
        let ctx = PlacementContext::new(&p, r2, &plan, &occ);
        // terminal resident already misses ED, GRM and CCR
        assert_eq!(ctx.baseline().len(), 3);
        let ed = p.catalogue().get("ED (SGH)").unwrap();
        assert!(check_placement(&ctx, ed, 1).is_ok());

        let plan = YearPlan::from_codes(&["ED (SGH)"]);
        let occ = RotationState::new().with_plan("R2", plan.clone()).occupancy();
        let ctx = PlacementContext::new(&p, r2, &plan, &occ);
        assert_eq!(
            check_placement(&ctx, ed, 5).unwrap_err().code,
            ViolationCode::WrongEdGrmCount
        );
    }

    #[test]
    fn test_second_ccr_rejected() {
        let p = problem();
        let occ = Occupancy::default();
        let r1 = p.resident("R1").unwrap();
        let plan = YearPlan::new();
        let ctx = PlacementContext::new(&p, r1, &plan, &occ);
        let nuh = p.catalogue().get("GM (NUH)").unwrap();
        assert_eq!(
            check_placement(&ctx, nuh, 4).unwrap_err().code,
            ViolationCode::CcrOverSatisfied
        );
    }

    #[test]
    fn test_micu_split_rejected() {
        let p = problem();
        let occ = Occupancy::default();
        let r1 = p.resident("R1").unwrap();
        let plan = YearPlan::from_codes(&["MICU (TTSH)"]);
        let ctx = PlacementContext::new(&p, r1, &plan, &occ);
        let micu = p.catalogue().get("MICU (TTSH)").unwrap();
        assert!(check_placement(&ctx, micu, 2).is_ok());
        assert_eq!(
            check_placement(&ctx, micu, 4).unwrap_err().code,
            ViolationCode::MicuRccmNotContiguous
        );
    }

    #[test]
    fn test_continuation_finishes_carried_placement() {
        let input = ProblemInput::new(2025)
            .with_resident(Resident::new("R1", 2))
            .with_posting(Posting::core("GRM (CGH)").with_duration(2).spanning_years().with_capacity(1))
            .with_posting(Posting::core("GM (TTSH)").with_capacity(5))
            .with_history(HistoryEntry::new("R1", 2024, 12, "GRM (CGH)"));
        let p = RotationProblem::from_input(input).unwrap();
        let r1 = p.resident("R1").unwrap();
        let grm = p.catalogue().get("GRM (CGH)").unwrap();
        let plan = YearPlan::new();
        let occ = Occupancy::default();
        let ctx = PlacementContext::new(&p, r1, &plan, &occ);

        assert_eq!(ctx.baseline().len(), 1);
        assert!(check_continuation(&ctx, grm, 1).is_ok());
        // a full-length run from block 1 leaves a short piece behind
        assert_eq!(
            check_placement(&ctx, grm, 1).unwrap_err().code,
            ViolationCode::NonContiguousPlacement
        );

        let occ = RotationState::new()
            .with_plan("X1", YearPlan::from_codes(&["GRM (CGH)"]))
            .occupancy();
        let ctx = PlacementContext::new(&p, r1, &plan, &occ);
        assert_eq!(
            check_continuation(&ctx, grm, 1).unwrap_err().code,
            ViolationCode::CapacityExceeded
        );
    }

    #[test]
    fn test_balance_enforced_only_on_request() {
        let input = ProblemInput::new(2025)
            .with_resident(Resident::new("R1", 1))
            .with_resident(Resident::new("R2", 1))
            .with_posting(Posting::elective("Cardio (NUH)").with_capacity(3))
            .with_deviation_override("Cardio (NUH)", 1);
        let p = RotationProblem::from_input(input).unwrap();
        let state = RotationState::new()
            .with_plan("R1", YearPlan::from_codes(&["Cardio (NUH)"]))
            .with_plan("R2", YearPlan::new());
        let occ = state.occupancy();
        let r2 = p.resident("R2").unwrap();
        let plan = YearPlan::new();
        let cardio = p.catalogue().get("Cardio (NUH)").unwrap();

        let relaxed = PlacementContext::new(&p, r2, &plan, &occ);
        assert!(check_placement(&relaxed, cardio, 1).is_ok());

        let strict = PlacementContext::new(&p, r2, &plan, &occ).with_balance(true);
        assert_eq!(
            check_placement(&strict, cardio, 1).unwrap_err().code,
            ViolationCode::ImbalancedPosting
        );
        assert!(check_placement(&strict, cardio, 2).is_ok());
    }
}
