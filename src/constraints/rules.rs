//! Hard rules.
//!
//! Each rule is a pure function over a snapshot; none of them mutates its
//! input. Cohort rules work on an [`Occupancy`]; resident rules work on one
//! resident's career timeline with a tentative current-year plan.

use crate::models::{
    posting_base, Occupancy, Placement, Posting, PostingCatalogue, Resident, RotationProblem,
    Slot, Violation, ViolationCode, YearPlan, BLOCKS_PER_YEAR, CRITICAL_CARE_BASES,
    MID_YEAR_BLOCK,
};

/// Half-year windows used by the balance rule, as inclusive block ranges.
pub const HALF_YEAR_WINDOWS: [(u8, u8); 2] = [(1, MID_YEAR_BLOCK), (MID_YEAR_BLOCK + 1, BLOCKS_PER_YEAR)];

/// Core bases that must be placed exactly once.
pub const SINGLE_PLACEMENT_BASES: [&str; 2] = ["ED", "GRM"];

/// `max − min` of the counts within an inclusive block window.
pub fn window_deviation(counts: &[u32; BLOCKS_PER_YEAR as usize], window: (u8, u8)) -> u32 {
    let slice = &counts[window.0 as usize - 1..window.1 as usize];
    let max = slice.iter().copied().max().unwrap_or(0);
    let min = slice.iter().copied().min().unwrap_or(0);
    max - min
}

/// Window containing `block`.
pub fn window_of(block: u8) -> (u8, u8) {
    if block <= MID_YEAR_BLOCK {
        HALF_YEAR_WINDOWS[0]
    } else {
        HALF_YEAR_WINDOWS[1]
    }
}

/// `CAPACITY_EXCEEDED` for every (posting, block) filled beyond capacity.
pub fn capacity_violations(catalogue: &PostingCatalogue, occupancy: &Occupancy) -> Vec<Violation> {
    let mut out = Vec::new();
    for (code, counts) in occupancy.iter() {
        let Some(posting) = catalogue.get(code) else {
            continue;
        };
        for (idx, &filled) in counts.iter().enumerate() {
            if filled > posting.max_residents {
                let block = idx as u8 + 1;
                out.push(
                    Violation::new(
                        ViolationCode::CapacityExceeded,
                        format!(
                            "{code} holds {filled} residents in block {block} (capacity {})",
                            posting.max_residents
                        ),
                    )
                    .for_posting(code)
                    .at_blocks(vec![block]),
                );
            }
        }
    }
    out
}

/// `IMBALANCED_POSTING` per (posting, window) beyond its tolerance.
///
/// Empty unless deviation overrides were supplied with the problem.
pub fn balance_violations(problem: &RotationProblem, occupancy: &Occupancy) -> Vec<Violation> {
    let mut out = Vec::new();
    for posting in problem.catalogue().iter() {
        let Some(tolerance) = problem.deviation_for(&posting.code) else {
            continue;
        };
        let counts = occupancy.per_block(&posting.code);
        for window in HALF_YEAR_WINDOWS {
            let deviation = window_deviation(&counts, window);
            if deviation > tolerance {
                out.push(
                    Violation::new(
                        ViolationCode::ImbalancedPosting,
                        format!(
                            "{} varies by {deviation} across blocks {}-{} (tolerance {tolerance})",
                            posting.code, window.0, window.1
                        ),
                    )
                    .for_posting(&posting.code)
                    .at_blocks((window.0..=window.1).collect()),
                );
            }
        }
    }
    out
}

/// Every single-resident rule over a tentative current-year plan.
///
/// Covers contiguous duration, the mid-year boundary, MICU/RCCM contiguity,
/// ED/GRM cardinality and CCR completion.
pub fn resident_violations(
    problem: &RotationProblem,
    resident: &Resident,
    plan: &YearPlan,
) -> Vec<Violation> {
    let catalogue = problem.catalogue();
    let year = problem.academic_year();
    let placements = problem.timeline(&resident.id, plan).placements(catalogue);

    let mut out = Vec::new();
    contiguous_duration(resident, &placements, catalogue, year, &mut out);
    mid_year_boundary(resident, &placements, year, &mut out);
    critical_care_run(resident, plan, catalogue, &mut out);
    single_placement_bases(resident, &placements, catalogue, year, &mut out);
    ccr_completion(resident, &placements, catalogue, year, &mut out);
    out
}

/// A placement a terminal-year resident must hold by the end of the year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Requirement {
    /// One placement of a core base (`ED`, `GRM`).
    Base(&'static str),
    /// One CCR posting.
    Ccr,
}

impl Requirement {
    /// Whether a placement in `posting` meets the requirement.
    pub fn is_met_by(&self, posting: &Posting) -> bool {
        match self {
            Requirement::Base(base) => posting.base() == *base,
            Requirement::Ccr => posting.is_ccr(),
        }
    }
}

/// Terminal-year requirements (ED, GRM, CCR) a plan still misses.
///
/// Empty for non-terminal residents. History counts.
pub fn missing_requirements(
    problem: &RotationProblem,
    resident: &Resident,
    plan: &YearPlan,
) -> Vec<Requirement> {
    if !resident.is_terminal_year() {
        return Vec::new();
    }
    let catalogue = problem.catalogue();
    let placements = problem.timeline(&resident.id, plan).placements(catalogue);
    let mut missing: Vec<Requirement> = SINGLE_PLACEMENT_BASES
        .iter()
        .copied()
        .filter(|base| !placements.iter().any(|p| base_of(catalogue, &p.posting) == *base))
        .map(Requirement::Base)
        .collect();
    if !placements.iter().any(|p| is_ccr(catalogue, &p.posting)) {
        missing.push(Requirement::Ccr);
    }
    missing
}

/// Number of missing terminal-year requirements of a plan.
///
/// Zero for non-terminal residents.
pub fn requirement_deficits(problem: &RotationProblem, resident: &Resident, plan: &YearPlan) -> usize {
    missing_requirements(problem, resident, plan).len()
}

/// `BLOCK_ON_LEAVE` for every leave block of `committed` that `proposed` fills.
pub fn leave_conflicts(resident_id: &str, committed: &YearPlan, proposed: &YearPlan) -> Vec<Violation> {
    committed
        .iter()
        .filter_map(|(block, slot)| {
            let Slot::Leave(kind) = slot else {
                return None;
            };
            let code = proposed.posting_at(block)?;
            Some(
                Violation::new(
                    ViolationCode::BlockOnLeave,
                    format!("{code} proposed in block {block}, which is {kind} leave"),
                )
                .for_resident(resident_id)
                .for_posting(code)
                .at_blocks(vec![block]),
            )
        })
        .collect()
}

fn base_of<'a>(catalogue: &'a PostingCatalogue, code: &'a str) -> &'a str {
    catalogue
        .get(code)
        .map(|p| p.base())
        .unwrap_or_else(|| posting_base(code))
}

fn is_ccr(catalogue: &PostingCatalogue, code: &str) -> bool {
    catalogue.get(code).is_some_and(|p| p.is_ccr())
}

fn current_blocks(placements: &[&Placement], year: i32) -> Vec<u8> {
    let mut blocks: Vec<u8> = placements
        .iter()
        .flat_map(|p| p.blocks_in_year(year))
        .collect();
    blocks.sort_unstable();
    blocks
}

fn contiguous_duration(
    resident: &Resident,
    placements: &[Placement],
    catalogue: &PostingCatalogue,
    year: i32,
    out: &mut Vec<Violation>,
) {
    for p in placements.iter().filter(|p| !p.is_complete()) {
        if !p.touches_year(year) {
            let owed = p.owed_into(year);
            let spans = catalogue.get(&p.posting).is_some_and(|posting| posting.spans_years);
            if owed > 0 && spans {
                out.push(
                    Violation::new(
                        ViolationCode::NonContiguousPlacement,
                        format!(
                            "{} from the previous year covers {} of {} blocks and must continue from block 1",
                            p.posting, p.len, p.required
                        ),
                    )
                    .for_resident(&resident.id)
                    .for_posting(&p.posting)
                    .at_blocks((1..=owed).collect()),
                );
            }
            continue;
        }
        out.push(
            Violation::new(
                ViolationCode::NonContiguousPlacement,
                format!(
                    "{} covers {} of {} consecutive blocks",
                    p.posting, p.len, p.required
                ),
            )
            .for_resident(&resident.id)
            .for_posting(&p.posting)
            .at_blocks(p.blocks_in_year(year)),
        );
    }
}

fn mid_year_boundary(resident: &Resident, placements: &[Placement], year: i32, out: &mut Vec<Violation>) {
    for p in placements {
        let blocks = p.blocks_in_year(year);
        if blocks.contains(&MID_YEAR_BLOCK) && blocks.contains(&(MID_YEAR_BLOCK + 1)) {
            out.push(
                Violation::new(
                    ViolationCode::SpansYearBoundary,
                    format!(
                        "{} runs across blocks {MID_YEAR_BLOCK} and {}",
                        p.posting,
                        MID_YEAR_BLOCK + 1
                    ),
                )
                .for_resident(&resident.id)
                .for_posting(&p.posting)
                .at_blocks(blocks),
            );
        }
    }
}

fn critical_care_run(
    resident: &Resident,
    plan: &YearPlan,
    catalogue: &PostingCatalogue,
    out: &mut Vec<Violation>,
) {
    let blocks: Vec<u8> = plan
        .iter()
        .filter_map(|(block, slot)| slot.posting().map(|code| (block, code)))
        .filter(|(_, code)| CRITICAL_CARE_BASES.contains(&base_of(catalogue, code)))
        .map(|(block, _)| block)
        .collect();
    let (Some(first), Some(last)) = (blocks.first(), blocks.last()) else {
        return;
    };
    if usize::from(last - first) + 1 != blocks.len() {
        out.push(
            Violation::new(
                ViolationCode::MicuRccmNotContiguous,
                format!("MICU/RCCM blocks {blocks:?} do not form a single run"),
            )
            .for_resident(&resident.id)
            .at_blocks(blocks),
        );
    }
}

fn single_placement_bases(
    resident: &Resident,
    placements: &[Placement],
    catalogue: &PostingCatalogue,
    year: i32,
    out: &mut Vec<Violation>,
) {
    for base in SINGLE_PLACEMENT_BASES {
        let matching: Vec<&Placement> = placements
            .iter()
            .filter(|p| base_of(catalogue, &p.posting) == base)
            .collect();
        let message = match matching.len() {
            0 if resident.is_terminal_year() => {
                format!("no {base} placement by the end of the terminal year")
            }
            0 | 1 => continue,
            n => format!("{base} placed {n} times (expected exactly once)"),
        };
        out.push(
            Violation::new(ViolationCode::WrongEdGrmCount, message)
                .for_resident(&resident.id)
                .at_blocks(current_blocks(&matching, year)),
        );
    }
}

fn ccr_completion(
    resident: &Resident,
    placements: &[Placement],
    catalogue: &PostingCatalogue,
    year: i32,
    out: &mut Vec<Violation>,
) {
    let ccr: Vec<&Placement> = placements
        .iter()
        .filter(|p| is_ccr(catalogue, &p.posting))
        .collect();
    match ccr.as_slice() {
        [] if resident.is_terminal_year() => out.push(
            Violation::new(
                ViolationCode::CcrNotSatisfied,
                "no CCR posting by the end of the terminal year",
            )
            .for_resident(&resident.id),
        ),
        [] | [_] => {}
        [first, rest @ ..] => {
            let extra: Vec<&str> = rest.iter().map(|p| p.posting.as_str()).collect();
            out.push(
                Violation::new(
                    ViolationCode::CcrOverSatisfied,
                    format!(
                        "CCR already satisfied by {}; also placed in {}",
                        first.posting,
                        extra.join(", ")
                    ),
                )
                .for_resident(&resident.id)
                .for_posting(rest[rest.len() - 1].posting.as_str())
                .at_blocks(current_blocks(&ccr, year)),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{HistoryEntry, Posting, ProblemInput, RotationState};

    fn problem(year: u8, history: Vec<HistoryEntry>) -> RotationProblem {
        let mut input = ProblemInput::new(2025)
            .with_resident(Resident::new("R1", year))
            .with_posting(Posting::core("ED (SGH)"))
            .with_posting(Posting::core("GRM (CGH)").with_duration(2))
            .with_posting(Posting::core("GM (SGH)").with_duration(3))
            .with_posting(Posting::core("GM (NUH)").with_duration(3))
            .with_posting(Posting::core("GM (TTSH)").with_capacity(5))
            .with_posting(Posting::core("MICU (TTSH)").with_capacity(2))
            .with_posting(Posting::core("RCCM (NUH)").with_capacity(2))
            .with_posting(Posting::elective("Cardio (NUH)").with_duration(2).with_max_deviation(0));
        for h in history {
            input = input.with_history(h);
        }
        RotationProblem::from_input(input).unwrap()
    }

    fn codes(v: &[Violation]) -> Vec<ViolationCode> {
        v.iter().map(|v| v.code).collect()
    }

    #[test]
    fn test_window_deviation() {
        let mut counts = [0u32; 12];
        counts[0] = 2;
        counts[3] = 1;
        counts[8] = 4;
        assert_eq!(window_deviation(&counts, HALF_YEAR_WINDOWS[0]), 2);
        assert_eq!(window_deviation(&counts, HALF_YEAR_WINDOWS[1]), 4);
        assert_eq!(window_of(6), (1, 6));
        assert_eq!(window_of(7), (7, 12));
    }

    #[test]
    fn test_capacity_exceeded_in_one_block() {
        let p = problem(1, vec![]);
        let mut state = RotationState::new();
        for i in 0..6 {
            state.insert(format!("X{i}"), YearPlan::from_codes(&["", "", "GM (TTSH)"]));
        }
        let v = capacity_violations(p.catalogue(), &state.occupancy());
        assert_eq!(codes(&v), vec![ViolationCode::CapacityExceeded]);
        assert_eq!(v[0].blocks, vec![3]);
        assert_eq!(v[0].posting.as_deref(), Some("GM (TTSH)"));
    }

    #[test]
    fn test_incomplete_placement() {
        let p = problem(1, vec![]);
        let r = p.resident("R1").unwrap();
        let plan = YearPlan::from_codes(&["GRM (CGH)", "", "GRM (CGH)", "GRM (CGH)"]);
        let v = resident_violations(&p, r, &plan);
        let nc: Vec<_> = v
            .iter()
            .filter(|v| v.code == ViolationCode::NonContiguousPlacement)
            .collect();
        assert_eq!(nc.len(), 1);
        assert_eq!(nc[0].blocks, vec![1]);
    }

    #[test]
    fn test_spanning_placement_left_short_at_year_end() {
        let p = RotationProblem::from_input(
            ProblemInput::new(2025)
                .with_resident(Resident::new("R1", 2))
                .with_posting(Posting::core("GRM (CGH)").with_duration(2).spanning_years())
                .with_posting(Posting::core("GM (TTSH)").with_capacity(5))
                .with_history(HistoryEntry::new("R1", 2024, 12, "GRM (CGH)")),
        )
        .unwrap();
        let r = p.resident("R1").unwrap();

        let v = resident_violations(&p, r, &YearPlan::from_codes(&["GM (TTSH)"]));
        assert_eq!(codes(&v), vec![ViolationCode::NonContiguousPlacement]);
        assert_eq!(v[0].blocks, vec![1]);
        assert_eq!(v[0].posting.as_deref(), Some("GRM (CGH)"));

        let v = resident_violations(&p, r, &YearPlan::from_codes(&["GRM (CGH)"]));
        assert!(v.is_empty(), "{v:?}");
    }

    #[test]
    fn test_non_spanning_history_stays_in_its_year() {
        let p = problem(2, vec![HistoryEntry::new("R1", 2024, 12, "GRM (CGH)")]);
        let r = p.resident("R1").unwrap();
        assert!(resident_violations(&p, r, &YearPlan::new()).is_empty());
    }

    #[test]
    fn test_mid_year_boundary() {
        let p = problem(1, vec![]);
        let r = p.resident("R1").unwrap();
        let mut codes_list = vec![""; 12];
        codes_list[5] = "GRM (CGH)";
        codes_list[6] = "GRM (CGH)";
        let v = resident_violations(&p, r, &YearPlan::from_codes(&codes_list));
        assert!(codes(&v).contains(&ViolationCode::SpansYearBoundary));

        // single-block placements on both sides are separate placements
        let mut codes_list = vec![""; 12];
        codes_list[5] = "GM (TTSH)";
        codes_list[6] = "GM (TTSH)";
        let v = resident_violations(&p, r, &YearPlan::from_codes(&codes_list));
        assert!(v.is_empty());
    }

    #[test]
    fn test_micu_rccm_single_run() {
        let p = problem(1, vec![]);
        let r = p.resident("R1").unwrap();
        let ok = YearPlan::from_codes(&["", "MICU (TTSH)", "RCCM (NUH)", "MICU (TTSH)"]);
        assert!(resident_violations(&p, r, &ok).is_empty());

        let split = YearPlan::from_codes(&["MICU (TTSH)", "", "RCCM (NUH)"]);
        let v = resident_violations(&p, r, &split);
        assert_eq!(codes(&v), vec![ViolationCode::MicuRccmNotContiguous]);
        assert_eq!(v[0].blocks, vec![1, 3]);
    }

    #[test]
    fn test_ed_grm_count() {
        let p = problem(2, vec![HistoryEntry::new("R1", 2024, 4, "ED (SGH)")]);
        let r = p.resident("R1").unwrap();
        let v = resident_violations(&p, r, &YearPlan::from_codes(&["ED (SGH)"]));
        assert_eq!(codes(&v), vec![ViolationCode::WrongEdGrmCount]);
        assert_eq!(v[0].blocks, vec![1]);

        let terminal = problem(3, vec![]);
        let r = terminal.resident("R1").unwrap();
        let v = resident_violations(&terminal, r, &YearPlan::new());
        assert_eq!(
            codes(&v),
            vec![
                ViolationCode::WrongEdGrmCount,
                ViolationCode::WrongEdGrmCount,
                ViolationCode::CcrNotSatisfied
            ]
        );
        assert_eq!(requirement_deficits(&terminal, r, &YearPlan::new()), 3);
        assert_eq!(
            missing_requirements(&terminal, r, &YearPlan::from_codes(&["GRM (CGH)", "GRM (CGH)"])),
            vec![Requirement::Base("ED"), Requirement::Ccr]
        );
    }

    #[test]
    fn test_ccr_over_satisfied() {
        let history = (1..=3)
            .map(|b| HistoryEntry::new("R1", 2024, b, "GM (SGH)"))
            .collect();
        let p = problem(2, history);
        let r = p.resident("R1").unwrap();
        let plan = YearPlan::from_codes(&["GM (NUH)", "GM (NUH)", "GM (NUH)"]);
        let v = resident_violations(&p, r, &plan);
        assert_eq!(codes(&v), vec![ViolationCode::CcrOverSatisfied]);
        assert_eq!(v[0].posting.as_deref(), Some("GM (NUH)"));
        assert_eq!(v[0].blocks, vec![1, 2, 3]);
    }

    #[test]
    fn test_terminal_requirements_met() {
        let p = problem(3, vec![]);
        let r = p.resident("R1").unwrap();
        let plan = YearPlan::from_codes(&[
            "ED (SGH)", "GRM (CGH)", "GRM (CGH)", "GM (SGH)", "GM (SGH)", "GM (SGH)",
        ]);
        assert!(resident_violations(&p, r, &plan).is_empty());
        assert_eq!(requirement_deficits(&p, r, &plan), 0);
    }

    #[test]
    fn test_balance_only_with_overrides() {
        let state = RotationState::new()
            .with_plan("R1", YearPlan::from_codes(&["Cardio (NUH)", "Cardio (NUH)"]));
        let p = problem(1, vec![]);
        assert!(balance_violations(&p, &state.occupancy()).is_empty());

        let input = ProblemInput::new(2025)
            .with_resident(Resident::new("R1", 1))
            .with_posting(Posting::elective("Cardio (NUH)").with_duration(2).with_max_deviation(0))
            .with_deviation_override("Cardio (NUH)", 1);
        let p = RotationProblem::from_input(input).unwrap();
        let v = balance_violations(&p, &state.occupancy());
        assert!(v.is_empty());

        // posting not named in the overrides falls back to its configured tolerance
        let input = ProblemInput::new(2025)
            .with_resident(Resident::new("R1", 1))
            .with_posting(Posting::elective("Cardio (NUH)").with_duration(2).with_max_deviation(0))
            .with_posting(Posting::core("ED (SGH)"))
            .with_deviation_override("ED (SGH)", 1);
        let p = RotationProblem::from_input(input).unwrap();
        let v = balance_violations(&p, &state.occupancy());
        assert_eq!(codes(&v), vec![ViolationCode::ImbalancedPosting]);
        assert_eq!(v[0].blocks, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_leave_conflicts() {
        let mut committed = YearPlan::new();
        committed.set(2, Slot::Leave("annual".into()));
        let proposed = YearPlan::from_codes(&["", "ED (SGH)"]);
        let v = leave_conflicts("R1", &committed, &proposed);
        assert_eq!(codes(&v), vec![ViolationCode::BlockOnLeave]);
        assert_eq!(v[0].blocks, vec![2]);
    }
}
