//! Output bundle.
//!
//! Assembles everything a caller needs after a solve or a save: refreshed
//! residents, current-year plans, cohort statistics, OFF-block diagnostics
//! and the cohort-wide violation list.

use serde::{Deserialize, Serialize};

use crate::constraints::{check, resident_violations, CheckScope};
use crate::diagnostics::explain_off_blocks;
use crate::models::{OffBlockExplanation, Resident, RotationProblem, RotationState, Violation};
use crate::scoring::CohortStatistics;

/// Refreshed view of a rotation state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RotationOutput {
    pub academic_year: i32,
    /// Residents with completion fields recomputed, in id order.
    pub residents: Vec<Resident>,
    /// Current-year plans.
    pub plans: RotationState,
    pub statistics: CohortStatistics,
    /// One entry per OFF block.
    pub diagnostics: Vec<OffBlockExplanation>,
    /// Every hard-rule violation on the state.
    pub violations: Vec<Violation>,
}

impl RotationOutput {
    /// Builds the bundle for `state`.
    pub fn assemble(problem: &RotationProblem, state: &RotationState) -> Self {
        let residents = problem
            .residents()
            .iter()
            .map(|r| {
                let plan = state.plan(&r.id).cloned().unwrap_or_default();
                let violations = resident_violations(problem, r, &plan);
                let mut refreshed = r.clone();
                refreshed.refresh(&problem.timeline(&r.id, &plan), problem.catalogue(), violations);
                refreshed
            })
            .collect();

        Self {
            academic_year: problem.academic_year(),
            residents,
            plans: state.clone(),
            statistics: CohortStatistics::calculate(problem, state),
            diagnostics: explain_off_blocks(problem, state),
            violations: check(problem, state, CheckScope::All),
        }
    }

    /// Whether the state breaks no hard rule.
    pub fn is_feasible(&self) -> bool {
        self.violations.is_empty()
    }

    /// Refreshed resident by id.
    pub fn resident(&self, resident_id: &str) -> Option<&Resident> {
        self.residents.iter().find(|r| r.id == resident_id)
    }

    /// Serializes the bundle as pretty JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{HistoryEntry, Posting, ProblemInput, ViolationCode, YearPlan};

    fn problem() -> RotationProblem {
        RotationProblem::from_input(
            ProblemInput::new(2025)
                .with_posting(Posting::core("ED (SGH)").with_capacity(1))
                .with_posting(Posting::core("GM (NUH)").with_capacity(2))
                .with_posting(Posting::elective("Cardio (NUH)"))
                .with_resident(Resident::new("R1", 2))
                .with_resident(Resident::new("R2", 1))
                .with_history(HistoryEntry::new("R1", 2024, 3, "Cardio (NUH)")),
        )
        .unwrap()
    }

    #[test]
    fn test_assemble_refreshes_residents() {
        let p = problem();
        let state = RotationState::new()
            .with_plan("R1", YearPlan::from_codes(&["GM (NUH)", "ED (SGH)"]))
            .with_plan("R2", YearPlan::new());
        let out = RotationOutput::assemble(&p, &state);

        let r1 = out.resident("R1").unwrap();
        assert!(r1.ccr_completed);
        assert_eq!(r1.ccr_posting.as_deref(), Some("GM (NUH)"));
        assert_eq!(r1.core_blocks["ED"], 1);
        assert!(r1.electives.contains("Cardio (NUH)"));
        assert!(out.is_feasible());
        assert_eq!(out.diagnostics.len(), 10 + 12);
        assert_eq!(out.statistics.filled_blocks, 2);
    }

    #[test]
    fn test_assemble_lists_violations() {
        let p = problem();
        let state = RotationState::new()
            .with_plan("R1", YearPlan::from_codes(&["ED (SGH)"]))
            .with_plan("R2", YearPlan::from_codes(&["ED (SGH)"]));
        let out = RotationOutput::assemble(&p, &state);

        assert!(!out.is_feasible());
        assert!(out
            .violations
            .iter()
            .any(|v| v.code == ViolationCode::CapacityExceeded));
        let json = out.to_json().unwrap();
        assert!(json.contains("CAPACITY_EXCEEDED"));
    }
}
