//! Hand edits over a committed roster.
//!
//! A proposal is a twelve-entry list of posting codes for one resident
//! (`""` or `"OFF"` leaves a block open; an open entry on a leave block
//! keeps the leave). Validation reports only the violations an edit
//! introduces relative to the committed plan, so re-validating an
//! unmodified plan is always clean.
//!
//! # Usage
//!
//! ```
//! use u_rotation::editing::{CommittedRoster, SaveOutcome};
//! use u_rotation::models::{Posting, ProblemInput, Resident, RotationProblem};
//!
//! let problem = RotationProblem::from_input(
//!     ProblemInput::new(2025)
//!         .with_posting(Posting::core("GM (TTSH)").with_capacity(2))
//!         .with_resident(Resident::new("R1", 1)),
//! )
//! .unwrap();
//! let mut roster = CommittedRoster::new(problem);
//!
//! let mut proposal = vec![""; 12];
//! proposal[0] = "GM (TTSH)";
//! assert!(roster.validate("R1", &proposal).unwrap().ok);
//! assert!(matches!(roster.save("R1", &proposal).unwrap(), SaveOutcome::Saved(_)));
//! ```

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::constraints::rules::{capacity_violations, leave_conflicts};
use crate::constraints::{introduced, resident_violations};
use crate::error::RotationError;
use crate::models::{RotationProblem, RotationState, Slot, Violation, YearPlan, BLOCKS_PER_YEAR};
use crate::report::RotationOutput;

/// Result of validating a proposal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub ok: bool,
    /// Violations the proposal would introduce.
    pub violations: Vec<Violation>,
}

/// Result of saving a proposal.
#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    /// Committed; the refreshed output bundle.
    Saved(Box<RotationOutput>),
    /// Not committed; the roster is unchanged.
    Rejected(Vec<Violation>),
}

/// The committed plans of a cohort, open to single-resident edits.
#[derive(Debug, Clone)]
pub struct CommittedRoster {
    problem: RotationProblem,
    plans: RotationState,
}

impl CommittedRoster {
    /// Commits the problem's initial state.
    pub fn new(problem: RotationProblem) -> Self {
        let plans = problem.initial_state().clone();
        Self { problem, plans }
    }

    /// Commits `plans` (e.g. a solve result) over the initial state.
    ///
    /// Plans for unknown residents are ignored.
    pub fn with_plans(problem: RotationProblem, plans: &RotationState) -> Self {
        let mut roster = Self::new(problem);
        for (id, plan) in plans.iter() {
            if roster.problem.resident(id).is_some() {
                roster.plans.insert(id, plan.clone());
            }
        }
        roster
    }

    pub fn problem(&self) -> &RotationProblem {
        &self.problem
    }

    /// Committed current-year plans.
    pub fn plans(&self) -> &RotationState {
        &self.plans
    }

    /// Output bundle for the committed state.
    pub fn output(&self) -> RotationOutput {
        RotationOutput::assemble(&self.problem, &self.plans)
    }

    /// Committed plan of a resident in proposal form (leave shown as `"OFF"`).
    ///
    /// # Errors
    /// [`RotationError::UnknownResident`].
    pub fn proposal_for(&self, resident_id: &str) -> Result<Vec<String>, RotationError> {
        let plan = self.committed(resident_id)?;
        Ok(plan
            .iter()
            .map(|(_, slot)| slot.posting().unwrap_or("OFF").to_string())
            .collect())
    }

    /// Checks a proposal without committing it.
    ///
    /// # Errors
    /// Malformed proposals: [`RotationError::UnknownResident`],
    /// [`RotationError::ProposalLength`], [`RotationError::UnknownPosting`].
    pub fn validate<S: AsRef<str>>(
        &self,
        resident_id: &str,
        proposal: &[S],
    ) -> Result<ValidationOutcome, RotationError> {
        let (_, violations) = self.assess(resident_id, proposal)?;
        Ok(ValidationOutcome {
            ok: violations.is_empty(),
            violations,
        })
    }

    /// Validates a proposal, re-checks capacity of the resident's blocks
    /// against the rest of the cohort, and commits it when clean.
    ///
    /// # Errors
    /// Same as [`CommittedRoster::validate`].
    pub fn save<S: AsRef<str>>(
        &mut self,
        resident_id: &str,
        proposal: &[S],
    ) -> Result<SaveOutcome, RotationError> {
        let (proposed, mut violations) = self.assess(resident_id, proposal)?;
        if violations.is_empty() {
            violations = self.capacity_introduced(resident_id, &proposed);
        }
        if !violations.is_empty() {
            warn!(
                event = "roster_save_rejected",
                resident = %resident_id,
                violations = violations.len(),
            );
            return Ok(SaveOutcome::Rejected(violations));
        }

        let filled = proposed.filled_count();
        self.plans.insert(resident_id, proposed);
        info!(event = "roster_saved", resident = %resident_id, filled);
        Ok(SaveOutcome::Saved(Box::new(self.output())))
    }

    fn committed(&self, resident_id: &str) -> Result<&YearPlan, RotationError> {
        self.plans
            .plan(resident_id)
            .ok_or_else(|| RotationError::UnknownResident(resident_id.to_string()))
    }

    /// Parses a proposal and collects the single-resident violations it
    /// introduces, including postings on leave blocks.
    fn assess<S: AsRef<str>>(
        &self,
        resident_id: &str,
        proposal: &[S],
    ) -> Result<(YearPlan, Vec<Violation>), RotationError> {
        let resident = self
            .problem
            .resident(resident_id)
            .ok_or_else(|| RotationError::UnknownResident(resident_id.to_string()))?;
        let committed = self.committed(resident_id)?;
        let proposed = self.parse(committed, proposal)?;

        let mut violations = leave_conflicts(resident_id, committed, &proposed);
        let baseline = resident_violations(&self.problem, resident, committed);
        violations.extend(introduced(
            &baseline,
            resident_violations(&self.problem, resident, &proposed),
        ));
        Ok((proposed, violations))
    }

    fn parse<S: AsRef<str>>(&self, committed: &YearPlan, proposal: &[S]) -> Result<YearPlan, RotationError> {
        if proposal.len() != BLOCKS_PER_YEAR as usize {
            return Err(RotationError::ProposalLength {
                expected: BLOCKS_PER_YEAR as usize,
                actual: proposal.len(),
            });
        }
        let mut plan = YearPlan::new();
        for ((block, kept), code) in committed.iter().zip(proposal) {
            let code = code.as_ref().trim();
            let slot = if code.is_empty() || code.eq_ignore_ascii_case("OFF") {
                match kept {
                    Slot::Leave(_) => kept.clone(),
                    _ => Slot::Open,
                }
            } else if self.problem.catalogue().contains(code) {
                Slot::Posting(code.to_string())
            } else {
                return Err(RotationError::UnknownPosting(code.to_string()));
            };
            plan.set(block, slot);
        }
        Ok(plan)
    }

    /// Capacity violations on the proposed resident's postings that the
    /// committed state does not already carry.
    fn capacity_introduced(&self, resident_id: &str, proposed: &YearPlan) -> Vec<Violation> {
        let catalogue = self.problem.catalogue();
        let baseline = capacity_violations(catalogue, &self.plans.occupancy());

        let mut tentative = self.plans.clone();
        tentative.insert(resident_id, proposed.clone());
        let after: Vec<Violation> = capacity_violations(catalogue, &tentative.occupancy())
            .into_iter()
            .filter(|v| {
                v.blocks
                    .iter()
                    .any(|&b| proposed.posting_at(b) == v.posting.as_deref())
            })
            .map(|v| v.for_resident(resident_id))
            .collect();
        let baseline: Vec<Violation> = baseline
            .into_iter()
            .map(|v| v.for_resident(resident_id))
            .collect();
        introduced(&baseline, after)
    }
}
