//! Resident model.
//!
//! Residents carry their identity and resident-year as input, plus a set of
//! derived completion fields (core blocks, distinct electives, CCR status,
//! current violations) that are recomputed from their career timeline
//! whenever an output bundle is assembled.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::history::CareerTimeline;
use super::posting::{PostingCatalogue, PostingKind};
use super::schedule::Violation;
use super::weights::TERMINAL_YEAR;

/// A resident in the rotation cohort.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resident {
    /// Unique resident identifier.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Resident-year, 1 to the terminal year.
    pub year: u8,
    /// Completed core blocks by posting base, history plus current year.
    #[serde(default)]
    pub core_blocks: BTreeMap<String, u32>,
    /// Distinct elective posting codes completed or placed.
    #[serde(default)]
    pub electives: BTreeSet<String>,
    /// Whether a CCR placement exists anywhere in the career.
    #[serde(default)]
    pub ccr_completed: bool,
    /// CCR posting that satisfied the requirement.
    #[serde(default)]
    pub ccr_posting: Option<String>,
    /// Hard-rule violations on the resident's current state.
    #[serde(default)]
    pub violations: Vec<Violation>,
}

impl Resident {
    /// Creates a resident; the year is clamped into `1..=TERMINAL_YEAR`.
    pub fn new(id: impl Into<String>, year: u8) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            year: clamp_year(year),
            core_blocks: BTreeMap::new(),
            electives: BTreeSet::new(),
            ccr_completed: false,
            ccr_posting: None,
            violations: Vec::new(),
        }
    }

    /// Sets the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Whether the curriculum must be complete by the end of this year.
    pub fn is_terminal_year(&self) -> bool {
        self.year >= TERMINAL_YEAR
    }

    /// Recomputes derived completion fields from a career timeline.
    pub fn refresh(
        &mut self,
        timeline: &CareerTimeline<'_>,
        catalogue: &PostingCatalogue,
        violations: Vec<Violation>,
    ) {
        self.core_blocks.clear();
        self.electives.clear();

        for (_, slot) in timeline.cells() {
            let Some(posting) = slot.posting().and_then(|code| catalogue.get(code)) else {
                continue;
            };
            match posting.kind {
                PostingKind::Core | PostingKind::Ccr => {
                    *self
                        .core_blocks
                        .entry(posting.base().to_string())
                        .or_insert(0) += 1;
                }
                PostingKind::Elective => {
                    self.electives.insert(posting.code.clone());
                }
            }
        }

        self.ccr_posting = timeline
            .placements(catalogue)
            .into_iter()
            .find(|p| catalogue.get(&p.posting).is_some_and(|q| q.is_ccr()))
            .map(|p| p.posting);
        self.ccr_completed = self.ccr_posting.is_some();
        self.violations = violations;
    }
}

/// Clamps a raw resident-year into `1..=TERMINAL_YEAR`.
pub fn clamp_year(year: u8) -> u8 {
    year.clamp(1, TERMINAL_YEAR)
}
