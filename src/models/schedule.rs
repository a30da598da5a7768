//! Rotation state (solution) model.
//!
//! A rotation state is the current-year plan of every resident. It may be a
//! solver result, a committed roster, or a candidate under edit. Hard-rule
//! failures are reported as [`Violation`] values; OFF blocks are explained
//! with [`OffBlockExplanation`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::history::{Slot, YearPlan};
use super::posting::BLOCKS_PER_YEAR;

/// Current-year plans keyed by resident id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationState {
    plans: BTreeMap<String, YearPlan>,
}

impl RotationState {
    /// Creates an empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: inserts a plan and returns self.
    pub fn with_plan(mut self, resident_id: impl Into<String>, plan: YearPlan) -> Self {
        self.insert(resident_id, plan);
        self
    }

    /// Inserts or replaces a resident's plan, returning the previous one.
    pub fn insert(&mut self, resident_id: impl Into<String>, plan: YearPlan) -> Option<YearPlan> {
        self.plans.insert(resident_id.into(), plan)
    }

    /// Plan for a resident.
    pub fn plan(&self, resident_id: &str) -> Option<&YearPlan> {
        self.plans.get(resident_id)
    }

    /// Mutable plan for a resident.
    pub fn plan_mut(&mut self, resident_id: &str) -> Option<&mut YearPlan> {
        self.plans.get_mut(resident_id)
    }

    /// `(resident_id, plan)` in id order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &YearPlan)> {
        self.plans.iter().map(|(id, plan)| (id.as_str(), plan))
    }

    /// Residents with a plan.
    pub fn len(&self) -> usize {
        self.plans.len()
    }

    /// Whether no plans are held.
    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }

    /// Per-posting, per-block fill counts.
    pub fn occupancy(&self) -> Occupancy {
        let mut occupancy = Occupancy::default();
        for plan in self.plans.values() {
            for (block, slot) in plan.iter() {
                if let Some(code) = slot.posting() {
                    occupancy.add(code, block);
                }
            }
        }
        occupancy
    }

    /// `(resident_id, block)` for every open block.
    pub fn off_blocks(&self) -> Vec<(String, u8)> {
        self.plans
            .iter()
            .flat_map(|(id, plan)| {
                plan.open_blocks()
                    .into_iter()
                    .map(move |block| (id.clone(), block))
            })
            .collect()
    }

    /// Total blocks holding a posting.
    pub fn filled_count(&self) -> usize {
        self.plans.values().map(YearPlan::filled_count).sum()
    }
}

/// Fill counts per posting and block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occupancy {
    counts: BTreeMap<String, [u32; BLOCKS_PER_YEAR as usize]>,
}

impl Occupancy {
    /// Residents in `posting` during `block`.
    pub fn get(&self, posting: &str, block: u8) -> u32 {
        block_index(block)
            .and_then(|idx| self.counts.get(posting).map(|row| row[idx]))
            .unwrap_or(0)
    }

    /// Counts for every block of a posting.
    pub fn per_block(&self, posting: &str) -> [u32; BLOCKS_PER_YEAR as usize] {
        self.counts.get(posting).copied().unwrap_or_default()
    }

    /// Records one more resident in `posting` during `block`.
    pub fn add(&mut self, posting: &str, block: u8) {
        if let Some(idx) = block_index(block) {
            self.counts.entry(posting.to_string()).or_default()[idx] += 1;
        }
    }

    /// Records one fewer resident in `posting` during `block`.
    ///
    /// A posting whose counts all reach zero is dropped, so equal fills
    /// compare equal however they were reached.
    pub fn remove(&mut self, posting: &str, block: u8) {
        if let (Some(idx), Some(row)) = (block_index(block), self.counts.get_mut(posting)) {
            row[idx] = row[idx].saturating_sub(1);
            if row.iter().all(|&n| n == 0) {
                self.counts.remove(posting);
            }
        }
    }

    /// Applies a slot change to the counts.
    pub fn replace(&mut self, block: u8, previous: &Slot, next: &Slot) {
        if let Some(code) = previous.posting() {
            self.remove(code, block);
        }
        if let Some(code) = next.posting() {
            self.add(code, block);
        }
    }

    /// `(posting, counts)` in posting order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u32; BLOCKS_PER_YEAR as usize])> {
        self.counts.iter().map(|(code, row)| (code.as_str(), row))
    }
}

fn block_index(block: u8) -> Option<usize> {
    (1..=BLOCKS_PER_YEAR)
        .contains(&block)
        .then(|| block as usize - 1)
}

/// Hard-rule classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViolationCode {
    /// More residents in a posting-block than its capacity.
    CapacityExceeded,
    /// A placement does not cover its required consecutive blocks.
    NonContiguousPlacement,
    /// MICU/RCCM blocks within a year are split.
    MicuRccmNotContiguous,
    /// A placement covers both block 6 and block 7.
    SpansYearBoundary,
    /// ED or GRM placed other than exactly once.
    WrongEdGrmCount,
    /// Terminal-year resident without a CCR placement.
    CcrNotSatisfied,
    /// More than one CCR placement.
    CcrOverSatisfied,
    /// Block counts within a half-year window differ beyond tolerance.
    ImbalancedPosting,
    /// A posting proposed on a leave block.
    BlockOnLeave,
}

impl ViolationCode {
    /// Stable upper-case code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationCode::CapacityExceeded => "CAPACITY_EXCEEDED",
            ViolationCode::NonContiguousPlacement => "NON_CONTIGUOUS_PLACEMENT",
            ViolationCode::MicuRccmNotContiguous => "MICU_RCCM_NOT_CONTIGUOUS",
            ViolationCode::SpansYearBoundary => "SPANS_YEAR_BOUNDARY",
            ViolationCode::WrongEdGrmCount => "WRONG_ED_GRM_COUNT",
            ViolationCode::CcrNotSatisfied => "CCR_NOT_SATISFIED",
            ViolationCode::CcrOverSatisfied => "CCR_OVER_SATISFIED",
            ViolationCode::ImbalancedPosting => "IMBALANCED_POSTING",
            ViolationCode::BlockOnLeave => "BLOCK_ON_LEAVE",
        }
    }
}

impl fmt::Display for ViolationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A broken hard rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Violation {
    /// Rule that failed.
    pub code: ViolationCode,
    /// Human-readable description.
    pub message: String,
    /// Resident concerned, if the rule is per-resident.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resident_id: Option<String>,
    /// Posting concerned, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub posting: Option<String>,
    /// Current-year blocks involved.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blocks: Vec<u8>,
}

impl Violation {
    /// Creates a violation with no context attached.
    pub fn new(code: ViolationCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            resident_id: None,
            posting: None,
            blocks: Vec::new(),
        }
    }

    /// Attaches the resident.
    pub fn for_resident(mut self, resident_id: impl Into<String>) -> Self {
        self.resident_id = Some(resident_id.into());
        self
    }

    /// Attaches the posting.
    pub fn for_posting(mut self, posting: impl Into<String>) -> Self {
        self.posting = Some(posting.into());
        self
    }

    /// Attaches the blocks involved.
    pub fn at_blocks(mut self, blocks: Vec<u8>) -> Self {
        self.blocks = blocks;
        self
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// Why a block was left OFF.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OffBlockExplanation {
    pub resident_id: String,
    pub block: u8,
    /// Postings that could have been placed over this block.
    pub feasible: Vec<String>,
    /// Postings that could not, with the rules they would break.
    pub infeasible: BTreeMap<String, Vec<Violation>>,
}
