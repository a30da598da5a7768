//! Block history and year plans.
//!
//! History arrives as one entry per filled month-block. Entries are folded
//! into [`YearPlan`]s (one slot per block) and, across years, into a
//! [`CareerTimeline`] that orders every block by its career index so that
//! placement extraction can follow runs across the academic-year boundary.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::posting::{PostingCatalogue, BLOCKS_PER_YEAR};

/// Position of a block across a resident's whole career.
///
/// Consecutive blocks have consecutive indices, including block 12 of one
/// academic year and block 1 of the next.
#[inline]
pub fn career_block(academic_year: i32, block: u8) -> i64 {
    i64::from(academic_year) * i64::from(BLOCKS_PER_YEAR) + i64::from(block) - 1
}

/// Inverse of [`career_block`]: `(academic_year, block)`.
#[inline]
pub fn year_and_block(career_index: i64) -> (i32, u8) {
    let per_year = i64::from(BLOCKS_PER_YEAR);
    let year = career_index.div_euclid(per_year) as i32;
    let block = career_index.rem_euclid(per_year) as u8 + 1;
    (year, block)
}

/// One recorded month-block of a resident's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Resident the entry belongs to.
    pub resident_id: String,
    /// Academic year the block belongs to.
    pub academic_year: i32,
    /// Month-block within the year (1..=12).
    pub block: u8,
    /// Posting code; empty for leave entries.
    #[serde(default)]
    pub posting_code: String,
    /// Whether the entry belongs to the year being planned.
    #[serde(default)]
    pub is_current_year: bool,
    /// Whether the block is leave rather than a posting.
    #[serde(default)]
    pub is_leave: bool,
    /// Leave classification when `is_leave` is set.
    #[serde(default)]
    pub leave_type: Option<String>,
}

impl HistoryEntry {
    /// Creates a posting entry.
    pub fn new(
        resident_id: impl Into<String>,
        academic_year: i32,
        block: u8,
        posting_code: impl Into<String>,
    ) -> Self {
        Self {
            resident_id: resident_id.into(),
            academic_year,
            block,
            posting_code: posting_code.into(),
            is_current_year: false,
            is_leave: false,
            leave_type: None,
        }
    }

    /// Creates a leave entry.
    pub fn leave(
        resident_id: impl Into<String>,
        academic_year: i32,
        block: u8,
        leave_type: impl Into<String>,
    ) -> Self {
        Self {
            resident_id: resident_id.into(),
            academic_year,
            block,
            posting_code: String::new(),
            is_current_year: false,
            is_leave: true,
            leave_type: Some(leave_type.into()),
        }
    }

    /// Marks the entry as belonging to the year being planned.
    pub fn current(mut self) -> Self {
        self.is_current_year = true;
        self
    }

    /// Career index of this entry's block.
    pub fn career_block(&self) -> i64 {
        career_block(self.academic_year, self.block)
    }

    /// Slot value this entry contributes to a year plan.
    pub fn slot(&self) -> Slot {
        if self.is_leave {
            Slot::Leave(self.leave_type.clone().unwrap_or_else(|| "leave".to_string()))
        } else {
            Slot::Posting(self.posting_code.clone())
        }
    }
}

/// Current-year leave supplied outside the history table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaveRecord {
    pub resident_id: String,
    pub block: u8,
    #[serde(default = "default_leave_type")]
    pub leave_type: String,
}

fn default_leave_type() -> String {
    "leave".to_string()
}

/// Content of one month-block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Slot {
    /// No posting ("OFF").
    #[default]
    Open,
    /// Placed in the posting with this code.
    Posting(String),
    /// On leave of the given type; never a decision variable.
    Leave(String),
}

impl Slot {
    /// Posting code, if the slot holds one.
    pub fn posting(&self) -> Option<&str> {
        match self {
            Slot::Posting(code) => Some(code),
            _ => None,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, Slot::Open)
    }

    pub fn is_leave(&self) -> bool {
        matches!(self, Slot::Leave(_))
    }
}

/// Twelve month-blocks of one resident's academic year.
///
/// One slot per block, so a resident can never hold two postings in the
/// same block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct YearPlan {
    slots: [Slot; BLOCKS_PER_YEAR as usize],
}

impl YearPlan {
    /// Creates a fully open plan.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a plan from per-block codes; `""` and `"OFF"` are open.
    pub fn from_codes<S: AsRef<str>>(codes: &[S]) -> Self {
        let mut plan = Self::new();
        for (idx, code) in codes.iter().take(BLOCKS_PER_YEAR as usize).enumerate() {
            let code = code.as_ref().trim();
            if !code.is_empty() && !code.eq_ignore_ascii_case("OFF") {
                plan.slots[idx] = Slot::Posting(code.to_string());
            }
        }
        plan
    }

    /// Slot at `block` (1..=12).
    pub fn slot(&self, block: u8) -> Option<&Slot> {
        block
            .checked_sub(1)
            .and_then(|idx| self.slots.get(idx as usize))
    }

    /// Posting code at `block`, if any.
    pub fn posting_at(&self, block: u8) -> Option<&str> {
        self.slot(block).and_then(Slot::posting)
    }

    /// Whether `block` is open. Out-of-range blocks are not.
    pub fn is_open(&self, block: u8) -> bool {
        self.slot(block).is_some_and(Slot::is_open)
    }

    /// Replaces the slot at `block`, returning the previous value.
    ///
    /// Returns `None` and leaves the plan untouched for out-of-range blocks.
    pub fn set(&mut self, block: u8, slot: Slot) -> Option<Slot> {
        let idx = block.checked_sub(1)? as usize;
        let target = self.slots.get_mut(idx)?;
        Some(std::mem::replace(target, slot))
    }

    /// Clears every posting, keeping leave.
    pub fn clear_postings(&mut self) {
        for slot in self.slots.iter_mut() {
            if matches!(slot, Slot::Posting(_)) {
                *slot = Slot::Open;
            }
        }
    }

    /// `(block, slot)` pairs in block order.
    pub fn iter(&self) -> impl Iterator<Item = (u8, &Slot)> {
        self.slots
            .iter()
            .enumerate()
            .map(|(idx, slot)| (idx as u8 + 1, slot))
    }

    /// Open blocks in order.
    pub fn open_blocks(&self) -> Vec<u8> {
        self.iter()
            .filter(|(_, s)| s.is_open())
            .map(|(b, _)| b)
            .collect()
    }

    /// First open block at or after `from`.
    pub fn next_open_from(&self, from: u8) -> Option<u8> {
        (from.max(1)..=BLOCKS_PER_YEAR).find(|&b| self.is_open(b))
    }

    /// Number of blocks holding a posting.
    pub fn filled_count(&self) -> usize {
        self.slots.iter().filter(|s| s.posting().is_some()).count()
    }
}

/// A placement derived from consecutive blocks of the same posting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    /// Posting code.
    pub posting: String,
    /// Career index of the first block.
    pub career_start: i64,
    /// Blocks actually occupied.
    pub len: u8,
    /// Blocks the posting requires per placement.
    pub required: u8,
}

impl Placement {
    /// Whether the placement covers its full required duration.
    pub fn is_complete(&self) -> bool {
        self.len == self.required
    }

    /// Career indices covered.
    pub fn career_blocks(&self) -> impl Iterator<Item = i64> {
        self.career_start..self.career_start + i64::from(self.len)
    }

    /// Blocks of `academic_year` covered, in order.
    pub fn blocks_in_year(&self, academic_year: i32) -> Vec<u8> {
        self.career_blocks()
            .map(year_and_block)
            .filter(|(year, _)| *year == academic_year)
            .map(|(_, block)| block)
            .collect()
    }

    /// Blocks still owed in `academic_year` by a placement that ended the
    /// previous year short of its duration.
    ///
    /// Zero unless the placement is incomplete and its last block is the
    /// final block of the year before `academic_year`. Whether the posting
    /// may continue across years is the caller's concern.
    pub fn owed_into(&self, academic_year: i32) -> u8 {
        let ends_before = self.career_start + i64::from(self.len) == career_block(academic_year, 1);
        if ends_before && !self.is_complete() {
            self.required - self.len
        } else {
            0
        }
    }

    /// Whether any covered block falls in `academic_year`.
    pub fn touches_year(&self, academic_year: i32) -> bool {
        self.career_blocks()
            .any(|idx| year_and_block(idx).0 == academic_year)
    }
}

/// A resident's blocks across all known years, in career order.
#[derive(Debug, Clone)]
pub struct CareerTimeline<'a> {
    prior: &'a BTreeMap<i32, YearPlan>,
    current_year: i32,
    current: &'a YearPlan,
}

impl<'a> CareerTimeline<'a> {
    /// Combines prior-year plans with the plan for `current_year`.
    ///
    /// A prior entry keyed by `current_year` itself is ignored.
    pub fn new(prior: &'a BTreeMap<i32, YearPlan>, current_year: i32, current: &'a YearPlan) -> Self {
        Self {
            prior,
            current_year,
            current,
        }
    }

    /// Year being planned.
    pub fn current_year(&self) -> i32 {
        self.current_year
    }

    /// Plan for the year being planned.
    pub fn current(&self) -> &YearPlan {
        self.current
    }

    /// `(career_index, slot)` for every known block, in career order.
    pub fn cells(&self) -> impl Iterator<Item = (i64, &Slot)> + '_ {
        let prior = self
            .prior
            .iter()
            .filter(move |(year, _)| **year < self.current_year)
            .flat_map(|(year, plan)| {
                plan.iter()
                    .map(move |(block, slot)| (career_block(*year, block), slot))
            });
        let current = self
            .current
            .iter()
            .map(move |(block, slot)| (career_block(self.current_year, block), slot));
        prior.chain(current)
    }

    /// Splits the timeline into placements.
    ///
    /// Maximal runs of one posting are cut at the academic-year boundary
    /// unless the posting spans years, then chunked into pieces of the
    /// posting's duration. A trailing piece shorter than the duration is an
    /// incomplete placement. Unknown codes are treated as single-block.
    pub fn placements(&self, catalogue: &PostingCatalogue) -> Vec<Placement> {
        let mut placements = Vec::new();
        let mut run: Option<(String, i64, u8)> = None;
        let mut last_idx: Option<i64> = None;

        for (idx, slot) in self.cells() {
            let code = slot.posting();
            let continues = match (&run, code, last_idx) {
                (Some((run_code, _, _)), Some(code), Some(last)) if run_code == code => {
                    let crosses_year = idx.rem_euclid(i64::from(BLOCKS_PER_YEAR)) == 0;
                    let spans = catalogue.get(code).is_some_and(|p| p.spans_years);
                    idx == last + 1 && (!crosses_year || spans)
                }
                _ => false,
            };

            if continues {
                if let Some((_, _, len)) = run.as_mut() {
                    *len += 1;
                }
            } else {
                if let Some((code, start, len)) = run.take() {
                    chunk_run(catalogue, code, start, len, &mut placements);
                }
                run = code.map(|c| (c.to_string(), idx, 1));
            }
            last_idx = Some(idx);
        }
        if let Some((code, start, len)) = run {
            chunk_run(catalogue, code, start, len, &mut placements);
        }

        placements
    }
}

fn chunk_run(
    catalogue: &PostingCatalogue,
    code: String,
    start: i64,
    len: u8,
    out: &mut Vec<Placement>,
) {
    let required = catalogue.get(&code).map(|p| p.duration()).unwrap_or(1);
    let mut offset = 0u8;
    while offset < len {
        let piece = required.min(len - offset);
        out.push(Placement {
            posting: code.clone(),
            career_start: start + i64::from(offset),
            len: piece,
            required,
        });
        offset += piece;
    }
}

/// Folds history entries into per-resident, per-year plans.
///
/// Entries outside 1..=12 are skipped; input validation reports them.
pub fn fold_history<'a>(
    entries: impl IntoIterator<Item = &'a HistoryEntry>,
) -> BTreeMap<String, BTreeMap<i32, YearPlan>> {
    let mut plans: BTreeMap<String, BTreeMap<i32, YearPlan>> = BTreeMap::new();
    for entry in entries {
        plans
            .entry(entry.resident_id.clone())
            .or_default()
            .entry(entry.academic_year)
            .or_default()
            .set(entry.block, entry.slot());
    }
    plans
}
