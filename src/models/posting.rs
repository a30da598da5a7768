//! Posting model.
//!
//! A posting is a department at a site that residents rotate through.
//! Each posting has a kind (core, elective or CCR), a per-block capacity,
//! and the number of consecutive blocks a single placement consumes.
//!
//! CCR status is never taken from free text: a posting is CCR exactly when
//! its code is listed in [`CCR_POSTINGS`]. The catalogue normalizes the
//! declared kind on construction so every consumer sees the same answer.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Month-blocks in one academic year.
pub const BLOCKS_PER_YEAR: u8 = 12;

/// Last block of the first half-year window (blocks 1..=6).
pub const MID_YEAR_BLOCK: u8 = 6;

/// Postings that satisfy the once-per-career CCR requirement.
pub const CCR_POSTINGS: &[&str] = &["GM (CGH)", "GM (KTPH)", "GM (NUH)", "GM (SGH)", "GM (SKH)"];

/// Bases whose blocks must form a single run within a year.
pub const CRITICAL_CARE_BASES: &[&str] = &["MICU", "RCCM"];

/// Whether a posting code belongs to the canonical CCR set.
pub fn is_ccr_code(code: &str) -> bool {
    CCR_POSTINGS.contains(&code)
}

/// Department prefix of a posting code: `"GM (SGH)"` → `"GM"`.
pub fn posting_base(code: &str) -> &str {
    match code.find(" (") {
        Some(idx) => code[..idx].trim(),
        None => code.trim(),
    }
}

/// Posting classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostingKind {
    /// Curriculum core posting (ED, GRM, GM, MICU, ...).
    Core,
    /// Elective posting chosen through preferences.
    Elective,
    /// Core posting that also satisfies the CCR requirement.
    Ccr,
}

impl PostingKind {
    /// Lowercase label used in exports.
    pub fn as_str(&self) -> &'static str {
        match self {
            PostingKind::Core => "core",
            PostingKind::Elective => "elective",
            PostingKind::Ccr => "ccr",
        }
    }
}

/// A posting residents can be placed in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Posting {
    /// Unique posting code, e.g. `"GM (SGH)"`.
    pub code: String,
    /// Human-readable name.
    #[serde(default)]
    pub name: String,
    /// Declared kind; normalized against [`CCR_POSTINGS`].
    pub kind: PostingKind,
    /// Residents allowed in the posting during any single block.
    pub max_residents: u32,
    /// Consecutive blocks consumed by one placement.
    #[serde(default = "default_duration")]
    pub required_block_duration: u8,
    /// Configured balance tolerance (max − min per half-year window).
    #[serde(default)]
    pub max_deviation: Option<u32>,
    /// Whether a placement may continue across the academic-year boundary.
    #[serde(default)]
    pub spans_years: bool,
    /// Lowest resident-year eligible for the posting.
    #[serde(default = "default_min_year")]
    pub min_year: u8,
}

fn default_duration() -> u8 {
    1
}

fn default_min_year() -> u8 {
    1
}

impl Posting {
    /// Creates a posting with capacity 1 and single-block placements.
    pub fn new(code: impl Into<String>, kind: PostingKind) -> Self {
        let code = code.into();
        let kind = normalize_kind(&code, kind);
        Self {
            code,
            name: String::new(),
            kind,
            max_residents: 1,
            required_block_duration: 1,
            max_deviation: None,
            spans_years: false,
            min_year: 1,
        }
    }

    /// Creates a core posting (promoted to CCR when listed).
    pub fn core(code: impl Into<String>) -> Self {
        Self::new(code, PostingKind::Core)
    }

    /// Creates an elective posting.
    pub fn elective(code: impl Into<String>) -> Self {
        Self::new(code, PostingKind::Elective)
    }

    /// Sets the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the per-block capacity.
    pub fn with_capacity(mut self, max_residents: u32) -> Self {
        self.max_residents = max_residents;
        self
    }

    /// Sets the consecutive-block duration of one placement.
    pub fn with_duration(mut self, blocks: u8) -> Self {
        self.required_block_duration = blocks;
        self
    }

    /// Sets the configured balance tolerance.
    pub fn with_max_deviation(mut self, deviation: u32) -> Self {
        self.max_deviation = Some(deviation);
        self
    }

    /// Allows placements to continue across the academic-year boundary.
    pub fn spanning_years(mut self) -> Self {
        self.spans_years = true;
        self
    }

    /// Sets the lowest eligible resident-year.
    pub fn with_min_year(mut self, year: u8) -> Self {
        self.min_year = year;
        self
    }

    /// Department prefix of the code.
    pub fn base(&self) -> &str {
        posting_base(&self.code)
    }

    /// Placement length, never below one block.
    #[inline]
    pub fn duration(&self) -> u8 {
        self.required_block_duration.max(1)
    }

    /// Whether this posting satisfies the CCR requirement.
    pub fn is_ccr(&self) -> bool {
        self.kind == PostingKind::Ccr
    }

    /// Whether this posting counts toward elective completion.
    pub fn is_elective(&self) -> bool {
        self.kind == PostingKind::Elective
    }

    /// Whether this posting belongs to the MICU/RCCM critical-care group.
    pub fn is_critical_care(&self) -> bool {
        CRITICAL_CARE_BASES.contains(&self.base())
    }

    /// Whether a resident of `year` may be placed here.
    pub fn is_eligible(&self, year: u8) -> bool {
        year >= self.min_year
    }
}

fn normalize_kind(code: &str, declared: PostingKind) -> PostingKind {
    match (is_ccr_code(code), declared) {
        (true, _) => PostingKind::Ccr,
        (false, PostingKind::Ccr) => PostingKind::Core,
        (false, kind) => kind,
    }
}

/// Postings indexed by code, iterated in code order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostingCatalogue {
    postings: BTreeMap<String, Posting>,
}

impl PostingCatalogue {
    /// Builds a catalogue, normalizing CCR kinds.
    ///
    /// Later duplicates replace earlier ones; input validation reports them.
    pub fn new(postings: impl IntoIterator<Item = Posting>) -> Self {
        let postings = postings
            .into_iter()
            .map(|mut p| {
                p.kind = normalize_kind(&p.code, p.kind);
                (p.code.clone(), p)
            })
            .collect();
        Self { postings }
    }

    /// Looks up a posting by code.
    pub fn get(&self, code: &str) -> Option<&Posting> {
        self.postings.get(code)
    }

    /// Whether the code is known.
    pub fn contains(&self, code: &str) -> bool {
        self.postings.contains_key(code)
    }

    /// Postings in code order.
    pub fn iter(&self) -> impl Iterator<Item = &Posting> {
        self.postings.values()
    }

    /// Postings a resident of `year` is eligible for, in code order.
    pub fn eligible_for(&self, year: u8) -> impl Iterator<Item = &Posting> {
        self.postings.values().filter(move |p| p.is_eligible(year))
    }

    /// Number of postings.
    pub fn len(&self) -> usize {
        self.postings.len()
    }

    /// Whether the catalogue is empty.
    pub fn is_empty(&self) -> bool {
        self.postings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_posting_base() {
        assert_eq!(posting_base("GM (SGH)"), "GM");
        assert_eq!(posting_base("MICU (NUH)"), "MICU");
        assert_eq!(posting_base("Cardio"), "Cardio");
    }

    #[test]
    fn test_ccr_kind_from_code_list() {
        let p = Posting::core("GM (SGH)");
        assert_eq!(p.kind, PostingKind::Ccr);
        assert!(p.is_ccr());

        let q = Posting::new("GM (TTSH)", PostingKind::Ccr);
        assert_eq!(q.kind, PostingKind::Core);
    }

    #[test]
    fn test_catalogue_normalizes_deserialized_kind() {
        let raw: Posting = serde_json::from_str(
            r#"{"code":"GM (NUH)","kind":"core","max_residents":4}"#,
        )
        .unwrap();
        assert_eq!(raw.required_block_duration, 1);
        assert_eq!(raw.min_year, 1);

        let catalogue = PostingCatalogue::new(vec![raw]);
        assert!(catalogue.get("GM (NUH)").unwrap().is_ccr());
    }

    #[test]
    fn test_posting_builder() {
        let p = Posting::core("MICU (NUH)")
            .with_name("Medical ICU")
            .with_capacity(3)
            .with_duration(2)
            .with_max_deviation(1)
            .with_min_year(2);

        assert_eq!(p.max_residents, 3);
        assert_eq!(p.duration(), 2);
        assert_eq!(p.max_deviation, Some(1));
        assert!(p.is_critical_care());
        assert!(!p.is_eligible(1));
        assert!(p.is_eligible(3));
    }

    #[test]
    fn test_zero_duration_reads_as_one() {
        let p = Posting::elective("Derm").with_duration(0);
        assert_eq!(p.duration(), 1);
    }

    #[test]
    fn test_eligible_for_filters_by_year() {
        let catalogue = PostingCatalogue::new(vec![
            Posting::elective("Cardio (NUH)"),
            Posting::core("MICU (SGH)").with_min_year(2),
        ]);
        let y1: Vec<_> = catalogue.eligible_for(1).map(|p| p.code.as_str()).collect();
        assert_eq!(y1, vec!["Cardio (NUH)"]);
        assert_eq!(catalogue.eligible_for(2).count(), 2);
    }
}
