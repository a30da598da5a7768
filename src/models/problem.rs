//! Problem input and the assembled, immutable problem.
//!
//! [`ProblemInput`] is the serde document a caller supplies per solve.
//! [`RotationProblem::from_input`] validates it and folds history into
//! per-resident year plans. The resulting problem is never mutated; solves
//! and edits work on separate [`RotationState`] values.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::history::{fold_history, CareerTimeline, HistoryEntry, LeaveRecord, Slot, YearPlan};
use super::posting::{Posting, PostingCatalogue};
use super::preference::{Preference, SrPreference};
use super::resident::{clamp_year, Resident};
use super::schedule::RotationState;
use super::weights::{Curriculum, Weightages};
use crate::error::RotationError;
use crate::validation::validate_input;

static NO_PRIOR: BTreeMap<i32, YearPlan> = BTreeMap::new();

/// Everything a caller supplies for one solve.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProblemInput {
    /// Academic year being planned.
    pub academic_year: i32,
    pub residents: Vec<Resident>,
    pub postings: Vec<Posting>,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
    /// Current-year leave outside the history table.
    #[serde(default)]
    pub leave: Vec<LeaveRecord>,
    #[serde(default)]
    pub preferences: Vec<Preference>,
    #[serde(default)]
    pub sr_preferences: Vec<SrPreference>,
    #[serde(default)]
    pub weights: Weightages,
    #[serde(default)]
    pub curriculum: Curriculum,
    /// Residents whose current-year plan must not change.
    #[serde(default)]
    pub pinned: BTreeSet<String>,
    /// Per-posting balance tolerance; presence enables the balance rule.
    #[serde(default)]
    pub deviation_overrides: Option<BTreeMap<String, u32>>,
}

impl ProblemInput {
    /// Creates an empty input for `academic_year`.
    pub fn new(academic_year: i32) -> Self {
        Self {
            academic_year,
            ..Self::default()
        }
    }

    pub fn with_resident(mut self, resident: Resident) -> Self {
        self.residents.push(resident);
        self
    }

    pub fn with_posting(mut self, posting: Posting) -> Self {
        self.postings.push(posting);
        self
    }

    pub fn with_history(mut self, entry: HistoryEntry) -> Self {
        self.history.push(entry);
        self
    }

    pub fn with_leave(mut self, record: LeaveRecord) -> Self {
        self.leave.push(record);
        self
    }

    pub fn with_preference(mut self, preference: Preference) -> Self {
        self.preferences.push(preference);
        self
    }

    pub fn with_sr_preference(mut self, preference: SrPreference) -> Self {
        self.sr_preferences.push(preference);
        self
    }

    pub fn with_weights(mut self, weights: Weightages) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_pinned(mut self, resident_id: impl Into<String>) -> Self {
        self.pinned.insert(resident_id.into());
        self
    }

    pub fn with_deviation_override(mut self, posting: impl Into<String>, deviation: u32) -> Self {
        self.deviation_overrides
            .get_or_insert_with(BTreeMap::new)
            .insert(posting.into(), deviation);
        self
    }

    /// Parses an input document from JSON.
    pub fn from_json_str(s: &str) -> Result<Self, RotationError> {
        Ok(serde_json::from_str(s)?)
    }
}

/// A validated problem ready to solve, validate or export.
#[derive(Debug, Clone)]
pub struct RotationProblem {
    academic_year: i32,
    residents: Vec<Resident>,
    catalogue: PostingCatalogue,
    prior: BTreeMap<String, BTreeMap<i32, YearPlan>>,
    initial: RotationState,
    preferences: BTreeMap<String, Vec<Preference>>,
    sr_preferences: BTreeMap<String, Vec<SrPreference>>,
    weights: Weightages,
    curriculum: Curriculum,
    pins: BTreeSet<String>,
    deviation_overrides: Option<BTreeMap<String, u32>>,
}

impl RotationProblem {
    /// Validates the input and assembles the problem.
    ///
    /// # Errors
    /// [`RotationError::InvalidInput`] listing every structural issue found.
    pub fn from_input(input: ProblemInput) -> Result<Self, RotationError> {
        validate_input(&input).map_err(RotationError::InvalidInput)?;

        let ProblemInput {
            academic_year,
            residents,
            postings,
            history,
            leave,
            preferences,
            sr_preferences,
            weights,
            curriculum,
            pinned,
            deviation_overrides,
        } = input;

        let mut residents: Vec<Resident> = residents
            .into_iter()
            .map(|mut r| {
                r.year = clamp_year(r.year);
                r
            })
            .collect();
        residents.sort_by(|a, b| a.id.cmp(&b.id));

        let (current, past): (Vec<&HistoryEntry>, Vec<&HistoryEntry>) = history
            .iter()
            .partition(|e| e.is_current_year || e.academic_year == academic_year);

        let prior = fold_history(past);
        let mut current_plans = fold_history(current);

        let mut initial = RotationState::new();
        for resident in &residents {
            let mut plan = current_plans
                .get_mut(&resident.id)
                .and_then(|years| years.remove(&academic_year))
                .unwrap_or_default();
            for record in leave.iter().filter(|l| l.resident_id == resident.id) {
                plan.set(record.block, Slot::Leave(record.leave_type.clone()));
            }
            initial.insert(resident.id.clone(), plan);
        }

        let mut pref_map: BTreeMap<String, Vec<Preference>> = BTreeMap::new();
        for p in preferences {
            pref_map.entry(p.resident_id.clone()).or_default().push(p);
        }
        for prefs in pref_map.values_mut() {
            prefs.sort_by_key(|p| p.rank);
        }

        let mut sr_map: BTreeMap<String, Vec<SrPreference>> = BTreeMap::new();
        for p in sr_preferences {
            sr_map.entry(p.resident_id.clone()).or_default().push(p);
        }
        for prefs in sr_map.values_mut() {
            prefs.sort_by_key(|p| p.rank);
        }

        Ok(Self {
            academic_year,
            residents,
            catalogue: PostingCatalogue::new(postings),
            prior,
            initial,
            preferences: pref_map,
            sr_preferences: sr_map,
            weights,
            curriculum,
            pins: pinned,
            deviation_overrides,
        })
    }

    /// Returns a copy with a different pin set, for re-solves.
    pub fn with_pins(mut self, pins: impl IntoIterator<Item = String>) -> Self {
        self.pins = pins.into_iter().collect();
        self
    }

    /// Returns a copy with different objective weights.
    pub fn with_weights(mut self, weights: Weightages) -> Self {
        self.weights = weights;
        self
    }

    /// Returns a copy whose initial state is `state` (e.g. a previous solve).
    ///
    /// Plans for unknown residents are ignored.
    pub fn with_initial_state(mut self, state: &RotationState) -> Self {
        for (id, plan) in state.iter() {
            if let Some(existing) = self.initial.plan_mut(id) {
                *existing = plan.clone();
            }
        }
        self
    }

    pub fn academic_year(&self) -> i32 {
        self.academic_year
    }

    /// Residents in id order.
    pub fn residents(&self) -> &[Resident] {
        &self.residents
    }

    pub fn resident(&self, resident_id: &str) -> Option<&Resident> {
        self.residents
            .binary_search_by(|r| r.id.as_str().cmp(resident_id))
            .ok()
            .map(|idx| &self.residents[idx])
    }

    pub fn catalogue(&self) -> &PostingCatalogue {
        &self.catalogue
    }

    /// Prior-year plans of a resident (empty when none).
    pub fn prior(&self, resident_id: &str) -> &BTreeMap<i32, YearPlan> {
        self.prior.get(resident_id).unwrap_or(&NO_PRIOR)
    }

    /// Current-year plans as supplied.
    pub fn initial_state(&self) -> &RotationState {
        &self.initial
    }

    /// Career timeline of a resident with `plan` as the current year.
    pub fn timeline<'a>(&'a self, resident_id: &str, plan: &'a YearPlan) -> CareerTimeline<'a> {
        CareerTimeline::new(self.prior(resident_id), self.academic_year, plan)
    }

    /// Spanning posting a resident must continue from block 1, with the
    /// number of blocks it still needs.
    ///
    /// `None` unless prior history ends the previous year on a short
    /// placement of a posting that may span years.
    pub fn carried_placement(&self, resident_id: &str) -> Option<(&Posting, u8)> {
        let empty = YearPlan::new();
        let placements = self.timeline(resident_id, &empty).placements(&self.catalogue);
        let last = placements.last()?;
        let owed = last.owed_into(self.academic_year);
        let posting = self.catalogue.get(&last.posting)?;
        (owed > 0 && posting.spans_years).then_some((posting, owed))
    }

    /// Elective preferences of a resident, best rank first.
    pub fn preferences(&self, resident_id: &str) -> &[Preference] {
        self.preferences
            .get(resident_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// SR preferences of a resident, best rank first.
    pub fn sr_preferences(&self, resident_id: &str) -> &[SrPreference] {
        self.sr_preferences
            .get(resident_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn weights(&self) -> &Weightages {
        &self.weights
    }

    pub fn curriculum(&self) -> &Curriculum {
        &self.curriculum
    }

    pub fn pins(&self) -> &BTreeSet<String> {
        &self.pins
    }

    pub fn is_pinned(&self, resident_id: &str) -> bool {
        self.pins.contains(resident_id)
    }

    /// Whether the balance rule is active.
    pub fn balance_enabled(&self) -> bool {
        self.deviation_overrides.is_some()
    }

    /// Effective balance tolerance for a posting, when the rule is active.
    ///
    /// An override wins; otherwise the posting's configured value applies.
    pub fn deviation_for(&self, posting: &str) -> Option<u32> {
        let overrides = self.deviation_overrides.as_ref()?;
        overrides
            .get(posting)
            .copied()
            .or_else(|| self.catalogue.get(posting).and_then(|p| p.max_deviation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Posting;

    fn input() -> ProblemInput {
        ProblemInput::new(2025)
            .with_resident(Resident::new("R2", 2))
            .with_resident(Resident::new("R1", 9))
            .with_posting(Posting::core("GM (TTSH)").with_capacity(5).with_max_deviation(2))
            .with_posting(Posting::elective("Cardio (NUH)").with_capacity(2))
            .with_history(HistoryEntry::new("R1", 2024, 1, "GM (TTSH)"))
            .with_history(HistoryEntry::new("R1", 2025, 3, "Cardio (NUH)").current())
            .with_leave(LeaveRecord {
                resident_id: "R2".into(),
                block: 4,
                leave_type: "annual".into(),
            })
            .with_preference(Preference::new("R1", 2, "Cardio (NUH)"))
            .with_preference(Preference::new("R1", 1, "GM (TTSH)"))
    }

    #[test]
    fn test_assembles_prior_and_current() {
        let problem = RotationProblem::from_input(input()).unwrap();
        assert_eq!(problem.residents()[0].id, "R1");
        assert_eq!(problem.resident("R1").unwrap().year, 3);
        assert_eq!(problem.prior("R1")[&2024].posting_at(1), Some("GM (TTSH)"));
        assert!(problem.prior("R2").is_empty());

        let r1 = problem.initial_state().plan("R1").unwrap();
        assert_eq!(r1.posting_at(3), Some("Cardio (NUH)"));
        let r2 = problem.initial_state().plan("R2").unwrap();
        assert!(r2.slot(4).unwrap().is_leave());
    }

    #[test]
    fn test_preferences_sorted_by_rank() {
        let problem = RotationProblem::from_input(input()).unwrap();
        let ranks: Vec<u8> = problem.preferences("R1").iter().map(|p| p.rank).collect();
        assert_eq!(ranks, vec![1, 2]);
        assert!(problem.preferences("R2").is_empty());
    }

    #[test]
    fn test_deviation_only_when_overrides_supplied() {
        let problem = RotationProblem::from_input(input()).unwrap();
        assert!(!problem.balance_enabled());
        assert_eq!(problem.deviation_for("GM (TTSH)"), None);

        let problem =
            RotationProblem::from_input(input().with_deviation_override("Cardio (NUH)", 0))
                .unwrap();
        assert_eq!(problem.deviation_for("Cardio (NUH)"), Some(0));
        assert_eq!(problem.deviation_for("GM (TTSH)"), Some(2));
    }

    #[test]
    fn test_carried_placement_only_for_spanning_postings() {
        let problem = RotationProblem::from_input(
            input()
                .with_posting(Posting::core("GRM (CGH)").with_duration(2).spanning_years())
                .with_posting(Posting::core("GM (SGH)").with_duration(3))
                .with_history(HistoryEntry::new("R2", 2024, 12, "GRM (CGH)"))
                .with_history(HistoryEntry::new("R1", 2024, 12, "GM (SGH)")),
        )
        .unwrap();

        let (posting, owed) = problem.carried_placement("R2").unwrap();
        assert_eq!(posting.code, "GRM (CGH)");
        assert_eq!(owed, 1);
        assert!(problem.carried_placement("R1").is_none());
    }

    #[test]
    fn test_rejects_malformed_input() {
        let bad = input().with_history(HistoryEntry::new("R9", 2024, 13, "Nowhere"));
        let err = RotationProblem::from_input(bad).unwrap_err();
        match err {
            RotationError::InvalidInput(issues) => assert!(issues.len() >= 3),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_parses_json_document() {
        let json = r#"{
            "academic_year": 2025,
            "residents": [{"id": "R1", "year": 2}],
            "postings": [{"code": "ED (SGH)", "kind": "core", "max_residents": 2}],
            "pinned": ["R1"]
        }"#;
        let input = ProblemInput::from_json_str(json).unwrap();
        let problem = RotationProblem::from_input(input).unwrap();
        assert!(problem.is_pinned("R1"));
        assert_eq!(problem.weights(), &Weightages::default());
    }

    #[test]
    fn test_missing_required_field_is_parse_error() {
        let json = r#"{"academic_year": 2025, "residents": [{"id": "R1"}], "postings": []}"#;
        assert!(matches!(
            ProblemInput::from_json_str(json),
            Err(RotationError::Parse(_))
        ));
    }
}
