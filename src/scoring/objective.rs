//! Objective scorer.
//!
//! Scores one resident's current-year plan against their preferences and
//! curriculum. Components are additive; penalties are negative.
//!
//! # Components
//!
//! | Component | Value |
//! |-----------|-------|
//! | Preference | `w_pref × (6 − rank)` per distinct ranked elective placed; ranks on other postings are ignored |
//! | Seniority | `w_sen × year × blocks placed` |
//! | SR preference | `w_sr × (6 − best matched rank)`, or `−penalty` for an unmatched year-2 resident |
//! | Elective shortfall | `−penalty` per missing distinct elective |
//! | Core shortfall | `−penalty` per missing core block, terminal year only |

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::models::{
    posting_base, rank_bonus, Posting, PostingKind, Preference, Resident, RotationProblem,
    RotationState, YearPlan,
};

/// Per-component score of one resident's plan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub preference: f64,
    pub seniority: f64,
    pub sr_preference: f64,
    /// Zero or negative.
    pub elective_shortfall: f64,
    /// Zero or negative.
    pub core_shortfall: f64,
}

impl ScoreBreakdown {
    /// Sum of all components.
    pub fn total(&self) -> f64 {
        self.preference
            + self.seniority
            + self.sr_preference
            + self.elective_shortfall
            + self.core_shortfall
    }
}

/// Scores plans with the problem's weights and curriculum.
#[derive(Debug, Clone, Copy)]
pub struct ObjectiveScorer<'a> {
    problem: &'a RotationProblem,
}

impl<'a> ObjectiveScorer<'a> {
    pub fn new(problem: &'a RotationProblem) -> Self {
        Self { problem }
    }

    /// Scores one resident's current-year plan.
    pub fn score(&self, resident: &Resident, plan: &YearPlan) -> ScoreBreakdown {
        let weights = self.problem.weights();
        let curriculum = self.problem.curriculum();
        let catalogue = self.problem.catalogue();
        let year = f64::from(resident.year);

        let placed: BTreeSet<&str> = plan.iter().filter_map(|(_, s)| s.posting()).collect();

        let elective_prefs: Vec<&Preference> = self
            .problem
            .preferences(&resident.id)
            .iter()
            .filter(|p| catalogue.get(&p.posting_code).is_some_and(Posting::is_elective))
            .collect();

        let preference: f64 = elective_prefs
            .iter()
            .filter(|p| placed.contains(p.posting_code.as_str()))
            .fold(BTreeMap::<&str, u8>::new(), |mut best, p| {
                let rank = best.entry(p.posting_code.as_str()).or_insert(p.rank);
                *rank = (*rank).min(p.rank);
                best
            })
            .values()
            .map(|&rank| weights.preference * rank_bonus(rank))
            .sum();

        let seniority = weights.seniority * year * plan.filled_count() as f64;

        let placed_bases: BTreeSet<&str> = placed
            .iter()
            .map(|code| {
                catalogue
                    .get(code)
                    .map(|p| p.base())
                    .unwrap_or_else(|| posting_base(code))
            })
            .collect();
        let sr_prefs = self.problem.sr_preferences(&resident.id);
        let sr_preference = match sr_prefs
            .iter()
            .filter(|p| placed_bases.contains(p.base.as_str()))
            .map(|p| p.rank)
            .min()
        {
            Some(rank) => weights.sr_preference * rank_bonus(rank),
            None if resident.year == 2 && !sr_prefs.is_empty() => {
                -weights.sr_y2_not_selected_penalty
            }
            None => 0.0,
        };

        let timeline = self.problem.timeline(&resident.id, plan);
        let mut electives = BTreeSet::new();
        let mut core_blocks: BTreeMap<&str, u32> = BTreeMap::new();
        for (_, slot) in timeline.cells() {
            let Some(posting) = slot.posting().and_then(|code| catalogue.get(code)) else {
                continue;
            };
            match posting.kind {
                PostingKind::Elective => {
                    electives.insert(posting.code.as_str());
                }
                PostingKind::Core | PostingKind::Ccr => {
                    *core_blocks.entry(posting.base()).or_insert(0) += 1;
                }
            }
        }

        let has_preferences = !elective_prefs.is_empty();
        let target = curriculum.elective_target(resident.year, has_preferences);
        let missing_electives = target.saturating_sub(electives.len() as u32);
        let elective_shortfall = -weights.elective_shortfall_penalty * f64::from(missing_electives);

        let core_shortfall = if resident.is_terminal_year() {
            let missing: u32 = curriculum
                .core_blocks
                .iter()
                .map(|(base, &required)| {
                    required.saturating_sub(core_blocks.get(base.as_str()).copied().unwrap_or(0))
                })
                .sum();
            -weights.core_shortfall_penalty * f64::from(missing)
        } else {
            0.0
        };

        ScoreBreakdown {
            preference,
            seniority,
            sr_preference,
            elective_shortfall,
            core_shortfall,
        }
    }

    /// Breakdown per resident of a state, in id order.
    ///
    /// Residents without a plan in `state` are skipped.
    pub fn score_state(&self, state: &RotationState) -> BTreeMap<String, ScoreBreakdown> {
        self.problem
            .residents()
            .iter()
            .filter_map(|r| {
                state
                    .plan(&r.id)
                    .map(|plan| (r.id.clone(), self.score(r, plan)))
            })
            .collect()
    }

    /// Sum of raw totals across the cohort.
    pub fn aggregate(&self, state: &RotationState) -> f64 {
        self.score_state(state).values().map(ScoreBreakdown::total).sum()
    }
}
