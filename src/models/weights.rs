//! Objective coefficients and curriculum requirements.
//!
//! Both are supplied per solve. Missing fields fall back to the defaults
//! below, so a caller may override a single coefficient.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Resident-year whose curriculum must be complete by year end.
pub const TERMINAL_YEAR: u8 = 3;

/// Tunable objective coefficients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Weightages {
    /// Multiplier on `(6 − rank)` for each ranked elective placed.
    pub preference: f64,
    /// Multiplier on `resident_year × blocks_placed`.
    pub seniority: f64,
    /// Cost per missing distinct elective.
    pub elective_shortfall_penalty: f64,
    /// Cost per missing core block for terminal-year residents.
    pub core_shortfall_penalty: f64,
    /// Multiplier on `(6 − rank)` for the best matched SR department.
    pub sr_preference: f64,
    /// Cost for a year-2 resident whose SR preferences were not matched.
    pub sr_y2_not_selected_penalty: f64,
}

impl Default for Weightages {
    fn default() -> Self {
        Self {
            preference: 10.0,
            seniority: 1.0,
            elective_shortfall_penalty: 20.0,
            core_shortfall_penalty: 50.0,
            sr_preference: 10.0,
            sr_y2_not_selected_penalty: 30.0,
        }
    }
}

/// Completion requirements checked by the scorer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Curriculum {
    /// Required core blocks by posting base.
    pub core_blocks: BTreeMap<String, u32>,
    /// Distinct electives a year-2 resident should have completed.
    pub year2_electives: u32,
    /// Distinct electives a year-3 resident should have completed.
    pub year3_electives: u32,
    /// Requirement for residents who submitted no elective preferences.
    pub no_preference_electives: u32,
}

impl Default for Curriculum {
    fn default() -> Self {
        let core_blocks = [("ED", 1), ("GRM", 2), ("GM", 3)]
            .into_iter()
            .map(|(base, blocks)| (base.to_string(), blocks))
            .collect();
        Self {
            core_blocks,
            year2_electives: 2,
            year3_electives: 5,
            no_preference_electives: 1,
        }
    }
}

impl Curriculum {
    /// Distinct electives expected of a resident in `year`.
    pub fn elective_target(&self, year: u8, has_preferences: bool) -> u32 {
        let target = match year {
            2 => self.year2_electives,
            y if y >= TERMINAL_YEAR => self.year3_electives,
            _ => 0,
        };
        if has_preferences {
            target
        } else {
            target.min(self.no_preference_electives)
        }
    }
}
