//! Ranked preferences.
//!
//! Residents rank up to five elective postings and, separately, up to five
//! base departments for the senior-residency track. Blank choices are simply
//! absent from the input.

use serde::{Deserialize, Serialize};

/// Highest rank a resident may assign.
pub const MAX_RANK: u8 = 5;

/// An elective preference: `rank` 1 (most wanted) to 5 for a posting code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preference {
    pub resident_id: String,
    pub rank: u8,
    /// Elective posting code.
    pub posting_code: String,
}

/// A senior-track preference: `rank` 1 to 5 for a base department.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SrPreference {
    pub resident_id: String,
    pub rank: u8,
    /// Base department, e.g. `"Cardio"`.
    pub base: String,
}

impl Preference {
    pub fn new(resident_id: impl Into<String>, rank: u8, posting_code: impl Into<String>) -> Self {
        Self {
            resident_id: resident_id.into(),
            rank,
            posting_code: posting_code.into(),
        }
    }
}

impl SrPreference {
    pub fn new(resident_id: impl Into<String>, rank: u8, base: impl Into<String>) -> Self {
        Self {
            resident_id: resident_id.into(),
            rank,
            base: base.into(),
        }
    }
}

/// Bonus multiplier for a rank: rank 1 → 5, rank 5 → 1, out of range → 0.
#[inline]
pub fn rank_bonus(rank: u8) -> f64 {
    if (1..=MAX_RANK).contains(&rank) {
        f64::from(MAX_RANK + 1 - rank)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_bonus() {
        assert_eq!(rank_bonus(1), 5.0);
        assert_eq!(rank_bonus(5), 1.0);
        assert_eq!(rank_bonus(0), 0.0);
        assert_eq!(rank_bonus(6), 0.0);
    }
}
