//! Rotation domain models.
//!
//! Provides the data types for representing a residency rotation problem
//! and its solutions: residents, postings, block history, preferences,
//! objective weights and per-resident year plans.
//!
//! # Domain Mappings
//!
//! | u-rotation | Scheduling analogue |
//! |------------|---------------------|
//! | Resident | Task |
//! | Posting | Resource (per-block capacity) |
//! | Placement | Activity (fixed duration) |
//! | Block | Time bucket |
//! | RotationState | Schedule |

mod history;
mod posting;
mod preference;
mod problem;
mod resident;
mod schedule;
mod weights;

pub use history::{
    career_block, fold_history, year_and_block, CareerTimeline, HistoryEntry, LeaveRecord,
    Placement, Slot, YearPlan,
};
pub use posting::{
    is_ccr_code, posting_base, Posting, PostingCatalogue, PostingKind, BLOCKS_PER_YEAR,
    CCR_POSTINGS, CRITICAL_CARE_BASES, MID_YEAR_BLOCK,
};
pub use preference::{rank_bonus, Preference, SrPreference, MAX_RANK};
pub use problem::{ProblemInput, RotationProblem};
pub use resident::{clamp_year, Resident};
pub use schedule::{
    Occupancy, OffBlockExplanation, RotationState, Violation, ViolationCode,
};
pub use weights::{Curriculum, Weightages, TERMINAL_YEAR};
