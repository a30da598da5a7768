//! Rotation planning engine for medical residency programmes.
//!
//! Assigns each resident a posting (or OFF) for each of the twelve
//! month-blocks of an academic year, honouring hard curriculum rules and
//! scoring soft preferences, then explains every OFF block and supports
//! hand edits of a committed roster.
//!
//! # Modules
//!
//! - **`models`**: Domain types: `Resident`, `Posting`, `HistoryEntry`,
//!   `YearPlan`, `RotationState`, `Violation`, `RotationProblem`
//! - **`validation`**: Input integrity checks (duplicate ids, references, block ranges)
//! - **`constraints`**: Hard rules and the shared placement predicate
//! - **`scoring`**: Objective scorer and cohort statistics
//! - **`dispatching`**: Resident ordering rules
//! - **`solver`**: Constructive search with backtracking, balance repair and top-K
//! - **`diagnostics`**: Why each OFF block is OFF
//! - **`editing`**: Validate and save single-resident edits
//! - **`report`**: Output bundle assembly
//! - **`export`**: Flat CSV export
//! - **`config`**: TOML solver configuration
//!
//! # Usage
//!
//! ```
//! use u_rotation::models::{Posting, ProblemInput, Resident, RotationProblem};
//! use u_rotation::solver::Solver;
//!
//! let input = ProblemInput::new(2025)
//!     .with_posting(Posting::core("GM (TTSH)").with_capacity(2))
//!     .with_posting(Posting::elective("Cardio (NUH)").with_capacity(1))
//!     .with_resident(Resident::new("R1", 1))
//!     .with_resident(Resident::new("R2", 1));
//! let problem = RotationProblem::from_input(input).unwrap();
//!
//! let outcome = Solver::new().solve(&problem).unwrap();
//! assert!(outcome.output.violations.is_empty());
//! assert_eq!(outcome.output.statistics.off_blocks, 0);
//! ```
//!
//! # References
//!
//! - Pinedo (2016), "Scheduling: Theory, Algorithms, and Systems"
//! - Burke et al. (2004), "The State of the Art of Nurse Rostering"

pub mod config;
pub mod constraints;
pub mod diagnostics;
pub mod dispatching;
pub mod editing;
pub mod error;
pub mod export;
pub mod models;
pub mod report;
pub mod scoring;
pub mod solver;
pub mod validation;

pub use error::RotationError;
