//! Dispatching rules and rule engine for resident ordering.
//!
//! The solver plans residents one at a time; the order decides who gets
//! first pick of scarce posting capacity. Rules score residents and the
//! engine combines them with a final tie-breaker.
//!
//! # Usage
//!
//! ```
//! use u_rotation::dispatching::{DispatchContext, RuleEngine, TieBreaker};
//! use u_rotation::dispatching::rules;
//! use u_rotation::models::Resident;
//!
//! let residents = vec![Resident::new("B", 1), Resident::new("A", 3), Resident::new("C", 3)];
//! let engine = RuleEngine::new()
//!     .with_rule(rules::Seniority)
//!     .with_final_tie_breaker(TieBreaker::ById);
//!
//! let order = engine.sort_indices(&residents, &DispatchContext::default());
//! assert_eq!(order, vec![1, 2, 0]);
//! ```

mod context;
mod engine;
pub mod rules;

pub use context::DispatchContext;
pub use engine::{RuleEngine, TieBreaker};

use crate::models::Resident;
use std::fmt::Debug;

/// Score returned by a dispatching rule.
///
/// Lower scores = higher priority (planned first).
pub type RuleScore = f64;

/// A dispatching rule that evaluates resident priority.
///
/// # Score Convention
/// **Lower score = higher priority.** Rules should return smaller values
/// for residents that should be planned first.
pub trait DispatchingRule: Send + Sync + Debug {
    /// Rule name (e.g., "SENIORITY").
    fn name(&self) -> &'static str;

    /// Evaluates the priority of a resident.
    ///
    /// Returns a score where lower = higher priority.
    fn evaluate(&self, resident: &Resident, context: &DispatchContext) -> RuleScore;

    /// Rule description.
    fn description(&self) -> &'static str {
        self.name()
    }
}
