//! Rule engine for resident ordering.
//!
//! Applies dispatching rules in sequence (next rule only on ties) and
//! finishes with a deterministic or seeded tie-breaker.

use std::cmp::Ordering;
use std::sync::Arc;

use super::{DispatchContext, DispatchingRule, RuleScore};
use crate::models::Resident;

/// How ties are broken after all rules are exhausted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TieBreaker {
    /// Deterministic by resident id (lexicographic).
    #[default]
    ById,
    /// By the context's seeded shuffle key, then id.
    Seeded,
}

/// A composable rule engine for resident prioritization.
///
/// # Example
/// ```
/// use u_rotation::dispatching::{RuleEngine, TieBreaker};
/// use u_rotation::dispatching::rules;
///
/// let engine = RuleEngine::new()
///     .with_rule(rules::Seniority)
///     .with_final_tie_breaker(TieBreaker::Seeded);
/// ```
#[derive(Clone)]
pub struct RuleEngine {
    rules: Vec<Arc<dyn DispatchingRule>>,
    tie_breaker: TieBreaker,
    epsilon: f64,
}

impl RuleEngine {
    /// Creates an empty rule engine.
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            tie_breaker: TieBreaker::ById,
            epsilon: 1e-9,
        }
    }

    /// Seniority first, then `tie_breaker`.
    pub fn seniority(tie_breaker: TieBreaker) -> Self {
        Self::new()
            .with_rule(super::rules::Seniority)
            .with_final_tie_breaker(tie_breaker)
    }

    /// Appends a rule; later rules only break ties of earlier ones.
    pub fn with_rule<R: DispatchingRule + 'static>(mut self, rule: R) -> Self {
        self.rules.push(Arc::new(rule));
        self
    }

    /// Sets the final tie-breaking strategy.
    pub fn with_final_tie_breaker(mut self, tie_breaker: TieBreaker) -> Self {
        self.tie_breaker = tie_breaker;
        self
    }

    /// Sorts residents by priority (highest priority first).
    ///
    /// Returns indices into the original slice.
    pub fn sort_indices(&self, residents: &[Resident], context: &DispatchContext) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..residents.len()).collect();
        indices.sort_by(|&a, &b| self.compare(&residents[a], &residents[b], context));
        indices
    }

    /// Scores of a resident under each rule, in rule order.
    pub fn evaluate(&self, resident: &Resident, context: &DispatchContext) -> Vec<RuleScore> {
        self.rules
            .iter()
            .map(|rule| rule.evaluate(resident, context))
            .collect()
    }

    fn compare(&self, a: &Resident, b: &Resident, context: &DispatchContext) -> Ordering {
        for rule in &self.rules {
            let score_a = rule.evaluate(a, context);
            let score_b = rule.evaluate(b, context);

            if (score_a - score_b).abs() > self.epsilon {
                return score_a.partial_cmp(&score_b).unwrap_or(Ordering::Equal);
            }
        }

        // All rules tied → use final tie-breaker
        match self.tie_breaker {
            TieBreaker::ById => a.id.cmp(&b.id),
            TieBreaker::Seeded => context
                .shuffle_key(&a.id)
                .cmp(&context.shuffle_key(&b.id))
                .then_with(|| a.id.cmp(&b.id)),
        }
    }
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RuleEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleEngine")
            .field(
                "rules",
                &self.rules.iter().map(|r| r.name()).collect::<Vec<_>>(),
            )
            .field("tie_breaker", &self.tie_breaker)
            .finish()
    }
}
