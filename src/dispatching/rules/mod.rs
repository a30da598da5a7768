//! Built-in dispatching rules.
//!
//! # Score Convention
//! All rules return lower scores for higher priority residents.

use super::{DispatchContext, DispatchingRule, RuleScore};
use crate::models::Resident;

/// Senior residents first.
///
/// Terminal-year residents take capacity before junior years.
#[derive(Debug, Clone, Copy)]
pub struct Seniority;

impl DispatchingRule for Seniority {
    fn name(&self) -> &'static str {
        "SENIORITY"
    }

    fn evaluate(&self, resident: &Resident, _context: &DispatchContext) -> RuleScore {
        -f64::from(resident.year)
    }

    fn description(&self) -> &'static str {
        "Higher resident-year first"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seniority_prefers_senior() {
        let ctx = DispatchContext::default();
        let senior = Seniority.evaluate(&Resident::new("A", 3), &ctx);
        let junior = Seniority.evaluate(&Resident::new("B", 1), &ctx);
        assert!(senior < junior);
        assert_eq!(Seniority.name(), "SENIORITY");
    }
}
