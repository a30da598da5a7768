//! Dispatch context for rule evaluation.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;

/// Runtime state passed to dispatching rules and tie-breakers.
#[derive(Debug, Clone, Default)]
pub struct DispatchContext {
    /// Random keys per resident for seeded tie-breaking.
    pub shuffle_keys: HashMap<String, u64>,
}

impl DispatchContext {
    /// Creates a context with seeded shuffle keys.
    ///
    /// Keys are drawn in the order `ids` are given, so the same ids and
    /// seed always produce the same keys.
    pub fn seeded<'a>(seed: u64, ids: impl IntoIterator<Item = &'a str>) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let shuffle_keys = ids
            .into_iter()
            .map(|id| (id.to_string(), rng.random::<u64>()))
            .collect();
        Self { shuffle_keys }
    }

    /// Shuffle key of a resident (zero when none was drawn).
    pub fn shuffle_key(&self, resident_id: &str) -> u64 {
        self.shuffle_keys.get(resident_id).copied().unwrap_or(0)
    }
}
