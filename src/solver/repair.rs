//! Half-year balance repair.
//!
//! Residents are planned one at a time, so the balance rule cannot be
//! judged while the cohort is still half empty. After the first pass, any
//! posting whose fill varies beyond its tolerance within a half-year window
//! is repaired by ruining placements from the fullest blocks, cheapest
//! score loss first. The solver then refills the freed blocks with the
//! balance rule enforced.
//!
//! A placement is only removed when doing so
//! - leaves no new hard-rule violation on its resident,
//! - touches no pinned resident,
//! - does not widen the window's deviation.

use tracing::debug;

use super::budget::SolverStats;
use super::search::Workspace;
use crate::constraints::{introduced, resident_violations, window_deviation, HALF_YEAR_WINDOWS};
use crate::models::{Posting, Slot, BLOCKS_PER_YEAR};
use crate::scoring::ObjectiveScorer;

/// A placement chosen for removal.
#[derive(Debug, Clone, PartialEq)]
struct Removal {
    resident_id: String,
    blocks: Vec<u8>,
    loss: f64,
}

/// Removes placements until every checked posting is within tolerance or
/// no admissible removal is left. Returns the number removed.
pub(crate) fn rebalance(ws: &mut Workspace<'_>, stats: &mut SolverStats) -> u64 {
    let problem = ws.problem();
    let mut removed = 0u64;

    for posting in problem.catalogue().iter() {
        let Some(tolerance) = problem.deviation_for(&posting.code) else {
            continue;
        };
        for window in HALF_YEAR_WINDOWS {
            loop {
                let counts = ws.occupancy().per_block(&posting.code);
                let deviation = window_deviation(&counts, window);
                if deviation <= tolerance {
                    break;
                }
                let Some(removal) = cheapest_removal(ws, posting, window, &counts, deviation) else {
                    debug!(
                        event = "balance_unrepaired",
                        posting = %posting.code,
                        window = ?window,
                        deviation,
                        tolerance,
                    );
                    break;
                };
                for &block in &removal.blocks {
                    ws.set_slot(&removal.resident_id, block, Slot::Open);
                }
                removed += 1;
                debug!(
                    event = "balance_removal",
                    posting = %posting.code,
                    resident = %removal.resident_id,
                    blocks = ?removal.blocks,
                    loss = removal.loss,
                );
            }
        }
    }

    stats.repairs += removed;
    removed
}

fn cheapest_removal(
    ws: &Workspace<'_>,
    posting: &Posting,
    window: (u8, u8),
    counts: &[u32; BLOCKS_PER_YEAR as usize],
    deviation: u32,
) -> Option<Removal> {
    let problem = ws.problem();
    let catalogue = problem.catalogue();
    let year = problem.academic_year();
    let scorer = ObjectiveScorer::new(problem);
    let in_window = |b: u8| (window.0..=window.1).contains(&b);
    let peak = (window.0..=window.1)
        .map(|b| counts[b as usize - 1])
        .max()?;

    let mut best: Option<Removal> = None;
    for resident in problem.residents() {
        if problem.is_pinned(&resident.id) {
            continue;
        }
        let Some(plan) = ws.state().plan(&resident.id) else {
            continue;
        };
        let placements = problem.timeline(&resident.id, plan).placements(catalogue);
        for placement in placements.iter().filter(|p| p.posting == posting.code) {
            let blocks = placement.blocks_in_year(year);
            if !blocks.iter().any(|&b| in_window(b) && counts[b as usize - 1] == peak) {
                continue;
            }

            let mut after = *counts;
            for &b in &blocks {
                after[b as usize - 1] = after[b as usize - 1].saturating_sub(1);
            }
            if window_deviation(&after, window) > deviation {
                continue;
            }

            let mut tentative = plan.clone();
            for &b in &blocks {
                tentative.set(b, Slot::Open);
            }
            let baseline = resident_violations(problem, resident, plan);
            if !introduced(&baseline, resident_violations(problem, resident, &tentative)).is_empty() {
                continue;
            }

            let loss = scorer.score(resident, plan).total() - scorer.score(resident, &tentative).total();
            if best.as_ref().map_or(true, |b| loss < b.loss) {
                best = Some(Removal {
                    resident_id: resident.id.clone(),
                    blocks,
                    loss,
                });
            }
        }
    }
    best
}
