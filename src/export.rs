//! Flat export of a committed state.
//!
//! One row per resident-block, in resident then block order, derived
//! purely from the plans. Rows serialize to CSV with a header line.

use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::error::RotationError;
use crate::models::{RotationProblem, RotationState, Slot};

/// One resident-block of the export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportRow {
    pub resident_id: String,
    pub resident_name: String,
    pub resident_year: u8,
    pub academic_year: i32,
    pub block: u8,
    /// `posting`, `leave` or `off`.
    pub status: String,
    /// Posting code; empty unless `status` is `posting`.
    pub posting_code: String,
    /// Posting kind (`core`, `elective`, `ccr`); empty unless placed.
    pub posting_kind: String,
    /// Leave type; empty unless `status` is `leave`.
    pub leave_type: String,
}

/// Export rows for every resident with a plan in `state`.
pub fn rows(problem: &RotationProblem, state: &RotationState) -> Vec<ExportRow> {
    let mut out = Vec::new();
    for resident in problem.residents() {
        let Some(plan) = state.plan(&resident.id) else {
            continue;
        };
        for (block, slot) in plan.iter() {
            let (status, posting_code, posting_kind, leave_type) = match slot {
                Slot::Posting(code) => (
                    "posting",
                    code.clone(),
                    problem
                        .catalogue()
                        .get(code)
                        .map(|p| p.kind.as_str().to_string())
                        .unwrap_or_default(),
                    String::new(),
                ),
                Slot::Leave(kind) => ("leave", String::new(), String::new(), kind.clone()),
                Slot::Open => ("off", String::new(), String::new(), String::new()),
            };
            out.push(ExportRow {
                resident_id: resident.id.clone(),
                resident_name: resident.name.clone(),
                resident_year: resident.year,
                academic_year: problem.academic_year(),
                block,
                status: status.to_string(),
                posting_code,
                posting_kind,
                leave_type,
            });
        }
    }
    out
}

/// Writes rows as CSV with a header line.
///
/// # Errors
/// [`RotationError::Csv`] or [`RotationError::Io`] on write failure.
pub fn write_csv<W: Write>(writer: W, rows: &[ExportRow]) -> Result<(), RotationError> {
    let mut csv_writer = csv::WriterBuilder::new().has_headers(true).from_writer(writer);
    for row in rows {
        csv_writer.serialize(row)?;
    }
    csv_writer.flush()?;
    Ok(())
}
