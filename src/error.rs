//! Crate error type.
//!
//! Local infeasibility and rule violations are never errors: they surface as
//! OFF blocks, diagnostics and [`Violation`](crate::models::Violation) lists.
//! Errors are reserved for malformed input, I/O and internal invariant
//! breaches.

use thiserror::Error;

use crate::config::ConfigError;
use crate::validation::ValidationError;

/// Errors raised by the rotation engine.
#[derive(Debug, Error)]
pub enum RotationError {
    /// The problem input failed structural validation.
    #[error("invalid input: {}", summarize(.0))]
    InvalidInput(Vec<ValidationError>),

    #[error("unknown resident '{0}'")]
    UnknownResident(String),

    #[error("unknown posting '{0}'")]
    UnknownPosting(String),

    /// An edit proposal did not carry one entry per block.
    #[error("proposal has {actual} blocks, expected {expected}")]
    ProposalLength { expected: usize, actual: usize },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("JSON error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The engine produced a state that breaks one of its own guarantees.
    #[error("internal invariant breached: {0}")]
    Invariant(String),
}

fn summarize(errors: &[ValidationError]) -> String {
    match errors {
        [] => "no details".to_string(),
        [only] => only.message.clone(),
        [first, rest @ ..] => format!("{} (and {} more)", first.message, rest.len()),
    }
}
