//! Error taxonomy for puzzle loading and search.
//!
//! Input problems are reported before any search work starts. Internal
//! errors mean an invariant of the engine itself was broken; they abort the
//! whole run instead of producing a possibly wrong answer.

use thiserror::Error;

/// A malformed puzzle definition.
#[derive(Error, Debug)]
pub enum InputError {
    #[error("stack capacity must be at least 1")]
    ZeroCapacity,
    #[error("{units} units cannot be split into stacks of capacity {capacity}")]
    NotMultipleOfCapacity { units: usize, capacity: usize },
    #[error("puzzle has no stacks")]
    NoStacks,
    #[error("expected {expected} stacks, found {found}")]
    StackCountMismatch { expected: usize, found: usize },
    #[error("invalid color identifier {0:?}")]
    InvalidColor(char),
    #[error("stack {stack} is {width} slots wide, expected {capacity}")]
    RowWidth {
        stack: usize,
        width: usize,
        capacity: usize,
    },
    #[error("stack {stack} has a gap below slot {slot}")]
    Gap { stack: usize, slot: usize },
    #[error("failed to read puzzle: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse puzzle JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Fatal outcome of a solver run.
#[derive(Error, Debug)]
pub enum SolverError {
    #[error("invalid puzzle input: {0}")]
    Input(#[from] InputError),
    #[error("internal invariant violated: {0}")]
    Internal(String),
}

impl SolverError {
    pub(crate) fn internal(message: impl Into<String>) -> Self {
        SolverError::Internal(message.into())
    }
}

pub type Result<T, E = SolverError> = std::result::Result<T, E>;
