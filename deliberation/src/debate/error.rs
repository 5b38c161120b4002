//! Error taxonomy for deliberation operations.
//!
//! Validation failures are raised before any model call. Generation and
//! persistence failures are kept apart so a caller can tell "the model call
//! failed" (retrying spends another call) from "the save failed" (only the
//! save needs retrying).

use thiserror::Error;

use super::persistence::PersistenceError;
use crate::gateway::GenerationError;

/// Result type alias for deliberation operations
pub type DeliberationResult<T> = Result<T, DeliberationError>;

/// Input rejected before any external call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("grievance text is empty")]
    EmptyGrievance,

    #[error("round {requested} out of sequence: expected {expected}")]
    RoundOutOfSequence { expected: u32, requested: u32 },

    #[error("implementation days {days} outside [{min}, {max}]")]
    ImplementationDaysOutOfRange { days: u32, min: u32, max: u32 },

    #[error("unknown budget level: {0}")]
    UnknownBudgetLevel(String),

    #[error("unknown urgency level: {0}")]
    UnknownUrgencyLevel(String),
}

/// Any failure surfaced by the engine or its host service.
#[derive(Debug, Error)]
pub enum DeliberationError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("generation failed: {0}")]
    Generation(#[from] GenerationError),

    #[error("persistence failed: {0}")]
    Persistence(#[from] PersistenceError),
}

impl DeliberationError {
    /// Whether the failure happened before the model was called.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Whether waiting and retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Validation(_) => false,
            Self::Generation(e) => e.is_retryable(),
            Self::Persistence(e) => e.is_retryable(),
        }
    }
}
