//! The module contains the errors the engine can throw.
//!
//! Every public operation recovers at its own boundary: an error means the
//! operation applied none of its effects.

use sea_orm::DbErr;
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Malformed or out-of-range input (non-positive amount, same-bank
    /// transfer, wrong account kind for the operation, ...).
    #[error("invalid input: {0}")]
    Validation(String),
    /// A state precondition does not hold (e.g. assigning equipment that is
    /// not available).
    #[error("conflict: {0}")]
    Conflict(String),
    /// A state-machine transition was attempted from the wrong state
    /// (pausing an unassigned unit, returning twice, ...).
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("\"{0}\" not found")]
    NotFound(String),
    /// A wage payment exceeds the payee's pending amount.
    #[error("payment of {requested_minor} exceeds pending amount {pending_minor}")]
    OverLimit {
        pending_minor: i64,
        requested_minor: i64,
    },
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Validation(a), Self::Validation(b)) => a == b,
            (Self::Conflict(a), Self::Conflict(b)) => a == b,
            (Self::InvalidState(a), Self::InvalidState(b)) => a == b,
            (Self::NotFound(a), Self::NotFound(b)) => a == b,
            (
                Self::OverLimit {
                    pending_minor: pa,
                    requested_minor: ra,
                },
                Self::OverLimit {
                    pending_minor: pb,
                    requested_minor: rb,
                },
            ) => pa == pb && ra == rb,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
