//! Error types for the allocation core

use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum Error {
    /// The actor's role forbids the requested operation. Never retried.
    #[error("{role} is not permitted to {action}")]
    Unauthorized { role: String, action: String },

    /// A state-machine precondition was not met.
    #[error("Illegal transition: {0}")]
    IllegalTransition(String),

    /// The constraint checker rejected the candidate assignment.
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// A referenced entity does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Optimistic-lock version mismatch. The caller may retry from a
    /// fresh read; the core never retries on its own.
    #[error("Concurrent modification of {entity} {id}")]
    ConcurrencyConflict { entity: &'static str, id: Uuid },
}

impl Error {
    pub fn unauthorized(role: impl Into<String>, action: impl Into<String>) -> Self {
        Error::Unauthorized {
            role: role.into(),
            action: action.into(),
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Error::NotFound(what.into())
    }

    /// Whether retrying the whole operation from a fresh read can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::ConcurrencyConflict { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
