//! Transformation error types.

use thiserror::Error;

use crate::db::DbError;

#[derive(Debug, Error)]
pub enum TransformationError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DbError),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Type conversion error: {0}")]
    TypeConversion(String),

    /// Persisted state contradicts what the event stream guarantees.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),
}

impl TransformationError {
    /// Errors confined to the event being processed. The engine drops that
    /// event's writes and carries on; anything else stops the engine.
    pub fn is_event_local(&self) -> bool {
        !matches!(self, Self::DatabaseError(_))
    }
}
