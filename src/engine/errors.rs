//! Host-engine contract errors

use thiserror::Error;

/// Result type for host-engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors surfaced by the host-engine contract.
///
/// These describe misuse of the storage/catalog surface, not data errors.
/// Callers in the capture and locator layers propagate them unchanged.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error("relation {0} does not exist")]
    UnknownRelation(String),

    #[error("relation {0} already exists")]
    DuplicateRelation(String),

    #[error("index {index} does not exist on relation {relation}")]
    UnknownIndex { relation: String, index: String },

    #[error("tuple {tuple} does not exist in relation {relation}")]
    UnknownTuple { relation: String, tuple: u64 },

    #[error("row has {got} columns, relation {relation} has {expected}")]
    ColumnCountMismatch {
        relation: String,
        expected: usize,
        got: usize,
    },

    #[error("transaction {0} is not in flight")]
    TransactionNotInFlight(u64),

    #[error("cannot parse command: {0}")]
    DdlParse(String),

    #[error("cannot execute command: {0}")]
    DdlExecute(String),
}
