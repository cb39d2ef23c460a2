//! Tuple locator errors
//!
//! Transient contention (in-flight writers, concurrent updates) is
//! never an error; the locator retries internally. What surfaces here
//! is misuse or metadata the key builder cannot work with.

use crate::engine::EngineError;
use thiserror::Error;

/// Result type for locator operations
pub type LocatorResult<T> = Result<T, LocatorError>;

/// Locator errors
#[derive(Debug, Clone, Error)]
pub enum LocatorError {
    #[error("could not look up equality operator for column {column} of {relation}")]
    NoEqualityOperator { relation: String, column: String },

    #[error("index {index} is an expression index and cannot take a scan key")]
    ExpressionIndex { index: String },

    #[error("index {index} references column position {position} beyond relation {relation}")]
    BadIndexColumn {
        relation: String,
        index: String,
        position: usize,
    },

    #[error("scan key over index {index} contains NULL and can never match a row")]
    KeyContainsNull { index: String },

    #[error(transparent)]
    Engine(#[from] EngineError),
}
