//! Capture errors
//!
//! Two fatal classes live here. Protocol violations mean a capture
//! entry point ran outside its expected triggering context, which is a
//! host-engine wiring problem, not a data error. Dependency invariant
//! violations signal version skew or a logic bug in the trigger
//! bookkeeping. Everything else is propagated engine or locator state.

use crate::engine::EngineError;
use crate::locator::LocatorError;
use thiserror::Error;

/// Result type for capture operations
pub type CaptureResult<T> = Result<T, CaptureError>;

/// Capture errors
#[derive(Debug, Clone, Error)]
pub enum CaptureError {
    #[error("{routine} was not invoked by {expected}")]
    ProtocolViolation {
        routine: &'static str,
        expected: &'static str,
    },

    #[error(
        "expected exactly one normal dependency from a new trigger to {routine}, found {found}"
    )]
    DependencyInvariant { routine: String, found: usize },

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Locator(#[from] LocatorError),
}

impl CaptureError {
    /// Whether the error signals a logic or wiring bug that must abort
    /// the enclosing operation rather than be handled.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            CaptureError::ProtocolViolation { .. } | CaptureError::DependencyInvariant { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_violation_is_fatal() {
        let err = CaptureError::ProtocolViolation {
            routine: "queue_truncate",
            expected: "a TRUNCATE trigger firing",
        };
        assert!(err.is_fatal());
    }

    #[test]
    fn test_dependency_invariant_is_fatal() {
        let err = CaptureError::DependencyInvariant {
            routine: "repl.queue_truncate".to_string(),
            found: 2,
        };
        assert!(err.is_fatal());
    }

    #[test]
    fn test_engine_errors_are_not_fatal() {
        let err = CaptureError::Engine(EngineError::UnknownRelation("app.t".to_string()));
        assert!(!err.is_fatal());
    }
}
