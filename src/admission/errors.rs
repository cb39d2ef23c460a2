//! Admission errors
//!
//! Policy rejections reported to the issuing session as statement
//! errors. Only the global-DDL-lock case is retryable as-is; the other
//! rejections require a schema or topology change first.

use std::fmt;

/// Admission error
#[derive(Debug, Clone)]
pub struct AdmissionError {
    /// Error kind
    pub kind: AdmissionErrorKind,
    /// Error message
    pub message: String,
}

/// Admission error kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionErrorKind {
    /// Write attempted on a read-only node
    ReadOnlyNode,

    /// Target table has no replica-identity index
    MissingReplicaIdentity,

    /// Another node holds the cluster-wide DDL lock
    GlobalDdlLockHeld,

    /// Plan references a relation the catalog does not know
    UnknownRelation,
}

impl AdmissionError {
    /// Create a new admission error.
    pub fn new(kind: AdmissionErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Create a read-only-node rejection.
    pub fn read_only_node(statement_tag: &str, relation: &str) -> Self {
        Self::new(
            AdmissionErrorKind::ReadOnlyNode,
            format!(
                "{statement_tag} may only affect UNLOGGED or TEMPORARY tables \
                 on a read-only node; {relation} is a regular table"
            ),
        )
    }

    /// Create a missing-replica-identity rejection.
    pub fn missing_replica_identity(relation: &str) -> Self {
        Self::new(
            AdmissionErrorKind::MissingReplicaIdentity,
            format!(
                "cannot run UPDATE or DELETE on table {relation} because it \
                 does not have a replica identity index; add a PRIMARY KEY to the table"
            ),
        )
    }

    /// Create a global-DDL-lock rejection.
    pub fn ddl_lock_held() -> Self {
        Self::new(
            AdmissionErrorKind::GlobalDdlLockHeld,
            "database is locked against writes while another node runs \
             schema changes; retry the transaction",
        )
    }

    /// Create an unknown-relation error.
    pub fn unknown_relation(relation: u32) -> Self {
        Self::new(
            AdmissionErrorKind::UnknownRelation,
            format!("plan references unknown relation #{relation}"),
        )
    }

    /// Whether the client may simply retry the statement. True only for
    /// the global-lock case; the others need operator action first.
    pub fn is_retryable(&self) -> bool {
        self.kind == AdmissionErrorKind::GlobalDdlLockHeld
    }
}

impl fmt::Display for AdmissionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AdmissionError({:?}): {}", self.kind, self.message)
    }
}

impl std::error::Error for AdmissionError {}

/// Result type for admission decisions
pub type AdmissionResult<T> = Result<T, AdmissionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_lock_errors_are_retryable() {
        assert!(AdmissionError::ddl_lock_held().is_retryable());
        assert!(!AdmissionError::read_only_node("UPDATE", "app.t").is_retryable());
        assert!(!AdmissionError::missing_replica_identity("app.t").is_retryable());
        assert!(!AdmissionError::unknown_relation(9).is_retryable());
    }

    #[test]
    fn test_messages_name_the_relation() {
        let err = AdmissionError::missing_replica_identity("app.orders");
        assert!(err.message.contains("app.orders"));
        assert!(err.message.contains("PRIMARY KEY"));

        let err = AdmissionError::read_only_node("DELETE", "app.orders");
        assert!(err.message.starts_with("DELETE"));
        assert!(err.message.contains("app.orders"));
    }
}
