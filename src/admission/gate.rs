//! Write admission gate
//!
//! Runs before every statement on a replication-enabled database and
//! decides, in O(result relations), whether the write is legal for this
//! node and these tables. It is a gate, not a transform: it never
//! rewrites the plan, and rejection has no side effect beyond the
//! error.
//!
//! Decision sequence:
//! 1. Always-allow override set - allow (trusted internal paths).
//! 2. Statement performs no writes - allow.
//! 3. Database not replication-enabled - allow.
//! 4. Another node holds the global DDL lock - fail, retryable.
//! 5. Bare single-table INSERT on a read-write node - allow; an insert
//!    cannot violate replica-identity requirements.
//! 6. Per result relation of an UPDATE/DELETE: non-WAL-logged storage
//!    exempt; catalog namespace exempt; otherwise a read-only node
//!    rejects outright and a read-write node requires a usable
//!    replica-identity index.

use std::sync::Arc;

use crate::engine::{NodeTopology, RelationCatalog};
use crate::observability::Logger;
use crate::session::SessionContext;

use super::errors::{AdmissionError, AdmissionResult};
use super::hooks::ExecutionHook;
use super::plan::{CommandKind, PlannedStatement};

/// The pre-execution admission check.
pub struct AdmissionGate<E> {
    engine: Arc<E>,
}

impl<E: RelationCatalog + NodeTopology> AdmissionGate<E> {
    /// Creates a gate over the given engine.
    pub fn new(engine: Arc<E>) -> Self {
        Self { engine }
    }

    /// Decides whether the statement may proceed.
    pub fn check(&self, session: &SessionContext, plan: &PlannedStatement) -> AdmissionResult<()> {
        if session.always_allow_writes() {
            return Ok(());
        }
        if !plan.performs_writes() {
            return Ok(());
        }
        if !self.engine.replication_enabled(session.database()) {
            return Ok(());
        }

        let read_only_node = self.engine.local_node_read_only();

        if self.engine.global_ddl_lock_held() {
            return Err(AdmissionError::ddl_lock_held());
        }

        // A bare insert cannot miss a replica identity; only read-only
        // nodes need the per-relation walk for it.
        if plan.command == CommandKind::Insert && !plan.has_modifying_cte && !read_only_node {
            return Ok(());
        }

        for relation in &plan.result_relations {
            let meta = self
                .engine
                .relation(*relation)
                .ok_or_else(|| AdmissionError::unknown_relation(relation.value()))?;

            // Non-durable storage never reaches the log, so it is free
            // to diverge per node.
            if !meta.needs_wal() {
                continue;
            }
            // Catalog changes are not replicated directly; direct
            // catalog writes stay the operator's own risk.
            if meta.in_catalog_namespace() {
                continue;
            }

            if read_only_node {
                return Err(AdmissionError::read_only_node(
                    plan.writable_tag(),
                    &meta.qualified_name(),
                ));
            }

            if meta.replica_identity_index().is_some() {
                continue;
            }
            return Err(AdmissionError::missing_replica_identity(
                &meta.qualified_name(),
            ));
        }

        Ok(())
    }
}

impl<E: RelationCatalog + NodeTopology> ExecutionHook for AdmissionGate<E> {
    fn before_execute(
        &self,
        session: &SessionContext,
        plan: &PlannedStatement,
    ) -> AdmissionResult<()> {
        self.check(session, plan).map_err(|error| {
            Logger::warn(
                "ADMISSION_DENIED",
                &[
                    ("actor", session.actor()),
                    ("reason", &error.message),
                    ("statement", plan.writable_tag()),
                ],
            );
            error
        })
    }
}
