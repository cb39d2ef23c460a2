//! Change capture queue writer
//!
//! Appends captured commands and drop batches to the replication
//! catalog. Every entry point runs the same guard sequence first, each
//! guard short-circuiting with no-op success:
//!
//! (a) the session is replaying a locally wrapped DDL statement - the
//!     command is already queued, capturing again would duplicate it;
//! (b) the session is replaying a remote change - capturing would
//!     broadcast the change back to where it came from;
//! (c) the operator switched DDL replication off (bulk restore).
//!
//! Schema-change capture never parses SQL. The host engine's
//! introspection facility hands over the exact, already-expanded
//! command text per affected object, in dependency order; one queued
//! row is emitted per object that survives filtering. Drops are the
//! opposite: one batch row for the whole statement, because a statement
//! can drop many unrelated objects atomically and replay must keep that
//! atomicity.

use chrono::Utc;

use crate::catalog;
use crate::engine::{
    DdlIntrospection, EventTriggerContext, EventTriggerKind, LogPosition, RelationCatalog,
    RowStore, TxnId, TEMP_SCHEMA,
};
use crate::observability::Logger;
use crate::session::{ReplayMode, SessionContext};

use super::errors::{CaptureError, CaptureResult};
use super::record::{DroppedObject, QueuedCommand, QueuedDropBatch};

/// Writes captured changes into the replication catalog.
pub struct QueueWriter<'a, E> {
    engine: &'a E,
}

impl<'a, E: RelationCatalog + RowStore> QueueWriter<'a, E> {
    /// Creates a writer over the given engine.
    pub fn new(engine: &'a E) -> Self {
        Self { engine }
    }

    /// Appends one queued command with the current log position and the
    /// session's actor. The row is visible to `txn` before this
    /// returns.
    ///
    /// No guards here: callers that capture conditionally check first.
    /// The wrapped-DDL path calls this directly on purpose.
    pub fn queue_ddl_command(
        &self,
        session: &SessionContext,
        txn: TxnId,
        command_tag: &str,
        command_text: &str,
    ) -> CaptureResult<LogPosition> {
        let position = self.engine.current_log_position();
        Logger::trace(
            "DDL_ENQUEUE",
            &[
                ("actor", session.actor()),
                ("command", command_text),
                ("position", &position.to_string()),
                ("tag", command_tag),
            ],
        );
        let command = QueuedCommand {
            position,
            queued_at: Utc::now(),
            actor: session.actor().to_string(),
            command_tag: command_tag.to_string(),
            command_text: command_text.to_string(),
        };
        catalog::append_command(self.engine, txn, &command)?;
        Ok(position)
    }

    /// Statement-completion callback: queues every command the
    /// introspection facility reports for the just-finished DDL
    /// statement. Returns how many rows were queued.
    ///
    /// Objects in the temporary schema are session-local and skipped.
    /// Extension-owned objects are skipped too: they reach peers via
    /// extension installation, not replication.
    pub fn on_ddl_command_end<I: DdlIntrospection>(
        &self,
        session: &SessionContext,
        txn: TxnId,
        event: &EventTriggerContext,
        introspection: &I,
    ) -> CaptureResult<usize> {
        if event.kind != EventTriggerKind::DdlCommandEnd {
            return Err(CaptureError::ProtocolViolation {
                routine: "queue_ddl_commands",
                expected: "a ddl_command_end event trigger",
            });
        }
        if session.replay_mode() == ReplayMode::LocalWrapped {
            return Ok(0);
        }
        if session.replay_mode() == ReplayMode::RemoteOrigin {
            return Ok(0);
        }
        if session.config().skip_ddl() {
            return Ok(0);
        }

        let mut queued = 0;
        for command in introspection.creation_commands() {
            if command.schema.as_deref() == Some(TEMP_SCHEMA) {
                continue;
            }
            if command.in_extension {
                continue;
            }
            self.queue_ddl_command(session, txn, &command.command_tag, &command.command_text)?;
            queued += 1;
        }
        Ok(queued)
    }

    /// Object-drop callback: queues one drop batch for the statement,
    /// keeping only objects that were directly named ("original") or
    /// reached through a normal dependency - cascade-internal drops
    /// replay implicitly with their owners.
    ///
    /// Returns the batch's position, or None when nothing qualified.
    pub fn on_sql_drop<I: DdlIntrospection>(
        &self,
        session: &SessionContext,
        txn: TxnId,
        event: &EventTriggerContext,
        introspection: &I,
    ) -> CaptureResult<Option<LogPosition>> {
        if event.kind != EventTriggerKind::SqlDrop {
            return Err(CaptureError::ProtocolViolation {
                routine: "queue_dropped_objects",
                expected: "a sql_drop event trigger",
            });
        }
        if session.replay_mode() == ReplayMode::LocalWrapped {
            return Ok(None);
        }
        if session.replay_mode() == ReplayMode::RemoteOrigin {
            return Ok(None);
        }
        if session.config().skip_ddl() {
            return Ok(None);
        }

        let dropped_objects: Vec<DroppedObject> = introspection
            .dropped_objects()
            .into_iter()
            .filter(|report| report.original || report.normal)
            .map(|report| DroppedObject {
                identity: report.address_names.join("."),
                schema: report.schema,
                object_type: report.object_type,
            })
            .collect();
        if dropped_objects.is_empty() {
            return Ok(None);
        }

        let position = self.engine.current_log_position();
        Logger::trace(
            "DROPS_ENQUEUE",
            &[
                ("actor", session.actor()),
                ("objects", &dropped_objects.len().to_string()),
                ("position", &position.to_string()),
            ],
        );
        let batch = QueuedDropBatch {
            position,
            queued_at: Utc::now(),
            dropped_objects,
        };
        catalog::append_drop_batch(self.engine, txn, &batch)?;
        Ok(Some(position))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{CreationCommand, DroppedObjectReport, MemoryEngine};

    fn setup() -> (MemoryEngine, SessionContext) {
        let engine = MemoryEngine::new("node_a", "appdb");
        catalog::bootstrap(&engine).unwrap();
        (engine, SessionContext::new("ada", "appdb"))
    }

    fn creation(schema: &str, in_extension: bool) -> CreationCommand {
        CreationCommand {
            command_tag: "CREATE TABLE".to_string(),
            object_type: "table".to_string(),
            schema: Some(schema.to_string()),
            identity: format!("{schema}.t"),
            in_extension,
            command_text: format!("CREATE TABLE {schema}.t (id BIGINT NOT NULL, PRIMARY KEY (id))"),
        }
    }

    fn ddl_end() -> EventTriggerContext {
        EventTriggerContext {
            kind: EventTriggerKind::DdlCommandEnd,
        }
    }

    fn sql_drop() -> EventTriggerContext {
        EventTriggerContext {
            kind: EventTriggerKind::SqlDrop,
        }
    }

    #[test]
    fn test_queues_one_row_per_reported_command() {
        let (engine, session) = setup();
        engine.inject_creation_report(creation("app", false));
        engine.inject_creation_report(creation("other", false));

        let txn = engine.begin();
        let writer = QueueWriter::new(&engine);
        let queued = writer
            .on_ddl_command_end(&session, txn, &ddl_end(), &engine)
            .unwrap();
        assert_eq!(queued, 2);
        engine.commit(txn);
        assert_eq!(catalog::committed_commands(&engine).unwrap().len(), 2);
    }

    #[test]
    fn test_temp_schema_objects_are_skipped() {
        let (engine, session) = setup();
        engine.inject_creation_report(creation(crate::engine::TEMP_SCHEMA, false));
        engine.inject_creation_report(creation("app", false));

        let txn = engine.begin();
        let writer = QueueWriter::new(&engine);
        let queued = writer
            .on_ddl_command_end(&session, txn, &ddl_end(), &engine)
            .unwrap();
        assert_eq!(queued, 1);
    }

    #[test]
    fn test_extension_owned_objects_are_skipped() {
        let (engine, session) = setup();
        engine.inject_creation_report(creation("app", true));

        let txn = engine.begin();
        let writer = QueueWriter::new(&engine);
        let queued = writer
            .on_ddl_command_end(&session, txn, &ddl_end(), &engine)
            .unwrap();
        assert_eq!(queued, 0);
    }

    #[test]
    fn test_wrapped_replay_suppresses_capture() {
        let (engine, session) = setup();
        engine.inject_creation_report(creation("app", false));

        let txn = engine.begin();
        let writer = QueueWriter::new(&engine);
        let _replay = session.enter_replay(ReplayMode::LocalWrapped);
        let queued = writer
            .on_ddl_command_end(&session, txn, &ddl_end(), &engine)
            .unwrap();
        assert_eq!(queued, 0);
        engine.commit(txn);
        assert!(catalog::committed_commands(&engine).unwrap().is_empty());
    }

    #[test]
    fn test_remote_origin_suppresses_capture() {
        let (engine, session) = setup();
        engine.inject_creation_report(creation("app", false));

        let txn = engine.begin();
        let writer = QueueWriter::new(&engine);
        let _replay = session.enter_replay(ReplayMode::RemoteOrigin);
        assert_eq!(
            writer
                .on_ddl_command_end(&session, txn, &ddl_end(), &engine)
                .unwrap(),
            0
        );
    }

    #[test]
    fn test_skip_switch_suppresses_capture() {
        let (engine, session) = setup();
        engine.inject_creation_report(creation("app", false));
        session.config().set_skip_ddl_replication("on");

        let txn = engine.begin();
        let writer = QueueWriter::new(&engine);
        assert_eq!(
            writer
                .on_ddl_command_end(&session, txn, &ddl_end(), &engine)
                .unwrap(),
            0
        );
    }

    #[test]
    fn test_wrong_event_kind_is_protocol_violation() {
        let (engine, session) = setup();
        let txn = engine.begin();
        let writer = QueueWriter::new(&engine);
        let err = writer
            .on_ddl_command_end(&session, txn, &sql_drop(), &engine)
            .unwrap_err();
        assert!(err.is_fatal());

        let err = writer
            .on_sql_drop(&session, txn, &ddl_end(), &engine)
            .unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_drops_batch_into_single_row() {
        let (engine, session) = setup();
        engine.inject_drop_report(DroppedObjectReport {
            original: true,
            normal: false,
            object_type: "table".to_string(),
            address_names: vec!["app".to_string(), "a".to_string()],
            schema: Some("app".to_string()),
        });
        engine.inject_drop_report(DroppedObjectReport {
            original: false,
            normal: true,
            object_type: "view".to_string(),
            address_names: vec!["app".to_string(), "b".to_string()],
            schema: Some("app".to_string()),
        });
        // Cascade-internal: filtered out.
        engine.inject_drop_report(DroppedObjectReport {
            original: false,
            normal: false,
            object_type: "index".to_string(),
            address_names: vec!["app".to_string(), "a_pkey".to_string()],
            schema: Some("app".to_string()),
        });

        let txn = engine.begin();
        let writer = QueueWriter::new(&engine);
        let position = writer
            .on_sql_drop(&session, txn, &sql_drop(), &engine)
            .unwrap();
        assert!(position.is_some());
        engine.commit(txn);

        let batches = catalog::committed_drop_batches(&engine).unwrap();
        assert_eq!(batches.len(), 1);
        let identities: Vec<&str> = batches[0]
            .dropped_objects
            .iter()
            .map(|o| o.identity.as_str())
            .collect();
        assert_eq!(identities, vec!["app.a", "app.b"]);
    }

    #[test]
    fn test_no_qualifying_drops_is_a_no_op() {
        let (engine, session) = setup();
        engine.inject_drop_report(DroppedObjectReport {
            original: false,
            normal: false,
            object_type: "index".to_string(),
            address_names: vec!["app".to_string(), "a_pkey".to_string()],
            schema: Some("app".to_string()),
        });

        let txn = engine.begin();
        let writer = QueueWriter::new(&engine);
        let position = writer
            .on_sql_drop(&session, txn, &sql_drop(), &engine)
            .unwrap();
        assert!(position.is_none());
        engine.commit(txn);
        assert!(catalog::committed_drop_batches(&engine).unwrap().is_empty());
    }
}
