//! Capture Queue Tests
//!
//! Queue writer behavior end to end against the reference engine:
//! - recursion suppression produces no rows, for every capture path
//! - DDL capture is one row per surviving object, position-ordered
//! - drop capture is one batch per statement
//! - rollback discards queued rows

use duplexdb::capture::{QueueWriter, TAG_SQL};
use duplexdb::catalog;
use duplexdb::engine::{
    CreationCommand, DroppedObjectReport, EventTriggerContext, EventTriggerKind, MemoryEngine,
};
use duplexdb::session::{ReplayMode, SessionContext};

// =============================================================================
// Helper Functions
// =============================================================================

fn engine() -> MemoryEngine {
    let engine = MemoryEngine::new("node_a", "appdb");
    catalog::bootstrap(&engine).unwrap();
    engine
}

fn creation(identity: &str) -> CreationCommand {
    CreationCommand {
        command_tag: "CREATE TABLE".to_string(),
        object_type: "table".to_string(),
        schema: Some("app".to_string()),
        identity: identity.to_string(),
        in_extension: false,
        command_text: format!("CREATE TABLE {identity} (id BIGINT NOT NULL, PRIMARY KEY (id))"),
    }
}

fn dropped(name: &str, original: bool, normal: bool) -> DroppedObjectReport {
    DroppedObjectReport {
        original,
        normal,
        object_type: "table".to_string(),
        address_names: vec!["app".to_string(), name.to_string()],
        schema: Some("app".to_string()),
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

// =============================================================================
// Recursion Suppression (no rows while replaying)
// =============================================================================

/// With either suppression flag set, no capture call produces a queued
/// row: the calls are idempotent no-ops.
#[test]
fn test_suppressed_sessions_queue_nothing() {
    for mode in [ReplayMode::LocalWrapped, ReplayMode::RemoteOrigin] {
        let engine = engine();
        let session = SessionContext::new("ada", "appdb");
        engine.inject_creation_report(creation("app.t"));
        engine.inject_drop_report(dropped("t", true, false));

        let txn = engine.begin();
        let writer = QueueWriter::new(&engine);
        {
            let _replay = session.enter_replay(mode);
            assert_eq!(
                writer
                    .on_ddl_command_end(&session, txn, &ddl_end(), &engine)
                    .unwrap(),
                0
            );
            assert!(writer
                .on_sql_drop(&session, txn, &sql_drop(), &engine)
                .unwrap()
                .is_none());
        }
        engine.commit(txn);

        assert!(catalog::committed_commands(&engine).unwrap().is_empty());
        assert!(catalog::committed_drop_batches(&engine).unwrap().is_empty());
    }
}

/// Suppression is scoped: once the replay guard drops, the same session
/// captures normally again.
#[test]
fn test_capture_resumes_after_replay_ends() {
    let engine = engine();
    let session = SessionContext::new("ada", "appdb");

    {
        let _replay = session.enter_replay(ReplayMode::RemoteOrigin);
        engine.inject_creation_report(creation("app.remote"));
        let txn = engine.begin();
        let writer = QueueWriter::new(&engine);
        assert_eq!(
            writer
                .on_ddl_command_end(&session, txn, &ddl_end(), &engine)
                .unwrap(),
            0
        );
        engine.commit(txn);
    }

    // Reports from the replayed statement are gone; a fresh local
    // statement captures.
    engine.inject_creation_report(creation("app.local"));
    let txn = engine.begin();
    let writer = QueueWriter::new(&engine);
    assert_eq!(
        writer
            .on_ddl_command_end(&session, txn, &ddl_end(), &engine)
            .unwrap(),
        1
    );
    engine.commit(txn);
    assert_eq!(catalog::committed_commands(&engine).unwrap().len(), 1);
}

// =============================================================================
// DDL Capture
// =============================================================================

/// One row per reported object, queued in report (dependency) order,
/// with positions monotonic in that order.
#[test]
fn test_ddl_rows_follow_report_order() {
    let engine = engine();
    let session = SessionContext::new("ada", "appdb");
    engine.inject_creation_report(creation("app.parent"));
    engine.inject_creation_report(creation("app.child"));

    let txn = engine.begin();
    let writer = QueueWriter::new(&engine);
    writer
        .on_ddl_command_end(&session, txn, &ddl_end(), &engine)
        .unwrap();
    engine.commit(txn);

    let commands = catalog::committed_commands(&engine).unwrap();
    assert_eq!(commands.len(), 2);
    assert!(commands[0].command_text.contains("app.parent"));
    assert!(commands[1].command_text.contains("app.child"));
    assert!(commands[0].position < commands[1].position);
}

/// The queued row records the capturing session's actor.
#[test]
fn test_actor_is_recorded() {
    let engine = engine();
    let session = SessionContext::new("grace", "appdb");
    let txn = engine.begin();
    let writer = QueueWriter::new(&engine);
    writer
        .queue_ddl_command(&session, txn, TAG_SQL, "DROP TABLE app.t")
        .unwrap();
    engine.commit(txn);

    let commands = catalog::committed_commands(&engine).unwrap();
    assert_eq!(commands[0].actor, "grace");
}

// =============================================================================
// Drop Capture
// =============================================================================

/// Many dropped objects, one batch: atomic replay of an atomic drop.
#[test]
fn test_statement_drops_into_one_batch() {
    let engine = engine();
    let session = SessionContext::new("ada", "appdb");
    engine.inject_drop_report(dropped("a", true, false));
    engine.inject_drop_report(dropped("b", true, false));
    engine.inject_drop_report(dropped("a_pkey", false, false)); // internal

    let txn = engine.begin();
    let writer = QueueWriter::new(&engine);
    writer
        .on_sql_drop(&session, txn, &sql_drop(), &engine)
        .unwrap();
    engine.commit(txn);

    let batches = catalog::committed_drop_batches(&engine).unwrap();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].dropped_objects.len(), 2);
}

// =============================================================================
// Transactionality
// =============================================================================

/// An aborted transaction leaves no trace in either queue.
#[test]
fn test_rollback_discards_captured_rows() {
    let engine = engine();
    let session = SessionContext::new("ada", "appdb");
    engine.inject_creation_report(creation("app.t"));
    engine.inject_drop_report(dropped("u", true, false));

    let txn = engine.begin();
    let writer = QueueWriter::new(&engine);
    writer
        .on_ddl_command_end(&session, txn, &ddl_end(), &engine)
        .unwrap();
    writer
        .on_sql_drop(&session, txn, &sql_drop(), &engine)
        .unwrap();

    // Visible to the writing transaction before commit.
    assert_eq!(catalog::commands_visible_to(&engine, txn).unwrap().len(), 1);

    engine.abort(txn);
    assert!(catalog::committed_commands(&engine).unwrap().is_empty());
    assert!(catalog::committed_drop_batches(&engine).unwrap().is_empty());
}
