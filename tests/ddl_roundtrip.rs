//! DDL Round-Trip Tests
//!
//! The schema-qualification invariant, end to end: a command captured
//! on one node and replayed verbatim against a clean peer produces a
//! structurally identical object, whatever either session's search
//! path says.

use duplexdb::capture::{replicate_ddl_command, QueueWriter, TAG_SQL};
use duplexdb::catalog;
use duplexdb::engine::{
    DdlExecutor, EventTriggerContext, EventTriggerKind, MemoryEngine, RelationCatalog,
    RelationMeta,
};
use duplexdb::session::{ReplayMode, SessionContext};

// =============================================================================
// Helper Functions
// =============================================================================

const CREATE_ORDERS: &str = "CREATE TABLE app.orders \
    (id BIGINT NOT NULL, note TEXT, placed_at TIMESTAMPTZ NOT NULL, PRIMARY KEY (id))";

fn node(name: &str) -> MemoryEngine {
    let engine = MemoryEngine::new(name, "appdb");
    catalog::bootstrap(&engine).unwrap();
    engine
}

/// Structure of a relation minus node-local identity.
fn shape(meta: &RelationMeta) -> (String, Vec<(String, bool)>, Vec<String>, Option<usize>) {
    (
        meta.qualified_name(),
        meta.columns
            .iter()
            .map(|c| (c.name.clone(), c.nullable))
            .collect(),
        meta.indexes.iter().map(|i| i.name.clone()).collect(),
        meta.replica_identity,
    )
}

// =============================================================================
// Round Trip
// =============================================================================

/// Capture on node A, replay the exact command_text on node B, compare
/// structures.
#[test]
fn test_captured_text_replays_identically() {
    let origin = node("node_a");
    let session = SessionContext::new("ada", "appdb");
    session.set_search_path(vec!["app".to_string()]);

    let txn = origin.begin();
    replicate_ddl_command(&session, txn, &origin, CREATE_ORDERS).unwrap();
    origin.commit(txn);

    let commands = catalog::committed_commands(&origin).unwrap();
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0].command_tag, TAG_SQL);

    // Replay on a clean peer, as the applier would: remote origin set,
    // empty bootstrap schema.
    let peer = node("node_b");
    let peer_session = SessionContext::new("repl_apply", "appdb");
    let _replay = peer_session.enter_replay(ReplayMode::RemoteOrigin);
    let peer_txn = peer.begin();
    peer.execute_ddl(peer_txn, &commands[0].command_text, peer_session.actor())
        .unwrap();
    peer.commit(peer_txn);

    let original = origin.relation_by_name("app", "orders").unwrap();
    let replayed = peer.relation_by_name("app", "orders").unwrap();
    assert_eq!(shape(&original), shape(&replayed));
}

/// Replay on the peer must not be captured again: the peer's queue
/// stays empty.
#[test]
fn test_replay_does_not_recapture() {
    let origin = node("node_a");
    let session = SessionContext::new("ada", "appdb");
    let txn = origin.begin();
    replicate_ddl_command(&session, txn, &origin, CREATE_ORDERS).unwrap();
    origin.commit(txn);
    let commands = catalog::committed_commands(&origin).unwrap();

    let peer = node("node_b");
    let peer_session = SessionContext::new("repl_apply", "appdb");
    let peer_txn = peer.begin();
    {
        let _replay = peer_session.enter_replay(ReplayMode::RemoteOrigin);
        peer.execute_ddl(peer_txn, &commands[0].command_text, peer_session.actor())
            .unwrap();
        // Host fires the completion callback during replay too; the
        // origin flag keeps it quiet.
        let writer = QueueWriter::new(&peer);
        let queued = writer
            .on_ddl_command_end(
                &peer_session,
                peer_txn,
                &EventTriggerContext {
                    kind: EventTriggerKind::DdlCommandEnd,
                },
                &peer,
            )
            .unwrap();
        assert_eq!(queued, 0);
    }
    peer.commit(peer_txn);

    assert!(catalog::committed_commands(&peer).unwrap().is_empty());
}

/// The unwrapped local path: the host executes DDL, the completion
/// callback captures the introspected canonical text, and that text
/// replays cleanly too.
#[test]
fn test_introspected_capture_round_trips() {
    let origin = node("node_a");
    let session = SessionContext::new("ada", "appdb");

    let txn = origin.begin();
    origin.execute_ddl(txn, CREATE_ORDERS, session.actor()).unwrap();
    let writer = QueueWriter::new(&origin);
    let queued = writer
        .on_ddl_command_end(
            &session,
            txn,
            &EventTriggerContext {
                kind: EventTriggerKind::DdlCommandEnd,
            },
            &origin,
        )
        .unwrap();
    assert_eq!(queued, 1);
    origin.commit(txn);

    let commands = catalog::committed_commands(&origin).unwrap();
    let peer = node("node_b");
    let peer_txn = peer.begin();
    peer.execute_ddl(peer_txn, &commands[0].command_text, "repl_apply")
        .unwrap();
    peer.commit(peer_txn);

    let original = origin.relation_by_name("app", "orders").unwrap();
    let replayed = peer.relation_by_name("app", "orders").unwrap();
    assert_eq!(shape(&original), shape(&replayed));
}
