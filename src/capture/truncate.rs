//! Truncate coalescing
//!
//! One TRUNCATE statement can touch many tables, and the trigger
//! manager fires the capture trigger once per table. Queueing each
//! firing would replay as several statements and lose atomicity, so
//! per-relation notifications accumulate in the transaction context and
//! flush into exactly one queued command at statement-group
//! completion.
//!
//! State machine: Idle (empty) -> Accumulating (>= 1 relation) ->
//! finish -> one queued command, back to Idle. Finishing while Idle is
//! a no-op. The recursion guards run before a relation is ever added,
//! so replayed or wrapped-local truncations never reach the
//! accumulator.

use crate::engine::{
    EngineError, LogPosition, RelationCatalog, RelationId, RowStore, TriggerContext, TriggerEvent,
};
use crate::observability::Logger;
use crate::session::{ReplayMode, SessionContext};
use crate::txn::TransactionContext;

use super::errors::{CaptureError, CaptureResult};
use super::queue::QueueWriter;
use super::record::TAG_TRUNCATE;

/// Accumulator states.
#[derive(Debug, Clone, PartialEq, Eq)]
enum CoalescerState {
    /// Nothing accumulated.
    Idle,
    /// At least one relation recorded, awaiting finish.
    Accumulating { relations: Vec<RelationId> },
}

/// Per-transaction truncate accumulator.
///
/// Owned by the transaction context, so a rollback discards it together
/// with everything else the transaction did.
#[derive(Debug)]
pub struct TruncateCoalescer {
    state: CoalescerState,
}

impl TruncateCoalescer {
    /// Creates an idle accumulator.
    pub fn new() -> Self {
        Self {
            state: CoalescerState::Idle,
        }
    }

    /// Whether nothing is accumulated.
    pub fn is_idle(&self) -> bool {
        self.state == CoalescerState::Idle
    }

    /// Records one truncated relation.
    pub fn note_truncated(&mut self, relation: RelationId) {
        match &mut self.state {
            CoalescerState::Idle => {
                self.state = CoalescerState::Accumulating {
                    relations: vec![relation],
                };
            }
            CoalescerState::Accumulating { relations } => relations.push(relation),
        }
    }

    /// Drains the accumulated relations, returning to Idle.
    pub fn take(&mut self) -> Vec<RelationId> {
        match std::mem::replace(&mut self.state, CoalescerState::Idle) {
            CoalescerState::Idle => Vec::new(),
            CoalescerState::Accumulating { relations } => relations,
        }
    }
}

impl Default for TruncateCoalescer {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-relation TRUNCATE trigger entry point.
///
/// Only records the relation; the actual queueing happens in
/// [`finish_truncate`]. Invoking this outside a TRUNCATE firing is a
/// protocol violation.
pub fn on_truncate(
    session: &SessionContext,
    txn: &mut TransactionContext,
    trigger: &TriggerContext,
) -> CaptureResult<()> {
    if trigger.event != TriggerEvent::Truncate {
        return Err(CaptureError::ProtocolViolation {
            routine: "queue_truncate",
            expected: "a TRUNCATE trigger firing",
        });
    }
    // A wrapped statement's truncations are queued with the wrapping
    // command; a remote replay's truncations must not echo back.
    if session.replay_mode() == ReplayMode::LocalWrapped {
        return Ok(());
    }
    if session.replay_mode() == ReplayMode::RemoteOrigin {
        return Ok(());
    }
    txn.coalescer_mut().note_truncated(trigger.relation);
    Ok(())
}

/// Flushes the accumulator into one queued command listing every
/// truncated relation, fully qualified and comma-joined. A no-op when
/// nothing accumulated.
pub fn finish_truncate<E: RelationCatalog + RowStore>(
    session: &SessionContext,
    txn: &mut TransactionContext,
    engine: &E,
) -> CaptureResult<Option<LogPosition>> {
    let relations = txn.coalescer_mut().take();
    if relations.is_empty() {
        return Ok(None);
    }

    let mut command_text = String::from("TRUNCATE TABLE ONLY ");
    let mut sep = "";
    for relation in &relations {
        let meta = engine
            .relation(*relation)
            .ok_or_else(|| EngineError::UnknownRelation(format!("#{}", relation.value())))?;
        command_text.push_str(sep);
        command_text.push_str(&meta.qualified_name());
        sep = ", ";
    }

    Logger::trace(
        "TRUNCATE_CAPTURE",
        &[
            ("relations", &relations.len().to_string()),
            ("command", &command_text),
        ],
    );
    let writer = QueueWriter::new(engine);
    let position = writer.queue_ddl_command(session, txn.txn(), TAG_TRUNCATE, &command_text)?;
    Ok(Some(position))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog;
    use crate::engine::{ColumnSpec, ColumnType, MemoryEngine, Persistence, TableSpec};

    fn table(engine: &MemoryEngine, name: &str) -> RelationId {
        engine
            .create_table(&TableSpec {
                schema: "app".to_string(),
                name: name.to_string(),
                persistence: Persistence::Permanent,
                columns: vec![ColumnSpec {
                    name: "id".to_string(),
                    column_type: ColumnType::Int,
                    nullable: false,
                }],
                primary_key: vec!["id".to_string()],
            })
            .unwrap()
    }

    fn truncate_firing(relation: RelationId) -> TriggerContext {
        TriggerContext {
            event: TriggerEvent::Truncate,
            relation,
        }
    }

    fn setup() -> (MemoryEngine, SessionContext) {
        let engine = MemoryEngine::new("node_a", "appdb");
        catalog::bootstrap(&engine).unwrap();
        (engine, SessionContext::new("ada", "appdb"))
    }

    #[test]
    fn test_coalescer_state_machine() {
        let mut coalescer = TruncateCoalescer::new();
        assert!(coalescer.is_idle());

        coalescer.note_truncated(RelationId::new(1));
        coalescer.note_truncated(RelationId::new(2));
        assert!(!coalescer.is_idle());

        assert_eq!(
            coalescer.take(),
            vec![RelationId::new(1), RelationId::new(2)]
        );
        assert!(coalescer.is_idle());
        assert!(coalescer.take().is_empty());
    }

    #[test]
    fn test_many_relations_one_command() {
        let (engine, session) = setup();
        let a = table(&engine, "a");
        let b = table(&engine, "b");
        let c = table(&engine, "c");

        let mut txn = TransactionContext::new(engine.begin());
        for rel in [a, b, c] {
            on_truncate(&session, &mut txn, &truncate_firing(rel)).unwrap();
        }
        let position = finish_truncate(&session, &mut txn, &engine).unwrap();
        assert!(position.is_some());
        engine.commit(txn.txn());

        let commands = catalog::committed_commands(&engine).unwrap();
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].command_tag, TAG_TRUNCATE);
        assert_eq!(
            commands[0].command_text,
            "TRUNCATE TABLE ONLY app.a, app.b, app.c"
        );
    }

    #[test]
    fn test_finish_on_empty_accumulator_is_no_op() {
        let (engine, session) = setup();
        let mut txn = TransactionContext::new(engine.begin());
        let position = finish_truncate(&session, &mut txn, &engine).unwrap();
        assert!(position.is_none());
        engine.commit(txn.txn());
        assert!(catalog::committed_commands(&engine).unwrap().is_empty());
    }

    #[test]
    fn test_finish_never_flushes_twice() {
        let (engine, session) = setup();
        let a = table(&engine, "a");

        let mut txn = TransactionContext::new(engine.begin());
        on_truncate(&session, &mut txn, &truncate_firing(a)).unwrap();
        assert!(finish_truncate(&session, &mut txn, &engine)
            .unwrap()
            .is_some());
        assert!(finish_truncate(&session, &mut txn, &engine)
            .unwrap()
            .is_none());
        engine.commit(txn.txn());
        assert_eq!(catalog::committed_commands(&engine).unwrap().len(), 1);
    }

    #[test]
    fn test_replay_modes_keep_accumulator_empty() {
        let (engine, session) = setup();
        let a = table(&engine, "a");
        let mut txn = TransactionContext::new(engine.begin());

        {
            let _replay = session.enter_replay(ReplayMode::LocalWrapped);
            on_truncate(&session, &mut txn, &truncate_firing(a)).unwrap();
        }
        {
            let _replay = session.enter_replay(ReplayMode::RemoteOrigin);
            on_truncate(&session, &mut txn, &truncate_firing(a)).unwrap();
        }
        assert!(txn.coalescer().is_idle());
    }

    #[test]
    fn test_non_truncate_firing_is_protocol_violation() {
        let (engine, session) = setup();
        let a = table(&engine, "a");
        let mut txn = TransactionContext::new(engine.begin());

        let err = on_truncate(
            &session,
            &mut txn,
            &TriggerContext {
                event: TriggerEvent::Delete,
                relation: a,
            },
        )
        .unwrap_err();
        assert!(err.is_fatal());
    }
}
