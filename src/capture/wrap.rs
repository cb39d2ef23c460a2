//! Wrapped DDL execution
//!
//! The operator-facing way to run DDL on a replicated database: queue
//! the literal statement text, then execute it locally. While the local
//! execution runs, the session is in `LocalWrapped` replay mode, so the
//! capture callbacks it fires stay quiet instead of queueing the same
//! change twice.
//!
//! The statement is queued before it runs. Running first would let the
//! creation hooks (truncate-trigger installation) observe a table whose
//! creating command is not yet in the queue.

use crate::engine::{DdlExecutor, DdlIntrospection, RelationCatalog, RowStore, TxnId};
use crate::session::{ReplayMode, SessionContext};

use super::errors::CaptureResult;
use super::queue::QueueWriter;
use super::record::TAG_SQL;

/// Queues `command_text` for replication, then executes it locally.
///
/// Concurrency-unfriendly statements (anything that cannot run inside
/// the queue-then-execute bracket) are the caller's problem; the
/// bracket itself is atomic with the enclosing transaction.
pub fn replicate_ddl_command<E>(
    session: &SessionContext,
    txn: TxnId,
    engine: &E,
    command_text: &str,
) -> CaptureResult<()>
where
    E: RelationCatalog + RowStore + DdlExecutor + DdlIntrospection,
{
    // Force every name in the statement to resolve fully qualified.
    let _search_path = session.force_empty_search_path();
    // Entered for the whole local execution; the guard restores the
    // previous mode on success and on error exits alike.
    let _replay = session.enter_replay(ReplayMode::LocalWrapped);

    let writer = QueueWriter::new(engine);
    writer.queue_ddl_command(session, txn, TAG_SQL, command_text)?;

    engine.execute_ddl(txn, command_text, session.actor())?;

    // Statement-scoped introspection reports die with the statement;
    // the capture callbacks never read them while the wrapped flag is
    // set.
    let _ = engine.creation_commands();
    let _ = engine.dropped_objects();
    Ok(())
}
