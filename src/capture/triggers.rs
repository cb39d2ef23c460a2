//! Truncate-capture trigger management
//!
//! Truncation is only visible to capture through a per-relation
//! trigger, so every replicated (permanent) table needs one attached.
//! The triggers are internal: never dumped, never replicated. That is
//! why the creation hook installs them even while replaying a remote
//! command or restoring a dump - nothing is queued for the trigger
//! itself, so there is no recursion.

use crate::engine::{
    DependencyKind, Persistence, RelationCatalog, RelationId, TriggerCatalog,
};
use crate::observability::Logger;

use super::errors::{CaptureError, CaptureResult};

/// Routine the truncate trigger invokes.
pub const TRUNCATE_CAPTURE_ROUTINE: &str = "repl.queue_truncate";

/// Name of the installed trigger.
pub const TRUNCATE_TRIGGER_NAME: &str = "truncate_capture";

/// Installs the truncate-capture trigger on a table, idempotently.
///
/// Trigger creation records a normal dependency on the capture routine,
/// which would make dropping the replication extension fail as long as
/// any table carries the trigger. What we want instead is for the
/// trigger to go away silently with either the extension or its table,
/// so the single auto-created edge is rewired into an automatic one and
/// the trigger is recorded as an extension member. Finding any other
/// number of edges than one means catalog version skew; that aborts.
pub fn install_truncate_trigger<E: RelationCatalog + TriggerCatalog>(
    engine: &E,
    relation: RelationId,
) -> CaptureResult<()> {
    for trigger in engine.triggers(relation) {
        if trigger.on_truncate && trigger.routine == TRUNCATE_CAPTURE_ROUTINE {
            return Ok(());
        }
    }

    let trigger = engine.create_truncate_trigger(
        relation,
        TRUNCATE_TRIGGER_NAME,
        TRUNCATE_CAPTURE_ROUTINE,
    )?;

    let found = engine.delete_trigger_dependencies(
        trigger,
        TRUNCATE_CAPTURE_ROUTINE,
        DependencyKind::Normal,
    );
    if found != 1 {
        return Err(CaptureError::DependencyInvariant {
            routine: TRUNCATE_CAPTURE_ROUTINE.to_string(),
            found,
        });
    }
    engine.record_trigger_dependency(trigger, TRUNCATE_CAPTURE_ROUTINE, DependencyKind::Automatic);
    engine.record_extension_member(trigger);

    Logger::trace(
        "TRUNCATE_TRIGGER_INSTALLED",
        &[("relation", &relation.value().to_string())],
    );
    Ok(())
}

/// Creation hook: attaches the truncate-capture trigger to every newly
/// created permanent table. Temporary and unlogged tables are never
/// replicated and are skipped.
pub fn on_table_created<E: RelationCatalog + TriggerCatalog>(
    engine: &E,
    relation: RelationId,
) -> CaptureResult<()> {
    let meta = engine.relation(relation).ok_or_else(|| {
        crate::engine::EngineError::UnknownRelation(format!("#{}", relation.value()))
    })?;
    if meta.persistence != Persistence::Permanent {
        return Ok(());
    }
    install_truncate_trigger(engine, relation)
}
