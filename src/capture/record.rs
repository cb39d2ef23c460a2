//! Captured change records
//!
//! The two persisted record shapes of the capture layer. Both are
//! append-only: created once, never mutated, consumed downstream in
//! log-position order and eventually reclaimed by the (out-of-scope)
//! retention process.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::LogPosition;

/// Tag for commands captured through the wrapped-DDL path.
pub const TAG_SQL: &str = "SQL";

/// Tag synthesized for coalesced truncate batches.
pub const TAG_TRUNCATE: &str = "TRUNCATE (automatic)";

/// One replayable command.
///
/// `command_text` is always schema-qualified: the search path is forced
/// empty before capture, so replay is unambiguous regardless of the
/// remote session's state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedCommand {
    /// Ordering key, monotonic with the write-ahead log
    pub position: LogPosition,
    /// When the command was queued
    pub queued_at: DateTime<Utc>,
    /// Identity of the session that produced the command
    pub actor: String,
    /// Short operation classifier, e.g. "SQL" or "TRUNCATE (automatic)"
    pub command_tag: String,
    /// Fully-qualified, replayable statement text
    pub command_text: String,
}

/// One object of a drop batch: (schema, identity, type).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DroppedObject {
    /// Schema of the dropped object, when it had one
    pub schema: Option<String>,
    /// Dotted identity path of the object
    pub identity: String,
    /// Object class, e.g. "table"
    pub object_type: String,
}

/// All objects dropped by one statement.
///
/// Drops are batched, unlike DDL capture which emits one row per
/// object: a single statement can drop many unrelated objects
/// atomically, and replay must preserve that atomicity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedDropBatch {
    /// Ordering key, monotonic with the write-ahead log
    pub position: LogPosition,
    /// When the batch was queued
    pub queued_at: DateTime<Utc>,
    /// Dropped objects, in the order the host engine reported them
    pub dropped_objects: Vec<DroppedObject>,
}
