//! Change capture
//!
//! Converts schema-changing and row-deleting operations into durable,
//! ordered, replayable records:
//!
//! - `QueueWriter` - appends queued commands and drop batches
//! - `TruncateCoalescer` / `on_truncate` / `finish_truncate` - merges
//!   per-relation truncate firings into one queued command
//! - `replicate_ddl_command` - queue-then-execute wrapper for DDL
//! - truncate-trigger installation and its creation hook
//!
//! Every entry point honors the recursion-suppression contract: no
//! capture proceeds while the session replays a wrapped local statement
//! or a remote change.

mod errors;
mod queue;
mod record;
mod triggers;
mod truncate;
mod wrap;

pub use errors::{CaptureError, CaptureResult};
pub use queue::QueueWriter;
pub use record::{DroppedObject, QueuedCommand, QueuedDropBatch, TAG_SQL, TAG_TRUNCATE};
pub use triggers::{
    install_truncate_trigger, on_table_created, TRUNCATE_CAPTURE_ROUTINE, TRUNCATE_TRIGGER_NAME,
};
pub use truncate::{finish_truncate, on_truncate, TruncateCoalescer};
pub use wrap::replicate_ddl_command;
