//! Replication catalog
//!
//! The capture layer persists into two append-only relations plus the
//! node registry, all owned by the replication extension's own schema:
//!
//! - `repl.queued_commands(position, queued_at, actor, command_tag, command_text)`
//! - `repl.queued_drops(position, queued_at, dropped_objects)`
//! - `repl.nodes(node_name, read_only)`
//!
//! Insertion goes through the host engine's row store, which maintains
//! each relation's indexes synchronously; a reader probing the position
//! index sees a queued row the moment the append returns. An outbound
//! reader consumes both queue tables in position order; pruning behind
//! peer acknowledgement is out of scope.

use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use crate::capture::{DroppedObject, QueuedCommand, QueuedDropBatch};
use crate::engine::{
    ColumnSpec, ColumnType, EngineError, EngineResult, LogPosition, MemoryEngine, Persistence,
    RelationCatalog, RelationMeta, RowStore, TableSpec, TupleData, TxnId,
};

/// Schema owned by the replication extension.
pub const QUEUE_SCHEMA: &str = "repl";

/// Queued replayable commands.
pub const COMMANDS_TABLE: &str = "queued_commands";

/// Queued drop batches.
pub const DROPS_TABLE: &str = "queued_drops";

/// Node registry, one row per known node.
pub const NODES_TABLE: &str = "nodes";

/// Definition of `repl.queued_commands`.
pub fn commands_table_spec() -> TableSpec {
    TableSpec {
        schema: QUEUE_SCHEMA.to_string(),
        name: COMMANDS_TABLE.to_string(),
        persistence: Persistence::Permanent,
        columns: vec![
            column("position", ColumnType::Int),
            column("queued_at", ColumnType::Timestamp),
            column("actor", ColumnType::Text),
            column("command_tag", ColumnType::Text),
            column("command_text", ColumnType::Text),
        ],
        primary_key: vec![],
    }
}

/// Definition of `repl.queued_drops`.
pub fn drops_table_spec() -> TableSpec {
    TableSpec {
        schema: QUEUE_SCHEMA.to_string(),
        name: DROPS_TABLE.to_string(),
        persistence: Persistence::Permanent,
        columns: vec![
            column("position", ColumnType::Int),
            column("queued_at", ColumnType::Timestamp),
            column("dropped_objects", ColumnType::Document),
        ],
        primary_key: vec![],
    }
}

/// Definition of `repl.nodes`.
pub fn nodes_table_spec() -> TableSpec {
    TableSpec {
        schema: QUEUE_SCHEMA.to_string(),
        name: NODES_TABLE.to_string(),
        persistence: Persistence::Permanent,
        columns: vec![
            column("node_name", ColumnType::Text),
            column("read_only", ColumnType::Bool),
        ],
        primary_key: vec!["node_name".to_string()],
    }
}

fn column(name: &str, column_type: ColumnType) -> ColumnSpec {
    ColumnSpec {
        name: name.to_string(),
        column_type,
        nullable: false,
    }
}

/// Creates the replication catalog on a fresh engine and registers the
/// local node as read-write. Runs once, at extension installation.
pub fn bootstrap(engine: &MemoryEngine) -> EngineResult<()> {
    let commands = engine.create_table(&commands_table_spec())?;
    engine.create_index(commands, "queued_commands_position_idx", &["position"], false)?;
    let drops = engine.create_table(&drops_table_spec())?;
    engine.create_index(drops, "queued_drops_position_idx", &["position"], false)?;
    let nodes = engine.create_table(&nodes_table_spec())?;

    let txn = engine.begin();
    engine.insert_row(
        txn,
        nodes,
        TupleData::new(vec![
            Some(json!(engine.local_node())),
            Some(json!(false)),
        ]),
    )?;
    engine.commit(txn);
    Ok(())
}

fn queue_relation<E: RelationCatalog>(engine: &E, name: &str) -> EngineResult<RelationMeta> {
    engine
        .relation_by_name(QUEUE_SCHEMA, name)
        .ok_or_else(|| EngineError::UnknownRelation(format!("{QUEUE_SCHEMA}.{name}")))
}

/// Appends one queued command. The row, and its index entries, are
/// visible to `txn` before this returns.
pub fn append_command<E: RelationCatalog + RowStore>(
    engine: &E,
    txn: TxnId,
    command: &QueuedCommand,
) -> EngineResult<()> {
    let rel = queue_relation(engine, COMMANDS_TABLE)?;
    engine.insert_row(txn, rel.id, command_tuple(command))?;
    Ok(())
}

/// Appends one drop batch.
pub fn append_drop_batch<E: RelationCatalog + RowStore>(
    engine: &E,
    txn: TxnId,
    batch: &QueuedDropBatch,
) -> EngineResult<()> {
    let rel = queue_relation(engine, DROPS_TABLE)?;
    engine.insert_row(txn, rel.id, drop_batch_tuple(batch))?;
    Ok(())
}

fn command_tuple(command: &QueuedCommand) -> TupleData {
    TupleData::new(vec![
        Some(json!(command.position.value())),
        Some(json!(command.queued_at.to_rfc3339())),
        Some(json!(command.actor)),
        Some(json!(command.command_tag)),
        Some(json!(command.command_text)),
    ])
}

fn drop_batch_tuple(batch: &QueuedDropBatch) -> TupleData {
    let objects = serde_json::to_value(&batch.dropped_objects).unwrap_or(Value::Null);
    TupleData::new(vec![
        Some(json!(batch.position.value())),
        Some(json!(batch.queued_at.to_rfc3339())),
        Some(objects),
    ])
}

fn parse_timestamp(value: Option<&Value>) -> Option<DateTime<Utc>> {
    let text = value?.as_str()?;
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

/// Decodes a `repl.queued_commands` row. None for a malformed row.
pub fn decode_command(row: &TupleData) -> Option<QueuedCommand> {
    Some(QueuedCommand {
        position: LogPosition::new(row.get(0)?.as_u64()?),
        queued_at: parse_timestamp(row.get(1))?,
        actor: row.get(2)?.as_str()?.to_string(),
        command_tag: row.get(3)?.as_str()?.to_string(),
        command_text: row.get(4)?.as_str()?.to_string(),
    })
}

/// Decodes a `repl.queued_drops` row. None for a malformed row.
pub fn decode_drop_batch(row: &TupleData) -> Option<QueuedDropBatch> {
    let objects: Vec<DroppedObject> = serde_json::from_value(row.get(2)?.clone()).ok()?;
    Some(QueuedDropBatch {
        position: LogPosition::new(row.get(0)?.as_u64()?),
        queued_at: parse_timestamp(row.get(1))?,
        dropped_objects: objects,
    })
}

/// Commands visible to a transaction, in position order.
pub fn commands_visible_to(engine: &MemoryEngine, txn: TxnId) -> EngineResult<Vec<QueuedCommand>> {
    let rel = queue_relation(engine, COMMANDS_TABLE)?;
    let mut commands: Vec<QueuedCommand> = engine
        .rows_visible_to(txn, rel.id)?
        .iter()
        .filter_map(decode_command)
        .collect();
    commands.sort_by_key(|c| c.position);
    Ok(commands)
}

/// Committed commands, in position order.
pub fn committed_commands(engine: &MemoryEngine) -> EngineResult<Vec<QueuedCommand>> {
    let rel = queue_relation(engine, COMMANDS_TABLE)?;
    let mut commands: Vec<QueuedCommand> = engine
        .committed_rows(rel.id)?
        .iter()
        .filter_map(decode_command)
        .collect();
    commands.sort_by_key(|c| c.position);
    Ok(commands)
}

/// Committed drop batches, in position order.
pub fn committed_drop_batches(engine: &MemoryEngine) -> EngineResult<Vec<QueuedDropBatch>> {
    let rel = queue_relation(engine, DROPS_TABLE)?;
    let mut batches: Vec<QueuedDropBatch> = engine
        .committed_rows(rel.id)?
        .iter()
        .filter_map(decode_drop_batch)
        .collect();
    batches.sort_by_key(|b| b.position);
    Ok(batches)
}
