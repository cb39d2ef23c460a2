//! Host-engine contract
//!
//! The capture core runs embedded in a relational engine it does not
//! own. Everything it needs from that engine is expressed as the narrow
//! traits in this module:
//!
//! - `RelationCatalog` - relation metadata lookup
//! - `RowStore` - row insertion/update with synchronous index maintenance
//! - `TupleScan` - dirty-snapshot index probes, transaction waits, row locks
//! - `NodeTopology` - node role, global DDL lock, membership notification
//! - `DdlIntrospection` - reports for the just-completed statement
//! - `DdlExecutor` - the external DDL execution path
//! - `TriggerCatalog` - trigger creation and dependency bookkeeping
//!
//! `MemoryEngine` implements the whole surface in process so the core is
//! testable without a host engine; it is the reference implementation of
//! the contract, not a toy for tests only.

pub mod ddl;
mod errors;
mod memory;
mod relation;

pub use ddl::{ColumnSpec, DdlCommand, TableSpec};
pub use errors::{EngineError, EngineResult};
pub use memory::MemoryEngine;
pub use relation::{
    quote_identifier, quote_qualified, ColumnMeta, ColumnType, EqOperator, IndexMeta, Persistence,
    RelationId, RelationMeta, CATALOG_SCHEMA, TEMP_SCHEMA,
};

use crate::locator::IndexScanKey;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A position in the engine's write-ahead log.
///
/// Monotonic with WAL progress; assigned to every captured change at
/// insertion time. Replay order downstream must equal this order.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct LogPosition(u64);

impl LogPosition {
    /// Creates a new LogPosition with the given value.
    #[inline]
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the underlying value.
    #[inline]
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for LogPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Hi/lo split, the conventional rendering for log positions.
        write!(f, "{:X}/{:X}", self.0 >> 32, self.0 & 0xFFFF_FFFF)
    }
}

/// Identity of a transaction managed by the host engine.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct TxnId(u64);

impl TxnId {
    /// Creates a new TxnId with the given value.
    #[inline]
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the underlying value.
    #[inline]
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Identity of a stored tuple within a relation.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct TupleId(u64);

impl TupleId {
    /// Creates a new TupleId with the given value.
    #[inline]
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the underlying value.
    #[inline]
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Identity of a trigger registered in the host catalog.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct TriggerId(u64);

impl TriggerId {
    /// Creates a new TriggerId with the given value.
    #[inline]
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the underlying value.
    #[inline]
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Lifecycle state of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnStatus {
    /// Still running; its writes are not yet decided.
    InFlight,
    /// Committed; its writes are durable.
    Committed,
    /// Aborted; its writes never happened.
    Aborted,
}

/// One stored row's column values. `None` is SQL NULL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TupleData {
    /// Values in column declaration order
    pub values: Vec<Option<Value>>,
}

impl TupleData {
    /// Creates a tuple from values in column order.
    pub fn new(values: Vec<Option<Value>>) -> Self {
        Self { values }
    }

    /// Returns the value at a column position; None for NULL or for a
    /// position beyond the tuple's width.
    pub fn get(&self, position: usize) -> Option<&Value> {
        self.values.get(position).and_then(|v| v.as_ref())
    }
}

/// Row lock strength.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowLockMode {
    /// Multiple holders allowed; conflicts with Exclusive.
    Shared,
    /// Single holder; conflicts with everything.
    Exclusive,
}

/// Result of a row lock attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockOutcome {
    /// Lock taken; held until the owning transaction ends.
    Acquired,
    /// The tuple was updated or removed by a committed concurrent
    /// transaction after it was probed. The caller must re-probe.
    ConcurrentlyUpdated,
}

/// A tuple returned by a dirty-snapshot probe.
///
/// The dirty view reports rows written by uncommitted transactions so
/// the caller can detect in-flight contention rather than skip it.
#[derive(Debug, Clone)]
pub struct DirtyTuple {
    /// Stored tuple identity
    pub tuple: TupleId,
    /// Materialized values
    pub data: TupleData,
    /// The in-flight transaction contesting this tuple: its creator if
    /// the insert has not resolved, otherwise an unresolved deleter.
    pub in_flight: Option<TxnId>,
}

/// Trigger-firing event classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerEvent {
    Insert,
    Update,
    Delete,
    Truncate,
}

/// Context handed to a trigger entry point by the trigger manager.
#[derive(Debug, Clone)]
pub struct TriggerContext {
    /// Event that fired the trigger
    pub event: TriggerEvent,
    /// Relation the trigger fired on
    pub relation: RelationId,
}

/// Event-trigger callback classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventTriggerKind {
    /// Fired after a DDL statement completes.
    DdlCommandEnd,
    /// Fired with the set of objects a statement dropped.
    SqlDrop,
}

/// Context handed to an event-trigger entry point.
#[derive(Debug, Clone)]
pub struct EventTriggerContext {
    /// Which callback class invoked us
    pub kind: EventTriggerKind,
}

/// One command reported by the host engine's introspection facility for
/// a just-completed DDL statement. `command_text` is already expanded
/// and fully qualified; the core never renders DDL itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreationCommand {
    /// Statement classifier, e.g. "CREATE TABLE"
    pub command_tag: String,
    /// Object class, e.g. "table"
    pub object_type: String,
    /// Schema of the affected object, when it has one
    pub schema: Option<String>,
    /// Qualified identity of the affected object
    pub identity: String,
    /// Whether the object belongs to an extension's own definition.
    /// Extension-owned objects arrive on peers via extension
    /// installation, never via the capture queue.
    pub in_extension: bool,
    /// Replayable, fully-qualified statement text
    pub command_text: String,
}

/// One object reported dropped by a just-completed statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedObjectReport {
    /// Directly named in the statement
    pub original: bool,
    /// Reached through a normal dependency (not cascade-internal)
    pub normal: bool,
    /// Object class, e.g. "table"
    pub object_type: String,
    /// Name path of the object
    pub address_names: Vec<String>,
    /// Schema of the object, when it has one
    pub schema: Option<String>,
}

/// Dependency edge classes in the host catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyKind {
    /// Dropping the referenced object requires CASCADE.
    Normal,
    /// The dependent object is dropped silently with the referenced one.
    Automatic,
}

/// A trigger as listed by the host catalog.
#[derive(Debug, Clone)]
pub struct TriggerMeta {
    /// Trigger identity
    pub id: TriggerId,
    /// Trigger name, unique within its relation
    pub name: String,
    /// Routine the trigger invokes, schema-qualified
    pub routine: String,
    /// Whether the trigger fires on TRUNCATE
    pub on_truncate: bool,
}

/// Relation metadata lookup.
pub trait RelationCatalog {
    /// Returns metadata for a relation, or None if it does not exist.
    fn relation(&self, id: RelationId) -> Option<RelationMeta>;

    /// Looks a relation up by schema-qualified name.
    fn relation_by_name(&self, schema: &str, name: &str) -> Option<RelationMeta>;
}

/// Row insertion and update with synchronous index maintenance.
///
/// Implementations must update every index of the target relation
/// before returning, so a reader probing an index immediately after an
/// insert sees the new row.
pub trait RowStore {
    /// Current position of the write-ahead log.
    fn current_log_position(&self) -> LogPosition;

    /// Inserts a row on behalf of a transaction. The row is visible to
    /// that transaction's own reads before this call returns.
    fn insert_row(&self, txn: TxnId, rel: RelationId, data: TupleData) -> EngineResult<TupleId>;

    /// Replaces a row, producing a new tuple version. The old version
    /// stays visible to concurrent snapshots until the transaction
    /// resolves.
    fn update_row(
        &self,
        txn: TxnId,
        rel: RelationId,
        tuple: TupleId,
        data: TupleData,
    ) -> EngineResult<TupleId>;
}

/// The tuple-scan/lock contract consumed by the conflict-safe locator.
pub trait TupleScan {
    /// Probes a unique index under a dirty snapshot. Returns at most one
    /// live tuple; a tuple written by an unresolved transaction is
    /// returned with `in_flight` set rather than skipped.
    fn dirty_probe(&self, rel: RelationId, key: &IndexScanKey) -> EngineResult<Option<DirtyTuple>>;

    /// Parks the calling session until the given transaction resolves.
    fn wait_for(&self, txn: TxnId);

    /// Attempts a row lock under the latest committed snapshot.
    fn lock_tuple(
        &self,
        txn: TxnId,
        rel: RelationId,
        tuple: TupleId,
        mode: RowLockMode,
    ) -> EngineResult<LockOutcome>;
}

/// Node role and cluster-lock state, plus the membership notification
/// hook. The membership protocol itself is out of scope; the core only
/// sees this boolean/void surface.
pub trait NodeTopology {
    /// Whether the named database participates in replication.
    fn replication_enabled(&self, database: &str) -> bool;

    /// Whether the local node is configured read-only.
    fn local_node_read_only(&self) -> bool;

    /// Whether another node currently holds the cluster-wide DDL lock.
    fn global_ddl_lock_held(&self) -> bool;

    /// Tells the membership subsystem that node configuration changed.
    fn connections_changed(&self);
}

/// Introspection of the just-completed statement.
///
/// Both methods consume their reports: a second call within the same
/// statement returns nothing, which is what makes capture exactly-once.
pub trait DdlIntrospection {
    /// Commands that would reproduce the statement's created or altered
    /// objects, in dependency order.
    fn creation_commands(&self) -> Vec<CreationCommand>;

    /// Objects the statement dropped.
    fn dropped_objects(&self) -> Vec<DroppedObjectReport>;
}

/// The external DDL execution path. The core queues around it; it never
/// parses or executes DDL itself.
pub trait DdlExecutor {
    /// Executes a DDL statement locally on behalf of an actor.
    fn execute_ddl(&self, txn: TxnId, command_text: &str, actor: &str) -> EngineResult<()>;
}

/// Trigger creation and dependency bookkeeping in the host catalog.
pub trait TriggerCatalog {
    /// Lists the triggers declared on a relation.
    fn triggers(&self, rel: RelationId) -> Vec<TriggerMeta>;

    /// Creates an internal (non-dumped) TRUNCATE trigger invoking the
    /// given routine. The catalog records a Normal dependency from the
    /// trigger to the routine as a side effect.
    fn create_truncate_trigger(
        &self,
        rel: RelationId,
        name: &str,
        routine: &str,
    ) -> EngineResult<TriggerId>;

    /// Deletes dependency edges of one kind from a trigger to a routine,
    /// returning how many were deleted.
    fn delete_trigger_dependencies(
        &self,
        trigger: TriggerId,
        routine: &str,
        kind: DependencyKind,
    ) -> usize;

    /// Records a dependency edge from a trigger to a routine.
    fn record_trigger_dependency(&self, trigger: TriggerId, routine: &str, kind: DependencyKind);

    /// Marks a trigger as a member of the replication extension.
    fn record_extension_member(&self, trigger: TriggerId);
}
