//! In-memory reference engine
//!
//! Implements the whole host-engine contract in process: relations with
//! synchronous index maintenance, transactions with real in-flight /
//! committed / aborted states, dirty-snapshot index probes, row locks
//! with first-committer-wins conflict detection, and statement
//! introspection buffers.
//!
//! Sessions are threads. All state sits behind one mutex; waiting for a
//! transaction or a row lock parks the calling thread on a condvar
//! until another session resolves the conflict, which is exactly the
//! blocking model the capture core is specified against. Deadlock
//! detection is not implemented here; the real host engine provides it.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use serde_json::Value;

use crate::locator::IndexScanKey;

use super::ddl::{DdlCommand, TableSpec};
use super::errors::{EngineError, EngineResult};
use super::relation::{ColumnMeta, IndexMeta, Persistence, RelationId, RelationMeta};
use super::{
    quote_qualified, CreationCommand, DdlExecutor, DdlIntrospection, DependencyKind, DirtyTuple,
    DroppedObjectReport, LockOutcome, LogPosition, NodeTopology, RelationCatalog, RowLockMode,
    RowStore, TriggerCatalog, TriggerId, TriggerMeta, TupleData, TupleId, TupleScan, TxnId,
    TxnStatus,
};

/// Separator for encoded index keys. Column encodings are JSON, which
/// never contains a raw 0x01 byte.
const KEY_SEPARATOR: char = '\u{1}';

struct RowVersion {
    data: TupleData,
    xmin: TxnId,
    xmax: Option<TxnId>,
}

struct RelationData {
    meta: RelationMeta,
    rows: BTreeMap<u64, RowVersion>,
    /// One map per `meta.indexes` entry: encoded key -> tuple ids.
    index_maps: Vec<HashMap<String, Vec<TupleId>>>,
}

struct TriggerRecord {
    relation: RelationId,
    name: String,
    routine: String,
    on_truncate: bool,
}

struct DependencyRecord {
    from: TriggerId,
    routine: String,
    kind: DependencyKind,
}

struct EngineState {
    local_node: String,
    replicated_databases: HashSet<String>,
    peer_holds_ddl_lock: bool,
    connections_changed: u64,
    next_relation: u32,
    next_txn: u64,
    next_tuple: u64,
    next_trigger: u64,
    wal_position: u64,
    relations: BTreeMap<RelationId, RelationData>,
    names: HashMap<(String, String), RelationId>,
    txns: HashMap<TxnId, TxnStatus>,
    row_locks: HashMap<(RelationId, TupleId), Vec<(TxnId, RowLockMode)>>,
    triggers: BTreeMap<TriggerId, TriggerRecord>,
    dependencies: Vec<DependencyRecord>,
    extension_members: HashSet<TriggerId>,
    pending_creations: Vec<CreationCommand>,
    pending_drops: Vec<DroppedObjectReport>,
}

struct Inner {
    state: Mutex<EngineState>,
    txn_resolved: Condvar,
    lock_released: Condvar,
}

/// The reference engine. Cloning yields another handle to the same
/// engine; each session thread holds its own clone.
#[derive(Clone)]
pub struct MemoryEngine {
    inner: Arc<Inner>,
}

impl MemoryEngine {
    /// Creates an engine for a node. The named database starts out
    /// replication-enabled.
    pub fn new(local_node: &str, database: &str) -> Self {
        let mut replicated = HashSet::new();
        replicated.insert(database.to_string());
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(EngineState {
                    local_node: local_node.to_string(),
                    replicated_databases: replicated,
                    peer_holds_ddl_lock: false,
                    connections_changed: 0,
                    next_relation: 1,
                    next_txn: 1,
                    next_tuple: 1,
                    next_trigger: 1,
                    wal_position: 1,
                    relations: BTreeMap::new(),
                    names: HashMap::new(),
                    txns: HashMap::new(),
                    row_locks: HashMap::new(),
                    triggers: BTreeMap::new(),
                    dependencies: Vec::new(),
                    extension_members: HashSet::new(),
                    pending_creations: Vec::new(),
                    pending_drops: Vec::new(),
                }),
                txn_resolved: Condvar::new(),
                lock_released: Condvar::new(),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, EngineState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Name of the local node.
    pub fn local_node(&self) -> String {
        self.state().local_node.clone()
    }

    /// Marks a database as replication-enabled or not.
    pub fn set_replication_enabled(&self, database: &str, enabled: bool) {
        let mut st = self.state();
        if enabled {
            st.replicated_databases.insert(database.to_string());
        } else {
            st.replicated_databases.remove(database);
        }
    }

    /// Simulates another node holding the cluster-wide DDL lock.
    pub fn set_peer_ddl_lock(&self, held: bool) {
        self.state().peer_holds_ddl_lock = held;
    }

    /// How many times the membership subsystem has been notified.
    pub fn connections_changed_count(&self) -> u64 {
        self.state().connections_changed
    }

    /// Starts a transaction.
    pub fn begin(&self) -> TxnId {
        let mut st = self.state();
        let txn = TxnId::new(st.next_txn);
        st.next_txn += 1;
        st.txns.insert(txn, TxnStatus::InFlight);
        txn
    }

    /// Commits a transaction, releasing its row locks and waking
    /// sessions parked on it.
    pub fn commit(&self, txn: TxnId) {
        self.resolve(txn, TxnStatus::Committed);
    }

    /// Aborts a transaction. Its writes never happened; queue rows and
    /// accumulator state it produced are discarded with it.
    pub fn abort(&self, txn: TxnId) {
        self.resolve(txn, TxnStatus::Aborted);
    }

    fn resolve(&self, txn: TxnId, status: TxnStatus) {
        let mut st = self.state();
        st.txns.insert(txn, status);
        for holders in st.row_locks.values_mut() {
            holders.retain(|(holder, _)| *holder != txn);
        }
        st.row_locks.retain(|_, holders| !holders.is_empty());
        self.inner.txn_resolved.notify_all();
        self.inner.lock_released.notify_all();
    }

    /// Current status of a transaction.
    pub fn txn_status(&self, txn: TxnId) -> Option<TxnStatus> {
        self.state().txns.get(&txn).copied()
    }

    /// Creates a table without reporting it to statement introspection.
    /// DDL executed through `execute_ddl` reports; direct creation is
    /// for bootstrap and test setup.
    pub fn create_table(&self, spec: &TableSpec) -> EngineResult<RelationId> {
        let mut st = self.state();
        create_table_locked(&mut st, spec)
    }

    /// Adds an index to an existing relation, backfilling it from the
    /// stored rows.
    pub fn create_index(
        &self,
        rel: RelationId,
        name: &str,
        columns: &[&str],
        unique: bool,
    ) -> EngineResult<()> {
        let mut st = self.state();
        let relation = relation_mut(&mut st, rel)?;
        let mut positions = Vec::with_capacity(columns.len());
        for column in columns {
            let position = relation
                .meta
                .columns
                .iter()
                .position(|c| c.name == *column)
                .ok_or_else(|| {
                    EngineError::DdlExecute(format!("indexed column {column:?} does not exist"))
                })?;
            positions.push(position);
        }
        let index = IndexMeta {
            name: name.to_string(),
            columns: positions,
            unique,
            expression: false,
        };
        let mut map: HashMap<String, Vec<TupleId>> = HashMap::new();
        for (id, row) in &relation.rows {
            if let Some(encoded) = encode_key(&index_values(&index, &row.data)) {
                map.entry(encoded).or_default().push(TupleId::new(*id));
            }
        }
        relation.meta.indexes.push(index);
        relation.index_maps.push(map);
        Ok(())
    }

    /// Marks every live row of a relation deleted by `txn`, as a
    /// TRUNCATE does. Firing the relation's truncate triggers is the
    /// trigger manager's job, not the storage layer's.
    pub fn truncate_relation(&self, txn: TxnId, rel: RelationId) -> EngineResult<()> {
        let mut st = self.state();
        require_in_flight(&st, txn)?;
        st.wal_position += 1;
        let data = relation_mut(&mut st, rel)?;
        let live: Vec<u64> = data
            .rows
            .iter()
            .filter(|(_, row)| row.xmax.is_none())
            .map(|(id, _)| *id)
            .collect();
        for id in live {
            if let Some(row) = data.rows.get_mut(&id) {
                row.xmax = Some(txn);
            }
        }
        Ok(())
    }

    /// Rows visible under the latest committed snapshot.
    pub fn committed_rows(&self, rel: RelationId) -> EngineResult<Vec<TupleData>> {
        let st = self.state();
        let data = relation_ref(&st, rel)?;
        let mut rows: Vec<TupleData> = Vec::new();
        for row in data.rows.values() {
            if row_committed_visible(&st, row) {
                rows.push(row.data.clone());
            }
        }
        Ok(rows)
    }

    /// Rows visible to a transaction: the committed snapshot plus its
    /// own uncommitted writes, minus its own deletions.
    pub fn rows_visible_to(&self, txn: TxnId, rel: RelationId) -> EngineResult<Vec<TupleData>> {
        let st = self.state();
        let data = relation_ref(&st, rel)?;
        let mut rows: Vec<TupleData> = Vec::new();
        for row in data.rows.values() {
            let created = row.xmin == txn || txn_status_of(&st, row.xmin) == TxnStatus::Committed;
            if !created {
                continue;
            }
            let deleted = match row.xmax {
                Some(xmax) => xmax == txn || txn_status_of(&st, xmax) == TxnStatus::Committed,
                None => false,
            };
            if !deleted {
                rows.push(row.data.clone());
            }
        }
        Ok(rows)
    }

    /// Emulates a host-engine introspection report beyond what the
    /// canonical DDL facility produces (extension-owned objects,
    /// temporary-schema objects, foreign object classes).
    pub fn inject_creation_report(&self, command: CreationCommand) {
        self.state().pending_creations.push(command);
    }

    /// Emulates a host-engine drop report.
    pub fn inject_drop_report(&self, report: DroppedObjectReport) {
        self.state().pending_drops.push(report);
    }

    /// Fabricates a dependency edge, for exercising the bookkeeping
    /// invariant paths.
    pub fn inject_trigger_dependency(&self, trigger: TriggerId, routine: &str, kind: DependencyKind) {
        self.state().dependencies.push(DependencyRecord {
            from: trigger,
            routine: routine.to_string(),
            kind,
        });
    }

    /// Dependency edges recorded from a trigger, as (routine, kind).
    pub fn trigger_dependencies(&self, trigger: TriggerId) -> Vec<(String, DependencyKind)> {
        self.state()
            .dependencies
            .iter()
            .filter(|d| d.from == trigger)
            .map(|d| (d.routine.clone(), d.kind))
            .collect()
    }

    /// Whether a trigger is recorded as an extension member.
    pub fn is_extension_member(&self, trigger: TriggerId) -> bool {
        self.state().extension_members.contains(&trigger)
    }
}

fn require_in_flight(st: &EngineState, txn: TxnId) -> EngineResult<()> {
    match st.txns.get(&txn) {
        Some(TxnStatus::InFlight) => Ok(()),
        _ => Err(EngineError::TransactionNotInFlight(txn.value())),
    }
}

fn txn_status_of(st: &EngineState, txn: TxnId) -> TxnStatus {
    st.txns.get(&txn).copied().unwrap_or(TxnStatus::Committed)
}

fn row_committed_visible(st: &EngineState, row: &RowVersion) -> bool {
    if txn_status_of(st, row.xmin) != TxnStatus::Committed {
        return false;
    }
    match row.xmax {
        Some(xmax) => txn_status_of(st, xmax) != TxnStatus::Committed,
        None => true,
    }
}

fn relation_ref<'a>(st: &'a EngineState, rel: RelationId) -> EngineResult<&'a RelationData> {
    st.relations
        .get(&rel)
        .ok_or_else(|| EngineError::UnknownRelation(format!("#{}", rel.value())))
}

fn relation_mut<'a>(st: &'a mut EngineState, rel: RelationId) -> EngineResult<&'a mut RelationData> {
    st.relations
        .get_mut(&rel)
        .ok_or_else(|| EngineError::UnknownRelation(format!("#{}", rel.value())))
}

/// Encodes index-column values as one lookup key. Any NULL makes the
/// key unindexable.
fn encode_key(values: &[Option<&Value>]) -> Option<String> {
    let mut out = String::new();
    for value in values {
        let value = (*value)?;
        out.push_str(&value.to_string());
        out.push(KEY_SEPARATOR);
    }
    Some(out)
}

fn index_values<'a>(meta: &IndexMeta, data: &'a TupleData) -> Vec<Option<&'a Value>> {
    meta.columns.iter().map(|&pos| data.get(pos)).collect()
}

fn create_table_locked(st: &mut EngineState, spec: &TableSpec) -> EngineResult<RelationId> {
    let key = (spec.schema.clone(), spec.name.clone());
    if st.names.contains_key(&key) {
        return Err(EngineError::DuplicateRelation(quote_qualified(
            &spec.schema,
            &spec.name,
        )));
    }

    let columns: Vec<ColumnMeta> = spec
        .columns
        .iter()
        .map(|c| ColumnMeta {
            name: c.name.clone(),
            column_type: c.column_type,
            nullable: c.nullable,
        })
        .collect();

    let mut indexes = Vec::new();
    let mut replica_identity = None;
    if !spec.primary_key.is_empty() {
        let mut positions = Vec::with_capacity(spec.primary_key.len());
        for name in &spec.primary_key {
            let position = columns
                .iter()
                .position(|c| &c.name == name)
                .ok_or_else(|| {
                    EngineError::DdlExecute(format!("primary key column {name:?} does not exist"))
                })?;
            positions.push(position);
        }
        indexes.push(IndexMeta {
            name: format!("{}_pkey", spec.name),
            columns: positions,
            unique: true,
            expression: false,
        });
        replica_identity = Some(0);
    }

    let id = RelationId::new(st.next_relation);
    st.next_relation += 1;
    let meta = RelationMeta {
        id,
        schema: spec.schema.clone(),
        name: spec.name.clone(),
        persistence: spec.persistence,
        columns,
        indexes,
        replica_identity,
    };
    let index_maps = meta.indexes.iter().map(|_| HashMap::new()).collect();
    st.relations.insert(
        id,
        RelationData {
            meta,
            rows: BTreeMap::new(),
            index_maps,
        },
    );
    st.names.insert(key, id);
    Ok(id)
}

impl RelationCatalog for MemoryEngine {
    fn relation(&self, id: RelationId) -> Option<RelationMeta> {
        self.state().relations.get(&id).map(|d| d.meta.clone())
    }

    fn relation_by_name(&self, schema: &str, name: &str) -> Option<RelationMeta> {
        let st = self.state();
        let id = st.names.get(&(schema.to_string(), name.to_string()))?;
        st.relations.get(id).map(|d| d.meta.clone())
    }
}

impl RowStore for MemoryEngine {
    fn current_log_position(&self) -> LogPosition {
        LogPosition::new(self.state().wal_position)
    }

    fn insert_row(&self, txn: TxnId, rel: RelationId, data: TupleData) -> EngineResult<TupleId> {
        let mut st = self.state();
        require_in_flight(&st, txn)?;
        let tuple = TupleId::new(st.next_tuple);
        st.next_tuple += 1;
        st.wal_position += 1;

        let relation = relation_mut(&mut st, rel)?;
        if data.values.len() != relation.meta.columns.len() {
            return Err(EngineError::ColumnCountMismatch {
                relation: relation.meta.qualified_name(),
                expected: relation.meta.columns.len(),
                got: data.values.len(),
            });
        }

        // Index maintenance is synchronous: a reader probing any index
        // of this relation right after we return sees the new row.
        for (position, index) in relation.meta.indexes.clone().iter().enumerate() {
            if let Some(encoded) = encode_key(&index_values(index, &data)) {
                relation.index_maps[position]
                    .entry(encoded)
                    .or_default()
                    .push(tuple);
            }
        }

        relation.rows.insert(
            tuple.value(),
            RowVersion {
                data,
                xmin: txn,
                xmax: None,
            },
        );
        Ok(tuple)
    }

    fn update_row(
        &self,
        txn: TxnId,
        rel: RelationId,
        tuple: TupleId,
        data: TupleData,
    ) -> EngineResult<TupleId> {
        let mut st = self.state();
        require_in_flight(&st, txn)?;
        let new_tuple = TupleId::new(st.next_tuple);
        st.next_tuple += 1;
        st.wal_position += 1;

        let relation = relation_mut(&mut st, rel)?;
        if data.values.len() != relation.meta.columns.len() {
            return Err(EngineError::ColumnCountMismatch {
                relation: relation.meta.qualified_name(),
                expected: relation.meta.columns.len(),
                got: data.values.len(),
            });
        }
        let qualified = relation.meta.qualified_name();
        let old = relation
            .rows
            .get_mut(&tuple.value())
            .ok_or(EngineError::UnknownTuple {
                relation: qualified,
                tuple: tuple.value(),
            })?;
        old.xmax = Some(txn);

        for (position, index) in relation.meta.indexes.clone().iter().enumerate() {
            if let Some(encoded) = encode_key(&index_values(index, &data)) {
                relation.index_maps[position]
                    .entry(encoded)
                    .or_default()
                    .push(new_tuple);
            }
        }
        relation.rows.insert(
            new_tuple.value(),
            RowVersion {
                data,
                xmin: txn,
                xmax: None,
            },
        );
        Ok(new_tuple)
    }
}

impl TupleScan for MemoryEngine {
    fn dirty_probe(&self, rel: RelationId, key: &IndexScanKey) -> EngineResult<Option<DirtyTuple>> {
        let st = self.state();
        let relation = relation_ref(&st, rel)?;
        let position = relation
            .meta
            .indexes
            .iter()
            .position(|i| i.name == key.index_name())
            .ok_or_else(|| EngineError::UnknownIndex {
                relation: relation.meta.qualified_name(),
                index: key.index_name().to_string(),
            })?;

        let encoded = match encode_key(&key.indexed_values()) {
            Some(encoded) => encoded,
            None => return Ok(None), // NULL key matches nothing
        };
        let candidates = match relation.index_maps[position].get(&encoded) {
            Some(ids) => ids.clone(),
            None => return Ok(None),
        };

        for tuple in candidates {
            let row = match relation.rows.get(&tuple.value()) {
                Some(row) => row,
                None => continue,
            };
            let xmin_status = txn_status_of(&st, row.xmin);
            if xmin_status == TxnStatus::Aborted {
                continue;
            }
            if let Some(xmax) = row.xmax {
                if txn_status_of(&st, xmax) == TxnStatus::Committed {
                    continue;
                }
            }
            // Index entries outlive superseded versions; re-check.
            if !key.matches(&row.data) {
                continue;
            }
            let in_flight = if xmin_status == TxnStatus::InFlight {
                Some(row.xmin)
            } else {
                row.xmax
                    .filter(|xmax| txn_status_of(&st, *xmax) == TxnStatus::InFlight)
            };
            return Ok(Some(DirtyTuple {
                tuple,
                data: row.data.clone(),
                in_flight,
            }));
        }
        Ok(None)
    }

    fn wait_for(&self, txn: TxnId) {
        let mut st = self.state();
        while txn_status_of(&st, txn) == TxnStatus::InFlight {
            st = self
                .inner
                .txn_resolved
                .wait(st)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn lock_tuple(
        &self,
        txn: TxnId,
        rel: RelationId,
        tuple: TupleId,
        mode: RowLockMode,
    ) -> EngineResult<LockOutcome> {
        let mut st = self.state();
        loop {
            {
                let relation = relation_ref(&st, rel)?;
                let qualified = relation.meta.qualified_name();
                let row = relation
                    .rows
                    .get(&tuple.value())
                    .ok_or(EngineError::UnknownTuple {
                        relation: qualified,
                        tuple: tuple.value(),
                    })?;
                if txn_status_of(&st, row.xmin) == TxnStatus::Aborted {
                    return Ok(LockOutcome::ConcurrentlyUpdated);
                }
                if let Some(xmax) = row.xmax {
                    match txn_status_of(&st, xmax) {
                        TxnStatus::Committed => return Ok(LockOutcome::ConcurrentlyUpdated),
                        TxnStatus::InFlight => {
                            st = self
                                .inner
                                .txn_resolved
                                .wait(st)
                                .unwrap_or_else(PoisonError::into_inner);
                            continue;
                        }
                        TxnStatus::Aborted => {}
                    }
                }
            }

            let conflicting = st
                .row_locks
                .get(&(rel, tuple))
                .map(|holders| {
                    holders.iter().any(|(holder, held_mode)| {
                        *holder != txn
                            && txn_status_of(&st, *holder) == TxnStatus::InFlight
                            && (mode == RowLockMode::Exclusive
                                || *held_mode == RowLockMode::Exclusive)
                    })
                })
                .unwrap_or(false);
            if conflicting {
                st = self
                    .inner
                    .lock_released
                    .wait(st)
                    .unwrap_or_else(PoisonError::into_inner);
                continue;
            }

            st.row_locks.entry((rel, tuple)).or_default().push((txn, mode));
            return Ok(LockOutcome::Acquired);
        }
    }
}

impl NodeTopology for MemoryEngine {
    fn replication_enabled(&self, database: &str) -> bool {
        self.state().replicated_databases.contains(database)
    }

    fn local_node_read_only(&self) -> bool {
        let st = self.state();
        let id = match st
            .names
            .get(&(crate::catalog::QUEUE_SCHEMA.to_string(), crate::catalog::NODES_TABLE.to_string()))
        {
            Some(id) => *id,
            None => return false,
        };
        let relation = match st.relations.get(&id) {
            Some(relation) => relation,
            None => return false,
        };
        for row in relation.rows.values() {
            if !row_committed_visible(&st, row) {
                continue;
            }
            if row.data.get(0).and_then(|v| v.as_str()) == Some(st.local_node.as_str()) {
                return row.data.get(1).and_then(|v| v.as_bool()).unwrap_or(false);
            }
        }
        false
    }

    fn global_ddl_lock_held(&self) -> bool {
        self.state().peer_holds_ddl_lock
    }

    fn connections_changed(&self) {
        self.state().connections_changed += 1;
    }
}

impl DdlIntrospection for MemoryEngine {
    fn creation_commands(&self) -> Vec<CreationCommand> {
        std::mem::take(&mut self.state().pending_creations)
    }

    fn dropped_objects(&self) -> Vec<DroppedObjectReport> {
        std::mem::take(&mut self.state().pending_drops)
    }
}

impl DdlExecutor for MemoryEngine {
    fn execute_ddl(&self, txn: TxnId, command_text: &str, _actor: &str) -> EngineResult<()> {
        let command = DdlCommand::parse(command_text)?;
        let mut st = self.state();
        require_in_flight(&st, txn)?;
        match command {
            DdlCommand::CreateTable(spec) => {
                create_table_locked(&mut st, &spec)?;
                st.wal_position += 1;
                st.pending_creations.push(CreationCommand {
                    command_tag: "CREATE TABLE".to_string(),
                    object_type: "table".to_string(),
                    schema: Some(spec.schema.clone()),
                    identity: quote_qualified(&spec.schema, &spec.name),
                    in_extension: false,
                    command_text: spec.render(),
                });
            }
            DdlCommand::DropTable { schema, name } => {
                let key = (schema.clone(), name.clone());
                let id = st.names.remove(&key).ok_or_else(|| {
                    EngineError::UnknownRelation(quote_qualified(&schema, &name))
                })?;
                let dropped = st.relations.remove(&id);
                st.wal_position += 1;
                st.pending_drops.push(DroppedObjectReport {
                    original: true,
                    normal: false,
                    object_type: "table".to_string(),
                    address_names: vec![schema.clone(), name.clone()],
                    schema: Some(schema.clone()),
                });
                // Indexes go down with the table through internal
                // dependencies; reported, but neither original nor
                // normal.
                if let Some(dropped) = dropped {
                    for index in &dropped.meta.indexes {
                        st.pending_drops.push(DroppedObjectReport {
                            original: false,
                            normal: false,
                            object_type: "index".to_string(),
                            address_names: vec![schema.clone(), index.name.clone()],
                            schema: Some(schema.clone()),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

impl TriggerCatalog for MemoryEngine {
    fn triggers(&self, rel: RelationId) -> Vec<TriggerMeta> {
        self.state()
            .triggers
            .iter()
            .filter(|(_, t)| t.relation == rel)
            .map(|(id, t)| TriggerMeta {
                id: *id,
                name: t.name.clone(),
                routine: t.routine.clone(),
                on_truncate: t.on_truncate,
            })
            .collect()
    }

    fn create_truncate_trigger(
        &self,
        rel: RelationId,
        name: &str,
        routine: &str,
    ) -> EngineResult<TriggerId> {
        let mut st = self.state();
        relation_ref(&st, rel)?;
        let id = TriggerId::new(st.next_trigger);
        st.next_trigger += 1;
        st.triggers.insert(
            id,
            TriggerRecord {
                relation: rel,
                name: name.to_string(),
                routine: routine.to_string(),
                on_truncate: true,
            },
        );
        // Trigger creation records a normal dependency on its routine,
        // the same way the host catalog does.
        st.dependencies.push(DependencyRecord {
            from: id,
            routine: routine.to_string(),
            kind: DependencyKind::Normal,
        });
        Ok(id)
    }

    fn delete_trigger_dependencies(
        &self,
        trigger: TriggerId,
        routine: &str,
        kind: DependencyKind,
    ) -> usize {
        let mut st = self.state();
        let before = st.dependencies.len();
        st.dependencies
            .retain(|d| !(d.from == trigger && d.routine == routine && d.kind == kind));
        before - st.dependencies.len()
    }

    fn record_trigger_dependency(&self, trigger: TriggerId, routine: &str, kind: DependencyKind) {
        self.state().dependencies.push(DependencyRecord {
            from: trigger,
            routine: routine.to_string(),
            kind,
        });
    }

    fn record_extension_member(&self, trigger: TriggerId) {
        self.state().extension_members.insert(trigger);
    }
}
