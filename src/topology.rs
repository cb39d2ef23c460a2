//! Node topology administration
//!
//! One administrative operation lives in the capture core: flipping a
//! node's read-only flag in the node registry. It runs through the
//! conflict-safe locator so concurrent flips on the same row settle
//! cleanly, and it carries the always-allow override so it works on a
//! node that is already read-only - which is the whole point of being
//! able to turn the flag off again.

use serde_json::json;
use thiserror::Error;

use crate::catalog::{NODES_TABLE, QUEUE_SCHEMA};
use crate::engine::{
    EngineError, NodeTopology, RelationCatalog, RowStore, TupleData, TupleScan, TxnId,
};
use crate::locator::{build_index_scan_key, LocatorError, TupleLocator};
use crate::observability::Logger;
use crate::session::SessionContext;

/// Result type for topology operations
pub type TopologyResult<T> = Result<T, TopologyError>;

/// Topology administration errors
#[derive(Debug, Clone, Error)]
pub enum TopologyError {
    #[error("node {0} not found")]
    UnknownNode(String),

    #[error(transparent)]
    Locator(#[from] LocatorError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Sets the read-only flag of a named node and notifies the membership
/// subsystem. The change is visible cluster-wide once the transaction
/// commits.
pub fn set_node_read_only<E>(
    session: &SessionContext,
    engine: &E,
    txn: TxnId,
    node_name: &str,
    read_only: bool,
) -> TopologyResult<()>
where
    E: RelationCatalog + RowStore + TupleScan + NodeTopology,
{
    // The registry row is a regular replicated table; without the
    // override, a node already switched read-only could never be
    // switched back.
    let _allow = session.scoped_always_allow();

    let nodes = engine
        .relation_by_name(QUEUE_SCHEMA, NODES_TABLE)
        .ok_or_else(|| EngineError::UnknownRelation(format!("{QUEUE_SCHEMA}.{NODES_TABLE}")))?;
    let identity = nodes
        .replica_identity_index()
        .ok_or_else(|| EngineError::UnknownIndex {
            relation: nodes.qualified_name(),
            index: "replica identity".to_string(),
        })?;

    let candidate = TupleData::new(vec![Some(json!(node_name)), None]);
    let key = build_index_scan_key(&nodes, identity, &candidate)?;

    let locator = TupleLocator::new(engine);
    let found = locator
        .locate(txn, nodes.id, &key, None)?
        .ok_or_else(|| TopologyError::UnknownNode(node_name.to_string()))?;

    let mut values = found.data.values.clone();
    values[1] = Some(json!(read_only));
    engine.update_row(txn, nodes.id, found.tuple, TupleData::new(values))?;

    engine.connections_changed();
    Logger::info(
        "NODE_READ_ONLY_CHANGED",
        &[
            ("node", node_name),
            ("read_only", if read_only { "true" } else { "false" }),
        ],
    );
    Ok(())
}
