//! Unique-index scan key construction
//!
//! A scan key pairs each column of a unique index with the equality
//! operator of that column's comparison family and the candidate row's
//! value for it. Keys are built fresh per lookup and discarded after
//! use.
//!
//! NULL semantics: a key with any NULL column can never match a row.
//! The builder still returns such keys, flagged, so the caller can
//! special-case them; it must not treat them as matchable.

use crate::engine::{EqOperator, IndexMeta, RelationMeta, TupleData};
use serde_json::Value;

use super::errors::{LocatorError, LocatorResult};

/// One equality condition of a scan key.
#[derive(Debug, Clone)]
pub struct KeyCondition {
    /// Position of the compared column within the relation (not the
    /// index).
    pub table_column: usize,
    /// Equality operator from the column's comparison family
    pub op: EqOperator,
    /// Candidate value; None is SQL NULL
    pub value: Option<Value>,
}

impl KeyCondition {
    /// Whether this condition's candidate value is NULL.
    pub fn is_null(&self) -> bool {
        self.value.is_none()
    }
}

/// A per-call scan key over one unique index.
#[derive(Debug, Clone)]
pub struct IndexScanKey {
    index_name: String,
    conditions: Vec<KeyCondition>,
    has_nulls: bool,
}

impl IndexScanKey {
    /// Name of the index this key probes.
    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    /// The per-column equality conditions, in index-column order.
    pub fn conditions(&self) -> &[KeyCondition] {
        &self.conditions
    }

    /// Whether any key column is NULL. Such a key can never match.
    pub fn has_nulls(&self) -> bool {
        self.has_nulls
    }

    /// Candidate values in index-column order, for index-side lookup.
    pub fn indexed_values(&self) -> Vec<Option<&Value>> {
        self.conditions.iter().map(|c| c.value.as_ref()).collect()
    }

    /// Evaluates the key against a materialized row. NULL on either
    /// side never matches.
    pub fn matches(&self, row: &TupleData) -> bool {
        self.conditions.iter().all(|cond| {
            match (&cond.value, row.get(cond.table_column)) {
                (Some(key_value), Some(row_value)) => (cond.op)(key_value, row_value),
                _ => false,
            }
        })
    }
}

/// Builds a scan key for `index` on `rel` from a candidate row shaped
/// like `rel` (not like the index).
///
/// Fails when the index is an expression index or when any indexed
/// column's type has no equality operator in its comparison family.
pub fn build_index_scan_key(
    rel: &RelationMeta,
    index: &IndexMeta,
    tuple: &TupleData,
) -> LocatorResult<IndexScanKey> {
    if index.expression {
        return Err(LocatorError::ExpressionIndex {
            index: index.name.clone(),
        });
    }

    let mut conditions = Vec::with_capacity(index.columns.len());
    let mut has_nulls = false;
    for &position in &index.columns {
        let column = rel
            .columns
            .get(position)
            .ok_or_else(|| LocatorError::BadIndexColumn {
                relation: rel.qualified_name(),
                index: index.name.clone(),
                position,
            })?;
        let op = column.column_type.equality_operator().ok_or_else(|| {
            LocatorError::NoEqualityOperator {
                relation: rel.qualified_name(),
                column: column.name.clone(),
            }
        })?;
        let value = tuple.values.get(position).cloned().flatten();
        if value.is_none() {
            has_nulls = true;
        }
        conditions.push(KeyCondition {
            table_column: position,
            op,
            value,
        });
    }

    Ok(IndexScanKey {
        index_name: index.name.clone(),
        conditions,
        has_nulls,
    })
}

/// Builds scan keys for every unique, non-expression index of `rel`
/// that the candidate row fills without NULLs. Indexes whose key would
/// contain a NULL are omitted: they can never identify a row.
pub fn build_index_scan_keys(
    rel: &RelationMeta,
    tuple: &TupleData,
) -> LocatorResult<Vec<IndexScanKey>> {
    let mut keys = Vec::new();
    for index in rel.key_indexes() {
        let key = build_index_scan_key(rel, index, tuple)?;
        if !key.has_nulls() {
            keys.push(key);
        }
    }
    Ok(keys)
}
