//! Conflict-safe tuple location
//!
//! Given a unique-index scan key, find at most one matching row and
//! optionally lock it, without ever returning a row a concurrent
//! uncommitted transaction might still retract.
//!
//! Protocol:
//! 1. Probe the index under a dirty snapshot, so in-progress writers'
//!    rows are seen rather than skipped.
//! 2. If the matching row is contested by an in-flight transaction
//!    (creator or deleter), wait for that transaction, then retry from
//!    the top: the winner's outcome may change which row now matches.
//! 3. If locking was requested, take the row lock under the latest
//!    committed snapshot. A concurrent-update report means the probed
//!    version is stale; retry from the top.
//!
//! The retry loop is unbounded. The host engine's lock manager and its
//! deadlock detection are the backstop; under contention the loop is
//! O(1) in practice. A warning is logged every 100 retries so a stall
//! is observable.

use crate::engine::{LockOutcome, RelationId, RowLockMode, TupleData, TupleId, TupleScan, TxnId};
use crate::observability::Logger;

use super::errors::{LocatorError, LocatorResult};
use super::scan_key::IndexScanKey;

/// Retry count at which a stalled lookup is reported.
const RETRY_WARN_INTERVAL: u64 = 100;

/// A located row. The tuple reference stays valid, and the lock (when
/// requested) stays held, until the caller's transaction ends.
#[derive(Debug, Clone)]
pub struct FoundTuple {
    /// Stored tuple identity
    pub tuple: TupleId,
    /// Materialized row values
    pub data: TupleData,
}

/// Locates rows through the host engine's tuple-scan/lock contract.
pub struct TupleLocator<'a, E: TupleScan> {
    engine: &'a E,
}

impl<'a, E: TupleScan> TupleLocator<'a, E> {
    /// Creates a locator over the given engine.
    pub fn new(engine: &'a E) -> Self {
        Self { engine }
    }

    /// Finds the row matching `key` in its unique index, waiting out
    /// in-flight writers, and locks it when `lock` is given.
    ///
    /// A key containing NULL is refused: it can never match a row, and
    /// silently reporting "not found" would let the caller proceed as
    /// if the key were meaningful.
    pub fn locate(
        &self,
        txn: TxnId,
        rel: RelationId,
        key: &IndexScanKey,
        lock: Option<RowLockMode>,
    ) -> LocatorResult<Option<FoundTuple>> {
        if key.has_nulls() {
            return Err(LocatorError::KeyContainsNull {
                index: key.index_name().to_string(),
            });
        }

        let mut retries: u64 = 0;
        loop {
            let probed = match self.engine.dirty_probe(rel, key)? {
                Some(tuple) => tuple,
                None => return Ok(None),
            };

            // Contested: the row's creator or deleter has not resolved.
            // Wait it out and re-probe; its commit or abort may change
            // which row, if any, now matches.
            if let Some(contender) = probed.in_flight {
                self.engine.wait_for(contender);
                retries += 1;
                self.warn_if_stalled(retries, key);
                continue;
            }

            if let Some(mode) = lock {
                match self.engine.lock_tuple(txn, rel, probed.tuple, mode)? {
                    LockOutcome::Acquired => {}
                    LockOutcome::ConcurrentlyUpdated => {
                        // The probed version went stale between scan and
                        // lock. Start over rather than touch it.
                        Logger::trace(
                            "LOCATOR_CONCURRENT_UPDATE",
                            &[("index", key.index_name())],
                        );
                        retries += 1;
                        self.warn_if_stalled(retries, key);
                        continue;
                    }
                }
            }

            return Ok(Some(FoundTuple {
                tuple: probed.tuple,
                data: probed.data,
            }));
        }
    }

    fn warn_if_stalled(&self, retries: u64, key: &IndexScanKey) {
        if retries % RETRY_WARN_INTERVAL == 0 {
            Logger::warn(
                "LOCATOR_RETRY_STALLED",
                &[
                    ("index", key.index_name()),
                    ("retries", &retries.to_string()),
                ],
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{DirtyTuple, EngineResult};
    use serde_json::json;
    use std::cell::RefCell;

    /// Scripted engine: each probe pops the next canned answer, and
    /// waits/locks are recorded so tests can assert the protocol.
    struct ScriptedEngine {
        probes: RefCell<Vec<Option<DirtyTuple>>>,
        lock_outcomes: RefCell<Vec<LockOutcome>>,
        waited_for: RefCell<Vec<TxnId>>,
    }

    impl ScriptedEngine {
        fn new(probes: Vec<Option<DirtyTuple>>, locks: Vec<LockOutcome>) -> Self {
            // Scripts are popped from the back.
            Self {
                probes: RefCell::new(probes.into_iter().rev().collect()),
                lock_outcomes: RefCell::new(locks.into_iter().rev().collect()),
                waited_for: RefCell::new(Vec::new()),
            }
        }
    }

    impl TupleScan for ScriptedEngine {
        fn dirty_probe(
            &self,
            _rel: RelationId,
            _key: &IndexScanKey,
        ) -> EngineResult<Option<DirtyTuple>> {
            Ok(self.probes.borrow_mut().pop().expect("probe script ran dry"))
        }

        fn wait_for(&self, txn: TxnId) {
            self.waited_for.borrow_mut().push(txn);
        }

        fn lock_tuple(
            &self,
            _txn: TxnId,
            _rel: RelationId,
            _tuple: TupleId,
            _mode: RowLockMode,
        ) -> EngineResult<LockOutcome> {
            Ok(self
                .lock_outcomes
                .borrow_mut()
                .pop()
                .expect("lock script ran dry"))
        }
    }

    fn key_for_value(value: i64) -> IndexScanKey {
        use crate::engine::{ColumnMeta, ColumnType, IndexMeta, Persistence, RelationMeta};
        let rel = RelationMeta {
            id: RelationId::new(1),
            schema: "app".to_string(),
            name: "t".to_string(),
            persistence: Persistence::Permanent,
            columns: vec![ColumnMeta {
                name: "id".to_string(),
                column_type: ColumnType::Int,
                nullable: false,
            }],
            indexes: vec![IndexMeta {
                name: "t_pkey".to_string(),
                columns: vec![0],
                unique: true,
                expression: false,
            }],
            replica_identity: Some(0),
        };
        super::super::build_index_scan_key(
            &rel,
            rel.index("t_pkey").unwrap(),
            &TupleData::new(vec![Some(json!(value))]),
        )
        .unwrap()
    }

    fn null_key() -> IndexScanKey {
        use crate::engine::{ColumnMeta, ColumnType, IndexMeta, Persistence, RelationMeta};
        let rel = RelationMeta {
            id: RelationId::new(1),
            schema: "app".to_string(),
            name: "t".to_string(),
            persistence: Persistence::Permanent,
            columns: vec![ColumnMeta {
                name: "id".to_string(),
                column_type: ColumnType::Int,
                nullable: true,
            }],
            indexes: vec![IndexMeta {
                name: "t_pkey".to_string(),
                columns: vec![0],
                unique: true,
                expression: false,
            }],
            replica_identity: Some(0),
        };
        super::super::build_index_scan_key(
            &rel,
            rel.index("t_pkey").unwrap(),
            &TupleData::new(vec![None]),
        )
        .unwrap()
    }

    fn tuple(id: u64, in_flight: Option<u64>) -> DirtyTuple {
        DirtyTuple {
            tuple: TupleId::new(id),
            data: TupleData::new(vec![Some(json!(1))]),
            in_flight: in_flight.map(TxnId::new),
        }
    }

    #[test]
    fn test_not_found_without_contention() {
        let engine = ScriptedEngine::new(vec![None], vec![]);
        let locator = TupleLocator::new(&engine);
        let found = locator
            .locate(TxnId::new(1), RelationId::new(1), &key_for_value(1), None)
            .unwrap();
        assert!(found.is_none());
        assert!(engine.waited_for.borrow().is_empty());
    }

    #[test]
    fn test_waits_out_in_flight_writer_then_retries() {
        // First probe sees a contested tuple, second sees it settled.
        let engine = ScriptedEngine::new(
            vec![Some(tuple(10, Some(77))), Some(tuple(10, None))],
            vec![],
        );
        let locator = TupleLocator::new(&engine);
        let found = locator
            .locate(TxnId::new(1), RelationId::new(1), &key_for_value(1), None)
            .unwrap()
            .expect("row should be found after the writer resolves");
        assert_eq!(found.tuple, TupleId::new(10));
        assert_eq!(*engine.waited_for.borrow(), vec![TxnId::new(77)]);
    }

    #[test]
    fn test_winner_abort_can_erase_the_match() {
        // Contested on the first probe; after waiting, the writer turns
        // out to have aborted and nothing matches any more.
        let engine = ScriptedEngine::new(vec![Some(tuple(10, Some(77))), None], vec![]);
        let locator = TupleLocator::new(&engine);
        let found = locator
            .locate(TxnId::new(1), RelationId::new(1), &key_for_value(1), None)
            .unwrap();
        assert!(found.is_none());
    }

    #[test]
    fn test_concurrent_update_during_lock_restarts_lookup() {
        let engine = ScriptedEngine::new(
            vec![Some(tuple(10, None)), Some(tuple(11, None))],
            vec![LockOutcome::ConcurrentlyUpdated, LockOutcome::Acquired],
        );
        let locator = TupleLocator::new(&engine);
        let found = locator
            .locate(
                TxnId::new(1),
                RelationId::new(1),
                &key_for_value(1),
                Some(RowLockMode::Exclusive),
            )
            .unwrap()
            .expect("second attempt should lock the fresh version");
        assert_eq!(found.tuple, TupleId::new(11));
    }

    #[test]
    fn test_null_key_is_refused() {
        let engine = ScriptedEngine::new(vec![], vec![]);
        let locator = TupleLocator::new(&engine);
        let err = locator
            .locate(TxnId::new(1), RelationId::new(1), &null_key(), None)
            .unwrap_err();
        assert!(matches!(err, LocatorError::KeyContainsNull { .. }));
    }
}
