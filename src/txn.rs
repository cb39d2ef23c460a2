//! Transaction context
//!
//! State scoped to one top-level transaction of a session. The host
//! engine's rollback discards everything a transaction wrote; this
//! context holds the capture-side state that must share that fate,
//! today the truncate accumulator.

use crate::capture::TruncateCoalescer;
use crate::engine::TxnId;

/// Capture state owned by one top-level transaction.
#[derive(Debug)]
pub struct TransactionContext {
    txn: TxnId,
    truncate: TruncateCoalescer,
}

impl TransactionContext {
    /// Creates the context for a just-begun transaction.
    pub fn new(txn: TxnId) -> Self {
        Self {
            txn,
            truncate: TruncateCoalescer::new(),
        }
    }

    /// The underlying transaction.
    pub fn txn(&self) -> TxnId {
        self.txn
    }

    /// The truncate accumulator.
    pub fn coalescer(&self) -> &TruncateCoalescer {
        &self.truncate
    }

    /// The truncate accumulator, mutably.
    pub fn coalescer_mut(&mut self) -> &mut TruncateCoalescer {
        &mut self.truncate
    }
}
