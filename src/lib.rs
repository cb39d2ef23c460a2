//! duplexdb - local admission control and change capture for
//! multi-master replication
//!
//! The per-node core of a multi-master replication engine embedded in a
//! relational database. It decides whether each local write is legal
//! for this node's role and the target tables' replication identity,
//! and turns schema changes, drops, and truncations into durable,
//! ordered, replayable records for peers to apply.
//!
//! Layering, leaves first: scan-key builder -> conflict-safe tuple
//! locator -> queue writer / truncate coalescer -> admission gate.
//! Everything the core needs from the surrounding engine is behind the
//! traits in [`engine`]; [`engine::MemoryEngine`] is the in-process
//! reference implementation.

pub mod admission;
pub mod capture;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod locator;
pub mod observability;
pub mod session;
pub mod topology;
pub mod txn;
