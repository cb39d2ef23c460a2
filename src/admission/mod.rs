//! Write admission
//!
//! The topmost capture component: a pre-execution gate deciding whether
//! a write is legal given the node's role and the target tables'
//! replication identity, installed into an explicit hook chain.
//!
//! This module provides:
//! - `PlannedStatement` / `CommandKind` - the planner's view of a statement
//! - `AdmissionGate` - the allow/deny decision
//! - `HookChain` / `ExecutionHook` - ordered pre-execution handlers
//! - `AdmissionError` - policy rejections with retryability

mod errors;
mod gate;
mod hooks;
mod plan;

pub use errors::{AdmissionError, AdmissionErrorKind, AdmissionResult};
pub use gate::AdmissionGate;
pub use hooks::{ExecutionHook, HookChain};
pub use plan::{CommandKind, PlannedStatement};
