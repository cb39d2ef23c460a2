//! Observability
//!
//! Structured, synchronous JSON event logging. The capture core never
//! buffers log output; an event is on the stream before the operation
//! that produced it returns.

mod logger;

pub use logger::{Logger, Severity};
