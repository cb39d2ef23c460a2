//! Pre-execution hook chain
//!
//! The host engine exposes one pre-execution hook slot; installing over
//! an occupied slot traditionally meant stashing the previous handler
//! and calling it yourself. Here the chain is explicit: an ordered list
//! the host runs before every statement, newest handler first, so
//! installing keeps every earlier handler reachable.

use std::sync::Arc;

use crate::session::SessionContext;

use super::errors::AdmissionResult;
use super::plan::PlannedStatement;

/// A handler invoked before a planned statement executes. Returning an
/// error rejects the statement; handlers must be side-effect-free on
/// the rejection path apart from the error itself.
pub trait ExecutionHook {
    /// Decide whether the statement may proceed.
    fn before_execute(
        &self,
        session: &SessionContext,
        plan: &PlannedStatement,
    ) -> AdmissionResult<()>;
}

/// Ordered pre-execution handlers.
pub struct HookChain {
    hooks: Vec<Arc<dyn ExecutionHook>>,
}

impl HookChain {
    /// Creates an empty chain.
    pub fn new() -> Self {
        Self { hooks: Vec::new() }
    }

    /// Installs a handler. It will run before every handler installed
    /// earlier, matching install-over-previous semantics.
    pub fn install(&mut self, hook: Arc<dyn ExecutionHook>) {
        self.hooks.push(hook);
    }

    /// Number of installed handlers.
    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    /// Whether no handler is installed.
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Runs every handler, newest first. The first rejection wins and
    /// later (older) handlers do not run, exactly as a chained slot
    /// would behave.
    pub fn run(&self, session: &SessionContext, plan: &PlannedStatement) -> AdmissionResult<()> {
        for hook in self.hooks.iter().rev() {
            hook.before_execute(session, plan)?;
        }
        Ok(())
    }
}

impl Default for HookChain {
    fn default() -> Self {
        Self::new()
    }
}
