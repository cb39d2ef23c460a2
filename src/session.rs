//! Session context
//!
//! Each database session owns one of these. It carries the state the
//! capture core used to keep in process-wide flags, made explicit:
//!
//! - the replay mode (recursion-suppression contract: no capture path
//!   proceeds unless the mode is `None`)
//! - the always-allow override used by trusted internal write paths
//! - the session search path, forced empty around wrapped DDL so every
//!   piece of captured text is schema-qualified
//!
//! All three are set and cleared through scoped guards, so every exit
//! path, including error propagation, restores the previous value.
//! Sessions are never shared between threads; the interior mutability
//! here is single-threaded.

use std::cell::{Cell, RefCell};

use uuid::Uuid;

use crate::config::CaptureConfig;

/// What, if anything, this session is currently replaying.
///
/// Capture entry points check this before queueing: a wrapped local
/// statement is already queued, and a remote change must not be
/// broadcast back to the cluster it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayMode {
    /// Normal execution; capture proceeds.
    None,
    /// Executing the local side of a wrapped DDL statement that has
    /// already been queued.
    LocalWrapped,
    /// Applying a change received from a remote node. Owned by the
    /// replication-origin subsystem of the applier.
    RemoteOrigin,
}

/// Per-session state consulted by the admission gate and every capture
/// entry point.
#[derive(Debug)]
pub struct SessionContext {
    id: Uuid,
    actor: String,
    database: String,
    replay: Cell<ReplayMode>,
    always_allow_writes: Cell<bool>,
    search_path: RefCell<Vec<String>>,
    config: CaptureConfig,
}

impl SessionContext {
    /// Creates a session for an actor connected to a database.
    pub fn new(actor: &str, database: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            actor: actor.to_string(),
            database: database.to_string(),
            replay: Cell::new(ReplayMode::None),
            always_allow_writes: Cell::new(false),
            search_path: RefCell::new(Vec::new()),
            config: CaptureConfig::new(),
        }
    }

    /// Session identity.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The identity captured as `actor` on queued commands.
    pub fn actor(&self) -> &str {
        &self.actor
    }

    /// Database this session executes in.
    pub fn database(&self) -> &str {
        &self.database
    }

    /// The session's capture configuration.
    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Current replay mode.
    pub fn replay_mode(&self) -> ReplayMode {
        self.replay.get()
    }

    /// Enters a replay mode for the guard's lifetime. The previous mode
    /// is restored when the guard drops, on success and error paths
    /// alike.
    #[must_use]
    pub fn enter_replay(&self, mode: ReplayMode) -> ReplayGuard<'_> {
        let previous = self.replay.replace(mode);
        ReplayGuard {
            session: self,
            previous,
        }
    }

    /// Whether the always-allow override is in effect.
    pub fn always_allow_writes(&self) -> bool {
        self.always_allow_writes.get()
    }

    /// Sets the always-allow override unscoped. Trusted long-running
    /// internal paths (the applier worker) use this once at startup.
    pub fn set_always_allow_writes(&self, allow: bool) {
        self.always_allow_writes.set(allow);
    }

    /// Scoped always-allow override for a single internal operation.
    #[must_use]
    pub fn scoped_always_allow(&self) -> AlwaysAllowGuard<'_> {
        let previous = self.always_allow_writes.replace(true);
        AlwaysAllowGuard {
            session: self,
            previous,
        }
    }

    /// Current search path.
    pub fn search_path(&self) -> Vec<String> {
        self.search_path.borrow().clone()
    }

    /// Replaces the search path.
    pub fn set_search_path(&self, path: Vec<String>) {
        *self.search_path.borrow_mut() = path;
    }

    /// Forces an empty search path for the guard's lifetime, so any
    /// name resolution and rendering done meanwhile must be fully
    /// qualified.
    #[must_use]
    pub fn force_empty_search_path(&self) -> SearchPathGuard<'_> {
        let previous = std::mem::take(&mut *self.search_path.borrow_mut());
        SearchPathGuard {
            session: self,
            previous,
        }
    }
}

/// Restores the previous replay mode on drop.
#[derive(Debug)]
pub struct ReplayGuard<'a> {
    session: &'a SessionContext,
    previous: ReplayMode,
}

impl Drop for ReplayGuard<'_> {
    fn drop(&mut self) {
        self.session.replay.set(self.previous);
    }
}

/// Restores the previous always-allow setting on drop.
#[derive(Debug)]
pub struct AlwaysAllowGuard<'a> {
    session: &'a SessionContext,
    previous: bool,
}

impl Drop for AlwaysAllowGuard<'_> {
    fn drop(&mut self) {
        self.session.always_allow_writes.set(self.previous);
    }
}

/// Restores the previous search path on drop.
#[derive(Debug)]
pub struct SearchPathGuard<'a> {
    session: &'a SessionContext,
    previous: Vec<String>,
}

impl Drop for SearchPathGuard<'_> {
    fn drop(&mut self) {
        *self.session.search_path.borrow_mut() = std::mem::take(&mut self.previous);
    }
}
