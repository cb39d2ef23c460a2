//! Planned statement description
//!
//! The gate sees a statement the way the planner describes it: a
//! top-level command kind, two flags, and the relations the plan
//! writes into. It never sees or rewrites the query itself.

use crate::engine::RelationId;

/// Top-level command classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// Pure read, unless a sub-statement or lock clause says otherwise
    Select,
    Insert,
    Update,
    Delete,
    /// Anything else the planner produces a plan for
    Utility,
}

impl CommandKind {
    /// Statement tag for messages.
    pub fn tag(self) -> &'static str {
        match self {
            CommandKind::Select => "SELECT",
            CommandKind::Insert => "INSERT",
            CommandKind::Update => "UPDATE",
            CommandKind::Delete => "DELETE",
            CommandKind::Utility => "UTILITY",
        }
    }
}

/// What the admission gate needs to know about a planned statement.
#[derive(Debug, Clone)]
pub struct PlannedStatement {
    /// Top-level command
    pub command: CommandKind,
    /// A sub-statement (CTE) modifies data even if the top level reads
    pub has_modifying_cte: bool,
    /// The statement takes row locks (SELECT ... FOR UPDATE/SHARE)
    pub has_row_locks: bool,
    /// Relations the plan writes into, in range-table order
    pub result_relations: Vec<RelationId>,
}

impl PlannedStatement {
    /// A plain read with no locks and no writing sub-statements.
    pub fn reader() -> Self {
        Self {
            command: CommandKind::Select,
            has_modifying_cte: false,
            has_row_locks: false,
            result_relations: Vec::new(),
        }
    }

    /// A write of the given kind into the given relations.
    pub fn write(command: CommandKind, result_relations: Vec<RelationId>) -> Self {
        Self {
            command,
            has_modifying_cte: false,
            has_row_locks: false,
            result_relations,
        }
    }

    /// Marks the statement as carrying a modifying sub-statement.
    pub fn with_modifying_cte(mut self) -> Self {
        self.has_modifying_cte = true;
        self
    }

    /// Marks the statement as taking row locks.
    pub fn with_row_locks(mut self) -> Self {
        self.has_row_locks = true;
        self
    }

    /// Whether the statement performs writes: a modifying
    /// sub-statement, a row-locking clause, or a non-read top-level
    /// command.
    pub fn performs_writes(&self) -> bool {
        self.has_modifying_cte || self.has_row_locks || self.command != CommandKind::Select
    }

    /// Tag used when reporting a write rejection. A SELECT that got
    /// this far writes through a sub-statement, so it reports as DML.
    pub fn writable_tag(&self) -> &'static str {
        match self.command {
            CommandKind::Select => "DML",
            other => other.tag(),
        }
    }
}
