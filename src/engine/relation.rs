//! Relation and index metadata
//!
//! The capture core never owns table storage; it only reasons about
//! relation metadata reported by the host engine:
//! - persistence class (only WAL-logged relations are replicated)
//! - namespace (catalog writes are exempt from admission checks)
//! - unique indexes (scan-key construction, replica identity)
//!
//! Identifier quoting lives here too because every piece of captured
//! command text must be schema-qualified.

use serde_json::Value;

/// Schema that holds the engine's own catalogs.
///
/// Writes into this namespace are never admission-checked: catalog
/// changes are not replicated directly.
pub const CATALOG_SCHEMA: &str = "syscat";

/// Schema backing session-temporary objects. Objects created here are
/// invisible to other sessions and must never be captured.
pub const TEMP_SCHEMA: &str = "tmp";

/// Stable numeric identity of a relation, assigned by the host engine.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct RelationId(u32);

impl RelationId {
    /// Creates a new RelationId with the given value.
    #[inline]
    pub fn new(value: u32) -> Self {
        Self(value)
    }

    /// Returns the underlying value.
    #[inline]
    pub fn value(&self) -> u32 {
        self.0
    }
}

/// Storage persistence class of a relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Persistence {
    /// WAL-logged, durable, replicated.
    Permanent,
    /// Durable-ish but not WAL-logged; never replicated.
    Unlogged,
    /// Session-local; never replicated.
    Temporary,
}

impl Persistence {
    /// Whether changes to a relation of this class reach the write-ahead
    /// log. Only WAL-logged relations participate in replication.
    pub fn needs_wal(self) -> bool {
        matches!(self, Persistence::Permanent)
    }
}

/// Column value types understood by the scan-key builder.
///
/// Each type maps to at most one comparison operator family; the family
/// supplies the equality operator used for index probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    /// UTF-8 text
    Text,
    /// 64-bit signed integer
    Int,
    /// Boolean
    Bool,
    /// 64-bit floating point
    Float,
    /// Timestamp with time zone, carried as RFC 3339 text
    Timestamp,
    /// Nested document. Has no comparison family, so document columns
    /// cannot feed unique-index scan keys.
    Document,
}

/// An equality operator resolved from a comparison family.
///
/// NULL handling is the caller's job: operators are only ever invoked on
/// non-null operands.
pub type EqOperator = fn(&Value, &Value) -> bool;

fn eq_text(a: &Value, b: &Value) -> bool {
    a.as_str() == b.as_str() && a.is_string() && b.is_string()
}

fn eq_int(a: &Value, b: &Value) -> bool {
    matches!((a.as_i64(), b.as_i64()), (Some(x), Some(y)) if x == y)
}

fn eq_bool(a: &Value, b: &Value) -> bool {
    matches!((a.as_bool(), b.as_bool()), (Some(x), Some(y)) if x == y)
}

fn eq_float(a: &Value, b: &Value) -> bool {
    matches!((a.as_f64(), b.as_f64()), (Some(x), Some(y)) if x == y)
}

impl ColumnType {
    /// Returns the canonical type keyword used in rendered command text.
    pub fn keyword(&self) -> &'static str {
        match self {
            ColumnType::Text => "TEXT",
            ColumnType::Int => "BIGINT",
            ColumnType::Bool => "BOOLEAN",
            ColumnType::Float => "FLOAT8",
            ColumnType::Timestamp => "TIMESTAMPTZ",
            ColumnType::Document => "JSONB",
        }
    }

    /// Parses a canonical type keyword.
    pub fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "TEXT" => Some(ColumnType::Text),
            "BIGINT" => Some(ColumnType::Int),
            "BOOLEAN" => Some(ColumnType::Bool),
            "FLOAT8" => Some(ColumnType::Float),
            "TIMESTAMPTZ" => Some(ColumnType::Timestamp),
            "JSONB" => Some(ColumnType::Document),
            _ => None,
        }
    }

    /// Looks up the equality operator of this type's comparison family.
    ///
    /// Returns None when the type has no comparison family (documents).
    /// Index probes over such columns are impossible and the scan-key
    /// builder reports an error rather than guessing.
    pub fn equality_operator(&self) -> Option<EqOperator> {
        match self {
            ColumnType::Text | ColumnType::Timestamp => Some(eq_text),
            ColumnType::Int => Some(eq_int),
            ColumnType::Bool => Some(eq_bool),
            ColumnType::Float => Some(eq_float),
            ColumnType::Document => None,
        }
    }
}

/// A single column of a relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMeta {
    /// Column name
    pub name: String,
    /// Value type
    pub column_type: ColumnType,
    /// Whether NULL is a legal value
    pub nullable: bool,
}

/// An index declared on a relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexMeta {
    /// Index name, unique within the relation
    pub name: String,
    /// Positions of the indexed columns within the relation
    pub columns: Vec<usize>,
    /// Whether the index enforces uniqueness
    pub unique: bool,
    /// Whether the index is over expressions rather than plain columns.
    /// Expression indexes cannot feed scan keys.
    pub expression: bool,
}

/// Relation metadata as reported by the host engine's catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationMeta {
    /// Stable identity
    pub id: RelationId,
    /// Schema name
    pub schema: String,
    /// Relation name
    pub name: String,
    /// Persistence class
    pub persistence: Persistence,
    /// Columns in declaration order
    pub columns: Vec<ColumnMeta>,
    /// Declared indexes
    pub indexes: Vec<IndexMeta>,
    /// Position into `indexes` of the replica-identity index, when one
    /// is declared (commonly the primary key).
    pub replica_identity: Option<usize>,
}

impl RelationMeta {
    /// Whether changes to this relation reach the write-ahead log.
    pub fn needs_wal(&self) -> bool {
        self.persistence.needs_wal()
    }

    /// Whether the relation lives in the engine's catalog namespace.
    pub fn in_catalog_namespace(&self) -> bool {
        self.schema == CATALOG_SCHEMA
    }

    /// The replica-identity index, when declared.
    pub fn replica_identity_index(&self) -> Option<&IndexMeta> {
        self.replica_identity.and_then(|i| self.indexes.get(i))
    }

    /// All unique, non-expression indexes, in declaration order.
    pub fn key_indexes(&self) -> impl Iterator<Item = &IndexMeta> {
        self.indexes.iter().filter(|i| i.unique && !i.expression)
    }

    /// Looks up an index by name.
    pub fn index(&self, name: &str) -> Option<&IndexMeta> {
        self.indexes.iter().find(|i| i.name == name)
    }

    /// Looks up a column position by name.
    pub fn column_position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Fully qualified, quoted name. Captured command text always uses
    /// this form so replay is independent of the remote search path.
    pub fn qualified_name(&self) -> String {
        quote_qualified(&self.schema, &self.name)
    }
}

/// Quotes a single identifier when it is not a plain lower-case name.
pub fn quote_identifier(ident: &str) -> String {
    let plain = !ident.is_empty()
        && ident
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        && !ident.starts_with(|c: char| c.is_ascii_digit());
    if plain {
        ident.to_string()
    } else {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }
}

/// Quotes a schema-qualified name.
pub fn quote_qualified(schema: &str, name: &str) -> String {
    format!("{}.{}", quote_identifier(schema), quote_identifier(name))
}
