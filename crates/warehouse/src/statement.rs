//! Statements and the warehouse seam.
//!
//! Every pipeline operation is expressed as a [`Statement`]: SQL text whose
//! shape is fixed by the table definitions, plus bound values for anything
//! that comes from configuration. Operations issue statements through the
//! [`Warehouse`] trait and never own the connection.

use async_trait::async_trait;
use clickhouse::Row;
use elt_core::Result;
use serde::Deserialize;
use std::fmt;

/// A value bound to a `?` placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindValue {
    Str(String),
    Int(i64),
}

/// What a statement does. Used for logging and error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementKind {
    Drop,
    Create,
    Truncate,
    Load,
    Upsert,
    Optimize,
    Insert,
    Count,
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Drop => "drop",
            Self::Create => "create",
            Self::Truncate => "truncate",
            Self::Load => "load",
            Self::Upsert => "upsert",
            Self::Optimize => "optimize",
            Self::Insert => "insert",
            Self::Count => "count",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub kind: StatementKind,
    pub table: &'static str,
    pub sql: String,
    pub binds: Vec<BindValue>,
}

impl Statement {
    pub fn new(kind: StatementKind, table: &'static str, sql: impl Into<String>) -> Self {
        Self {
            kind,
            table,
            sql: sql.into(),
            binds: Vec::new(),
        }
    }

    pub fn bind_str(mut self, value: impl Into<String>) -> Self {
        self.binds.push(BindValue::Str(value.into()));
        self
    }

    pub fn bind_int(mut self, value: i64) -> Self {
        self.binds.push(BindValue::Int(value));
        self
    }

    /// Short name such as `upsert:users`.
    pub fn label(&self) -> String {
        format!("{}:{}", self.kind, self.table)
    }

    /// Number of `?` placeholders in the SQL text.
    pub fn placeholder_count(&self) -> usize {
        self.sql.matches('?').count()
    }
}

/// A live column as reported by the warehouse catalog.
#[derive(Debug, Clone, PartialEq, Eq, Row, Deserialize)]
pub struct ColumnDescription {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
}

impl ColumnDescription {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

/// The warehouse session every operation runs against.
///
/// Implemented by [`crate::ClickHouseClient`] and by test doubles.
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Run a statement that returns no rows.
    async fn execute(&self, statement: &Statement) -> Result<()>;

    /// Run a statement that returns a single count.
    async fn count(&self, statement: &Statement) -> Result<u64>;

    /// Live columns of a table in declaration order. Empty if absent.
    async fn describe(&self, table: &str) -> Result<Vec<ColumnDescription>>;
}
