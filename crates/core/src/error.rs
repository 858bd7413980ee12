//! Unified error types for the ELT pipeline.
//!
//! Error codes:
//! - CFG_001-004: Configuration errors
//! - SCHEMA_001-002: Schema errors
//! - DATA_001: Source data errors
//! - CONSTRAINT_001: Key constraint errors
//! - WH_001: Warehouse errors
//!
//! Every error is fatal for the run. Nothing in the pipeline retries.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Configuration error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigErrorCode {
    /// CFG_001: Bulk-load credential is missing or malformed
    MissingCredential,
    /// CFG_002: Source location is invalid or unreachable
    InvalidSource,
    /// CFG_003: Event shape descriptor is malformed
    InvalidEventShape,
    /// CFG_004: Any other malformed setting
    Invalid,
}

impl ConfigErrorCode {
    /// Get the error code string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingCredential => "CFG_001",
            Self::InvalidSource => "CFG_002",
            Self::InvalidEventShape => "CFG_003",
            Self::Invalid => "CFG_004",
        }
    }
}

/// Schema error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaErrorCode {
    /// SCHEMA_001: Live table differs from its definition
    DefinitionMismatch,
    /// SCHEMA_002: Table does not exist
    UnknownTable,
}

impl SchemaErrorCode {
    /// Get the error code string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::DefinitionMismatch => "SCHEMA_001",
            Self::UnknownTable => "SCHEMA_002",
        }
    }
}

/// Unified error type for the ELT pipeline.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error: credentials, source locations, settings.
    #[error("[{code}] configuration error: {message}")]
    Config { code: &'static str, message: String },

    /// Schema error, always tied to the offending table.
    #[error("[{code}] schema error on table `{table}`: {message}")]
    Schema {
        code: &'static str,
        table: String,
        message: String,
    },

    /// Malformed records in a source stream during a bulk load.
    #[error("[DATA_001] data error loading `{table}`: {message}")]
    Data { table: String, message: String },

    /// A key constraint was violated unexpectedly.
    #[error("[CONSTRAINT_001] constraint error on table `{table}`: {message}")]
    Constraint { table: String, message: String },

    /// Any other statement failure reported by the warehouse.
    #[error("[WH_001] warehouse error in `{statement}`: {message}")]
    Warehouse { statement: String, message: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create a configuration error.
    pub fn config(code: ConfigErrorCode, msg: impl Into<String>) -> Self {
        Self::Config {
            code: code.code(),
            message: msg.into(),
        }
    }

    /// Create a schema error for a table.
    pub fn schema(code: SchemaErrorCode, table: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Schema {
            code: code.code(),
            table: table.into(),
            message: msg.into(),
        }
    }

    pub fn data(table: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Data {
            table: table.into(),
            message: msg.into(),
        }
    }

    pub fn constraint(table: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Constraint {
            table: table.into(),
            message: msg.into(),
        }
    }

    pub fn warehouse(statement: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Warehouse {
            statement: statement.into(),
            message: msg.into(),
        }
    }

    /// Get the error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Config { code, .. } | Self::Schema { code, .. } => *code,
            Self::Data { .. } => "DATA_001",
            Self::Constraint { .. } => "CONSTRAINT_001",
            Self::Warehouse { .. } => "WH_001",
            Self::Serialization(_) => "CFG_004",
        }
    }

    /// Process exit code for the orchestrator.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config { .. } | Self::Serialization(_) => 2,
            Self::Schema { .. } => 3,
            Self::Data { .. } => 4,
            Self::Constraint { .. } => 5,
            Self::Warehouse { .. } => 1,
        }
    }

    /// The table the error is attached to, if any.
    pub fn table(&self) -> Option<&str> {
        match self {
            Self::Schema { table, .. } | Self::Data { table, .. } | Self::Constraint { table, .. } => {
                Some(table.as_str())
            }
            _ => None,
        }
    }
}
