//! Core types for the songplay ELT: table definitions, pipeline
//! configuration, event shapes, time decomposition and errors.

pub mod config;
pub mod error;
pub mod schema;
pub mod shape;
pub mod time;

pub use config::*;
pub use error::{ConfigErrorCode, Error, Result, SchemaErrorCode};
pub use schema::{ColumnDef, Constraint, SemanticType, TableDef, TableKind};
pub use shape::*;
pub use time::*;
