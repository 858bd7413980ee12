//! ClickHouse DDL for the staging and star-schema tables.
//!
//! Table layout by kind:
//! - Staging: `MergeTree ORDER BY tuple()`, every column Nullable, no key.
//! - Dimension: `ReplacingMergeTree(_loaded_at) ORDER BY <primary key>`.
//!   The primary key is the merge key and the newest load wins.
//! - Fact: `MergeTree ORDER BY (<sort key>, <primary key>)` with a UUID
//!   surrogate generated on insert.

use crate::statement::{ColumnDescription, Statement, StatementKind, Warehouse};
use elt_core::schema::all_tables;
use elt_core::{ColumnDef, Error, Result, SchemaErrorCode, SemanticType, TableDef, TableKind};
use tracing::{debug, info};

/// Version column added to every dimension table.
pub const VERSION_COLUMN: &str = "_loaded_at";
const VERSION_TYPE: &str = "DateTime64(6, 'UTC')";

/// ClickHouse type for a column, including nullability.
pub fn column_type(column: &ColumnDef) -> String {
    let base = base_type(column.ty);
    if column.is_not_null() {
        base.to_string()
    } else {
        format!("Nullable({})", base)
    }
}

fn base_type(ty: SemanticType) -> &'static str {
    match ty {
        SemanticType::Varchar => "String",
        SemanticType::Char => "FixedString(1)",
        SemanticType::Integer => "Int32",
        SemanticType::BigInt => "Int64",
        SemanticType::Decimal => "Decimal(38, 10)",
        SemanticType::Float => "Float64",
        SemanticType::TimestampTz => "DateTime64(3, 'UTC')",
        SemanticType::Surrogate => "UUID",
    }
}

/// Columns the live table must report, in order.
pub fn expected_columns(def: &TableDef) -> Vec<ColumnDescription> {
    let mut columns: Vec<_> = def
        .columns
        .iter()
        .map(|c| ColumnDescription::new(c.name, column_type(c)))
        .collect();
    if def.kind == TableKind::Dimension {
        columns.push(ColumnDescription::new(VERSION_COLUMN, VERSION_TYPE));
    }
    columns
}

/// Column list in `name Type` form, as taken by table functions.
pub fn structure(def: &TableDef) -> String {
    def.columns
        .iter()
        .map(|c| format!("{} {}", c.name, column_type(c)))
        .collect::<Vec<_>>()
        .join(", ")
}

fn quoted(name: &str) -> String {
    format!("`{}`", name)
}

fn engine_clause(def: &TableDef) -> String {
    let pk = def.primary_key().map(|c| quoted(c.name));
    match def.kind {
        TableKind::Staging => {
            let sort: Vec<_> = def.sort_keys().map(|c| quoted(c.name)).collect();
            if sort.is_empty() {
                "ENGINE = MergeTree\nORDER BY tuple()".to_string()
            } else {
                format!("ENGINE = MergeTree\nORDER BY ({})", sort.join(", "))
            }
        }
        TableKind::Dimension => format!(
            "ENGINE = ReplacingMergeTree({})\nORDER BY ({})",
            quoted(VERSION_COLUMN),
            pk.unwrap_or_default()
        ),
        TableKind::Fact => {
            let mut order: Vec<_> = def.sort_keys().map(|c| quoted(c.name)).collect();
            order.extend(pk);
            format!("ENGINE = MergeTree\nORDER BY ({})", order.join(", "))
        }
    }
}

/// `CREATE TABLE IF NOT EXISTS` for a definition.
pub fn create_statement(def: &TableDef) -> Statement {
    let mut lines: Vec<String> = def
        .columns
        .iter()
        .map(|c| {
            let mut line = format!("    {} {}", quoted(c.name), column_type(c));
            if c.ty == SemanticType::Surrogate {
                line.push_str(" DEFAULT generateUUIDv4()");
            }
            line
        })
        .collect();
    if def.kind == TableKind::Dimension {
        lines.push(format!(
            "    {} {} DEFAULT now64(6)",
            quoted(VERSION_COLUMN),
            VERSION_TYPE
        ));
    }

    let sql = format!(
        "CREATE TABLE IF NOT EXISTS {}\n(\n{}\n)\n{}",
        quoted(def.name),
        lines.join(",\n"),
        engine_clause(def)
    );
    Statement::new(StatementKind::Create, def.name, sql)
}

/// `DROP TABLE IF EXISTS` for a definition.
pub fn drop_statement(def: &TableDef) -> Statement {
    Statement::new(
        StatementKind::Drop,
        def.name,
        format!("DROP TABLE IF EXISTS {}", quoted(def.name)),
    )
}

/// Compare the live table with its definition.
pub async fn verify_table(warehouse: &dyn Warehouse, def: &TableDef) -> Result<()> {
    let live = warehouse.describe(def.name).await?;
    if live.is_empty() {
        return Err(Error::schema(
            SchemaErrorCode::UnknownTable,
            def.name,
            "table does not exist",
        ));
    }

    let expected = expected_columns(def);
    if live == expected {
        return Ok(());
    }

    let message = match expected.iter().zip(&live).position(|(e, l)| e != l) {
        Some(i) => format!(
            "column {} is `{} {}` but the definition expects `{} {}`",
            i + 1,
            live[i].name,
            live[i].type_name,
            expected[i].name,
            expected[i].type_name
        ),
        None => format!(
            "table has {} columns but the definition has {}",
            live.len(),
            expected.len()
        ),
    };
    Err(Error::schema(
        SchemaErrorCode::DefinitionMismatch,
        def.name,
        message,
    ))
}

/// Create every table that does not exist yet, then check each live table
/// against its definition.
///
/// Safe to call repeatedly. A table that exists with a different layout is
/// reported, never altered.
pub async fn create_all(warehouse: &dyn Warehouse) -> Result<()> {
    for def in all_tables() {
        warehouse.execute(&create_statement(def)).await?;
        verify_table(warehouse, def).await?;
        debug!(table = def.name, "Table ready");
    }
    info!(tables = all_tables().len(), "Created tables");
    Ok(())
}

/// Drop every table, staging and warehouse alike.
pub async fn drop_all(warehouse: &dyn Warehouse) -> Result<()> {
    for def in all_tables() {
        warehouse.execute(&drop_statement(def)).await?;
    }
    info!(tables = all_tables().len(), "Dropped tables");
    Ok(())
}
