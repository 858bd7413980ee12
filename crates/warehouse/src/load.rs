//! Bulk load from object storage into the staging tables.
//!
//! Each load replaces the target table: it is truncated, then filled by a
//! single `INSERT ... SELECT FROM s3(...)`. Records are parsed as JSON but
//! not validated or transformed. One malformed record fails the whole load.
//!
//! Source location, role and every JSON path key are bound values. Only
//! identifiers and types derived from the table definitions appear in the
//! SQL text.

use crate::ddl::{column_type, structure};
use crate::query::count_rows;
use crate::statement::{Statement, StatementKind, Warehouse};
use elt_core::schema::{STAGING_EVENTS_TABLE, STAGING_SONGS_TABLE};
use elt_core::{EventShape, PathSegment, PipelineConfig, Result, TableDef};
use tracing::info;

const STRICT_PARSING: &str =
    "SETTINGS input_format_allow_errors_num = 0, input_format_allow_errors_ratio = 0";

/// How source records map onto staging columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceFormat {
    /// JSON lines whose keys match the column names.
    JsonAuto,
    /// JSON lines mapped column by column through a path descriptor.
    JsonPaths(EventShape),
}

/// Encoding of event timestamps in the source.
///
/// Epoch milliseconds are staged unchanged in an `Int64` column. The
/// calendar conversion happens in the transforms, so this only records
/// what the source carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeFormat {
    EpochMillis,
}

/// One bulk load into a staging table.
#[derive(Debug, Clone)]
pub struct StagingLoad {
    pub table: &'static TableDef,
    /// Resolved URL pattern
    pub location: String,
    /// IAM role the warehouse assumes to read the location
    pub role_arn: String,
    pub format: SourceFormat,
    pub time_format: Option<TimeFormat>,
}

/// Rows present in each staging table after a load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub staging_events: u64,
    pub staging_songs: u64,
}

/// The two loads of a run: events, then songs.
pub fn load_plan(config: &PipelineConfig) -> Result<Vec<StagingLoad>> {
    config.check()?;

    let event_format = match &config.event_shape {
        Some(shape) => {
            shape.resolve(STAGING_EVENTS_TABLE.columns.len())?;
            SourceFormat::JsonPaths(shape.clone())
        }
        None => SourceFormat::JsonAuto,
    };

    Ok(vec![
        StagingLoad {
            table: &STAGING_EVENTS_TABLE,
            location: config.event_location()?,
            role_arn: config.role_arn.clone(),
            format: event_format,
            time_format: Some(TimeFormat::EpochMillis),
        },
        StagingLoad {
            table: &STAGING_SONGS_TABLE,
            location: config.song_location()?,
            role_arn: config.role_arn.clone(),
            format: SourceFormat::JsonAuto,
            time_format: None,
        },
    ])
}

/// The bulk-load statement for one staging table.
pub fn load_statement(load: &StagingLoad) -> Result<Statement> {
    let table = load.table;
    let target: Vec<_> = table.columns.iter().map(|c| format!("`{}`", c.name)).collect();

    let stmt = match &load.format {
        SourceFormat::JsonAuto => {
            let columns = target.join(", ");
            let sql = format!(
                "INSERT INTO `{}` ({})\nSELECT {}\nFROM s3(?, 'JSONEachRow', ?, extra_credentials(role_arn = ?))\n{}",
                table.name, columns, columns, STRICT_PARSING
            );
            Statement::new(StatementKind::Load, table.name, sql)
                .bind_str(&load.location)
                .bind_str(structure(table))
                .bind_str(&load.role_arn)
        }
        SourceFormat::JsonPaths(shape) => {
            let paths = shape.resolve(table.columns.len())?;
            let mut stmt = Statement::new(StatementKind::Load, table.name, String::new());
            let mut projection = Vec::with_capacity(paths.len());

            for (column, path) in table.columns.iter().zip(&paths) {
                let mut args = vec!["json".to_string()];
                for segment in path {
                    args.push("?".to_string());
                    stmt = match segment {
                        PathSegment::Key(key) => stmt.bind_str(key),
                        // JSONExtract indexes arrays from 1
                        PathSegment::Index(i) => stmt.bind_int(*i as i64 + 1),
                    };
                }
                args.push(format!("'{}'", column_type(column)));
                projection.push(format!("JSONExtract({}) AS `{}`", args.join(", "), column.name));
            }

            stmt.sql = format!(
                "INSERT INTO `{}` ({})\nSELECT {}\nFROM s3(?, 'JSONAsString', extra_credentials(role_arn = ?))\n{}",
                table.name,
                target.join(", "),
                projection.join(", "),
                STRICT_PARSING
            );
            stmt.bind_str(&load.location).bind_str(&load.role_arn)
        }
    };
    Ok(stmt)
}

fn truncate_statement(table: &TableDef) -> Statement {
    Statement::new(
        StatementKind::Truncate,
        table.name,
        format!("TRUNCATE TABLE `{}`", table.name),
    )
}

/// Replace the contents of a staging table from object storage.
///
/// Returns the number of rows in the table afterwards. Not incremental:
/// whatever the table held before is discarded.
pub async fn load(warehouse: &dyn Warehouse, plan: &StagingLoad) -> Result<u64> {
    let statement = load_statement(plan)?;
    warehouse.execute(&truncate_statement(plan.table)).await?;
    warehouse.execute(&statement).await?;

    let rows = count_rows(warehouse, plan.table).await?;
    info!(
        table = plan.table.name,
        location = %plan.location,
        rows,
        "Loaded staging table"
    );
    Ok(rows)
}

/// Load both staging tables.
pub async fn load_all(warehouse: &dyn Warehouse, config: &PipelineConfig) -> Result<LoadReport> {
    let mut report = LoadReport::default();
    for plan in load_plan(config)? {
        let rows = load(warehouse, &plan).await?;
        if plan.table.name == STAGING_EVENTS_TABLE.name {
            report.staging_events = rows;
        } else {
            report.staging_songs = rows;
        }
    }
    Ok(report)
}
