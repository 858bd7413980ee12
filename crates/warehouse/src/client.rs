//! ClickHouse client wrapper.

use crate::config::ClickHouseConfig;
use crate::statement::{BindValue, ColumnDescription, Statement, StatementKind, Warehouse};
use async_trait::async_trait;
use clickhouse::query::Query;
use clickhouse::Client;
use elt_core::{ConfigErrorCode, Error, Result, SchemaErrorCode};
use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, info};

const DESCRIBE_SQL: &str = "SELECT name, type FROM system.columns \
     WHERE database = currentDatabase() AND table = ? ORDER BY position";

/// ClickHouse client wrapper. Owned by the orchestrator and borrowed by
/// every pipeline operation.
#[derive(Clone)]
pub struct ClickHouseClient {
    inner: Client,
    config: ClickHouseConfig,
}

impl ClickHouseClient {
    /// Creates a new ClickHouse client.
    pub fn new(config: ClickHouseConfig) -> Result<Self> {
        if config.url.trim().is_empty() {
            return Err(Error::config(
                ConfigErrorCode::Invalid,
                "clickhouse.url must not be empty",
            ));
        }

        let mut client = Client::default()
            .with_url(&config.url)
            .with_database(&config.database)
            .with_option("max_execution_time", config.timeout_secs.to_string());

        if let Some(ref user) = config.username {
            client = client.with_user(user);
        }

        if let Some(ref pass) = config.password {
            client = client.with_password(pass);
        }

        info!(
            url = %config.url,
            database = %config.database,
            "Created ClickHouse client"
        );

        Ok(Self {
            inner: client,
            config,
        })
    }

    /// Returns the inner clickhouse client.
    pub fn inner(&self) -> &Client {
        &self.inner
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ClickHouseConfig {
        &self.config
    }

    /// Create the configured database if missing. Issued against the
    /// server's `default` database, since the target may not exist yet.
    pub async fn ensure_database(&self) -> Result<()> {
        let sql = format!(
            "CREATE DATABASE IF NOT EXISTS `{}`",
            self.config.database.replace('`', "")
        );
        self.inner
            .clone()
            .with_database("default")
            .query(&sql)
            .execute()
            .await
            .map_err(|e| Error::warehouse("create:database", e.to_string()))?;
        debug!(database = %self.config.database, "Database ready");
        Ok(())
    }

    fn prepare(&self, statement: &Statement) -> Query {
        let mut query = self.inner.query(&statement.sql);
        for value in &statement.binds {
            query = match value {
                BindValue::Str(s) => query.bind(s.as_str()),
                BindValue::Int(i) => query.bind(*i),
            };
        }
        query
    }
}

#[async_trait]
impl Warehouse for ClickHouseClient {
    async fn execute(&self, statement: &Statement) -> Result<()> {
        debug!(statement = %statement.label(), "Executing statement");
        self.prepare(statement)
            .execute()
            .await
            .map_err(|e| classify_error(statement, &e.to_string()))
    }

    async fn count(&self, statement: &Statement) -> Result<u64> {
        self.prepare(statement)
            .fetch_one::<u64>()
            .await
            .map_err(|e| classify_error(statement, &e.to_string()))
    }

    async fn describe(&self, table: &str) -> Result<Vec<ColumnDescription>> {
        self.inner
            .query(DESCRIBE_SQL)
            .bind(table)
            .fetch_all::<ColumnDescription>()
            .await
            .map_err(|e| Error::warehouse(format!("describe:{}", table), e.to_string()))
    }
}

/// Server error code in messages such as `Code: 60. DB::Exception ...`.
static SERVER_CODE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Code: (\d+)").expect("invalid server code pattern"));

/// Extract the numeric server error code.
fn server_code(message: &str) -> Option<u32> {
    SERVER_CODE_REGEX.captures(message)?.get(1)?.as_str().parse().ok()
}

/// Map a ClickHouse failure onto the pipeline error taxonomy.
pub fn classify_error(statement: &Statement, message: &str) -> Error {
    let table = statement.table;
    match server_code(message) {
        // UNKNOWN_TABLE, UNKNOWN_DATABASE
        Some(60) | Some(81) => Error::schema(SchemaErrorCode::UnknownTable, table, message),
        // NO_SUCH_COLUMN_IN_TABLE, THERE_IS_NO_COLUMN, TYPE_MISMATCH, INCOMPATIBLE_COLUMNS
        Some(16) | Some(8) | Some(53) | Some(122) => {
            Error::schema(SchemaErrorCode::DefinitionMismatch, table, message)
        }
        // VIOLATED_CONSTRAINT
        Some(469) => Error::constraint(table, message),
        // ACCESS_DENIED, AUTHENTICATION_FAILED
        Some(497) | Some(516) => Error::config(ConfigErrorCode::MissingCredential, message),
        // S3_ERROR, CANNOT_EXTRACT_TABLE_STRUCTURE
        Some(499) | Some(636) if statement.kind == StatementKind::Load => {
            Error::config(ConfigErrorCode::InvalidSource, message)
        }
        // CANNOT_PARSE_*, CANNOT_READ_ALL_DATA, INCORRECT_DATA
        Some(6) | Some(26) | Some(27) | Some(33) | Some(38) | Some(72) | Some(117)
            if statement.kind == StatementKind::Load =>
        {
            Error::data(table, message)
        }
        _ => Error::warehouse(statement.label(), message),
    }
}
