//! Common test setup functions.

use elt_core::{Result, TableDef};
use serde_json::Value;
use warehouse::ddl::structure;
use warehouse::{
    create_all, drop_all, ClickHouseClient, ClickHouseConfig, Statement, StatementKind, Warehouse,
};

use crate::containers::TestContainers;
use crate::fixtures::json_lines;

/// Test context with a real ClickHouse and a freshly created schema.
///
/// Staging is seeded directly from in-memory records, so the transforms run
/// the same statements as production without object storage.
pub struct TestContext {
    pub containers: TestContainers,
    pub clickhouse: ClickHouseClient,
}

impl TestContext {
    /// Create a new test context with every table dropped and recreated.
    pub async fn new() -> Self {
        telemetry::init_tracing(telemetry::TracingConfig::new().with_filter("warn"));

        let containers = TestContainers::start().await;

        let config = ClickHouseConfig {
            url: containers.clickhouse_url.clone(),
            database: containers.clickhouse_database.clone(),
            username: containers.clickhouse_username.clone(),
            password: containers.clickhouse_password.clone(),
            timeout_secs: 30,
        };
        let clickhouse = ClickHouseClient::new(config).expect("Failed to create ClickHouse client");

        clickhouse
            .ensure_database()
            .await
            .expect("Failed to create database");
        drop_all(&clickhouse).await.expect("Failed to drop tables");
        create_all(&clickhouse)
            .await
            .expect("Failed to create tables");

        Self {
            containers,
            clickhouse,
        }
    }

    /// Append records to a staging table, parsed exactly as a bulk load
    /// would parse them.
    pub async fn seed(&self, table: &'static TableDef, records: &[Value]) -> Result<()> {
        let sql = format!(
            "INSERT INTO `{}` SELECT * FROM format(JSONEachRow, ?, ?)",
            table.name
        );
        let statement = Statement::new(StatementKind::Load, table.name, sql)
            .bind_str(structure(table))
            .bind_str(json_lines(records));
        self.clickhouse.execute(&statement).await
    }

    /// Empty a table.
    pub async fn truncate(&self, table: &'static TableDef) -> Result<()> {
        let statement = Statement::new(
            StatementKind::Truncate,
            table.name,
            format!("TRUNCATE TABLE `{}`", table.name),
        );
        self.clickhouse.execute(&statement).await
    }
}
