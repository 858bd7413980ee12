//! Failure classification against a real ClickHouse.
//!
//! Requires Docker to be running for the ClickHouse testcontainer, or
//! `ELT_TEST_CLICKHOUSE_URL` pointing at a server.

use elt_core::schema::{STAGING_EVENTS_TABLE, USERS_TABLE};
use integration_tests::setup::TestContext;
use serde_json::json;
use warehouse::query::count_rows;
use warehouse::transform::upsert_users;
use warehouse::{create_all, drop_all, Statement, StatementKind, Warehouse};

#[tokio::test]
async fn test_create_twice_is_harmless() {
    let ctx = TestContext::new().await;
    create_all(&ctx.clickhouse).await.expect("second create failed");
}

#[tokio::test]
async fn test_existing_table_with_other_layout_is_reported() {
    let ctx = TestContext::new().await;
    ctx.clickhouse
        .execute(&Statement::new(StatementKind::Drop, "users", "DROP TABLE users"))
        .await
        .unwrap();
    ctx.clickhouse
        .execute(&Statement::new(
            StatementKind::Create,
            "users",
            "CREATE TABLE users (user_id String) ENGINE = MergeTree ORDER BY user_id",
        ))
        .await
        .unwrap();

    let err = create_all(&ctx.clickhouse).await.unwrap_err();
    assert_eq!(err.error_code(), "SCHEMA_001");
    assert_eq!(err.table(), Some("users"));
}

#[tokio::test]
async fn test_transform_without_tables_is_schema_error() {
    let ctx = TestContext::new().await;
    drop_all(&ctx.clickhouse).await.unwrap();

    let err = upsert_users(&ctx.clickhouse).await.unwrap_err();
    assert_eq!(err.error_code(), "SCHEMA_002");
    assert_eq!(err.exit_code(), 3);
}

#[tokio::test]
async fn test_malformed_record_fails_whole_load() {
    let ctx = TestContext::new().await;

    let err = ctx
        .seed(
            &STAGING_EVENTS_TABLE,
            &[
                json!({"userId": "1", "ts": 1541990258796_i64}),
                json!({"userId": "2", "ts": "yesterday"}),
            ],
        )
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "DATA_001");
    assert_eq!(err.table(), Some("staging_events"));

    let rows = count_rows(&ctx.clickhouse, &STAGING_EVENTS_TABLE).await.unwrap();
    assert_eq!(rows, 0, "no partial load");

    assert_eq!(count_rows(&ctx.clickhouse, &USERS_TABLE).await.unwrap(), 0);
}
