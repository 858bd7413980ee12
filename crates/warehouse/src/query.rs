//! Query functions for reading data back (used in reports and tests).

use crate::client::ClickHouseClient;
use crate::statement::{Statement, StatementKind, Warehouse};
use clickhouse::Row;
use elt_core::{Error, Result, TableDef, TableKind};
use serde::Deserialize;

/// Row count statement. Dimensions are read with `FINAL` so rows that are
/// not merged yet count once per key.
pub fn count_statement(def: &TableDef) -> Statement {
    let modifier = if def.kind == TableKind::Dimension {
        " FINAL"
    } else {
        ""
    };
    Statement::new(
        StatementKind::Count,
        def.name,
        format!("SELECT count() FROM `{}`{}", def.name, modifier),
    )
}

/// Count rows in a table.
pub async fn count_rows(warehouse: &dyn Warehouse, def: &TableDef) -> Result<u64> {
    warehouse.count(&count_statement(def)).await
}

#[derive(Debug, Clone, Row, Deserialize)]
pub struct UserRow {
    pub user_id: i32,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub gender: Option<String>,
    pub level: Option<String>,
}

#[derive(Debug, Clone, Row, Deserialize)]
pub struct SongRow {
    pub song_id: String,
    pub title: Option<String>,
    pub artist_id: String,
    pub year: Option<i32>,
    pub duration: Option<f64>,
}

#[derive(Debug, Clone, Row, Deserialize)]
pub struct ArtistRow {
    pub artist_id: String,
    pub name: Option<String>,
    pub location: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone, Row, Deserialize)]
pub struct TimeRow {
    pub start_time_ms: i64,
    pub hour: Option<i32>,
    pub day: Option<i32>,
    pub week: Option<i32>,
    pub month: Option<i32>,
    pub year: Option<i32>,
    pub weekday: Option<i32>,
}

/// A fact row. `songplay_id` is opaque.
#[derive(Debug, Clone, Row, Deserialize)]
pub struct SongplayRow {
    pub songplay_id: String,
    pub start_time_ms: i64,
    pub user_id: i32,
    pub level: Option<String>,
    pub song_id: Option<String>,
    pub artist_id: Option<String>,
    pub session_id: Option<i32>,
    pub location: Option<String>,
    pub user_agent: Option<String>,
}

async fn fetch<T>(client: &ClickHouseClient, label: &str, sql: &str) -> Result<Vec<T>>
where
    T: Row + for<'b> Deserialize<'b>,
{
    client
        .inner()
        .query(sql)
        .fetch_all::<T>()
        .await
        .map_err(|e| Error::warehouse(label, e.to_string()))
}

/// All users, merged, ordered by id.
pub async fn fetch_users(client: &ClickHouseClient) -> Result<Vec<UserRow>> {
    fetch(
        client,
        "fetch:users",
        "SELECT user_id, first_name, last_name, gender, level FROM users FINAL ORDER BY user_id",
    )
    .await
}

/// All songs, merged, ordered by id.
pub async fn fetch_songs(client: &ClickHouseClient) -> Result<Vec<SongRow>> {
    fetch(
        client,
        "fetch:songs",
        "SELECT song_id, title, artist_id, year, toFloat64(duration) AS duration \
         FROM songs FINAL ORDER BY song_id",
    )
    .await
}

/// All artists, merged, ordered by id.
pub async fn fetch_artists(client: &ClickHouseClient) -> Result<Vec<ArtistRow>> {
    fetch(
        client,
        "fetch:artists",
        "SELECT artist_id, name, location, toFloat64(latitude) AS latitude, \
         toFloat64(longitude) AS longitude FROM artists FINAL ORDER BY artist_id",
    )
    .await
}

/// All time rows, merged, ordered by instant.
pub async fn fetch_time(client: &ClickHouseClient) -> Result<Vec<TimeRow>> {
    fetch(
        client,
        "fetch:time",
        "SELECT toUnixTimestamp64Milli(start_time) AS start_time_ms, hour, day, week, month, \
         year, weekday FROM `time` FINAL ORDER BY start_time",
    )
    .await
}

/// All songplays ordered by instant.
pub async fn fetch_songplays(client: &ClickHouseClient) -> Result<Vec<SongplayRow>> {
    fetch(
        client,
        "fetch:songplays",
        "SELECT toString(songplay_id) AS songplay_id, \
         toUnixTimestamp64Milli(start_time) AS start_time_ms, user_id, level, song_id, \
         artist_id, session_id, location, user_agent FROM songplays ORDER BY start_time",
    )
    .await
}
