//! Staging → star schema transforms.
//!
//! Dimensions (`users`, `songs`, `artists`, `time`) are upserted: one row
//! per key is selected from staging under a total ordering, inserted, and
//! the table is merged with `OPTIMIZE ... FINAL` so the newest load
//! replaces older rows for the same key. Rows with a NULL key are skipped.
//! Running an upsert again on the same staging snapshot changes nothing.
//!
//! The fact table is append-only. `insert_songplays` has no natural key to
//! deduplicate on, so running it twice against the same staging snapshot
//! inserts every songplay twice. Reload staging between fact inserts.

use crate::query::count_rows;
use crate::statement::{Statement, StatementKind, Warehouse};
use elt_core::schema::{tables, ARTISTS_TABLE, SONGPLAYS_TABLE, SONGS_TABLE, TIME_TABLE, USERS_TABLE};
use elt_core::{Result, TableDef};
use tracing::info;

/// The `page` value that marks a song play.
pub const NEXT_SONG_PAGE: &str = "NextSong";

/// Users come from the event log, the only staging table carrying user
/// identity. The latest event per user wins, so `level` tracks upgrades
/// and downgrades. Empty or non-numeric ids are logged-out events.
/// An empty `gender` stages as a NUL byte and is stored as NULL.
const USERS_UPSERT: &str = r#"
INSERT INTO users (user_id, first_name, last_name, gender, level)
SELECT toInt32OrNull(userId) AS user_id, firstName, lastName, nullIf(toString(gender), '\0'), level
FROM staging_events
WHERE user_id IS NOT NULL
ORDER BY user_id, ts DESC NULLS LAST, level, firstName, lastName
LIMIT 1 BY user_id
"#;

/// Songs without an artist cannot satisfy `artist_id NOT NULL`.
const SONGS_UPSERT: &str = r#"
INSERT INTO songs (song_id, title, artist_id, year, duration)
SELECT song_id, title, artist_id, toInt32(year), duration
FROM staging_songs
WHERE song_id IS NOT NULL AND artist_id IS NOT NULL
ORDER BY song_id, title, artist_id, year, duration
LIMIT 1 BY song_id
"#;

const ARTISTS_UPSERT: &str = r#"
INSERT INTO artists (artist_id, name, location, latitude, longitude)
SELECT artist_id, artist_name, artist_location, artist_latitude, artist_longitude
FROM staging_songs
WHERE artist_id IS NOT NULL
ORDER BY artist_id, artist_name, artist_location, artist_latitude, artist_longitude
LIMIT 1 BY artist_id
"#;

/// Weekday is the ISO day of week (`toDayOfWeek`, Monday = 1), not the
/// ISO week number.
const TIME_UPSERT: &str = r#"
INSERT INTO `time` (start_time, hour, day, week, month, year, weekday)
SELECT
    start_time,
    toHour(start_time),
    toDayOfMonth(start_time),
    toISOWeek(start_time),
    toMonth(start_time),
    toYear(start_time),
    toDayOfWeek(start_time)
FROM (
    SELECT DISTINCT fromUnixTimestamp64Milli(assumeNotNull(ts), 'UTC') AS start_time
    FROM staging_events
    WHERE ts IS NOT NULL
)
"#;

/// One row per `NextSong` event. The catalog match is a left join with at
/// most one hit per event; unmatched plays keep NULL song and artist ids.
const SONGPLAYS_INSERT: &str = r#"
INSERT INTO songplays (start_time, user_id, level, song_id, artist_id, session_id, location, user_agent)
SELECT
    fromUnixTimestamp64Milli(assumeNotNull(e.ts), 'UTC'),
    assumeNotNull(toInt32OrNull(e.userId)),
    e.level,
    c.song_id,
    c.artist_id,
    e.sessionId,
    e.location,
    e.userAgent
FROM staging_events AS e
LEFT ANY JOIN (
    SELECT s.song_id AS song_id, s.artist_id AS artist_id, s.title AS title,
           a.name AS artist_name, s.duration AS duration
    FROM (SELECT * FROM songs FINAL) AS s
    INNER JOIN (SELECT * FROM artists FINAL) AS a ON s.artist_id = a.artist_id
) AS c ON e.song = c.title AND e.artist = c.artist_name AND e.length = c.duration
WHERE e.page = ? AND e.ts IS NOT NULL AND toInt32OrNull(e.userId) IS NOT NULL
SETTINGS join_use_nulls = 1
"#;

/// Upsert statement for a dimension table.
pub fn upsert_statement(table: &TableDef) -> Option<Statement> {
    let sql = match table.name {
        tables::USERS => USERS_UPSERT,
        tables::SONGS => SONGS_UPSERT,
        tables::ARTISTS => ARTISTS_UPSERT,
        tables::TIME => TIME_UPSERT,
        _ => return None,
    };
    Some(Statement::new(StatementKind::Upsert, table.name, sql.trim()))
}

/// Forces the pending replace-merge for a dimension.
pub fn optimize_statement(table: &TableDef) -> Statement {
    Statement::new(
        StatementKind::Optimize,
        table.name,
        format!("OPTIMIZE TABLE `{}` FINAL", table.name),
    )
}

/// The fact insert, with the page filter bound.
pub fn songplays_statement() -> Statement {
    Statement::new(StatementKind::Insert, SONGPLAYS_TABLE.name, SONGPLAYS_INSERT.trim())
        .bind_str(NEXT_SONG_PAGE)
}

/// Dimension and fact row counts after a transform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransformReport {
    pub users: u64,
    pub songs: u64,
    pub artists: u64,
    pub time: u64,
    /// Rows appended to `songplays` by this run
    pub songplays_inserted: u64,
}

async fn upsert(warehouse: &dyn Warehouse, table: &TableDef) -> Result<u64> {
    let Some(statement) = upsert_statement(table) else {
        return Err(elt_core::Error::warehouse(
            format!("upsert:{}", table.name),
            "not a dimension table",
        ));
    };
    warehouse.execute(&statement).await?;
    warehouse.execute(&optimize_statement(table)).await?;

    let rows = count_rows(warehouse, table).await?;
    info!(table = table.name, rows, "Upserted dimension");
    Ok(rows)
}

/// Merge users from the event log. Returns the user count.
pub async fn upsert_users(warehouse: &dyn Warehouse) -> Result<u64> {
    upsert(warehouse, &USERS_TABLE).await
}

/// Merge songs from the catalog. Returns the song count.
pub async fn upsert_songs(warehouse: &dyn Warehouse) -> Result<u64> {
    upsert(warehouse, &SONGS_TABLE).await
}

/// Merge artists from the catalog. Returns the artist count.
pub async fn upsert_artists(warehouse: &dyn Warehouse) -> Result<u64> {
    upsert(warehouse, &ARTISTS_TABLE).await
}

/// Merge the calendar breakdown of every distinct event instant.
pub async fn upsert_time(warehouse: &dyn Warehouse) -> Result<u64> {
    upsert(warehouse, &TIME_TABLE).await
}

/// Append songplays for every `NextSong` event in staging.
///
/// Not idempotent: each call appends a full set of rows for the current
/// staging snapshot. Returns the number of rows appended.
pub async fn insert_songplays(warehouse: &dyn Warehouse) -> Result<u64> {
    let before = count_rows(warehouse, &SONGPLAYS_TABLE).await?;
    warehouse.execute(&songplays_statement()).await?;
    let after = count_rows(warehouse, &SONGPLAYS_TABLE).await?;

    let inserted = after.saturating_sub(before);
    info!(inserted, total = after, "Inserted songplays");
    Ok(inserted)
}

/// Run all five transforms: dimensions first so the fact join sees the
/// freshly merged catalog.
pub async fn transform_all(warehouse: &dyn Warehouse) -> Result<TransformReport> {
    Ok(TransformReport {
        users: upsert_users(warehouse).await?,
        songs: upsert_songs(warehouse).await?,
        artists: upsert_artists(warehouse).await?,
        time: upsert_time(warehouse).await?,
        songplays_inserted: insert_songplays(warehouse).await?,
    })
}
