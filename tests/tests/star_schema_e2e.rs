//! End-to-end tests for the staging → star schema transforms.
//!
//! Staging is seeded straight from fixture records, then the production
//! transforms run against a real ClickHouse.
//!
//! Requires Docker to be running for the ClickHouse testcontainer, or
//! `ELT_TEST_CLICKHOUSE_URL` pointing at a server (run with
//! `--test-threads=1` in that case, since every test recreates the schema).

use elt_core::schema::{STAGING_EVENTS_TABLE, STAGING_SONGS_TABLE};
use elt_core::TimeParts;
use integration_tests::{fixtures, setup::TestContext};
use serde_json::json;
use warehouse::query::{fetch_artists, fetch_songplays, fetch_songs, fetch_time, fetch_users};
use warehouse::transform_all;

async fn seeded_context() -> TestContext {
    let ctx = TestContext::new().await;
    ctx.seed(&STAGING_EVENTS_TABLE, &fixtures::event_log())
        .await
        .expect("Failed to seed events");
    ctx.seed(&STAGING_SONGS_TABLE, &[fixtures::catalog_song()])
        .await
        .expect("Failed to seed songs");
    ctx
}

#[tokio::test]
async fn test_transform_builds_star_schema() {
    let ctx = seeded_context().await;

    let report = transform_all(&ctx.clickhouse).await.expect("Transform failed");
    assert_eq!(report.users, 2);
    assert_eq!(report.songs, 1);
    assert_eq!(report.artists, 1);
    assert_eq!(report.time, 4, "every distinct event instant, plays or not");
    assert_eq!(report.songplays_inserted, 3);

    let songs = fetch_songs(&ctx.clickhouse).await.unwrap();
    assert_eq!(songs[0].song_id, "SOYMRWW12A6D4FAB14");
    assert_eq!(songs[0].artist_id, "ARGSJW91187B9B1D6B");
    assert_eq!(songs[0].year, Some(0));

    let artists = fetch_artists(&ctx.clickhouse).await.unwrap();
    assert_eq!(artists[0].name.as_deref(), Some("Jenny Lind"));
}

#[tokio::test]
async fn test_dimensions_converge_and_fact_appends() {
    let ctx = seeded_context().await;

    let first = transform_all(&ctx.clickhouse).await.unwrap();
    let users_after_first = fetch_users(&ctx.clickhouse).await.unwrap();
    let time_after_first = fetch_time(&ctx.clickhouse).await.unwrap();

    let second = transform_all(&ctx.clickhouse).await.unwrap();
    assert_eq!(
        (first.users, first.songs, first.artists, first.time),
        (second.users, second.songs, second.artists, second.time)
    );

    let users_after_second = fetch_users(&ctx.clickhouse).await.unwrap();
    assert_eq!(users_after_first.len(), users_after_second.len());
    for (a, b) in users_after_first.iter().zip(&users_after_second) {
        assert_eq!(a.user_id, b.user_id);
        assert_eq!(a.level, b.level);
    }
    assert_eq!(
        time_after_first.len(),
        fetch_time(&ctx.clickhouse).await.unwrap().len()
    );

    // No natural key on the fact table: the second run duplicates it
    assert_eq!(second.songplays_inserted, first.songplays_inserted);
    let songplays = fetch_songplays(&ctx.clickhouse).await.unwrap();
    assert_eq!(songplays.len() as u64, 2 * first.songplays_inserted);
}

#[tokio::test]
async fn test_only_next_song_becomes_a_songplay() {
    let ctx = TestContext::new().await;
    let events = vec![
        fixtures::next_song(7, fixtures::MONDAY_TS),
        fixtures::event("Login", Some(7), fixtures::MONDAY_TS + 1, "", "", 0.0),
        fixtures::event("Help", Some(7), fixtures::MONDAY_TS + 2, "", "", 0.0),
    ];
    ctx.seed(&STAGING_EVENTS_TABLE, &events).await.unwrap();

    let report = transform_all(&ctx.clickhouse).await.unwrap();
    assert_eq!(report.songplays_inserted, 1);

    let songplays = fetch_songplays(&ctx.clickhouse).await.unwrap();
    assert_eq!(songplays.len(), 1);
    assert_eq!(songplays[0].start_time_ms, fixtures::MONDAY_TS);
    assert_eq!(songplays[0].user_id, 7);
}

#[tokio::test]
async fn test_unmatched_play_keeps_null_catalog_ids() {
    let ctx = seeded_context().await;
    transform_all(&ctx.clickhouse).await.unwrap();

    let songplays = fetch_songplays(&ctx.clickhouse).await.unwrap();
    let matched: Vec<_> = songplays.iter().filter(|p| p.song_id.is_some()).collect();
    let unmatched: Vec<_> = songplays.iter().filter(|p| p.song_id.is_none()).collect();

    assert_eq!(matched.len(), 2);
    assert!(matched
        .iter()
        .all(|p| p.artist_id.as_deref() == Some("ARGSJW91187B9B1D6B")));

    assert_eq!(unmatched.len(), 1);
    assert_eq!(unmatched[0].artist_id, None);
    assert_eq!(unmatched[0].start_time_ms, fixtures::MONDAY_TS + 60_000);
    assert!(!unmatched[0].songplay_id.is_empty());
}

#[tokio::test]
async fn test_null_keys_are_excluded() {
    let ctx = TestContext::new().await;
    ctx.seed(
        &STAGING_EVENTS_TABLE,
        &[
            fixtures::next_song(1, fixtures::MONDAY_TS),
            fixtures::event("NextSong", None, fixtures::SUNDAY_TS, "x", "y", 1.0),
        ],
    )
    .await
    .unwrap();
    ctx.seed(
        &STAGING_SONGS_TABLE,
        &[
            fixtures::catalog_song(),
            fixtures::song(None, Some("AR00000000000001"), "No Id", "Orphan", 10.0),
            fixtures::song(Some("SO00000000000002"), None, "No Artist", "Nobody", 20.0),
        ],
    )
    .await
    .unwrap();

    let report = transform_all(&ctx.clickhouse).await.unwrap();

    let users = fetch_users(&ctx.clickhouse).await.unwrap();
    assert_eq!(users.iter().map(|u| u.user_id).collect::<Vec<_>>(), vec![1]);

    let songs = fetch_songs(&ctx.clickhouse).await.unwrap();
    assert_eq!(songs.len(), 1, "songs without id or artist are skipped");

    // the artist is known even though its song row had no id
    assert_eq!(report.artists, 2);
    assert_eq!(report.songplays_inserted, 1);
}

#[tokio::test]
async fn test_latest_level_wins() {
    let ctx = TestContext::new().await;
    let mut upgraded = fixtures::next_song(42, fixtures::SUNDAY_TS);
    upgraded["level"] = json!("paid");
    ctx.seed(
        &STAGING_EVENTS_TABLE,
        &[fixtures::next_song(42, fixtures::MONDAY_TS), upgraded],
    )
    .await
    .unwrap();
    transform_all(&ctx.clickhouse).await.unwrap();

    let users = fetch_users(&ctx.clickhouse).await.unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].level.as_deref(), Some("paid"));

    // a later snapshot with a downgrade replaces the row
    let mut downgraded = fixtures::next_song(42, fixtures::SUNDAY_TS + 1_000);
    downgraded["level"] = json!("free");
    ctx.truncate(&STAGING_EVENTS_TABLE).await.unwrap();
    ctx.seed(&STAGING_EVENTS_TABLE, &[downgraded]).await.unwrap();
    transform_all(&ctx.clickhouse).await.unwrap();

    let users = fetch_users(&ctx.clickhouse).await.unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].level.as_deref(), Some("free"));
}

#[tokio::test]
async fn test_time_rows_match_calendar_decomposition() {
    let ctx = seeded_context().await;
    transform_all(&ctx.clickhouse).await.unwrap();

    let rows = fetch_time(&ctx.clickhouse).await.unwrap();
    assert_eq!(rows.len(), 4);
    for row in rows {
        let parts = TimeParts::from_epoch_millis(row.start_time_ms).unwrap();
        assert_eq!(row.hour, Some(parts.hour as i32));
        assert_eq!(row.day, Some(parts.day as i32));
        assert_eq!(row.week, Some(parts.week as i32));
        assert_eq!(row.month, Some(parts.month as i32));
        assert_eq!(row.year, Some(parts.year));
        assert_eq!(row.weekday, Some(parts.weekday as i32));
    }

    let monday = TimeParts::from_epoch_millis(fixtures::MONDAY_TS).unwrap();
    assert_eq!((monday.hour, monday.day, monday.month, monday.year), (2, 12, 11, 2018));
}

#[tokio::test]
async fn test_logged_out_events_load_and_are_skipped() {
    let ctx = TestContext::new().await;
    let mut blank_gender = fixtures::next_song(5, fixtures::SUNDAY_TS);
    blank_gender["gender"] = json!("");
    ctx.seed(
        &STAGING_EVENTS_TABLE,
        &[
            fixtures::logged_out(fixtures::MONDAY_TS),
            fixtures::next_song(39, fixtures::MONDAY_TS + 1_000),
            blank_gender,
        ],
    )
    .await
    .expect("quoted and empty user ids must load");

    let report = transform_all(&ctx.clickhouse).await.unwrap();
    assert_eq!(report.songplays_inserted, 2);
    assert_eq!(report.time, 3, "logged-out events still mark an instant");

    let users = fetch_users(&ctx.clickhouse).await.unwrap();
    assert_eq!(users.iter().map(|u| u.user_id).collect::<Vec<_>>(), vec![5, 39]);
    assert_eq!(users[0].gender, None);
    assert_eq!(users[1].gender.as_deref(), Some("M"));

    let songplays = fetch_songplays(&ctx.clickhouse).await.unwrap();
    assert!(songplays.iter().all(|p| p.user_id == 5 || p.user_id == 39));
}
