use chrono::{Duration, Utc};
use pairplan_core::RateLimitStore;
use pairplan_storage_sqlite::SqliteRateLimitStore;
use tempfile::TempDir;

async fn setup() -> (SqliteRateLimitStore, TempDir) {
    let tempdir = TempDir::new().unwrap();
    let db_path = tempdir.path().join("test.db");
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let store = SqliteRateLimitStore::connect(&db_url).await.unwrap();
    (store, tempdir)
}

#[tokio::test]
async fn hits_count_up_within_window() {
    let (store, _dir) = setup().await;
    let start = Utc::now();
    let window = Duration::minutes(5);

    let first = store.hit("k", window, start).await.unwrap();
    assert_eq!(first.count, 1);
    assert_eq!(
        first.window_reset_at.timestamp_millis(),
        (start + window).timestamp_millis()
    );

    let second = store.hit("k", window, start + Duration::seconds(30)).await.unwrap();
    assert_eq!(second.count, 2);
    assert_eq!(second.window_reset_at, first.window_reset_at);
}

#[tokio::test]
async fn window_restarts_once_elapsed() {
    let (store, _dir) = setup().await;
    let start = Utc::now();
    let window = Duration::minutes(5);
    for _ in 0..4 {
        store.hit("k", window, start).await.unwrap();
    }

    let later = start + window;
    let fresh = store.hit("k", window, later).await.unwrap();
    assert_eq!(fresh.count, 1);
    assert_eq!(
        fresh.window_reset_at.timestamp_millis(),
        (later + window).timestamp_millis()
    );
}

#[tokio::test]
async fn concurrent_hits_are_all_counted() {
    let (store, _dir) = setup().await;
    let now = Utc::now();
    let window = Duration::minutes(5);

    let hits = (0..10).map(|_| store.hit("shared", window, now));
    let results = futures::future::join_all(hits).await;
    let mut counts: Vec<u32> = results.into_iter().map(|r| r.unwrap().count).collect();
    counts.sort_unstable();
    assert_eq!(counts, (1..=10).collect::<Vec<_>>());
}

#[tokio::test]
async fn prune_drops_elapsed_keys_only() {
    let (store, _dir) = setup().await;
    let now = Utc::now();
    store.hit("short", Duration::seconds(5), now).await.unwrap();
    store.hit("long", Duration::minutes(5), now).await.unwrap();

    let removed = store.prune_expired(now + Duration::seconds(10)).await.unwrap();
    assert_eq!(removed, 1);

    // "long" survived with its count.
    let again = store.hit("long", Duration::minutes(5), now + Duration::seconds(10)).await.unwrap();
    assert_eq!(again.count, 2);
}
