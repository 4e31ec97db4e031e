use std::sync::Arc;
use tempfile::TempDir;

use pairplan_core::{LinkageStore, UserProfile};
use pairplan_storage_sqlite::{SqliteLinkageStore, SqliteUsageStore, connect_pool};

pub struct TestStores {
    pub linkage_store: Arc<SqliteLinkageStore>,
    pub usage_store: Arc<SqliteUsageStore>,
    /// Hold the TempDir to keep it alive for the test's duration.
    pub _tempdir: TempDir,
}

impl TestStores {
    pub async fn seed_profile(&self, user_id: &str, name: &str) {
        self.linkage_store
            .upsert_profile(&UserProfile {
                user_id: user_id.to_string(),
                name: Some(name.to_string()),
                email: Some(format!("{user_id}@example.com")),
                avatar_url: None,
            })
            .await
            .expect("failed to seed profile");
    }
}

/// Create a fresh set of test stores backed by a tempdir.
///
/// All stores share one pool on the same file-backed database.
pub async fn create_test_stores() -> TestStores {
    let tempdir = TempDir::new().expect("failed to create tempdir");
    let db_path = tempdir.path().join("test.db");
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());

    let pool = connect_pool(&db_url)
        .await
        .expect("failed to connect test database");

    TestStores {
        linkage_store: Arc::new(SqliteLinkageStore::from_pool(pool.clone())),
        usage_store: Arc::new(SqliteUsageStore::from_pool(pool)),
        _tempdir: tempdir,
    }
}
