use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::{Row, SqlitePool};

use pairplan_core::{PairError, PairResult, RateLimitRecord, RateLimitStore};

use crate::db::{connect_pool, format_datetime, parse_datetime, storage_err};

/// Rate-limit counters shared by every instance pointed at the same database.
#[derive(Clone)]
pub struct SqliteRateLimitStore {
    pool: SqlitePool,
}

impl SqliteRateLimitStore {
    pub async fn connect(url: &str) -> PairResult<Self> {
        Ok(Self::from_pool(connect_pool(url).await?))
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RateLimitStore for SqliteRateLimitStore {
    async fn hit(
        &self,
        key: &str,
        window: Duration,
        now: DateTime<Utc>,
    ) -> PairResult<RateLimitRecord> {
        // Single statement, so the read-modify-write is atomic per key.
        let row = sqlx::query(
            r#"
            INSERT INTO rate_limit (key, count, window_reset_at) VALUES (?1, 1, ?3)
            ON CONFLICT (key) DO UPDATE SET
                count = CASE WHEN rate_limit.window_reset_at <= ?2 THEN 1 ELSE rate_limit.count + 1 END,
                window_reset_at = CASE WHEN rate_limit.window_reset_at <= ?2 THEN ?3 ELSE rate_limit.window_reset_at END
            RETURNING count, window_reset_at
            "#,
        )
        .bind(key)
        .bind(format_datetime(&now))
        .bind(format_datetime(&(now + window)))
        .fetch_one(&self.pool)
        .await
        .map_err(storage_err)?;

        let count: i64 = row.try_get("count").map_err(storage_err)?;
        let window_reset_at: String = row.try_get("window_reset_at").map_err(storage_err)?;

        Ok(RateLimitRecord {
            count: u32::try_from(count)
                .map_err(|_| PairError::Storage(format!("rate limit count out of range: {count}")))?,
            window_reset_at: parse_datetime(&window_reset_at)?,
        })
    }

    async fn prune_expired(&self, now: DateTime<Utc>) -> PairResult<u64> {
        let result = sqlx::query("DELETE FROM rate_limit WHERE window_reset_at <= ?")
            .bind(format_datetime(&now))
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(result.rows_affected())
    }
}
