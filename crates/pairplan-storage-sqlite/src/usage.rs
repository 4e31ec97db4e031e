use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use pairplan_core::{PairResult, UsagePlan, UsageRecord, UsageStore};

use crate::db::{connect_pool, format_datetime, parse_datetime, storage_err};

#[derive(Clone)]
pub struct SqliteUsageStore {
    pool: SqlitePool,
}

impl SqliteUsageStore {
    pub async fn connect(url: &str) -> PairResult<Self> {
        Ok(Self::from_pool(connect_pool(url).await?))
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn count_where(&self, column: &str, user_id: &str, key: &str) -> PairResult<i64> {
        let sql = format!("SELECT COUNT(*) AS n FROM usage_record WHERE user_id = ? AND {column} = ?");
        let row = sqlx::query(&sql)
            .bind(user_id)
            .bind(key)
            .fetch_one(&self.pool)
            .await
            .map_err(storage_err)?;
        row.try_get("n").map_err(storage_err)
    }
}

#[async_trait]
impl UsageStore for SqliteUsageStore {
    async fn upsert_plan(&self, plan: &UsagePlan) -> PairResult<()> {
        sqlx::query(
            r#"
            INSERT INTO usage_plan (name, daily_limit, monthly_limit) VALUES (?, ?, ?)
            ON CONFLICT (name) DO UPDATE SET
                daily_limit = excluded.daily_limit,
                monthly_limit = excluded.monthly_limit
            "#,
        )
        .bind(&plan.name)
        .bind(plan.daily_limit)
        .bind(plan.monthly_limit)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(())
    }

    async fn set_subscription(&self, user_id: &str, plan_name: &str) -> PairResult<()> {
        sqlx::query(
            r#"
            INSERT INTO subscription (user_id, plan_name, status) VALUES (?, ?, 'ACTIVE')
            ON CONFLICT (user_id) DO UPDATE SET
                plan_name = excluded.plan_name,
                status = 'ACTIVE'
            "#,
        )
        .bind(user_id)
        .bind(plan_name)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(())
    }

    async fn get_active_plan(&self, user_id: &str) -> PairResult<Option<UsagePlan>> {
        let row = sqlx::query(
            r#"
            SELECT p.name, p.daily_limit, p.monthly_limit
            FROM subscription s
            INNER JOIN usage_plan p ON p.name = s.plan_name
            WHERE s.user_id = ? AND s.status = 'ACTIVE'
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        match row {
            Some(ref r) => Ok(Some(UsagePlan {
                name: r.try_get("name").map_err(storage_err)?,
                daily_limit: r.try_get("daily_limit").map_err(storage_err)?,
                monthly_limit: r.try_get("monthly_limit").map_err(storage_err)?,
            })),
            None => Ok(None),
        }
    }

    async fn insert_usage(&self, record: &UsageRecord) -> PairResult<()> {
        sqlx::query(
            "INSERT INTO usage_record (id, user_id, plan_id, occurred_at, day_key, month_key) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.id)
        .bind(&record.user_id)
        .bind(&record.plan_id)
        .bind(format_datetime(&record.occurred_at))
        .bind(&record.day_key)
        .bind(&record.month_key)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(())
    }

    async fn count_usage_for_day(&self, user_id: &str, day_key: &str) -> PairResult<i64> {
        self.count_where("day_key", user_id, day_key).await
    }

    async fn count_usage_for_month(&self, user_id: &str, month_key: &str) -> PairResult<i64> {
        self.count_where("month_key", user_id, month_key).await
    }

    async fn list_usage(&self, user_id: &str, limit: usize) -> PairResult<Vec<UsageRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, plan_id, occurred_at, day_key, month_key
            FROM usage_record
            WHERE user_id = ?
            ORDER BY occurred_at DESC, rowid DESC
            LIMIT ?
            "#,
        )
        .bind(user_id)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        rows.iter()
            .map(|r| {
                let occurred_at: String = r.try_get("occurred_at").map_err(storage_err)?;
                Ok(UsageRecord {
                    id: r.try_get("id").map_err(storage_err)?,
                    user_id: r.try_get("user_id").map_err(storage_err)?,
                    plan_id: r.try_get("plan_id").map_err(storage_err)?,
                    occurred_at: parse_datetime(&occurred_at)?,
                    day_key: r.try_get("day_key").map_err(storage_err)?,
                    month_key: r.try_get("month_key").map_err(storage_err)?,
                })
            })
            .collect()
    }
}
