use async_trait::async_trait;

use crate::error::PairResult;
use crate::types::{UsagePlan, UsageRecord};

#[async_trait]
pub trait UsageStore: Send + Sync + 'static {
    // Plans and subscriptions
    async fn upsert_plan(&self, plan: &UsagePlan) -> PairResult<()>;
    async fn set_subscription(&self, user_id: &str, plan_name: &str) -> PairResult<()>;
    /// The plan of the user's active subscription, if one can be resolved.
    async fn get_active_plan(&self, user_id: &str) -> PairResult<Option<UsagePlan>>;

    // Usage records (append-only)
    async fn insert_usage(&self, record: &UsageRecord) -> PairResult<()>;
    async fn count_usage_for_day(&self, user_id: &str, day_key: &str) -> PairResult<i64>;
    async fn count_usage_for_month(&self, user_id: &str, month_key: &str) -> PairResult<i64>;
    async fn list_usage(&self, user_id: &str, limit: usize) -> PairResult<Vec<UsageRecord>>;
}
