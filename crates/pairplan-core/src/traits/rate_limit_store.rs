use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::error::PairResult;
use crate::types::RateLimitRecord;

/// Fixed-window counter storage, atomic per key.
#[async_trait]
pub trait RateLimitStore: Send + Sync + 'static {
    /// Count one request against `key`.
    ///
    /// A missing key, or one whose window has elapsed (`now >= window_reset_at`),
    /// starts a fresh window with `count = 1` ending at `now + window`.
    /// Otherwise the count is incremented and the window kept.
    async fn hit(&self, key: &str, window: Duration, now: DateTime<Utc>)
        -> PairResult<RateLimitRecord>;

    /// Drop every key whose window has elapsed. Returns how many were removed.
    async fn prune_expired(&self, now: DateTime<Utc>) -> PairResult<u64>;
}
