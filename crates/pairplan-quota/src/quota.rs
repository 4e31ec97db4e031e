use std::sync::Arc;

use chrono::FixedOffset;
use serde::Serialize;

use pairplan_core::{Clock, PairResult, UsagePlan, UsageRecord, UsageStore, window_keys};

/// Per-window values where `None` stands for "unlimited".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WindowLimits {
    pub daily: Option<i64>,
    pub monthly: Option<i64>,
}

impl WindowLimits {
    const UNLIMITED: WindowLimits = WindowLimits {
        daily: None,
        monthly: None,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct UsageCounts {
    pub daily: i64,
    pub monthly: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageSnapshot {
    pub can_generate: bool,
    pub remaining: WindowLimits,
    pub used: UsageCounts,
    pub limits: WindowLimits,
    pub plan: Option<String>,
    /// The plan or the usage counts could not be read; the caller is let
    /// through as if unlimited.
    pub degraded: bool,
}

impl UsageSnapshot {
    fn unlimited(plan: Option<String>, degraded: bool) -> Self {
        Self {
            can_generate: true,
            remaining: WindowLimits::UNLIMITED,
            used: UsageCounts::default(),
            limits: WindowLimits::UNLIMITED,
            plan,
            degraded,
        }
    }

    /// Quota arithmetic for a limited plan. Each window is an independent
    /// gate: exhausting either one blocks the user.
    pub fn evaluate(plan: &UsagePlan, used: UsageCounts) -> Self {
        if plan.is_unlimited() {
            return Self::unlimited(Some(plan.name.clone()), false);
        }

        let remaining = WindowLimits {
            daily: plan.daily_limit.map(|limit| (limit - used.daily).max(0)),
            monthly: plan.monthly_limit.map(|limit| (limit - used.monthly).max(0)),
        };
        let can_generate = remaining.daily.is_none_or(|r| r > 0)
            && remaining.monthly.is_none_or(|r| r > 0);

        Self {
            can_generate,
            remaining,
            used,
            limits: WindowLimits {
                daily: plan.daily_limit,
                monthly: plan.monthly_limit,
            },
            plan: Some(plan.name.clone()),
            degraded: false,
        }
    }
}

/// Soft quota for a metered action (AI plan generation).
///
/// Callers ask [`check_limit`](Self::check_limit) before acting and call
/// [`record_usage`](Self::record_usage) once the action happened. The pair is
/// not linearized: concurrent callers can each pass the check and each
/// record, overshooting the quota by at most the number of racers.
pub struct UsageQuotaEngine<U: UsageStore> {
    store: Arc<U>,
    clock: Arc<dyn Clock>,
    offset: FixedOffset,
}

impl<U: UsageStore> UsageQuotaEngine<U> {
    pub fn new(store: Arc<U>, clock: Arc<dyn Clock>, offset: FixedOffset) -> Self {
        Self {
            store,
            clock,
            offset,
        }
    }

    /// Never fails: storage trouble yields a degraded, permissive snapshot.
    pub async fn check_limit(&self, user_id: &str) -> UsageSnapshot {
        let plan = match self.store.get_active_plan(user_id).await {
            Ok(Some(plan)) => plan,
            Ok(None) => {
                tracing::warn!(user_id = %user_id, "no active subscription, allowing usage");
                return UsageSnapshot::unlimited(None, true);
            }
            Err(e) => {
                tracing::error!(user_id = %user_id, error = %e, "failed to resolve usage plan");
                return UsageSnapshot::unlimited(None, true);
            }
        };

        if plan.is_unlimited() {
            return UsageSnapshot::unlimited(Some(plan.name), false);
        }

        match self.count_usage(user_id).await {
            Ok(used) => UsageSnapshot::evaluate(&plan, used),
            Err(e) => {
                tracing::error!(user_id = %user_id, error = %e, "failed to count usage");
                UsageSnapshot::unlimited(Some(plan.name), true)
            }
        }
    }

    /// Append one usage record and report the quota as it now stands.
    pub async fn record_usage(
        &self,
        user_id: &str,
        artifact_id: Option<&str>,
    ) -> PairResult<UsageSnapshot> {
        let now = self.clock.now();
        let keys = window_keys(now, self.offset);
        let record = UsageRecord {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            plan_id: artifact_id.map(str::to_string),
            occurred_at: now,
            day_key: keys.day_key,
            month_key: keys.month_key,
        };

        self.store.insert_usage(&record).await.inspect_err(|e| {
            tracing::error!(user_id = %user_id, error = %e, "failed to record usage");
        })?;
        tracing::info!(user_id = %user_id, day_key = %record.day_key, "usage recorded");

        Ok(self.check_limit(user_id).await)
    }

    async fn count_usage(&self, user_id: &str) -> PairResult<UsageCounts> {
        let keys = window_keys(self.clock.now(), self.offset);
        let daily = self.store.count_usage_for_day(user_id, &keys.day_key).await?;
        let monthly = self
            .store
            .count_usage_for_month(user_id, &keys.month_key)
            .await?;
        Ok(UsageCounts { daily, monthly })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(daily: Option<i64>, monthly: Option<i64>) -> UsagePlan {
        UsagePlan {
            name: "free".to_string(),
            daily_limit: daily,
            monthly_limit: monthly,
        }
    }

    #[test]
    fn both_windows_with_headroom() {
        let snapshot = UsageSnapshot::evaluate(&plan(Some(3), Some(10)), UsageCounts { daily: 2, monthly: 9 });
        assert!(snapshot.can_generate);
        assert_eq!(snapshot.remaining.daily, Some(1));
        assert_eq!(snapshot.remaining.monthly, Some(1));
        assert_eq!(snapshot.limits.daily, Some(3));
        assert_eq!(snapshot.limits.monthly, Some(10));
    }

    #[test]
    fn exhausted_daily_blocks_despite_monthly_headroom() {
        let snapshot = UsageSnapshot::evaluate(&plan(Some(3), Some(10)), UsageCounts { daily: 3, monthly: 3 });
        assert!(!snapshot.can_generate);
        assert_eq!(snapshot.remaining.daily, Some(0));
        assert_eq!(snapshot.remaining.monthly, Some(7));
    }

    #[test]
    fn exhausted_monthly_blocks_despite_daily_headroom() {
        let snapshot = UsageSnapshot::evaluate(&plan(Some(3), Some(10)), UsageCounts { daily: 0, monthly: 10 });
        assert!(!snapshot.can_generate);
        assert_eq!(snapshot.remaining.daily, Some(3));
    }

    #[test]
    fn overshoot_clamps_remaining_to_zero() {
        let snapshot = UsageSnapshot::evaluate(&plan(Some(3), Some(10)), UsageCounts { daily: 5, monthly: 12 });
        assert_eq!(snapshot.remaining.daily, Some(0));
        assert_eq!(snapshot.remaining.monthly, Some(0));
        assert_eq!(snapshot.used.daily, 5);
    }

    #[test]
    fn single_unlimited_window_is_ignored() {
        let snapshot = UsageSnapshot::evaluate(&plan(None, Some(10)), UsageCounts { daily: 50, monthly: 4 });
        assert!(snapshot.can_generate);
        assert_eq!(snapshot.remaining.daily, None);
        assert_eq!(snapshot.remaining.monthly, Some(6));
    }

    #[test]
    fn fully_unlimited_plan_reports_zero_usage() {
        let snapshot = UsageSnapshot::evaluate(&plan(None, None), UsageCounts { daily: 100, monthly: 1000 });
        assert!(snapshot.can_generate);
        assert_eq!(snapshot.used, UsageCounts::default());
        assert_eq!(snapshot.remaining, WindowLimits::UNLIMITED);
        assert!(!snapshot.degraded);
    }
}
