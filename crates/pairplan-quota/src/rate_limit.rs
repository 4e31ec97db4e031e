use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use pairplan_core::{Clock, PairError, PairResult, RateLimitRecord, RateLimitStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateDecision {
    Allowed {
        remaining: u32,
        window_reset_at: DateTime<Utc>,
    },
    Throttled {
        retry_after: Duration,
    },
}

impl RateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateDecision::Allowed { .. })
    }
}

/// "N requests per window per key". The window starts at a key's first
/// request and restarts on the first request after it has elapsed.
#[derive(Clone)]
pub struct FixedWindowLimiter {
    store: Arc<dyn RateLimitStore>,
    clock: Arc<dyn Clock>,
}

impl FixedWindowLimiter {
    pub fn new(store: Arc<dyn RateLimitStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn check_and_increment(
        &self,
        key: &str,
        max_requests: u32,
        window: Duration,
    ) -> PairResult<RateDecision> {
        let now = self.clock.now();
        let record = self.store.hit(key, window, now).await?;

        if record.count > max_requests {
            let retry_after = (record.window_reset_at - now).max(Duration::zero());
            tracing::debug!(key = %key, count = record.count, "rate limit exceeded");
            return Ok(RateDecision::Throttled { retry_after });
        }

        Ok(RateDecision::Allowed {
            remaining: max_requests - record.count,
            window_reset_at: record.window_reset_at,
        })
    }

    /// Like [`check_and_increment`](Self::check_and_increment) but turns a
    /// throttled decision into `PairError::RateLimited`.
    pub async fn enforce(&self, key: &str, max_requests: u32, window: Duration) -> PairResult<()> {
        match self.check_and_increment(key, max_requests, window).await? {
            RateDecision::Allowed { .. } => Ok(()),
            RateDecision::Throttled { retry_after } => Err(PairError::RateLimited { retry_after }),
        }
    }
}

/// Process-local counters. Each instance of the service enforces its own
/// window, so the effective global limit is `max_requests * instances`.
///
/// The map is bounded: at capacity, elapsed windows are evicted first, then
/// the live key with the fewest hits (soonest window on a tie). Keys that are
/// close to or over their limit therefore outlive a flood of fresh keys.
pub struct MemoryRateLimitStore {
    entries: Mutex<HashMap<String, RateLimitRecord>>,
    capacity: usize,
}

impl MemoryRateLimitStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn make_room(entries: &mut HashMap<String, RateLimitRecord>, capacity: usize, now: DateTime<Utc>) {
        if entries.len() < capacity {
            return;
        }
        entries.retain(|_, record| record.window_reset_at > now);
        while entries.len() >= capacity {
            let Some(oldest) = entries
                .iter()
                .min_by_key(|(_, record)| (record.count, record.window_reset_at))
                .map(|(key, _)| key.clone())
            else {
                break;
            };
            entries.remove(&oldest);
        }
    }
}

#[async_trait]
impl RateLimitStore for MemoryRateLimitStore {
    async fn hit(
        &self,
        key: &str,
        window: Duration,
        now: DateTime<Utc>,
    ) -> PairResult<RateLimitRecord> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(record) = entries.get_mut(key) {
            if now >= record.window_reset_at {
                record.count = 1;
                record.window_reset_at = now + window;
            } else {
                record.count = record.count.saturating_add(1);
            }
            return Ok(record.clone());
        }

        Self::make_room(&mut entries, self.capacity, now);
        let record = RateLimitRecord {
            count: 1,
            window_reset_at: now + window,
        };
        entries.insert(key.to_string(), record.clone());
        Ok(record)
    }

    async fn prune_expired(&self, now: DateTime<Utc>) -> PairResult<u64> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let before = entries.len();
        entries.retain(|_, record| record.window_reset_at > now);
        Ok((before - entries.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pairplan_core::ManualClock;

    fn limiter(capacity: usize) -> (FixedWindowLimiter, Arc<ManualClock>, Arc<MemoryRateLimitStore>) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let store = Arc::new(MemoryRateLimitStore::new(capacity));
        let limiter = FixedWindowLimiter::new(store.clone(), clock.clone());
        (limiter, clock, store)
    }

    #[tokio::test]
    async fn fourth_request_in_window_is_throttled() {
        let (limiter, clock, _) = limiter(100);
        let window = Duration::minutes(5);

        for expected_remaining in [2, 1, 0] {
            let decision = limiter.check_and_increment("ip|a@x.com", 3, window).await.unwrap();
            match decision {
                RateDecision::Allowed { remaining, .. } => assert_eq!(remaining, expected_remaining),
                other => panic!("expected allowed, got {other:?}"),
            }
            clock.advance(Duration::seconds(10));
        }

        let decision = limiter.check_and_increment("ip|a@x.com", 3, window).await.unwrap();
        // 30s have passed since the window opened.
        assert_eq!(
            decision,
            RateDecision::Throttled {
                retry_after: Duration::seconds(270)
            }
        );
    }

    #[tokio::test]
    async fn request_after_reset_opens_fresh_window() {
        let (limiter, clock, _) = limiter(100);
        let window = Duration::minutes(5);
        for _ in 0..4 {
            limiter.check_and_increment("k", 3, window).await.unwrap();
        }

        clock.advance(Duration::minutes(5));
        let decision = limiter.check_and_increment("k", 3, window).await.unwrap();
        match decision {
            RateDecision::Allowed { remaining, window_reset_at } => {
                assert_eq!(remaining, 2);
                assert_eq!(window_reset_at, clock.now() + window);
            }
            other => panic!("expected allowed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn keys_are_independent() {
        let (limiter, _, _) = limiter(100);
        let window = Duration::minutes(5);
        for _ in 0..3 {
            assert!(limiter.check_and_increment("a", 3, window).await.unwrap().is_allowed());
        }
        assert!(!limiter.check_and_increment("a", 3, window).await.unwrap().is_allowed());
        assert!(limiter.check_and_increment("b", 3, window).await.unwrap().is_allowed());
    }

    #[tokio::test]
    async fn enforce_reports_retry_after() {
        let (limiter, _, _) = limiter(100);
        let window = Duration::minutes(5);
        limiter.enforce("k", 1, window).await.unwrap();
        let err = limiter.enforce("k", 1, window).await.unwrap_err();
        assert!(matches!(err, PairError::RateLimited { retry_after } if retry_after == window));
    }

    #[tokio::test]
    async fn capacity_evicts_elapsed_windows_first() {
        let (limiter, clock, store) = limiter(2);
        limiter.check_and_increment("old", 3, Duration::seconds(10)).await.unwrap();
        limiter.check_and_increment("live", 3, Duration::minutes(5)).await.unwrap();
        clock.advance(Duration::seconds(30));

        limiter.check_and_increment("new", 3, Duration::minutes(5)).await.unwrap();
        assert_eq!(store.len(), 2);

        // "live" kept its count, so this is its second hit.
        let decision = limiter.check_and_increment("live", 3, Duration::minutes(5)).await.unwrap();
        assert!(matches!(decision, RateDecision::Allowed { remaining: 1, .. }));
    }

    #[tokio::test]
    async fn capacity_evicts_soonest_window_when_all_live() {
        let (limiter, _, store) = limiter(2);
        limiter.check_and_increment("short", 3, Duration::minutes(1)).await.unwrap();
        limiter.check_and_increment("long", 3, Duration::minutes(10)).await.unwrap();
        limiter.check_and_increment("third", 3, Duration::minutes(5)).await.unwrap();
        assert_eq!(store.len(), 2);

        // "short" was evicted, so it starts over.
        let decision = limiter.check_and_increment("short", 3, Duration::minutes(1)).await.unwrap();
        assert!(matches!(decision, RateDecision::Allowed { remaining: 2, .. }));
    }

    #[tokio::test]
    async fn flood_of_fresh_keys_does_not_reset_a_throttled_key() {
        let (limiter, _, store) = limiter(2);
        let window = Duration::minutes(5);
        for _ in 0..3 {
            limiter.check_and_increment("victim", 3, window).await.unwrap();
        }

        for i in 0..50 {
            limiter.check_and_increment(&format!("flood-{i}"), 3, window).await.unwrap();
        }
        assert_eq!(store.len(), 2);

        let decision = limiter.check_and_increment("victim", 3, window).await.unwrap();
        assert!(!decision.is_allowed());
    }

    #[tokio::test]
    async fn prune_removes_only_elapsed_windows() {
        let store = MemoryRateLimitStore::new(10);
        let now = Utc::now();
        store.hit("a", Duration::seconds(5), now).await.unwrap();
        store.hit("b", Duration::minutes(5), now).await.unwrap();

        let removed = store.prune_expired(now + Duration::seconds(5)).await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.len(), 1);
    }
}
