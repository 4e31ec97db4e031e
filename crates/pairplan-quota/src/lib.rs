//! Usage metering: calendar-window quotas and fixed-window request throttling.

pub mod quota;
pub mod rate_limit;

pub use quota::{UsageCounts, UsageQuotaEngine, UsageSnapshot, WindowLimits};
pub use rate_limit::{FixedWindowLimiter, MemoryRateLimitStore, RateDecision};
