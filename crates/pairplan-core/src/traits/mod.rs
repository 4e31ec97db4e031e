pub mod linkage_store;
pub mod rate_limit_store;
pub mod usage_store;

pub use linkage_store::LinkageStore;
pub use rate_limit_store::RateLimitStore;
pub use usage_store::UsageStore;
