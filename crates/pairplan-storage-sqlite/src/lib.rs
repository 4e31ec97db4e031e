pub mod db;
pub mod linkage;
pub mod rate_limit;
pub mod usage;

pub use db::connect_pool;
pub use linkage::SqliteLinkageStore;
pub use rate_limit::SqliteRateLimitStore;
pub use usage::SqliteUsageStore;
