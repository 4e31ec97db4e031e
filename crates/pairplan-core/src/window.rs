//! Calendar window keys for usage quotas.
//!
//! Every user shares one canonical zone: a day rolls over at local midnight
//! of the configured offset, and a month on the first of the month there,
//! regardless of where the user actually is.

use chrono::{DateTime, Datelike, FixedOffset, Utc};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowKeys {
    /// `YYYY-MM-DD`
    pub day_key: String,
    /// `YYYY-MM-01`
    pub month_key: String,
}

pub fn window_keys(now: DateTime<Utc>, offset: FixedOffset) -> WindowKeys {
    let local = now.with_timezone(&offset).date_naive();
    WindowKeys {
        day_key: local.format("%Y-%m-%d").to_string(),
        month_key: format!("{:04}-{:02}-01", local.year(), local.month()),
    }
}
