pub mod clock;
pub mod config;
pub mod error;
pub mod traits;
pub mod types;
pub mod window;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::AppConfig;
pub use error::{PairError, PairResult};
pub use traits::{LinkageStore, RateLimitStore, UsageStore};
pub use types::{
    Couple, CoupleStatus, Invitation, InvitationStatus, NewCouple, NewInvitation,
    RateLimitRecord, UsagePlan, UsageRecord, UserProfile,
};
pub use window::{WindowKeys, window_keys};
