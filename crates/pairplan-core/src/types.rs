use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvitationStatus {
    Pending,
    Verified,
    Consumed,
    Expired,
}

impl InvitationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvitationStatus::Pending => "PENDING",
            InvitationStatus::Verified => "VERIFIED",
            InvitationStatus::Consumed => "CONSUMED",
            InvitationStatus::Expired => "EXPIRED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(InvitationStatus::Pending),
            "VERIFIED" => Some(InvitationStatus::Verified),
            "CONSUMED" => Some(InvitationStatus::Consumed),
            "EXPIRED" => Some(InvitationStatus::Expired),
            _ => None,
        }
    }

    /// Whether an invitation in this state can still lead to a couple.
    pub fn is_open(&self) -> bool {
        matches!(self, InvitationStatus::Pending | InvitationStatus::Verified)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invitation {
    pub id: String,
    pub code: String,
    pub from_user_id: String,
    pub status: InvitationStatus,
    /// The partner who most recently verified the code.
    pub verified_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Invitation {
    /// Expiry is strict: an invitation is still honorable at exactly `expires_at`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

#[derive(Debug, Clone)]
pub struct NewInvitation {
    pub id: String,
    pub code: String,
    pub from_user_id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CoupleStatus {
    Active,
}

impl CoupleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CoupleStatus::Active => "ACTIVE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ACTIVE" => Some(CoupleStatus::Active),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Couple {
    pub id: String,
    pub user1_id: String,
    pub user2_id: String,
    pub status: CoupleStatus,
    pub created_at: DateTime<Utc>,
}

impl Couple {
    pub fn partner_of(&self, user_id: &str) -> Option<&str> {
        if self.user1_id == user_id {
            Some(&self.user2_id)
        } else if self.user2_id == user_id {
            Some(&self.user1_id)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewCouple {
    pub id: String,
    pub invitation_id: String,
    pub from_user_id: String,
    pub to_user_id: String,
    pub created_at: DateTime<Utc>,
}

/// Public profile summary shown to a prospective or linked partner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub user_id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
}

/// Subscription tier limits. `None` means unlimited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsagePlan {
    pub name: String,
    pub daily_limit: Option<i64>,
    pub monthly_limit: Option<i64>,
}

impl UsagePlan {
    pub fn is_unlimited(&self) -> bool {
        self.daily_limit.is_none() && self.monthly_limit.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageRecord {
    pub id: String,
    pub user_id: String,
    pub plan_id: Option<String>,
    pub occurred_at: DateTime<Utc>,
    pub day_key: String,
    pub month_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitRecord {
    pub count: u32,
    pub window_reset_at: DateTime<Utc>,
}
