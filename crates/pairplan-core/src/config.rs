use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use chrono::{Offset, Utc};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub port: u16,
    pub jwt: JwtConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub invitation: InvitationConfig,
    #[serde(default)]
    pub quota: QuotaConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub access_secret: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InvitationConfig {
    /// Lifetime of a freshly created invitation code.
    #[serde(default = "default_invitation_ttl_hours")]
    pub ttl_hours: i64,
    /// How many random codes to try before giving up on a collision streak.
    #[serde(default = "default_max_code_attempts")]
    pub max_code_attempts: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuotaConfig {
    /// Offset of the canonical zone in which daily and monthly quota windows
    /// roll over, in minutes east of UTC.
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateLimitBackend {
    /// Per-process counters; each instance enforces its own window.
    Memory,
    /// Counters shared through the database.
    Sqlite,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_rate_limit_backend")]
    pub backend: RateLimitBackend,
    /// Upper bound on keys held by the in-memory backend.
    #[serde(default = "default_memory_capacity")]
    pub memory_capacity: usize,
    #[serde(default = "default_password_reset_max_requests")]
    pub password_reset_max_requests: u32,
    #[serde(default = "default_password_reset_window_secs")]
    pub password_reset_window_secs: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub json: bool,
}

fn default_invitation_ttl_hours() -> i64 {
    24
}

fn default_max_code_attempts() -> u32 {
    5
}

fn default_rate_limit_backend() -> RateLimitBackend {
    RateLimitBackend::Memory
}

fn default_memory_capacity() -> usize {
    10_000
}

fn default_password_reset_max_requests() -> u32 {
    3
}

fn default_password_reset_window_secs() -> i64 {
    5 * 60
}

impl Default for InvitationConfig {
    fn default() -> Self {
        Self {
            ttl_hours: default_invitation_ttl_hours(),
            max_code_attempts: default_max_code_attempts(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            backend: default_rate_limit_backend(),
            memory_capacity: default_memory_capacity(),
            password_reset_max_requests: default_password_reset_max_requests(),
            password_reset_window_secs: default_password_reset_window_secs(),
        }
    }
}

const MAX_INVITATION_TTL_HOURS: i64 = 24 * 365;
const MAX_PASSWORD_RESET_WINDOW_SECS: i64 = 7 * 24 * 60 * 60;

impl InvitationConfig {
    /// Values outside `1..=MAX_INVITATION_TTL_HOURS` are rejected by [`AppConfig::load`].
    pub fn ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.ttl_hours.clamp(1, MAX_INVITATION_TTL_HOURS))
    }

    fn validate(&self) -> Result<(), String> {
        if !(1..=MAX_INVITATION_TTL_HOURS).contains(&self.ttl_hours) {
            return Err(format!(
                "invitation.ttl_hours must be between 1 and {MAX_INVITATION_TTL_HOURS}, got {}",
                self.ttl_hours
            ));
        }
        Ok(())
    }
}

impl QuotaConfig {
    /// The canonical zone, or `None` when the offset is not a valid UTC offset.
    pub fn try_offset(&self) -> Option<chrono::FixedOffset> {
        self.utc_offset_minutes
            .checked_mul(60)
            .and_then(chrono::FixedOffset::east_opt)
    }

    /// The canonical zone as a chrono offset. [`AppConfig::load`] rejects
    /// offsets [`Self::try_offset`] cannot represent.
    pub fn offset(&self) -> chrono::FixedOffset {
        self.try_offset().unwrap_or(Utc.fix())
    }

    fn validate(&self) -> Result<(), String> {
        match self.try_offset() {
            Some(_) => Ok(()),
            None => Err(format!(
                "quota.utc_offset_minutes must lie strictly between -1440 and 1440, got {}",
                self.utc_offset_minutes
            )),
        }
    }
}

impl RateLimitConfig {
    /// Values outside `1..=MAX_PASSWORD_RESET_WINDOW_SECS` are rejected by [`AppConfig::load`].
    pub fn password_reset_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(
            self.password_reset_window_secs
                .clamp(1, MAX_PASSWORD_RESET_WINDOW_SECS),
        )
    }

    fn validate(&self) -> Result<(), String> {
        if !(1..=MAX_PASSWORD_RESET_WINDOW_SECS).contains(&self.password_reset_window_secs) {
            return Err(format!(
                "rate_limit.password_reset_window_secs must be between 1 and {MAX_PASSWORD_RESET_WINDOW_SECS}, got {}",
                self.password_reset_window_secs
            ));
        }
        Ok(())
    }
}

impl AppConfig {
    pub fn load(path: &str) -> Result<Self, figment::Error> {
        let config: Self = Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("PAIRPLAN_").split("__"))
            .extract()?;
        config.validate().map_err(figment::Error::from)?;
        Ok(config)
    }

    /// Range checks serde cannot express.
    pub fn validate(&self) -> Result<(), String> {
        self.invitation.validate()?;
        self.quota.validate()?;
        self.rate_limit.validate()
    }
}
