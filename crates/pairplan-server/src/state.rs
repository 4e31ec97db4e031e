use std::sync::Arc;

use pairplan_core::traits::*;
use pairplan_core::{AppConfig, Clock};
use pairplan_linkage::{CoupleService, InvitationService};
use pairplan_quota::{FixedWindowLimiter, UsageQuotaEngine};

pub struct AppState<L, U>
where
    L: LinkageStore,
    U: UsageStore,
{
    pub linkage_store: Arc<L>,
    pub usage_store: Arc<U>,
    pub config: Arc<AppConfig>,
    pub clock: Arc<dyn Clock>,
    pub rate_limiter: FixedWindowLimiter,
}

// Manual impl: the stores sit behind `Arc`, so they need not be `Clone` themselves.
impl<L: LinkageStore, U: UsageStore> Clone for AppState<L, U> {
    fn clone(&self) -> Self {
        Self {
            linkage_store: self.linkage_store.clone(),
            usage_store: self.usage_store.clone(),
            config: self.config.clone(),
            clock: self.clock.clone(),
            rate_limiter: self.rate_limiter.clone(),
        }
    }
}

impl<L: LinkageStore, U: UsageStore> AppState<L, U> {
    pub fn invitations(&self) -> InvitationService<L> {
        InvitationService::new(
            self.linkage_store.clone(),
            self.clock.clone(),
            &self.config.invitation,
        )
    }

    pub fn couples(&self) -> CoupleService<L> {
        CoupleService::new(self.linkage_store.clone(), self.clock.clone())
    }

    pub fn quota(&self) -> UsageQuotaEngine<U> {
        UsageQuotaEngine::new(
            self.usage_store.clone(),
            self.clock.clone(),
            self.config.quota.offset(),
        )
    }
}
