use std::sync::Arc;

use serde::Serialize;

use pairplan_core::{
    Clock, Couple, InvitationStatus, LinkageStore, NewCouple, PairError, PairResult, UserProfile,
};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoupleLinkStatus {
    pub is_linked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub couple_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partner_user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partner_profile: Option<UserProfile>,
}

impl CoupleLinkStatus {
    fn unlinked() -> Self {
        Self {
            is_linked: false,
            couple_id: None,
            partner_user_id: None,
            partner_profile: None,
        }
    }
}

/// Turns a verified invitation into a couple.
pub struct CoupleService<L: LinkageStore> {
    store: Arc<L>,
    clock: Arc<dyn Clock>,
}

impl<L: LinkageStore> CoupleService<L> {
    pub fn new(store: Arc<L>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Link `from_user_id` (the inviter) and `to_user_id` (the partner who
    /// verified the code).
    ///
    /// Everything checked during verification is checked again here, since
    /// the world may have moved on in between. The checks below only give
    /// early, readable errors; the store's transactional consume-and-create is
    /// what decides a race, so of two concurrent calls exactly one wins and
    /// the other sees `AlreadyLinked` or `InvitationAlreadyConsumed`.
    pub async fn create_couple(
        &self,
        invitation_id: &str,
        from_user_id: &str,
        to_user_id: &str,
    ) -> PairResult<Couple> {
        if from_user_id == to_user_id {
            return Err(PairError::SelfInvite);
        }

        let invitation = self
            .store
            .get_invitation(invitation_id)
            .await?
            .ok_or_else(|| PairError::NotFound("invitation".to_string()))?;

        if invitation.from_user_id != from_user_id {
            return Err(PairError::InvalidState(
                "invitation was not issued by this user".to_string(),
            ));
        }

        match invitation.status {
            InvitationStatus::Verified => {}
            InvitationStatus::Consumed => return Err(PairError::InvitationAlreadyConsumed),
            InvitationStatus::Expired => return Err(PairError::Expired),
            InvitationStatus::Pending => {
                return Err(PairError::InvalidState(
                    "invitation has not been verified".to_string(),
                ));
            }
        }

        let now = self.clock.now();
        if invitation.is_expired_at(now) {
            self.store
                .transition_invitation(
                    &invitation.id,
                    &[InvitationStatus::Pending, InvitationStatus::Verified],
                    InvitationStatus::Expired,
                    None,
                )
                .await?;
            return Err(PairError::Expired);
        }

        if invitation.verified_by.as_deref() != Some(to_user_id) {
            return Err(PairError::InvalidState(
                "invitation was verified by a different user".to_string(),
            ));
        }

        for user_id in [from_user_id, to_user_id] {
            if self.store.get_active_couple_for_user(user_id).await?.is_some() {
                tracing::debug!(user_id = %user_id, "connect rejected, user already linked");
                return Err(PairError::AlreadyLinked);
            }
        }

        let input = NewCouple {
            id: uuid::Uuid::new_v4().to_string(),
            invitation_id: invitation.id.clone(),
            from_user_id: from_user_id.to_string(),
            to_user_id: to_user_id.to_string(),
            created_at: now,
        };
        let couple = self.store.create_couple_from_invitation(&input, now).await?;

        tracing::info!(
            couple_id = %couple.id,
            invitation_id = %invitation.id,
            user1_id = %couple.user1_id,
            user2_id = %couple.user2_id,
            "couple created"
        );
        Ok(couple)
    }

    pub async fn couple_status(&self, user_id: &str) -> PairResult<CoupleLinkStatus> {
        let Some(couple) = self.store.get_active_couple_for_user(user_id).await? else {
            return Ok(CoupleLinkStatus::unlinked());
        };

        let partner_user_id = couple.partner_of(user_id).map(str::to_string);
        let partner_profile = match partner_user_id.as_deref() {
            Some(partner) => self.store.get_profile(partner).await?,
            None => None,
        };

        Ok(CoupleLinkStatus {
            is_linked: true,
            couple_id: Some(couple.id),
            partner_user_id,
            partner_profile,
        })
    }
}
