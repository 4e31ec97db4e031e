use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use pairplan_core::config::InvitationConfig;
use pairplan_core::{
    Clock, Invitation, InvitationStatus, LinkageStore, NewInvitation, PairError, PairResult,
    UserProfile,
};
use pairplan_crypto::{generate_invite_code, normalize_invite_code};

const OPEN: &[InvitationStatus] = &[InvitationStatus::Pending, InvitationStatus::Verified];

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedInvitation {
    pub invitation_id: String,
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedInvitation {
    pub invitation_id: String,
    pub from_user_id: String,
    pub from_user_profile: Option<UserProfile>,
    pub expires_at: DateTime<Utc>,
}

/// Issues invitation codes and moves them through
/// `PENDING -> VERIFIED`, expiring them lazily when they are looked at.
pub struct InvitationService<L: LinkageStore> {
    store: Arc<L>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    max_code_attempts: u32,
}

impl<L: LinkageStore> InvitationService<L> {
    pub fn new(store: Arc<L>, clock: Arc<dyn Clock>, config: &InvitationConfig) -> Self {
        Self {
            store,
            clock,
            ttl: config.ttl(),
            max_code_attempts: config.max_code_attempts.max(1),
        }
    }

    /// Create a fresh invitation for `from_user_id`. Any invitation the user
    /// still had open is superseded and can no longer be verified.
    pub async fn create_invitation(&self, from_user_id: &str) -> PairResult<CreatedInvitation> {
        for attempt in 1..=self.max_code_attempts {
            let code = generate_invite_code();
            if self.store.code_exists(&code).await? {
                tracing::debug!(attempt, "invitation code collision, retrying");
                continue;
            }

            let now = self.clock.now();
            let input = NewInvitation {
                id: uuid::Uuid::new_v4().to_string(),
                code,
                from_user_id: from_user_id.to_string(),
                created_at: now,
                expires_at: now + self.ttl,
            };

            match self.store.create_invitation(&input).await {
                Ok(invitation) => {
                    tracing::info!(
                        invitation_id = %invitation.id,
                        from_user_id = %from_user_id,
                        expires_at = %invitation.expires_at,
                        "invitation created"
                    );
                    return Ok(CreatedInvitation {
                        invitation_id: invitation.id,
                        code: invitation.code,
                        expires_at: invitation.expires_at,
                    });
                }
                Err(PairError::CodeCollision) => {
                    tracing::debug!(attempt, "invitation code taken at insert, retrying");
                }
                Err(e) => return Err(e),
            }
        }

        Err(PairError::Internal(format!(
            "could not allocate a unique invitation code after {} attempts",
            self.max_code_attempts
        )))
    }

    /// Check a code presented by a prospective partner and mark the
    /// invitation `VERIFIED` on their behalf.
    pub async fn verify_invitation(
        &self,
        code: &str,
        verifying_user_id: &str,
    ) -> PairResult<VerifiedInvitation> {
        let code = normalize_invite_code(code);
        let invitation = self
            .store
            .get_invitation_by_code(&code)
            .await?
            .ok_or_else(|| PairError::NotFound("invitation".to_string()))?;

        self.ensure_honorable(&invitation).await?;

        if invitation.from_user_id == verifying_user_id {
            return Err(PairError::SelfInvite);
        }

        for user_id in [invitation.from_user_id.as_str(), verifying_user_id] {
            if self.store.get_active_couple_for_user(user_id).await?.is_some() {
                tracing::debug!(user_id = %user_id, "verify rejected, user already linked");
                return Err(PairError::AlreadyLinked);
            }
        }

        // Once verified, only the same partner may present the code again.
        let from: &[InvitationStatus] = match invitation.verified_by.as_deref() {
            Some(verifier) if invitation.status == InvitationStatus::Verified => {
                if verifier != verifying_user_id {
                    tracing::debug!(
                        invitation_id = %invitation.id,
                        "verify rejected, already verified by another user"
                    );
                    return Err(PairError::InvalidState(
                        "invitation was already verified by another user".to_string(),
                    ));
                }
                &[InvitationStatus::Verified]
            }
            _ => &[InvitationStatus::Pending],
        };

        let moved = self
            .store
            .transition_invitation(
                &invitation.id,
                from,
                InvitationStatus::Verified,
                Some(verifying_user_id),
            )
            .await?;
        if !moved {
            return Err(self.classify_lost_transition(&invitation.id).await);
        }

        let from_user_profile = self.store.get_profile(&invitation.from_user_id).await?;

        tracing::info!(
            invitation_id = %invitation.id,
            from_user_id = %invitation.from_user_id,
            verified_by = %verifying_user_id,
            "invitation verified"
        );

        Ok(VerifiedInvitation {
            invitation_id: invitation.id,
            from_user_id: invitation.from_user_id,
            from_user_profile,
            expires_at: invitation.expires_at,
        })
    }

    /// The inviter's newest invitation, if it can still be verified or connected.
    pub async fn current_invitation(&self, from_user_id: &str) -> PairResult<Option<Invitation>> {
        let Some(invitation) = self.store.latest_invitation_from(from_user_id).await? else {
            return Ok(None);
        };
        if !invitation.status.is_open() {
            return Ok(None);
        }
        if invitation.is_expired_at(self.clock.now()) {
            self.expire(&invitation).await?;
            return Ok(None);
        }
        Ok(Some(invitation))
    }

    /// Reject consumed or expired invitations, expiring stale open ones on the way.
    async fn ensure_honorable(&self, invitation: &Invitation) -> PairResult<()> {
        match invitation.status {
            InvitationStatus::Consumed => return Err(PairError::InvitationAlreadyConsumed),
            InvitationStatus::Expired => return Err(PairError::Expired),
            InvitationStatus::Pending | InvitationStatus::Verified => {}
        }
        if invitation.is_expired_at(self.clock.now()) {
            self.expire(invitation).await?;
            return Err(PairError::Expired);
        }
        Ok(())
    }

    async fn expire(&self, invitation: &Invitation) -> PairResult<()> {
        let expired = self
            .store
            .transition_invitation(&invitation.id, OPEN, InvitationStatus::Expired, None)
            .await?;
        if expired {
            tracing::info!(invitation_id = %invitation.id, "invitation expired");
        }
        Ok(())
    }

    async fn classify_lost_transition(&self, invitation_id: &str) -> PairError {
        match self.store.get_invitation(invitation_id).await {
            Ok(Some(current)) => match current.status {
                InvitationStatus::Consumed => PairError::InvitationAlreadyConsumed,
                InvitationStatus::Expired => PairError::Expired,
                status => PairError::InvalidState(format!(
                    "invitation changed concurrently (now {})",
                    status.as_str()
                )),
            },
            Ok(None) => PairError::NotFound("invitation".to_string()),
            Err(e) => e,
        }
    }
}
