use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::PairResult;
use crate::types::{Couple, Invitation, InvitationStatus, NewCouple, NewInvitation, UserProfile};

#[async_trait]
pub trait LinkageStore: Send + Sync + 'static {
    // Profiles
    async fn upsert_profile(&self, profile: &UserProfile) -> PairResult<()>;
    async fn get_profile(&self, user_id: &str) -> PairResult<Option<UserProfile>>;

    // Invitations

    /// Insert a `PENDING` invitation and, in the same transaction, move every
    /// other open invitation of the same inviter to `EXPIRED`.
    ///
    /// Fails with `PairError::CodeCollision` if the code is already taken.
    async fn create_invitation(&self, input: &NewInvitation) -> PairResult<Invitation>;
    async fn code_exists(&self, code: &str) -> PairResult<bool>;
    async fn get_invitation(&self, id: &str) -> PairResult<Option<Invitation>>;
    async fn get_invitation_by_code(&self, code: &str) -> PairResult<Option<Invitation>>;
    /// The most recently created invitation of `from_user_id`, whatever its state.
    async fn latest_invitation_from(&self, from_user_id: &str) -> PairResult<Option<Invitation>>;

    /// Move an invitation to `to` only if its current status is one of `from`.
    /// `verified_by`, when given, is written in the same update.
    ///
    /// Returns `false` when no row matched, i.e. the transition lost a race.
    async fn transition_invitation(
        &self,
        id: &str,
        from: &[InvitationStatus],
        to: InvitationStatus,
        verified_by: Option<&str>,
    ) -> PairResult<bool>;

    // Couples
    async fn get_active_couple_for_user(&self, user_id: &str) -> PairResult<Option<Couple>>;

    /// Consume a `VERIFIED`, unexpired invitation and create the couple as one
    /// atomic unit.
    ///
    /// Errors: `NotFound` (no such invitation), `InvitationAlreadyConsumed`,
    /// `Expired`, `InvalidState` (wrong status, inviter or verifier),
    /// `AlreadyLinked` (either user already belongs to a couple).
    async fn create_couple_from_invitation(
        &self,
        input: &NewCouple,
        now: DateTime<Utc>,
    ) -> PairResult<Couple>;
}
