use axum::Json;
use axum::extract::State;
use serde::Deserialize;
use serde_json::{Value, json};

use pairplan_core::traits::*;
use pairplan_core::{Invitation, PairError};
use pairplan_linkage::{CreatedInvitation, VerifiedInvitation};

use crate::auth::AuthenticatedUser;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct VerifyInvitationRequest {
    pub code: String,
}

pub async fn create_invitation<L, U>(
    State(state): State<AppState<L, U>>,
    user: AuthenticatedUser,
) -> Result<Json<CreatedInvitation>, ApiError>
where
    L: LinkageStore,
    U: UsageStore,
{
    let created = state.invitations().create_invitation(&user.user_id).await?;
    Ok(Json(created))
}

pub async fn current_invitation<L, U>(
    State(state): State<AppState<L, U>>,
    user: AuthenticatedUser,
) -> Result<Json<Value>, ApiError>
where
    L: LinkageStore,
    U: UsageStore,
{
    let current = state.invitations().current_invitation(&user.user_id).await?;
    Ok(Json(json!({
        "invitation": current.as_ref().map(invitation_view),
    })))
}

pub async fn verify_invitation<L, U>(
    State(state): State<AppState<L, U>>,
    user: AuthenticatedUser,
    Json(body): Json<VerifyInvitationRequest>,
) -> Result<Json<VerifiedInvitation>, ApiError>
where
    L: LinkageStore,
    U: UsageStore,
{
    if body.code.trim().is_empty() {
        return Err(PairError::InvalidRequest("code is required".to_string()).into());
    }

    let verified = state
        .invitations()
        .verify_invitation(&body.code, &user.user_id)
        .await
        .inspect_err(|e| {
            if e.is_user_facing() {
                tracing::debug!(user_id = %user.user_id, error = %e, "verify rejected");
            }
        })?;
    Ok(Json(verified))
}

fn invitation_view(invitation: &Invitation) -> Value {
    json!({
        "invitationId": invitation.id,
        "code": invitation.code,
        "status": invitation.status.as_str(),
        "verifiedBy": invitation.verified_by,
        "createdAt": invitation.created_at,
        "expiresAt": invitation.expires_at,
    })
}
