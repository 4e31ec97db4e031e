use axum::Json;
use axum::extract::State;
use serde::Deserialize;
use serde_json::{Value, json};

use pairplan_core::traits::*;
use pairplan_core::PairError;
use pairplan_linkage::CoupleLinkStatus;

use crate::auth::AuthenticatedUser;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCoupleRequest {
    pub invitation_id: String,
    pub from_user_id: String,
}

/// Connect: the caller is the partner who verified the inviter's code.
pub async fn create_couple<L, U>(
    State(state): State<AppState<L, U>>,
    user: AuthenticatedUser,
    Json(body): Json<CreateCoupleRequest>,
) -> Result<Json<Value>, ApiError>
where
    L: LinkageStore,
    U: UsageStore,
{
    if body.invitation_id.is_empty() || body.from_user_id.is_empty() {
        return Err(PairError::InvalidRequest(
            "invitationId and fromUserId are required".to_string(),
        )
        .into());
    }

    let couple = state
        .couples()
        .create_couple(&body.invitation_id, &body.from_user_id, &user.user_id)
        .await
        .inspect_err(|e| {
            if e.is_user_facing() {
                tracing::debug!(user_id = %user.user_id, error = %e, "connect rejected");
            }
        })?;

    Ok(Json(json!({
        "coupleId": couple.id,
        "partnerUserId": body.from_user_id,
    })))
}

pub async fn couple_status<L, U>(
    State(state): State<AppState<L, U>>,
    user: AuthenticatedUser,
) -> Result<Json<CoupleLinkStatus>, ApiError>
where
    L: LinkageStore,
    U: UsageStore,
{
    let status = state.couples().couple_status(&user.user_id).await?;
    Ok(Json(status))
}
