use axum::Json;
use axum::extract::State;
use serde::Deserialize;

use pairplan_core::traits::*;
use pairplan_quota::UsageSnapshot;

use crate::auth::AuthenticatedUser;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct RecordUsageRequest {
    /// The generated artifact this usage is attributed to, if any.
    pub artifact_id: Option<String>,
}

pub async fn check_limit<L, U>(
    State(state): State<AppState<L, U>>,
    user: AuthenticatedUser,
) -> Json<UsageSnapshot>
where
    L: LinkageStore,
    U: UsageStore,
{
    Json(state.quota().check_limit(&user.user_id).await)
}

pub async fn record_usage<L, U>(
    State(state): State<AppState<L, U>>,
    user: AuthenticatedUser,
    Json(body): Json<RecordUsageRequest>,
) -> Result<Json<UsageSnapshot>, ApiError>
where
    L: LinkageStore,
    U: UsageStore,
{
    let snapshot = state
        .quota()
        .record_usage(&user.user_id, body.artifact_id.as_deref())
        .await?;
    Ok(Json(snapshot))
}
