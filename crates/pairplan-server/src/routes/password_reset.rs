use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use serde::Deserialize;
use serde_json::{Value, json};

use pairplan_core::traits::*;
use pairplan_core::PairError;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct PasswordResetRequest {
    pub email: String,
}

/// First hop of `X-Forwarded-For`, or `unknown` when absent.
pub fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .unwrap_or("unknown")
        .to_string()
}

/// Lower-cased address when it has a non-empty local part and domain.
pub fn normalize_email(raw: &str) -> Option<String> {
    let email = raw.trim().to_lowercase();
    let (local, domain) = email.split_once('@')?;
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return None;
    }
    Some(email)
}

/// Accept a password-reset request, throttled per client address and email.
///
/// The response is the same whether or not the email belongs to anyone.
pub async fn request_password_reset<L, U>(
    State(state): State<AppState<L, U>>,
    headers: HeaderMap,
    Json(body): Json<PasswordResetRequest>,
) -> Result<Json<Value>, ApiError>
where
    L: LinkageStore,
    U: UsageStore,
{
    let email = normalize_email(&body.email)
        .ok_or_else(|| PairError::InvalidRequest("a valid email is required".to_string()))?;

    let ip = client_ip(&headers);
    let key = format!("password-reset|{ip}|{email}");
    let limits = &state.config.rate_limit;
    state
        .rate_limiter
        .enforce(
            &key,
            limits.password_reset_max_requests,
            limits.password_reset_window(),
        )
        .await
        .inspect_err(|e| {
            if let PairError::RateLimited { .. } = e {
                tracing::info!(client_ip = %ip, "password reset throttled");
            }
        })?;

    tracing::info!(client_ip = %ip, "password reset requested");
    Ok(Json(json!({})))
}
