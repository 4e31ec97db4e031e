use axum::Extension;
use axum::extract::FromRequestParts;
use axum::http::StatusCode;
use axum::http::request::Parts;
use pairplan_crypto::TokenRejection;

use crate::error::ApiError;

/// The HS256 secret bearer tokens are checked against, added as an Axum Extension.
#[derive(Clone)]
pub struct JwtSecret(pub String);

/// The caller, resolved from `Authorization: Bearer <jwt>`. The token's `sub`
/// is the opaque user id every operation runs as.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: String,
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Extension(jwt_secret) = Extension::<JwtSecret>::from_request_parts(parts, state)
            .await
            .map_err(|_| {
                tracing::error!("jwt secret extension missing from router");
                ApiError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "InternalServerError",
                    "Internal server error",
                )
            })?;

        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                ApiError::new(
                    StatusCode::UNAUTHORIZED,
                    "AuthenticationRequired",
                    "Missing authorization header",
                )
            })?;

        let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
            ApiError::new(
                StatusCode::UNAUTHORIZED,
                "AuthenticationRequired",
                "Invalid authorization format",
            )
        })?;

        let user_id = pairplan_crypto::verify_access_token(token, &jwt_secret.0).map_err(|e| {
            match e {
                TokenRejection::Expired => {
                    ApiError::new(StatusCode::UNAUTHORIZED, "ExpiredToken", "Token has expired")
                }
                TokenRejection::MissingSubject => {
                    ApiError::new(StatusCode::UNAUTHORIZED, "InvalidToken", "Token has no subject")
                }
                TokenRejection::Invalid(_) => {
                    ApiError::new(StatusCode::UNAUTHORIZED, "InvalidToken", "Invalid token")
                }
            }
        })?;

        Ok(AuthenticatedUser { user_id })
    }
}
