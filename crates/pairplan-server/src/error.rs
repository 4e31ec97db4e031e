use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use pairplan_core::PairError;
use serde_json::json;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub error_name: String,
    pub message: String,
    /// Seconds, sent as `Retry-After`.
    pub retry_after: Option<i64>,
}

impl ApiError {
    pub fn new(status: StatusCode, error_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            error_name: error_name.into(),
            message: message.into(),
            retry_after: None,
        }
    }

    fn internal() -> Self {
        ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "InternalServerError",
            "Internal server error",
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": self.error_name,
            "message": self.message,
        });
        let mut response = (self.status, axum::Json(body)).into_response();
        if let Some(seconds) = self.retry_after
            && let Ok(value) = HeaderValue::from_str(&seconds.to_string())
        {
            response.headers_mut().insert(header::RETRY_AFTER, value);
        }
        response
    }
}

impl From<PairError> for ApiError {
    fn from(err: PairError) -> Self {
        match &err {
            PairError::Unauthenticated => ApiError::new(
                StatusCode::UNAUTHORIZED,
                "AuthenticationRequired",
                err.to_string(),
            ),
            PairError::Auth(_) => {
                ApiError::new(StatusCode::UNAUTHORIZED, "InvalidToken", "Invalid token")
            }
            PairError::NotFound(_) => {
                ApiError::new(StatusCode::NOT_FOUND, "NotFound", err.to_string())
            }
            PairError::Expired => {
                ApiError::new(StatusCode::GONE, "InvitationExpired", err.to_string())
            }
            PairError::SelfInvite => {
                ApiError::new(StatusCode::BAD_REQUEST, "SelfInvite", err.to_string())
            }
            PairError::AlreadyLinked => {
                ApiError::new(StatusCode::CONFLICT, "AlreadyLinked", err.to_string())
            }
            PairError::InvitationAlreadyConsumed => ApiError::new(
                StatusCode::CONFLICT,
                "InvitationAlreadyConsumed",
                err.to_string(),
            ),
            PairError::InvalidState(_) => {
                ApiError::new(StatusCode::CONFLICT, "InvalidState", err.to_string())
            }
            PairError::RateLimited { retry_after } => {
                // Round up so clients never retry a moment too early.
                let seconds = (retry_after.num_milliseconds() + 999) / 1000;
                ApiError {
                    retry_after: Some(seconds.max(1)),
                    ..ApiError::new(StatusCode::TOO_MANY_REQUESTS, "RateLimited", err.to_string())
                }
            }
            PairError::InvalidRequest(_) => {
                ApiError::new(StatusCode::BAD_REQUEST, "InvalidRequest", err.to_string())
            }
            PairError::Storage(_) | PairError::CodeCollision | PairError::Internal(_) => {
                tracing::error!(error = %err, "request failed");
                ApiError::internal()
            }
        }
    }
}
