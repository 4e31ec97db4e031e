//! Bearer tokens minted by the identity provider. Both sides share an HS256
//! secret; this service only ever needs the user id in `sub`.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use pairplan_core::{PairError, PairResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// Why a bearer token was not accepted.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TokenRejection {
    #[error("token has expired")]
    Expired,
    #[error("token has no subject")]
    MissingSubject,
    #[error("invalid token: {0}")]
    Invalid(String),
}

/// Mint a token for `user_id` valid from `now` for `ttl`.
///
/// Production tokens come from the identity provider; this issuer exists for
/// local tooling and tests that share the same secret.
pub fn issue_access_token(
    user_id: &str,
    secret: &str,
    now: DateTime<Utc>,
    ttl: Duration,
) -> PairResult<String> {
    let claims = AccessTokenClaims {
        sub: user_id.to_string(),
        iat: now.timestamp(),
        exp: (now + ttl).timestamp(),
    };
    let key = EncodingKey::from_secret(secret.as_bytes());
    encode(&Header::default(), &claims, &key).map_err(|e| PairError::Auth(e.to_string()))
}

/// Check signature and expiry and return the user id the token speaks for.
pub fn verify_access_token(token: &str, secret: &str) -> Result<String, TokenRejection> {
    let key = DecodingKey::from_secret(secret.as_bytes());
    let claims = decode::<AccessTokenClaims>(token, &key, &Validation::default())
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => TokenRejection::Expired,
            _ => TokenRejection::Invalid(e.to_string()),
        })?
        .claims;

    if claims.sub.trim().is_empty() {
        return Err(TokenRejection::MissingSubject);
    }
    Ok(claims.sub)
}
