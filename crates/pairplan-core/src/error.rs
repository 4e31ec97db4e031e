use thiserror::Error;

#[derive(Debug, Error)]
pub enum PairError {
    #[error("authentication required")]
    Unauthenticated,

    #[error("auth error: {0}")]
    Auth(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invitation has expired")]
    Expired,

    #[error("cannot accept your own invitation")]
    SelfInvite,

    #[error("user is already linked to a partner")]
    AlreadyLinked,

    #[error("invitation has already been used")]
    InvitationAlreadyConsumed,

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("too many requests, retry in {}s", retry_after.num_seconds())]
    RateLimited { retry_after: chrono::Duration },

    #[error("invitation code collision")]
    CodeCollision,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl PairError {
    /// Expected, user-facing outcomes that callers surface without treating
    /// them as failures.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            PairError::NotFound(_)
                | PairError::Expired
                | PairError::SelfInvite
                | PairError::AlreadyLinked
                | PairError::InvitationAlreadyConsumed
                | PairError::InvalidState(_)
                | PairError::RateLimited { .. }
                | PairError::InvalidRequest(_)
        )
    }
}

pub type PairResult<T> = Result<T, PairError>;
