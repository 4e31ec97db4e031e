pub mod auth;
pub mod error;
pub mod routes;
pub mod state;

pub use auth::{AuthenticatedUser, JwtSecret};
pub use error::ApiError;
pub use routes::build_router;
pub use state::AppState;
