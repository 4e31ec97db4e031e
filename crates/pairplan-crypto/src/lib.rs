pub mod code;
pub mod jwt;

pub use code::{INVITE_CODE_LEN, generate_invite_code, normalize_invite_code};
pub use jwt::{AccessTokenClaims, TokenRejection, issue_access_token, verify_access_token};
