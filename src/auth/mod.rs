// ============================================================================
// Auth - password hashing, signed bearer tokens, request identity
// ============================================================================

mod identity;
mod password;
mod token;

pub use identity::{AdminUser, AuthUser, Identity};
pub use password::{hash_password, verify_password};
pub use token::{TokenClaims, TokenSigner};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum AuthError {
    #[error("Authentication required")]
    MissingToken,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    Expired,

    #[error("Admin access required")]
    Forbidden,

    #[error("password hashing failed: {0}")]
    Hashing(String),
}
