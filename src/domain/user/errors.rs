// ============================================================================
// User Business Rule Errors
// ============================================================================

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum UserError {
    #[error("Name cannot be empty")]
    EmptyName,

    #[error("Invalid email address: {0}")]
    InvalidEmail(String),

    #[error("Password must be at least {0} characters")]
    WeakPassword(usize),

    #[error("An account with this email already exists")]
    EmailTaken,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Account is deactivated")]
    Inactive,

    #[error("Admins cannot demote or deactivate their own account")]
    SelfModification,
}
