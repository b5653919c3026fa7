//! Authentication error types.

use thiserror::Error;

use pet_market_core::ContactError;

use crate::db::RepositoryError;

/// Errors that can occur during authentication and account operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid e-mail or phone format.
    #[error("invalid contact details: {0}")]
    InvalidContact(#[from] ContactError),

    /// Username is blank or too long.
    #[error("invalid username: {0}")]
    InvalidUsername(String),

    /// Invalid credentials (wrong password or user not found).
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Credentials are valid but the account is not an administrator.
    #[error("administrator access required")]
    NotAdmin,

    /// User not found.
    #[error("user not found")]
    UserNotFound,

    /// Username, e-mail or phone already in use.
    #[error("{0}")]
    UserAlreadyExists(String),

    /// Password too weak or invalid.
    #[error("password validation failed: {0}")]
    WeakPassword(String),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,
}
