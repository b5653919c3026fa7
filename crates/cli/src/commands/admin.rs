//! User role management commands.
//!
//! There is no sign-up path for administrators: an operator registers a
//! normal account through the API and promotes it here.
//!
//! # Usage
//!
//! ```bash
//! pm-cli admin promote owner@example.com
//! pm-cli admin demote owner@example.com
//! ```

use pet_market_core::{Email, UserRole};
use sqlx::PgPool;
use thiserror::Error;

use pet_market_storefront::db;

/// Errors that can occur during role changes.
#[derive(Debug, Error)]
pub enum AdminError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: STOREFRONT_DATABASE_URL (or DATABASE_URL)")]
    MissingDatabaseUrl,

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    /// Invalid email.
    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    /// No account with that e-mail.
    #[error("No user with email: {0}")]
    UserNotFound(String),
}

/// Grant the admin role.
///
/// # Errors
///
/// Returns `AdminError` if the e-mail is malformed or unknown, or the update fails.
pub async fn promote(email: &str) -> Result<(), AdminError> {
    set_role(email, UserRole::Admin).await
}

/// Revoke the admin role.
///
/// # Errors
///
/// Returns `AdminError` if the e-mail is malformed or unknown, or the update fails.
pub async fn demote(email: &str) -> Result<(), AdminError> {
    set_role(email, UserRole::User).await
}

async fn set_role(email: &str, role: UserRole) -> Result<(), AdminError> {
    let email = Email::parse(email).map_err(|e| AdminError::InvalidEmail(e.to_string()))?;
    let database_url = super::database_url().ok_or(AdminError::MissingDatabaseUrl)?;
    let pool = db::create_pool(&database_url).await?;

    update_role(&pool, &email, role).await?;
    tracing::info!(email = %email, %role, "User role updated");
    Ok(())
}

async fn update_role(pool: &PgPool, email: &Email, role: UserRole) -> Result<(), AdminError> {
    let result = sqlx::query("UPDATE users SET role = $2 WHERE email = $1")
        .bind(email)
        .bind(role)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AdminError::UserNotFound(email.to_string()));
    }
    Ok(())
}
