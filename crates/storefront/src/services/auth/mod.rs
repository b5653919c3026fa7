//! Authentication service.
//!
//! Password accounts hashed with Argon2id. Users log in with their e-mail
//! address or phone number.

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use sqlx::PgPool;

use pet_market_core::{Email, LoginIdentifier, Phone, UserId, UserRole};

use crate::db::RepositoryError;
use crate::db::users::UserRepository;
use crate::models::user::{NewUser, ProfileUpdate, User};

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Maximum password length (Argon2 input is bounded to keep hashing cheap).
const MAX_PASSWORD_LENGTH: usize = 128;

/// Maximum username length (matches the `users.username` column).
const MAX_USERNAME_LENGTH: usize = 50;

/// Raw registration input.
#[derive(Debug, Clone, Copy)]
pub struct Registration<'r> {
    pub username: &'r str,
    pub email: &'r str,
    pub password: &'r str,
    pub phone: Option<&'r str>,
}

/// Raw profile update input; `None` leaves the field untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProfileChanges<'r> {
    pub username: Option<&'r str>,
    pub email: Option<&'r str>,
    pub phone: Option<&'r str>,
    pub avatar: Option<&'r str>,
}

/// Authentication service.
///
/// Handles registration, login, and profile and password changes.
pub struct AuthService<'a> {
    users: UserRepository<'a>,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            users: UserRepository::new(pool),
        }
    }

    /// Register a new user.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidContact` if the e-mail or phone is malformed.
    /// Returns `AuthError::InvalidUsername` if the username is blank or too long.
    /// Returns `AuthError::WeakPassword` if the password doesn't meet requirements.
    /// Returns `AuthError::UserAlreadyExists` if the username, e-mail or phone is taken.
    pub async fn register(&self, registration: Registration<'_>) -> Result<User, AuthError> {
        let username = validate_username(registration.username)?;
        let email = Email::parse(registration.email)?;
        let phone = optional_phone(registration.phone)?;
        validate_password(registration.password)?;

        let password_hash = hash_password(registration.password)?;

        let user = self
            .users
            .create(&NewUser {
                username,
                email,
                phone,
                password_hash,
            })
            .await
            .map_err(already_exists)?;

        tracing::info!(user_id = %user.id, "User registered");
        Ok(user)
    }

    /// Login with an e-mail address or phone number and a password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the identifier or password is wrong.
    pub async fn login(&self, identifier: &str, password: &str) -> Result<User, AuthError> {
        // A malformed identifier cannot match any account.
        let identifier =
            LoginIdentifier::parse(identifier).map_err(|_| AuthError::InvalidCredentials)?;

        let (user, password_hash) = self
            .users
            .get_credentials(&identifier)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &password_hash)?;

        Ok(user)
    }

    /// Login to the admin console.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the identifier or password is wrong.
    /// Returns `AuthError::NotAdmin` if the account is not an administrator.
    pub async fn admin_login(&self, identifier: &str, password: &str) -> Result<User, AuthError> {
        let user = self.login(identifier, password).await?;
        if user.role != UserRole::Admin {
            tracing::warn!(user_id = %user.id, "Non-admin attempted admin login");
            return Err(AuthError::NotAdmin);
        }
        Ok(user)
    }

    /// Get a user by ID.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` if the user no longer exists.
    pub async fn get_user(&self, id: UserId) -> Result<User, AuthError> {
        self.users
            .get_by_id(id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    /// Update profile fields.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidContact` / `AuthError::InvalidUsername` on bad input.
    /// Returns `AuthError::UserAlreadyExists` if a new username, e-mail or phone is taken.
    pub async fn update_profile(
        &self,
        id: UserId,
        changes: ProfileChanges<'_>,
    ) -> Result<User, AuthError> {
        let update = ProfileUpdate {
            username: changes.username.map(validate_username).transpose()?,
            email: changes.email.map(Email::parse).transpose()?,
            phone: optional_phone(changes.phone)?,
            avatar: changes
                .avatar
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .map(ToOwned::to_owned),
        };

        self.users
            .update_profile(id, &update)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => AuthError::UserNotFound,
                other => already_exists(other),
            })
    }

    /// Record a new avatar URL.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` if the user no longer exists.
    pub async fn set_avatar(&self, id: UserId, url: String) -> Result<User, AuthError> {
        let update = ProfileUpdate {
            avatar: Some(url),
            ..ProfileUpdate::default()
        };
        self.users
            .update_profile(id, &update)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => AuthError::UserNotFound,
                other => AuthError::Repository(other),
            })
    }

    /// Change a password after checking the current one.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if `old_password` is wrong.
    /// Returns `AuthError::WeakPassword` if the new password doesn't meet requirements.
    pub async fn change_password(
        &self,
        id: UserId,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let current_hash = self
            .users
            .get_password_hash(id)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        verify_password(old_password, &current_hash)?;
        validate_password(new_password)?;

        let new_hash = hash_password(new_password)?;
        self.users.set_password_hash(id, &new_hash).await?;

        tracing::info!(user_id = %id, "Password changed");
        Ok(())
    }
}

fn already_exists(e: RepositoryError) -> AuthError {
    match e {
        RepositoryError::Conflict(message) => AuthError::UserAlreadyExists(message),
        other => AuthError::Repository(other),
    }
}

fn optional_phone(phone: Option<&str>) -> Result<Option<Phone>, AuthError> {
    phone
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(Phone::parse)
        .transpose()
        .map_err(AuthError::from)
}

fn validate_username(username: &str) -> Result<String, AuthError> {
    let username = username.trim();
    if username.is_empty() {
        return Err(AuthError::InvalidUsername(
            "username cannot be empty".to_owned(),
        ));
    }
    if username.chars().count() > MAX_USERNAME_LENGTH {
        return Err(AuthError::InvalidUsername(format!(
            "username must be at most {MAX_USERNAME_LENGTH} characters"
        )));
    }
    Ok(username.to_owned())
}

fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at most {MAX_PASSWORD_LENGTH} bytes"
        )));
    }
    Ok(())
}

/// Hash a password using Argon2id.
fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("correct horse battery").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse battery", &hash).is_ok());
        assert!(matches!(
            verify_password("wrong password", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_verify_rejects_garbage_hash() {
        assert!(matches!(
            verify_password("anything", "not-a-phc-string"),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_password_length_rules() {
        assert!(matches!(
            validate_password("short"),
            Err(AuthError::WeakPassword(_))
        ));
        assert!(validate_password("longenough").is_ok());
        assert!(validate_password(&"x".repeat(MAX_PASSWORD_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_username_is_trimmed_and_bounded() {
        assert_eq!(validate_username("  rex  ").unwrap(), "rex");
        assert!(validate_username("   ").is_err());
        assert!(validate_username(&"a".repeat(MAX_USERNAME_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_blank_phone_is_absent() {
        assert!(optional_phone(Some("  ")).unwrap().is_none());
        assert!(optional_phone(None).unwrap().is_none());
        assert!(optional_phone(Some("abc")).is_err());
    }
}
