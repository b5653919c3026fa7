//! User repository for database operations.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use pet_market_core::{Email, LoginIdentifier, Phone, UserId, UserRole};

use super::{RepositoryError, conflict_or_database};
use crate::models::user::{NewUser, ProfileUpdate, User};

const USER_COLUMNS: &str = "id, username, email, phone, avatar, role, register_time";

#[derive(sqlx::FromRow)]
struct UserRow {
    id: UserId,
    username: String,
    email: String,
    phone: Option<String>,
    avatar: Option<String>,
    role: UserRole,
    register_time: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;
        let phone = row
            .phone
            .as_deref()
            .map(Phone::parse)
            .transpose()
            .map_err(|e| {
                RepositoryError::DataCorruption(format!("invalid phone in database: {e}"))
            })?;

        Ok(Self {
            id: row.id,
            username: row.username,
            email,
            phone,
            avatar: row.avatar,
            role: row.role,
            register_time: row.register_time,
        })
    }
}

#[derive(sqlx::FromRow)]
struct CredentialRow {
    #[sqlx(flatten)]
    user: UserRow,
    password_hash: String,
}

/// Describe which unique constraint on `users` was violated.
fn describe_conflict(constraint: Option<&str>) -> String {
    match constraint {
        Some("users_username_key") => "username is already taken".to_owned(),
        Some("users_email_key") => "email is already registered".to_owned(),
        Some("users_phone_key") => "phone is already registered".to_owned(),
        _ => "user already exists".to_owned(),
    }
}

/// Repository for user database operations.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a user by their ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored contact details are invalid.
    pub async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    /// Look up a user and their password hash by e-mail or phone.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_credentials(
        &self,
        identifier: &LoginIdentifier,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        let (column, value) = match identifier {
            LoginIdentifier::Email(email) => ("email", email.as_str()),
            LoginIdentifier::Phone(phone) => ("phone", phone.as_str()),
        };
        let sql = format!("SELECT {USER_COLUMNS}, password_hash FROM users WHERE {column} = $1");
        let row = sqlx::query_as::<_, CredentialRow>(&sql)
            .bind(value)
            .fetch_optional(self.pool)
            .await?;

        match row {
            Some(r) => Ok(Some((User::try_from(r.user)?, r.password_hash))),
            None => Ok(None),
        }
    }

    /// Get a user's password hash.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_password_hash(&self, id: UserId) -> Result<Option<String>, RepositoryError> {
        let hash = sqlx::query_scalar::<_, String>("SELECT password_hash FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(hash)
    }

    /// Create a new user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the username, email or phone already exists.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(&self, new_user: &NewUser) -> Result<User, RepositoryError> {
        let sql = format!(
            "INSERT INTO users (id, username, email, phone, password_hash) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(UserId::generate())
            .bind(&new_user.username)
            .bind(new_user.email.as_str())
            .bind(new_user.phone.as_ref().map(Phone::as_str))
            .bind(&new_user.password_hash)
            .fetch_one(self.pool)
            .await
            .map_err(|e| conflict_or_database(e, describe_conflict))?;

        User::try_from(row)
    }

    /// Apply a profile update. Fields left as `None` are unchanged.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    /// Returns `RepositoryError::Conflict` if the new username, email or phone is taken.
    pub async fn update_profile(
        &self,
        id: UserId,
        update: &ProfileUpdate,
    ) -> Result<User, RepositoryError> {
        let sql = format!(
            "UPDATE users SET \
                 username = COALESCE($2, username), \
                 email = COALESCE($3, email), \
                 phone = COALESCE($4, phone), \
                 avatar = COALESCE($5, avatar) \
             WHERE id = $1 \
             RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .bind(update.username.as_deref())
            .bind(update.email.as_ref().map(Email::as_str))
            .bind(update.phone.as_ref().map(Phone::as_str))
            .bind(update.avatar.as_deref())
            .fetch_optional(self.pool)
            .await
            .map_err(|e| conflict_or_database(e, describe_conflict))?
            .ok_or(RepositoryError::NotFound)?;

        User::try_from(row)
    }

    /// Replace a user's password hash.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    pub async fn set_password_hash(&self, id: UserId, hash: &str) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(id)
            .bind(hash)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_conflict_names_the_field() {
        assert_eq!(
            describe_conflict(Some("users_email_key")),
            "email is already registered"
        );
        assert_eq!(describe_conflict(None), "user already exists");
    }
}
