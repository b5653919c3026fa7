//! User domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use pet_market_core::{Email, Phone, UserId, UserRole};

/// A marketplace account. Never carries the password hash.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// Unique display name.
    pub username: String,
    /// Unique e-mail address.
    pub email: Email,
    /// Optional phone number, usable as a login identifier.
    pub phone: Option<Phone>,
    /// Avatar URL, usually under `/uploads`.
    pub avatar: Option<String>,
    /// Account role.
    pub role: UserRole,
    /// When the account was registered.
    pub register_time: DateTime<Utc>,
}

/// Fields required to create an account.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: Email,
    pub phone: Option<Phone>,
    pub password_hash: String,
}

/// Profile fields a user may change; `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub email: Option<Email>,
    pub phone: Option<Phone>,
    pub avatar: Option<String>,
}
