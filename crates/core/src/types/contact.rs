//! Contact details: e-mail addresses, phone numbers and login identifiers.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing contact details.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ContactError {
    /// The input string is empty.
    #[error("{0} cannot be empty")]
    Empty(&'static str),
    /// The input string is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong {
        /// Which field was rejected.
        field: &'static str,
        /// Maximum allowed length.
        max: usize,
    },
    /// The e-mail address is not `local@domain`.
    #[error("email must look like name@domain")]
    MalformedEmail,
    /// The phone number contains characters other than digits, spaces, `+`, `-`
    /// and `*` (the storefront masks numbers as `138****8888`).
    #[error("phone may only contain digits, spaces, '+', '-' and '*'")]
    MalformedPhone,
}

/// An e-mail address, stored lower-cased.
///
/// ```
/// use pet_market_core::Email;
///
/// assert!(Email::parse("Owner@Example.com").is_ok());
/// assert!(Email::parse("no-at-symbol").is_err());
/// assert_eq!(Email::parse(" A@B.c ").unwrap().as_str(), "a@b.c");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(feature = "postgres", sqlx(transparent))]
#[serde(try_from = "String", into = "String")]
pub struct Email(String);

impl Email {
    /// Maximum length of an email address (matches the `users.email` column).
    pub const MAX_LENGTH: usize = 100;

    /// Parse and normalize an e-mail address.
    ///
    /// # Errors
    ///
    /// Returns [`ContactError`] if the input is empty, too long, or not of the
    /// form `local@domain`.
    pub fn parse(s: &str) -> Result<Self, ContactError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ContactError::Empty("email"));
        }
        if s.len() > Self::MAX_LENGTH {
            return Err(ContactError::TooLong {
                field: "email",
                max: Self::MAX_LENGTH,
            });
        }
        match s.split_once('@') {
            Some((local, domain))
                if !local.is_empty() && !domain.is_empty() && !domain.contains('@') =>
            {
                Ok(Self(s.to_lowercase()))
            }
            _ => Err(ContactError::MalformedEmail),
        }
    }

    /// Returns the email address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Email {
    type Error = ContactError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Email> for String {
    fn from(email: Email) -> Self {
        email.0
    }
}

/// A phone number as entered by the user, whitespace-trimmed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(feature = "postgres", sqlx(transparent))]
#[serde(try_from = "String", into = "String")]
pub struct Phone(String);

impl Phone {
    /// Maximum length of a phone number (matches the `phone` columns).
    pub const MAX_LENGTH: usize = 20;

    /// Parse a phone number.
    ///
    /// # Errors
    ///
    /// Returns [`ContactError`] if the input is empty, too long or contains
    /// unexpected characters.
    pub fn parse(s: &str) -> Result<Self, ContactError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ContactError::Empty("phone"));
        }
        if s.len() > Self::MAX_LENGTH {
            return Err(ContactError::TooLong {
                field: "phone",
                max: Self::MAX_LENGTH,
            });
        }
        if !s
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, ' ' | '+' | '-' | '*'))
        {
            return Err(ContactError::MalformedPhone);
        }
        Ok(Self(s.to_owned()))
    }

    /// Returns the phone number as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Phone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Phone {
    type Error = ContactError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Phone> for String {
    fn from(phone: Phone) -> Self {
        phone.0
    }
}

/// What a user typed into the login form: an e-mail address or a phone number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginIdentifier {
    /// Log in by e-mail.
    Email(Email),
    /// Log in by phone number.
    Phone(Phone),
}

impl LoginIdentifier {
    /// Classify a login identifier. Anything containing `@` is treated as an
    /// e-mail address.
    ///
    /// # Errors
    ///
    /// Returns [`ContactError`] if the input is neither a valid e-mail address
    /// nor a valid phone number.
    pub fn parse(s: &str) -> Result<Self, ContactError> {
        if s.contains('@') {
            Email::parse(s).map(Self::Email)
        } else {
            Phone::parse(s).map(Self::Phone)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_email_normalizes_case() {
        let email = Email::parse("Pet.Owner@Example.COM").unwrap();
        assert_eq!(email.as_str(), "pet.owner@example.com");
    }

    #[test]
    fn test_email_rejections() {
        assert_eq!(Email::parse(""), Err(ContactError::Empty("email")));
        assert_eq!(Email::parse("@x.com"), Err(ContactError::MalformedEmail));
        assert_eq!(Email::parse("x@"), Err(ContactError::MalformedEmail));
        assert_eq!(Email::parse("a@b@c"), Err(ContactError::MalformedEmail));
        let long = format!("{}@example.com", "a".repeat(100));
        assert!(matches!(Email::parse(&long), Err(ContactError::TooLong { .. })));
    }

    #[test]
    fn test_email_deserialize_validates() {
        assert!(serde_json::from_str::<Email>("\"nope\"").is_err());
        let email: Email = serde_json::from_str("\"a@b.c\"").unwrap();
        assert_eq!(email.to_string(), "a@b.c");
    }

    #[test]
    fn test_phone_accepts_masked_numbers() {
        assert!(Phone::parse("138****8888").is_ok());
        assert!(Phone::parse("+86 138-0000-0000").is_ok());
        assert_eq!(Phone::parse("call me"), Err(ContactError::MalformedPhone));
    }

    #[test]
    fn test_login_identifier_classifies() {
        assert!(matches!(
            LoginIdentifier::parse("a@b.c").unwrap(),
            LoginIdentifier::Email(_)
        ));
        assert!(matches!(
            LoginIdentifier::parse("13800000000").unwrap(),
            LoginIdentifier::Phone(_)
        ));
        assert!(LoginIdentifier::parse("username").is_err());
    }
}
