//! Human-facing order numbers.
//!
//! An order number is distinct from the opaque [`OrderId`](super::OrderId):
//! it is shown to customers and support staff, so it is short, sortable by
//! creation time, and digits only: a UTC `YYYYMMDDHHMMSS` timestamp followed
//! by a six-digit random suffix.

use core::fmt;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Number of random digits appended to the timestamp.
const SUFFIX_DIGITS: u32 = 6;

/// A unique, human-readable order number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(feature = "postgres", sqlx(transparent))]
#[serde(transparent)]
pub struct OrderNumber(String);

impl OrderNumber {
    /// Generate a candidate order number for an order created at `now`.
    ///
    /// Candidates are not guaranteed unique; the caller must check against
    /// existing orders and retry on collision.
    pub fn generate<R: Rng + ?Sized>(now: DateTime<Utc>, rng: &mut R) -> Self {
        let suffix = rng.random_range(0..10_u32.pow(SUFFIX_DIGITS));
        Self(format!(
            "{}{suffix:0width$}",
            now.format("%Y%m%d%H%M%S"),
            width = SUFFIX_DIGITS as usize
        ))
    }

    /// Returns the order number as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
