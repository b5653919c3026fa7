//! Address book entries.

use chrono::{DateTime, Utc};
use serde::Serialize;

use pet_market_core::{AddressFields, AddressId, UserId};

/// A saved shipping address.
#[derive(Debug, Clone, Serialize)]
pub struct Address {
    pub id: AddressId,
    pub user_id: UserId,
    #[serde(flatten)]
    pub fields: AddressFields,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
}
