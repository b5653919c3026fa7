//! Database operations for the marketplace `PostgreSQL`.
//!
//! # Tables
//!
//! - `users` - Accounts with Argon2 password hashes and a role
//! - `products`, `product_images`, `product_specs` - Catalog
//! - `cart_items` - Per-user cart lines keyed by (product, selected specs)
//! - `favorites`, `search_history` - Auxiliary per-user collections
//! - `addresses` - Address book, at most one default per user
//! - `orders`, `order_items` - Write-once orders with captured prices and an
//!   address snapshot
//! - `categories`, `banners` - Display taxonomy
//! - `tower_sessions.session` - Session storage
//!
//! Cross-table reads are explicit joins written in each repository; nothing is
//! loaded lazily.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p pet-market-cli -- migrate
//! ```

pub mod addresses;
pub mod cart;
pub mod favorites;
pub mod orders;
pub mod products;
pub mod search_history;
pub mod taxonomy;
pub mod users;

use std::fmt::Display;
use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use pet_market_core::{DocumentError, Quantity};

pub use addresses::AddressRepository;
pub use cart::CartRepository;
pub use favorites::FavoriteRepository;
pub use orders::OrderRepository;
pub use products::ProductRepository;
pub use search_history::SearchHistoryRepository;
pub use taxonomy::TaxonomyRepository;
pub use users::UserRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// Handlers acquire a connection per query (or a transaction per workflow)
/// and return it to the pool when it is dropped.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Fall back to an empty document when a stored text blob does not parse.
///
/// Stored `selected_specs` and `address_snapshot` values are never surfaced
/// to clients as errors. A malformed value is logged with the owning row so
/// that corruption stays visible to operators.
pub(crate) fn document_or_empty<T: Default>(
    parsed: Result<T, DocumentError>,
    column: &'static str,
    row_id: impl Display,
) -> T {
    parsed.unwrap_or_else(|error| {
        tracing::warn!(
            column,
            row_id = %row_id,
            error = %error,
            "Malformed stored document, reading it as empty"
        );
        T::default()
    })
}

/// Convert a stored quantity column into a [`Quantity`].
pub(crate) fn stored_quantity(
    value: i32,
    table: &'static str,
    row_id: impl Display,
) -> Result<Quantity, RepositoryError> {
    Quantity::new(i64::from(value)).map_err(|e| {
        RepositoryError::DataCorruption(format!("{table} row {row_id}: {e}"))
    })
}

/// Map a unique violation to [`RepositoryError::Conflict`] using `describe`
/// to name the violated constraint.
pub(crate) fn conflict_or_database(
    error: sqlx::Error,
    describe: impl FnOnce(Option<&str>) -> String,
) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = error
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(describe(db_err.constraint()));
    }
    RepositoryError::Database(error)
}

/// Escape `LIKE` wildcards in user input and wrap it for a substring match.
pub(crate) fn contains_pattern(keyword: &str) -> String {
    let mut pattern = String::with_capacity(keyword.len() + 2);
    pattern.push('%');
    for c in keyword.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pet_market_core::SpecSelection;

    use super::*;

    #[test]
    fn test_document_or_empty_falls_back() {
        let parsed = SpecSelection::from_storage(Some("{not json"));
        assert!(parsed.is_err());
        let specs = document_or_empty(parsed, "selected_specs", 7);
        assert!(specs.is_empty());
    }

    #[test]
    fn test_document_or_empty_keeps_valid_values() {
        let parsed = SpecSelection::from_storage(Some(r#"{"color":"red"}"#));
        let specs = document_or_empty(parsed, "selected_specs", 7);
        assert_eq!(specs.get("color"), Some("red"));
    }

    #[test]
    fn test_stored_quantity_rejects_zero() {
        assert!(matches!(
            stored_quantity(0, "cart_items", 1),
            Err(RepositoryError::DataCorruption(_))
        ));
        assert_eq!(stored_quantity(3, "cart_items", 1).unwrap().get(), 3);
    }

    #[test]
    fn test_contains_pattern_escapes_wildcards() {
        assert_eq!(contains_pattern("dog"), "%dog%");
        assert_eq!(contains_pattern("50%_off"), "%50\\%\\_off%");
    }
}
