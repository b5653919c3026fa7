//! Integration tests for the Pet Marketplace backend.
//!
//! # Running Tests
//!
//! ```bash
//! # Database-backed workflow tests (migrations are applied automatically)
//! TEST_DATABASE_URL=postgres://localhost/pet_market_test \
//!     cargo test -p pet-market-integration-tests -- --ignored
//!
//! # HTTP smoke tests additionally need a running server
//! STOREFRONT_BASE_URL=http://localhost:8000 \
//!     cargo test -p pet-market-integration-tests --test http_smoke -- --ignored
//! ```
//!
//! # Test Categories
//!
//! - `order_workflow` - Checkout atomicity, pricing, stock and status changes
//! - `address_book` - The single-default invariant
//! - `cart_catalog` - Cart lines, favorites and catalog pagination
//! - `http_smoke` - The JSON API end to end over HTTP
//!
//! Every fixture uses fresh random names, so tests can share one database and
//! run in parallel.

#![allow(clippy::missing_panics_doc, clippy::unwrap_used)]

use std::str::FromStr;

use rust_decimal::Decimal;
use secrecy::SecretString;
use sqlx::PgPool;
use uuid::Uuid;

use pet_market_core::{AddressFields, Price, ProductId};
use pet_market_storefront::db;
use pet_market_storefront::models::{NewProduct, User};
use pet_market_storefront::services::auth::{AuthService, Registration};
use pet_market_storefront::services::catalog::CatalogService;

/// Password used for every fixture account.
pub const TEST_PASSWORD: &str = "correct-horse-battery";

/// Connect to `TEST_DATABASE_URL` and bring the schema up to date.
pub async fn test_pool() -> PgPool {
    let url = std::env::var("TEST_DATABASE_URL")
        .expect("TEST_DATABASE_URL must point at a disposable PostgreSQL database");
    let pool = db::create_pool(&SecretString::from(url))
        .await
        .expect("Failed to connect to test database");
    sqlx::migrate!("../storefront/migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");
    pool
}

/// A short random suffix for unique names.
#[must_use]
pub fn unique(prefix: &str) -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("{prefix}-{}", id.get(..12).unwrap_or(&id))
}

/// Parse a decimal price literal.
#[must_use]
pub fn price(s: &str) -> Price {
    Price::new(Decimal::from_str(s).unwrap()).unwrap()
}

/// Register a fresh user.
pub async fn create_user(pool: &PgPool) -> User {
    let username = unique("user");
    AuthService::new(pool)
        .register(Registration {
            username: &username,
            email: &format!("{username}@example.com"),
            password: TEST_PASSWORD,
            phone: None,
        })
        .await
        .unwrap()
}

/// Create a product in a fresh category.
pub async fn create_product(pool: &PgPool, unit_price: &str, stock: i32) -> ProductId {
    CatalogService::new(pool)
        .create(NewProduct {
            name: unique("product"),
            price: price(unit_price),
            category: unique("category"),
            image: String::new(),
            images: vec!["/uploads/products/test.jpg".to_string()],
            description: "Integration test product".to_string(),
            rating: 4.5,
            stock,
            specs: vec!["red".to_string(), "blue".to_string()],
        })
        .await
        .unwrap()
        .id
}

/// A valid shipping address.
#[must_use]
pub fn address_fields(name: &str) -> AddressFields {
    AddressFields::new(
        name,
        "13800000000",
        "Zhejiang",
        "Hangzhou",
        "Xihu",
        "12 Lakeside Road",
    )
    .unwrap()
}
