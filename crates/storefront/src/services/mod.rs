//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `auth` - Registration, password login and profile changes
//! - `catalog` - Product listing, admin product creation and search history
//! - `cart` - Cart lines keyed by product and spec selection
//! - `orders` - The checkout workflow and order status changes
//! - `address_book` - Saved addresses with a single default
//! - `uploads` - Avatar image storage

pub mod address_book;
pub mod auth;
pub mod cart;
pub mod catalog;
pub mod orders;
pub mod uploads;
