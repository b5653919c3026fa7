//! Pet Marketplace Core - Shared domain types.
//!
//! This crate provides the types used across the Pet Marketplace components:
//! - `storefront` - The HTTP API (catalog, cart, orders, addresses)
//! - `cli` - Command-line tools for migrations, seeding and user management
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP. Database encoding is available behind the `postgres`
//! feature so the storefront can bind these types directly in queries.
//!
//! # Modules
//!
//! - [`types`] - Typed IDs, prices, contact details, statuses, line-item specs,
//!   address snapshots and pagination

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
