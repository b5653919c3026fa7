//! Pet Marketplace storefront library.
//!
//! The HTTP API (catalog, cart, favorites, addresses, orders) as a library,
//! so the binary, the CLI and the integration tests share one implementation.
//!
//! The heart of the crate is [`services::orders`]: checkout prices lines at
//! the current catalog price, takes stock, snapshots the shipping address and
//! writes the order in one database transaction.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
