//! Core types for the Pet Marketplace.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod address;
pub mod contact;
pub mod document;
pub mod id;
pub mod line;
pub mod order_number;
pub mod page;
pub mod price;
pub mod status;

pub use address::{AddressError, AddressFields, AddressSnapshot};
pub use contact::{ContactError, Email, LoginIdentifier, Phone};
pub use document::DocumentError;
pub use id::*;
pub use line::{Quantity, QuantityError, SpecSelection};
pub use order_number::OrderNumber;
pub use page::{Page, PageRequest};
pub use price::{Price, PriceError};
pub use status::*;
