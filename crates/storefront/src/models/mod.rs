//! Domain models for the storefront.
//!
//! These are the validated shapes handed between repositories, services and
//! routes, and serialized as API responses. Row types whose columns need
//! conversion live next to the queries in [`crate::db`].

pub mod address;
pub mod cart;
pub mod favorite;
pub mod order;
pub mod product;
pub mod session;
pub mod taxonomy;
pub mod user;

pub use address::Address;
pub use cart::CartLine;
pub use favorite::{Favorite, SearchHistoryEntry};
pub use order::{Order, OrderItem};
pub use product::{NewProduct, Product, ProductFilter, ProductSort, ProductSummary};
pub use session::CurrentUser;
pub use taxonomy::{Banner, Category};
pub use user::User;
