//! Domain models for the storefront.
//!
//! These are validated domain objects, separate from the `FromRow` row types
//! in [`crate::db`]. Most of them are also the JSON shapes the API returns.

pub mod address;
pub mod catalog;
pub mod message;
pub mod order;
pub mod session;
pub mod user;

pub use address::{Address, AddressInput};
pub use catalog::{Category, Product, ProductSummary};
pub use message::ContactMessage;
pub use order::{Order, OrderItem, ShippingAddress};
pub use session::CurrentUser;
pub use user::User;
