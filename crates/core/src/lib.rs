//! Animart Core - domain types and pricing rules.
//!
//! This crate is shared by the storefront server and the CLI:
//! - `storefront` - JSON API for catalog, checkout, dashboard and back-office
//! - `cli` - migrations, seeding and user management
//!
//! # Architecture
//!
//! Nothing in here performs I/O. Repositories in the storefront crate load
//! records and hand them to the functions in this crate, which decide whether
//! a checkout is acceptable and what it costs.
//!
//! # Modules
//!
//! - [`types`] - Typed IDs, emails, and status enums
//! - [`catalog`] - Normalization of the two product option shapes
//! - [`pricing`] - Server-side price, shipping and total recomputation
//! - [`coupon`] - Coupon eligibility and discount calculation
//! - [`money`] - Decimal rounding helpers

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod catalog;
pub mod coupon;
pub mod money;
pub mod pricing;
pub mod types;

pub use types::*;
