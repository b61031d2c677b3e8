//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `auth` - Password registration, login and password changes
//! - `authorization` - Session-trusting role checks with a database fallback
//! - `pricing` - Server-side recomputation of checkout figures

pub mod auth;
pub mod authorization;
pub mod pricing;
