//! Core types for Animart.
//!
//! Type-safe wrappers for identifiers, email addresses and the enums stored
//! in the database.

pub mod email;
pub mod id;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use status::*;
