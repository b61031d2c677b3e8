//! Animart storefront API library.
//!
//! The binary in `main.rs` wires these modules into an axum server; keeping
//! them in a library lets the CLI and tests reuse them.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
