//! Bullet Cloud Core - Shared types library.
//!
//! This crate provides common types used across all Bullet Cloud components:
//! - `api` - JSON HTTP API for carts, addresses, checkout and orders
//! - `cli` - Command-line tools for migrations and order operations
//!
//! # Architecture
//!
//! The core crate contains only types and rules - no I/O, no database access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, prices, quantities, and order statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
