//! Bullet Cloud API library.
//!
//! Cart, address book, checkout and order lifecycle for the Bullet Cloud
//! store. The binary in `main.rs` serves [`routes::router`]; the CLI and the
//! integration tests use the same repositories and services directly.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
