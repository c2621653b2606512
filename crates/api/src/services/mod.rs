//! Business logic services.
//!
//! Services validate input at the boundary, then orchestrate the store
//! traits from [`crate::db`]. They are generic over the stores so the same
//! rules run against Postgres in production and an in-memory store in tests.
//!
//! # Services
//!
//! - [`AddressService`] - Address book with a single default per user
//! - [`CartService`] - Cart lines with merge-on-add semantics
//! - [`CheckoutService`] - Cart to order conversion
//! - [`OrderService`] - Order reads and the status state machine
//! - [`auth`] - Bearer token verification

pub mod addresses;
pub mod auth;
pub mod cart;
pub mod checkout;
pub mod error;
pub mod orders;

pub use addresses::AddressService;
pub use cart::{CartService, CartView};
pub use checkout::CheckoutService;
pub use error::ServiceError;
pub use orders::OrderService;
