//! Core types for Bullet Cloud.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod id;
pub mod price;
pub mod quantity;
pub mod status;

pub use id::*;
pub use price::{Price, PriceError, total_of};
pub use quantity::{Quantity, QuantityError};
pub use status::{OrderStatus, ParseOrderStatusError};
