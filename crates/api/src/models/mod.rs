//! Domain models for the checkout core.
//!
//! These are validated domain objects, separate from the database row types
//! in [`crate::db`].

pub mod address;
pub mod cart;
pub mod order;

pub use address::{Address, AddressPatch, NewAddress};
pub use cart::{Cart, CartItem};
pub use order::{Order, OrderItem, OrderWithItems};
