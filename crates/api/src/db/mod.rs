//! Database operations for the checkout core.
//!
//! # Tables
//!
//! - `users`, `products` - Read-only collaborators (accounts and catalog live elsewhere)
//! - `addresses` - Shipping addresses, at most one default per user
//! - `carts`, `cart_items` - One cart per user, one line per product
//! - `orders`, `order_items` - Immutable checkout records
//!
//! # Store traits
//!
//! Each component is a trait so services are independent of the storage
//! engine. The Postgres repositories in this module implement them; the
//! integration tests provide an in-memory implementation with the same
//! all-or-nothing semantics.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/api/migrations/` and run via:
//! ```bash
//! cargo run -p bullet-cloud-cli -- migrate
//! ```

pub mod addresses;
pub mod carts;
pub mod orders;
pub mod products;
pub mod users;

use std::future::Future;
use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use bullet_cloud_core::{
    AddressId, CartId, OrderId, OrderStatus, Price, ProductId, Quantity, UserId,
};

use crate::config::DatabasePoolConfig;
use crate::models::{
    Address, AddressPatch, Cart, CartItem, NewAddress, Order, OrderWithItems,
};

pub use addresses::AddressRepository;
pub use carts::CartRepository;
pub use orders::OrderRepository;
pub use products::ProductRepository;
pub use users::UserRepository;

/// Embedded schema migrations.
pub static MIGRATOR: Migrator = sqlx::migrate!();

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Requested entity was not found (or is not owned by the caller).
    #[error("not found")]
    NotFound,

    /// Lost a race with a concurrent writer, or a uniqueness rule was hit.
    /// Safe to retry.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The row is still referenced by another record. Retrying does not help.
    #[error("{0}")]
    InUse(String),

    /// A value does not fit its column (SQLSTATE `22003`).
    #[error("value out of range: {0}")]
    OutOfRange(String),

    /// A row references an entity that does not exist.
    #[error("invalid reference: {0}")]
    InvalidReference(String),

    /// The (cart, product) pair has no line.
    #[error("product not in cart")]
    ProductNotInCart,

    /// The order's current status does not allow the requested one.
    #[error("cannot move order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// Checkout was attempted with no cart lines.
    #[error("cannot create order from empty cart")]
    EmptyCart,
}

/// Map a write error to the repository taxonomy.
///
/// Unique and foreign-key violations become [`RepositoryError::Conflict`]
/// and [`RepositoryError::InvalidReference`]; serialization failures and
/// deadlocks (SQLSTATE `40001`, `40P01`) become `Conflict`; numeric
/// overflow (`22003`) becomes [`RepositoryError::OutOfRange`].
pub(crate) fn classify(err: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = err {
        let constraint = db_err.constraint().unwrap_or("unknown").to_owned();
        if db_err.is_unique_violation() {
            return RepositoryError::Conflict(format!("unique constraint {constraint} violated"));
        }
        if db_err.is_foreign_key_violation() {
            return RepositoryError::InvalidReference(constraint);
        }
        match db_err.code().as_deref() {
            Some("40001" | "40P01") => {
                return RepositoryError::Conflict("concurrent transaction won, retry".to_owned());
            }
            Some("22003") => return RepositoryError::OutOfRange(db_err.message().to_owned()),
            _ => {}
        }
    }
    RepositoryError::Database(err)
}

/// Persistence for addresses with the single-default rule.
///
/// Every lookup and mutation is scoped by `(user, address)`: an address id
/// alone never grants access.
pub trait AddressStore: Send + Sync {
    /// Insert an address. When `is_default` is set, every other address of
    /// the user is un-defaulted in the same transaction.
    fn create(
        &self,
        user_id: UserId,
        address: &NewAddress,
    ) -> impl Future<Output = Result<Address, RepositoryError>> + Send;

    /// Addresses of a user, default first, then newest first.
    fn list_for_user(
        &self,
        user_id: UserId,
    ) -> impl Future<Output = Result<Vec<Address>, RepositoryError>> + Send;

    fn find(
        &self,
        user_id: UserId,
        id: AddressId,
    ) -> impl Future<Output = Result<Option<Address>, RepositoryError>> + Send;

    /// Apply a patch; same default-swap rule as [`AddressStore::create`].
    fn update(
        &self,
        user_id: UserId,
        id: AddressId,
        patch: &AddressPatch,
    ) -> impl Future<Output = Result<Address, RepositoryError>> + Send;

    fn delete(
        &self,
        user_id: UserId,
        id: AddressId,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Make `id` the only default address of the user. On `NotFound`
    /// nothing changes.
    fn set_default(
        &self,
        user_id: UserId,
        id: AddressId,
    ) -> impl Future<Output = Result<Address, RepositoryError>> + Send;
}

/// Persistence for carts and their lines.
pub trait CartStore: Send + Sync {
    /// Return the user's cart, creating it if needed. Safe under concurrent
    /// calls for the same user.
    fn get_or_create(
        &self,
        user_id: UserId,
    ) -> impl Future<Output = Result<Cart, RepositoryError>> + Send;

    /// Lines ordered by creation time, oldest first.
    fn list_items(
        &self,
        cart_id: CartId,
    ) -> impl Future<Output = Result<Vec<CartItem>, RepositoryError>> + Send;

    fn find_item(
        &self,
        cart_id: CartId,
        product_id: ProductId,
    ) -> impl Future<Output = Result<Option<CartItem>, RepositoryError>> + Send;

    /// Insert a line, or merge into the existing one: quantities add up and
    /// the incoming price replaces the stored one.
    fn add_item(
        &self,
        cart_id: CartId,
        product_id: ProductId,
        quantity: Quantity,
        price: Price,
    ) -> impl Future<Output = Result<CartItem, RepositoryError>> + Send;

    /// Set the quantity of an existing line.
    fn update_quantity(
        &self,
        cart_id: CartId,
        product_id: ProductId,
        quantity: Quantity,
    ) -> impl Future<Output = Result<CartItem, RepositoryError>> + Send;

    /// Remove a line; [`RepositoryError::ProductNotInCart`] if there was none.
    fn remove_item(
        &self,
        cart_id: CartId,
        product_id: ProductId,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Remove every line. Returns how many were removed (zero is fine).
    fn clear(&self, cart_id: CartId) -> impl Future<Output = Result<u64, RepositoryError>> + Send;
}

/// Persistence for orders, including the checkout transaction.
pub trait OrderStore: Send + Sync {
    /// Convert cart lines into a pending order and empty the cart, all or
    /// nothing.
    ///
    /// `items` must be the cart's current lines. If the cart no longer holds
    /// exactly these lines when it is cleared, the whole operation rolls back
    /// with [`RepositoryError::Conflict`].
    fn create_from_cart(
        &self,
        user_id: UserId,
        cart_id: CartId,
        shipping_address_id: AddressId,
        items: &[CartItem],
    ) -> impl Future<Output = Result<OrderWithItems, RepositoryError>> + Send;

    /// Orders of a user, newest first.
    fn list_for_user(
        &self,
        user_id: UserId,
    ) -> impl Future<Output = Result<Vec<Order>, RepositoryError>> + Send;

    /// Unscoped lookup. Callers check ownership.
    fn find_with_items(
        &self,
        id: OrderId,
    ) -> impl Future<Output = Result<Option<OrderWithItems>, RepositoryError>> + Send;

    /// Move an order to `status` if its current status allows it.
    ///
    /// Fails with [`RepositoryError::NotFound`] if the order does not exist
    /// and [`RepositoryError::InvalidTransition`] if it does but the
    /// transition is not allowed. The row is untouched in both cases.
    fn update_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> impl Future<Output = Result<Order, RepositoryError>> + Send;

    /// Set the tracking number without touching the status.
    fn update_tracking(
        &self,
        id: OrderId,
        tracking_number: &str,
    ) -> impl Future<Output = Result<Order, RepositoryError>> + Send;
}

/// Read-only view of the product catalog.
pub trait ProductCatalog: Send + Sync {
    /// Current unit price, or `None` if the product does not exist.
    fn current_price(
        &self,
        product_id: ProductId,
    ) -> impl Future<Output = Result<Option<Price>, RepositoryError>> + Send;
}

/// Read-only view of user accounts.
pub trait UserDirectory: Send + Sync {
    fn exists(&self, user_id: UserId) -> impl Future<Output = Result<bool, RepositoryError>> + Send;
}

/// Create a `PostgreSQL` connection pool.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(
    database_url: &secrecy::SecretString,
    sizing: DatabasePoolConfig,
) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(sizing.max_connections)
        .min_connections(sizing.min_connections)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
