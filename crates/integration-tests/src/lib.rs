//! Integration test support for Bullet Cloud.
//!
//! # Running Tests
//!
//! ```bash
//! # In-memory and HTTP tests (no database needed)
//! cargo test -p bullet-cloud-integration-tests
//!
//! # Postgres-backed tests
//! DATABASE_URL=postgres://localhost/bullet_cloud_test \
//!     cargo test -p bullet-cloud-integration-tests -- --ignored
//! ```
//!
//! # Test Categories
//!
//! - `addresses`, `cart`, `checkout`, `order_lifecycle` - service behavior
//!   against [`MemoryStore`]
//! - `http` - router, authentication and error bodies
//! - `postgres` - the real repositories (`#[ignore]`d without a database)
//!
//! [`MemoryStore`] implements every store trait with the same semantics as
//! the Postgres repositories: scoped lookups, the single-default rule, merge
//! on add, and an all-or-nothing checkout that commits by swapping in a
//! modified copy of the tables.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;

use bullet_cloud_api::db::{
    AddressStore, CartStore, OrderStore, ProductCatalog, RepositoryError, UserDirectory,
};
use bullet_cloud_api::models::{
    Address, AddressPatch, Cart, CartItem, NewAddress, Order, OrderItem, OrderWithItems,
};
use bullet_cloud_core::{
    AddressId, CartId, CartItemId, OrderId, OrderItemId, OrderStatus, Price, ProductId, Quantity,
    UserId, total_of,
};

/// Every row held by a [`MemoryStore`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tables {
    pub users: HashSet<UserId>,
    pub products: HashMap<ProductId, Price>,
    pub addresses: Vec<Address>,
    pub carts: Vec<Cart>,
    pub cart_items: Vec<CartItem>,
    pub orders: Vec<Order>,
    pub order_items: Vec<OrderItem>,
}

/// Step at which the next checkout fails, after the earlier steps ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutFault {
    /// Inserting the order row.
    InsertOrder,
    /// Inserting the order line at this index.
    InsertItem(usize),
    /// Clearing the cart.
    ClearCart,
}

#[derive(Debug)]
struct Inner {
    tables: Tables,
    epoch: DateTime<Utc>,
    tick: i64,
    fault: Option<CheckoutFault>,
}

impl Inner {
    /// Strictly increasing timestamps so insertion order is observable.
    fn now(&mut self) -> DateTime<Utc> {
        self.tick += 1;
        self.epoch + Duration::microseconds(self.tick)
    }
}

/// In-memory implementation of every store trait.
///
/// Clones share the same tables.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                tables: Tables::default(),
                epoch: Utc::now(),
                tick: 0,
                fault: None,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// A copy of every table.
    #[must_use]
    pub fn snapshot(&self) -> Tables {
        self.lock().tables.clone()
    }

    /// Register a user account.
    #[must_use]
    pub fn seed_user(&self) -> UserId {
        let id = UserId::generate();
        self.lock().tables.users.insert(id);
        id
    }

    /// Register a catalog product at `price` (a decimal string like `"10.00"`).
    ///
    /// # Panics
    ///
    /// Panics if `price` is not a non-negative decimal.
    #[must_use]
    pub fn seed_product(&self, price: &str) -> ProductId {
        let id = ProductId::generate();
        self.set_price(id, price);
        id
    }

    /// Change (or set) a product's catalog price.
    ///
    /// # Panics
    ///
    /// Panics if `price` is not a non-negative decimal.
    pub fn set_price(&self, product_id: ProductId, price: &str) {
        self.lock().tables.products.insert(product_id, price_of(price));
    }

    /// Drop a product from the catalog.
    pub fn remove_product(&self, product_id: ProductId) {
        self.lock().tables.products.remove(&product_id);
    }

    /// Overwrite an order's status without checking the state machine.
    pub fn force_status(&self, order_id: OrderId, status: OrderStatus) {
        let mut inner = self.lock();
        if let Some(order) = inner.tables.orders.iter_mut().find(|o| o.id == order_id) {
            order.status = status;
        }
    }

    /// Make the next checkout fail at `fault`.
    pub fn fail_next_checkout(&self, fault: CheckoutFault) {
        self.lock().fault = Some(fault);
    }

    /// Current lines of the user's cart, oldest first.
    #[must_use]
    pub fn cart_lines(&self, user_id: UserId) -> Vec<CartItem> {
        let inner = self.lock();
        let Some(cart) = inner.tables.carts.iter().find(|c| c.user_id == user_id) else {
            return Vec::new();
        };
        inner
            .tables
            .cart_items
            .iter()
            .filter(|item| item.cart_id == cart.id)
            .cloned()
            .collect()
    }

    /// Number of addresses of the user flagged as default.
    #[must_use]
    pub fn default_count(&self, user_id: UserId) -> usize {
        self.lock()
            .tables
            .addresses
            .iter()
            .filter(|a| a.user_id == user_id && a.is_default)
            .count()
    }
}

/// Parse a decimal string into a [`Price`].
///
/// # Panics
///
/// Panics if `raw` is not a non-negative decimal.
#[must_use]
#[allow(clippy::expect_used)]
pub fn price_of(raw: &str) -> Price {
    let amount: Decimal = raw.parse().expect("decimal price");
    Price::new(amount).expect("non-negative price")
}

/// Clear the user's default flags, except on `keep`.
fn clear_defaults(tables: &mut Tables, user_id: UserId, keep: Option<AddressId>) {
    for address in &mut tables.addresses {
        if address.user_id == user_id && Some(address.id) != keep {
            address.is_default = false;
        }
    }
}

/// Same `COALESCE` semantics as the SQL update: `None` keeps the field.
fn apply_patch(patch: &AddressPatch, address: &mut Address) {
    if let Some(street) = &patch.street {
        address.street.clone_from(street);
    }
    if let Some(city) = &patch.city {
        address.city.clone_from(city);
    }
    if let Some(state) = &patch.state {
        address.state.clone_from(state);
    }
    if let Some(postal_code) = &patch.postal_code {
        address.postal_code.clone_from(postal_code);
    }
    if let Some(country) = &patch.country {
        address.country.clone_from(country);
    }
    if let Some(is_default) = patch.is_default {
        address.is_default = is_default;
    }
}

fn require_user(tables: &Tables, user_id: UserId) -> Result<(), RepositoryError> {
    if tables.users.contains(&user_id) {
        Ok(())
    } else {
        Err(RepositoryError::NotFound)
    }
}

fn sorted_lines(mut lines: Vec<(ProductId, Quantity, Price)>) -> Vec<(ProductId, Quantity, Price)> {
    lines.sort_by_key(|(product_id, _, _)| *product_id);
    lines
}

impl AddressStore for MemoryStore {
    async fn create(&self, user_id: UserId, address: &NewAddress) -> Result<Address, RepositoryError> {
        let mut inner = self.lock();
        require_user(&inner.tables, user_id)?;

        let now = inner.now();
        let created = Address {
            id: AddressId::generate(),
            user_id,
            street: address.street.clone(),
            city: address.city.clone(),
            state: address.state.clone(),
            postal_code: address.postal_code.clone(),
            country: address.country.clone(),
            is_default: address.is_default,
            created_at: now,
            updated_at: now,
        };

        if created.is_default {
            clear_defaults(&mut inner.tables, user_id, None);
        }
        inner.tables.addresses.push(created.clone());
        Ok(created)
    }

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Address>, RepositoryError> {
        let inner = self.lock();
        let mut addresses: Vec<Address> = inner
            .tables
            .addresses
            .iter()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect();
        addresses.sort_by(|a, b| {
            b.is_default
                .cmp(&a.is_default)
                .then(b.created_at.cmp(&a.created_at))
        });
        Ok(addresses)
    }

    async fn find(&self, user_id: UserId, id: AddressId) -> Result<Option<Address>, RepositoryError> {
        Ok(self
            .lock()
            .tables
            .addresses
            .iter()
            .find(|a| a.id == id && a.user_id == user_id)
            .cloned())
    }

    async fn update(
        &self,
        user_id: UserId,
        id: AddressId,
        patch: &AddressPatch,
    ) -> Result<Address, RepositoryError> {
        let mut inner = self.lock();
        let now = inner.now();
        let position = inner
            .tables
            .addresses
            .iter()
            .position(|a| a.id == id && a.user_id == user_id)
            .ok_or(RepositoryError::NotFound)?;

        if patch.sets_default() {
            clear_defaults(&mut inner.tables, user_id, Some(id));
        }
        let address = inner
            .tables
            .addresses
            .get_mut(position)
            .ok_or(RepositoryError::NotFound)?;
        apply_patch(patch, address);
        address.updated_at = now;
        Ok(address.clone())
    }

    async fn delete(&self, user_id: UserId, id: AddressId) -> Result<(), RepositoryError> {
        let mut inner = self.lock();
        let position = inner
            .tables
            .addresses
            .iter()
            .position(|a| a.id == id && a.user_id == user_id)
            .ok_or(RepositoryError::NotFound)?;

        if inner.tables.orders.iter().any(|o| o.shipping_address_id == id) {
            return Err(RepositoryError::InUse("address is used by an order".to_owned()));
        }
        inner.tables.addresses.remove(position);
        Ok(())
    }

    async fn set_default(&self, user_id: UserId, id: AddressId) -> Result<Address, RepositoryError> {
        let mut inner = self.lock();
        let now = inner.now();
        let position = inner
            .tables
            .addresses
            .iter()
            .position(|a| a.id == id && a.user_id == user_id)
            .ok_or(RepositoryError::NotFound)?;

        clear_defaults(&mut inner.tables, user_id, Some(id));
        let address = inner
            .tables
            .addresses
            .get_mut(position)
            .ok_or(RepositoryError::NotFound)?;
        address.is_default = true;
        address.updated_at = now;
        Ok(address.clone())
    }
}

impl CartStore for MemoryStore {
    async fn get_or_create(&self, user_id: UserId) -> Result<Cart, RepositoryError> {
        let mut inner = self.lock();
        if let Some(cart) = inner.tables.carts.iter().find(|c| c.user_id == user_id) {
            return Ok(cart.clone());
        }
        if !inner.tables.users.contains(&user_id) {
            return Err(RepositoryError::InvalidReference("carts_user_id_fkey".to_owned()));
        }

        let now = inner.now();
        let cart = Cart {
            id: CartId::generate(),
            user_id,
            created_at: now,
            updated_at: now,
        };
        inner.tables.carts.push(cart.clone());
        Ok(cart)
    }

    async fn list_items(&self, cart_id: CartId) -> Result<Vec<CartItem>, RepositoryError> {
        let inner = self.lock();
        let mut items: Vec<CartItem> = inner
            .tables
            .cart_items
            .iter()
            .filter(|item| item.cart_id == cart_id)
            .cloned()
            .collect();
        items.sort_by_key(|item| item.created_at);
        Ok(items)
    }

    async fn find_item(
        &self,
        cart_id: CartId,
        product_id: ProductId,
    ) -> Result<Option<CartItem>, RepositoryError> {
        Ok(self
            .lock()
            .tables
            .cart_items
            .iter()
            .find(|item| item.cart_id == cart_id && item.product_id == product_id)
            .cloned())
    }

    async fn add_item(
        &self,
        cart_id: CartId,
        product_id: ProductId,
        quantity: Quantity,
        price: Price,
    ) -> Result<CartItem, RepositoryError> {
        let mut inner = self.lock();
        if !inner.tables.products.contains_key(&product_id) {
            return Err(RepositoryError::InvalidReference(
                "cart_items_product_id_fkey".to_owned(),
            ));
        }
        let now = inner.now();

        if let Some(item) = inner
            .tables
            .cart_items
            .iter_mut()
            .find(|item| item.cart_id == cart_id && item.product_id == product_id)
        {
            item.quantity = item
                .quantity
                .checked_add(quantity)
                .ok_or_else(|| RepositoryError::OutOfRange("integer out of range".to_owned()))?;
            item.price = price;
            item.updated_at = now;
            return Ok(item.clone());
        }

        let item = CartItem {
            id: CartItemId::generate(),
            cart_id,
            product_id,
            quantity,
            price,
            created_at: now,
            updated_at: now,
        };
        inner.tables.cart_items.push(item.clone());
        Ok(item)
    }

    async fn update_quantity(
        &self,
        cart_id: CartId,
        product_id: ProductId,
        quantity: Quantity,
    ) -> Result<CartItem, RepositoryError> {
        let mut inner = self.lock();
        let now = inner.now();
        let item = inner
            .tables
            .cart_items
            .iter_mut()
            .find(|item| item.cart_id == cart_id && item.product_id == product_id)
            .ok_or(RepositoryError::ProductNotInCart)?;

        item.quantity = quantity;
        item.updated_at = now;
        Ok(item.clone())
    }

    async fn remove_item(&self, cart_id: CartId, product_id: ProductId) -> Result<(), RepositoryError> {
        let mut inner = self.lock();
        let before = inner.tables.cart_items.len();
        inner
            .tables
            .cart_items
            .retain(|item| !(item.cart_id == cart_id && item.product_id == product_id));

        if inner.tables.cart_items.len() == before {
            return Err(RepositoryError::ProductNotInCart);
        }
        Ok(())
    }

    async fn clear(&self, cart_id: CartId) -> Result<u64, RepositoryError> {
        let mut inner = self.lock();
        let before = inner.tables.cart_items.len();
        inner.tables.cart_items.retain(|item| item.cart_id != cart_id);
        let removed = before - inner.tables.cart_items.len();
        Ok(u64::try_from(removed).unwrap_or(u64::MAX))
    }
}

impl OrderStore for MemoryStore {
    async fn create_from_cart(
        &self,
        user_id: UserId,
        cart_id: CartId,
        shipping_address_id: AddressId,
        items: &[CartItem],
    ) -> Result<OrderWithItems, RepositoryError> {
        if items.is_empty() {
            return Err(RepositoryError::EmptyCart);
        }

        let mut inner = self.lock();
        let fault = inner.fault.take();

        // Work on a copy; it replaces the live tables only on success.
        let mut tx = inner.tables.clone();

        if !tx.carts.iter().any(|c| c.id == cart_id && c.user_id == user_id) {
            return Err(RepositoryError::NotFound);
        }
        if !tx.addresses.iter().any(|a| a.id == shipping_address_id) {
            return Err(RepositoryError::InvalidReference(
                "orders_shipping_address_id_fkey".to_owned(),
            ));
        }

        if fault == Some(CheckoutFault::InsertOrder) {
            return Err(RepositoryError::Conflict("injected: insert order".to_owned()));
        }
        let total = total_of(items.iter().map(|item| (item.quantity, item.price)));
        if total > Price::MAX {
            return Err(RepositoryError::OutOfRange("numeric field overflow".to_owned()));
        }
        let now = inner.now();
        let order = Order {
            id: OrderId::generate(),
            user_id,
            shipping_address_id,
            status: OrderStatus::Pending,
            total,
            tracking_number: None,
            created_at: now,
            updated_at: now,
        };
        tx.orders.push(order.clone());

        let mut order_items = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            if fault == Some(CheckoutFault::InsertItem(index)) {
                return Err(RepositoryError::Conflict("injected: insert item".to_owned()));
            }
            if !tx.products.contains_key(&item.product_id) {
                return Err(RepositoryError::InvalidReference(
                    "order_items_product_id_fkey".to_owned(),
                ));
            }
            let created_at = inner.now();
            let line = OrderItem {
                id: OrderItemId::generate(),
                order_id: order.id,
                product_id: item.product_id,
                quantity: item.quantity,
                price: item.price,
                created_at,
                updated_at: created_at,
            };
            tx.order_items.push(line.clone());
            order_items.push(line);
        }

        if fault == Some(CheckoutFault::ClearCart) {
            return Err(RepositoryError::Conflict("injected: clear cart".to_owned()));
        }
        let (removed, kept): (Vec<CartItem>, Vec<CartItem>) = tx
            .cart_items
            .into_iter()
            .partition(|item| item.cart_id == cart_id);
        tx.cart_items = kept;

        let removed = sorted_lines(
            removed
                .iter()
                .map(|item| (item.product_id, item.quantity, item.price))
                .collect(),
        );
        let expected = sorted_lines(
            items
                .iter()
                .map(|item| (item.product_id, item.quantity, item.price))
                .collect(),
        );
        if removed != expected {
            return Err(RepositoryError::Conflict("cart changed during checkout".to_owned()));
        }

        inner.tables = tx;
        Ok(OrderWithItems {
            order,
            items: order_items,
        })
    }

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let inner = self.lock();
        let mut orders: Vec<Order> = inner
            .tables
            .orders
            .iter()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn find_with_items(&self, id: OrderId) -> Result<Option<OrderWithItems>, RepositoryError> {
        let inner = self.lock();
        let Some(order) = inner.tables.orders.iter().find(|o| o.id == id).cloned() else {
            return Ok(None);
        };
        let items = inner
            .tables
            .order_items
            .iter()
            .filter(|item| item.order_id == id)
            .cloned()
            .collect();
        Ok(Some(OrderWithItems { order, items }))
    }

    async fn update_status(&self, id: OrderId, status: OrderStatus) -> Result<Order, RepositoryError> {
        let mut inner = self.lock();
        let now = inner.now();
        let order = inner
            .tables
            .orders
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or(RepositoryError::NotFound)?;

        if !order.status.can_transition_to(status) {
            return Err(RepositoryError::InvalidTransition {
                from: order.status,
                to: status,
            });
        }
        order.status = status;
        order.updated_at = now;
        Ok(order.clone())
    }

    async fn update_tracking(&self, id: OrderId, tracking_number: &str) -> Result<Order, RepositoryError> {
        let mut inner = self.lock();
        let now = inner.now();
        let order = inner
            .tables
            .orders
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or(RepositoryError::NotFound)?;

        order.tracking_number = Some(tracking_number.to_owned());
        order.updated_at = now;
        Ok(order.clone())
    }
}

impl ProductCatalog for MemoryStore {
    async fn current_price(&self, product_id: ProductId) -> Result<Option<Price>, RepositoryError> {
        Ok(self.lock().tables.products.get(&product_id).copied())
    }
}

impl UserDirectory for MemoryStore {
    async fn exists(&self, user_id: UserId) -> Result<bool, RepositoryError> {
        Ok(self.lock().tables.users.contains(&user_id))
    }
}

/// A [`NewAddress`] with placeholder fields.
#[must_use]
pub fn new_address(street: &str, is_default: bool) -> NewAddress {
    NewAddress {
        street: street.to_owned(),
        city: "Lisbon".to_owned(),
        state: "Lisboa".to_owned(),
        postal_code: "1100-148".to_owned(),
        country: "PT".to_owned(),
        is_default,
    }
}
