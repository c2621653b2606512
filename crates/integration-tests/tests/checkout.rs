//! Checkout: cart to order, all or nothing.

#![allow(clippy::unwrap_used)]

use bullet_cloud_api::db::{AddressStore, CartStore, OrderStore};
use bullet_cloud_api::services::{CartService, CheckoutService, OrderService, ServiceError};
use bullet_cloud_core::{AddressId, OrderStatus, UserId};
use bullet_cloud_integration_tests::{CheckoutFault, MemoryStore, new_address, price_of};

fn checkout_service(store: &MemoryStore) -> CheckoutService<MemoryStore, MemoryStore, MemoryStore> {
    CheckoutService::new(store.clone(), store.clone(), store.clone())
}

fn cart_service(store: &MemoryStore) -> CartService<MemoryStore, MemoryStore> {
    CartService::new(store.clone(), store.clone())
}

async fn user_with_address(store: &MemoryStore) -> (UserId, AddressId) {
    let user = store.seed_user();
    let address = store.create(user, &new_address("1 Main St", true)).await.unwrap();
    (user, address.id)
}

// =============================================================================
// Happy path
// =============================================================================

#[tokio::test]
async fn test_checkout_two_lines_totals_45() {
    let store = MemoryStore::new();
    let (user, address) = user_with_address(&store).await;
    let a = store.seed_product("10.00");
    let b = store.seed_product("25.00");

    let carts = cart_service(&store);
    carts.add_item(user, a, 2).await.unwrap();
    carts.add_item(user, b, 1).await.unwrap();

    let order = checkout_service(&store).checkout(user, address).await.unwrap();

    assert_eq!(order.order.total, price_of("45.00"));
    assert_eq!(order.order.status, OrderStatus::Pending);
    assert_eq!(order.order.user_id, user);
    assert_eq!(order.order.shipping_address_id, address);
    assert_eq!(order.items.len(), 2);
    assert!(carts.view(user).await.unwrap().items.is_empty());
}

#[tokio::test]
async fn test_checkout_copies_lines_verbatim() {
    let store = MemoryStore::new();
    let (user, address) = user_with_address(&store).await;
    let a = store.seed_product("3.50");
    let b = store.seed_product("0.99");
    let c = store.seed_product("120.00");

    let carts = cart_service(&store);
    carts.add_item(user, a, 4).await.unwrap();
    carts.add_item(user, b, 10).await.unwrap();
    carts.add_item(user, c, 1).await.unwrap();
    let lines = carts.view(user).await.unwrap();

    let order = checkout_service(&store).checkout(user, address).await.unwrap();

    assert_eq!(order.items.len(), lines.items.len());
    for (line, item) in lines.items.iter().zip(&order.items) {
        assert_eq!(item.product_id, line.product_id);
        assert_eq!(item.quantity, line.quantity);
        assert_eq!(item.price, line.price);
        assert_eq!(item.order_id, order.order.id);
        assert_eq!(item.updated_at, item.created_at);
    }
    assert_eq!(order.order.total, lines.total);

    let tables = store.snapshot();
    assert_eq!(tables.orders.len(), 1);
    assert_eq!(tables.order_items.len(), 3);
}

#[tokio::test]
async fn test_order_total_survives_price_changes() {
    let store = MemoryStore::new();
    let (user, address) = user_with_address(&store).await;
    let product = store.seed_product("10.00");

    cart_service(&store).add_item(user, product, 3).await.unwrap();
    let order = checkout_service(&store).checkout(user, address).await.unwrap();

    store.set_price(product, "99.00");

    let reread = OrderService::new(store.clone())
        .get(user, order.order.id)
        .await
        .unwrap();
    assert_eq!(reread.order.total, price_of("30.00"));
    assert_eq!(reread.items[0].price, price_of("10.00"));
}

// =============================================================================
// Rejected before any transaction
// =============================================================================

#[tokio::test]
async fn test_empty_cart_creates_no_order() {
    let store = MemoryStore::new();
    let (user, address) = user_with_address(&store).await;

    let err = checkout_service(&store).checkout(user, address).await.unwrap_err();

    assert!(matches!(err, ServiceError::InvalidState(ref msg) if msg == "cannot create order from empty cart"));
    assert!(store.snapshot().orders.is_empty());
}

#[tokio::test]
async fn test_foreign_address_is_rejected() {
    let store = MemoryStore::new();
    let (user, _) = user_with_address(&store).await;
    let (_, other_address) = user_with_address(&store).await;
    let product = store.seed_product("5.00");
    cart_service(&store).add_item(user, product, 1).await.unwrap();

    let err = checkout_service(&store).checkout(user, other_address).await.unwrap_err();

    assert!(matches!(err, ServiceError::InvalidArgument(_)));
    assert!(store.snapshot().orders.is_empty());
    assert_eq!(store.cart_lines(user).len(), 1);
}

#[tokio::test]
async fn test_unknown_address_is_rejected() {
    let store = MemoryStore::new();
    let (user, _) = user_with_address(&store).await;
    let product = store.seed_product("5.00");
    cart_service(&store).add_item(user, product, 1).await.unwrap();

    let err = checkout_service(&store)
        .checkout(user, AddressId::generate())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidArgument(_)));
}

// =============================================================================
// Rollback
// =============================================================================

async fn assert_fault_rolls_back(fault: CheckoutFault) {
    let store = MemoryStore::new();
    let (user, address) = user_with_address(&store).await;
    let a = store.seed_product("10.00");
    let b = store.seed_product("25.00");
    let carts = cart_service(&store);
    carts.add_item(user, a, 2).await.unwrap();
    carts.add_item(user, b, 1).await.unwrap();

    let before = store.snapshot();
    store.fail_next_checkout(fault);

    assert!(checkout_service(&store).checkout(user, address).await.is_err());

    let after = store.snapshot();
    assert_eq!(after, before, "{fault:?} left partial state");
    assert!(after.orders.is_empty());
    assert!(after.order_items.is_empty());
    assert_eq!(store.cart_lines(user).len(), 2);
}

#[tokio::test]
async fn test_failure_inserting_order_rolls_back() {
    assert_fault_rolls_back(CheckoutFault::InsertOrder).await;
}

#[tokio::test]
async fn test_failure_inserting_second_item_rolls_back() {
    assert_fault_rolls_back(CheckoutFault::InsertItem(1)).await;
}

#[tokio::test]
async fn test_failure_clearing_cart_rolls_back() {
    assert_fault_rolls_back(CheckoutFault::ClearCart).await;
}

#[tokio::test]
async fn test_deleted_product_rolls_back() {
    let store = MemoryStore::new();
    let (user, address) = user_with_address(&store).await;
    let kept = store.seed_product("10.00");
    let dropped = store.seed_product("25.00");
    let carts = cart_service(&store);
    carts.add_item(user, kept, 1).await.unwrap();
    carts.add_item(user, dropped, 1).await.unwrap();

    store.remove_product(dropped);
    let before = store.snapshot();

    let err = checkout_service(&store).checkout(user, address).await.unwrap_err();

    assert!(matches!(err, ServiceError::InvalidState(_)));
    assert_eq!(store.snapshot(), before);
}

#[tokio::test]
async fn test_total_beyond_order_precision_is_rejected() {
    let store = MemoryStore::new();
    let (user, address) = user_with_address(&store).await;
    let product = store.seed_product("25.00");
    let carts = cart_service(&store);
    carts.add_item(user, product, 1_000_000_000).await.unwrap();
    assert_eq!(carts.view(user).await.unwrap().total, price_of("25000000000.00"));
    let before = store.snapshot();

    let err = checkout_service(&store).checkout(user, address).await.unwrap_err();

    assert!(matches!(err, ServiceError::InvalidState(_)));
    assert_eq!(store.snapshot(), before);
}

#[tokio::test]
async fn test_store_refuses_total_beyond_order_precision() {
    let store = MemoryStore::new();
    let (user, address) = user_with_address(&store).await;
    let product = store.seed_product("25.00");
    cart_service(&store).add_item(user, product, 1_000_000_000).await.unwrap();
    let cart = store.get_or_create(user).await.unwrap();
    let items = store.list_items(cart.id).await.unwrap();
    let before = store.snapshot();

    let err = store
        .create_from_cart(user, cart.id, address, &items)
        .await
        .unwrap_err();

    assert!(matches!(err, bullet_cloud_api::db::RepositoryError::OutOfRange(_)));
    assert_eq!(store.snapshot(), before);
}

#[tokio::test]
async fn test_address_deleted_mid_checkout_is_named() {
    let store = MemoryStore::new();
    let user = store.seed_user();
    let product = store.seed_product("10.00");
    cart_service(&store).add_item(user, product, 1).await.unwrap();
    let cart = store.get_or_create(user).await.unwrap();
    let items = store.list_items(cart.id).await.unwrap();

    let err = store
        .create_from_cart(user, cart.id, AddressId::generate(), &items)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        bullet_cloud_api::db::RepositoryError::InvalidReference(ref c) if c.contains("shipping_address")
    ));
    assert_eq!(store.cart_lines(user).len(), 1);
}

#[tokio::test]
async fn test_stale_cart_is_a_conflict() {
    let store = MemoryStore::new();
    let (user, address) = user_with_address(&store).await;
    let a = store.seed_product("10.00");
    let b = store.seed_product("25.00");
    let carts = cart_service(&store);
    carts.add_item(user, a, 1).await.unwrap();

    // Lines read, then another request adds to the cart before the commit.
    let cart = store.get_or_create(user).await.unwrap();
    let stale = store.list_items(cart.id).await.unwrap();
    carts.add_item(user, b, 1).await.unwrap();
    let before = store.snapshot();

    let err = store
        .create_from_cart(user, cart.id, address, &stale)
        .await
        .unwrap_err();

    assert!(matches!(err, bullet_cloud_api::db::RepositoryError::Conflict(_)));
    assert_eq!(store.snapshot(), before);
}

#[tokio::test]
async fn test_second_checkout_finds_empty_cart() {
    let store = MemoryStore::new();
    let (user, address) = user_with_address(&store).await;
    let product = store.seed_product("10.00");
    cart_service(&store).add_item(user, product, 1).await.unwrap();

    let checkout = checkout_service(&store);
    checkout.checkout(user, address).await.unwrap();
    let err = checkout.checkout(user, address).await.unwrap_err();

    assert!(matches!(err, ServiceError::InvalidState(_)));
    assert_eq!(store.snapshot().orders.len(), 1);
}

#[tokio::test]
async fn test_concurrent_checkouts_produce_one_order() {
    let store = MemoryStore::new();
    let (user, address) = user_with_address(&store).await;
    let product = store.seed_product("10.00");
    cart_service(&store).add_item(user, product, 2).await.unwrap();

    let first = checkout_service(&store);
    let second = checkout_service(&store);
    let (a, b) = futures::join!(first.checkout(user, address), second.checkout(user, address));

    assert_eq!(usize::from(a.is_ok()) + usize::from(b.is_ok()), 1);
    assert_eq!(store.snapshot().orders.len(), 1);
    assert!(store.cart_lines(user).is_empty());
}

#[tokio::test]
async fn test_checkout_only_clears_own_cart() {
    let store = MemoryStore::new();
    let (alice, address) = user_with_address(&store).await;
    let (bob, _) = user_with_address(&store).await;
    let product = store.seed_product("10.00");
    let carts = cart_service(&store);
    carts.add_item(alice, product, 1).await.unwrap();
    carts.add_item(bob, product, 5).await.unwrap();

    checkout_service(&store).checkout(alice, address).await.unwrap();

    assert!(store.cart_lines(alice).is_empty());
    assert_eq!(store.cart_lines(bob)[0].quantity.get(), 5);
}

#[tokio::test]
async fn test_empty_items_rejected_by_store() {
    let store = MemoryStore::new();
    let (user, address) = user_with_address(&store).await;
    let cart = store.get_or_create(user).await.unwrap();

    let err = store.create_from_cart(user, cart.id, address, &[]).await.unwrap_err();
    assert!(matches!(err, bullet_cloud_api::db::RepositoryError::EmptyCart));
    assert!(store.snapshot().orders.is_empty());
}
