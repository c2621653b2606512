//! Cart merge semantics.

#![allow(clippy::unwrap_used)]

use bullet_cloud_api::db::{CartStore, RepositoryError};
use bullet_cloud_api::services::{CartService, ServiceError};
use bullet_cloud_core::{ProductId, Quantity};
use bullet_cloud_integration_tests::{MemoryStore, price_of};

fn service(store: &MemoryStore) -> CartService<MemoryStore, MemoryStore> {
    CartService::new(store.clone(), store.clone())
}

#[tokio::test]
async fn test_first_view_creates_empty_cart() {
    let store = MemoryStore::new();
    let user = store.seed_user();

    let view = service(&store).view(user).await.unwrap();

    assert_eq!(view.cart.user_id, user);
    assert!(view.items.is_empty());
    assert_eq!(view.total, price_of("0"));
}

#[tokio::test]
async fn test_get_or_create_returns_same_cart() {
    let store = MemoryStore::new();
    let user = store.seed_user();

    let (a, b) = futures::join!(store.get_or_create(user), store.get_or_create(user));

    assert_eq!(a.unwrap().id, b.unwrap().id);
    assert_eq!(store.snapshot().carts.len(), 1);
}

#[tokio::test]
async fn test_repeat_add_merges_and_takes_newest_price() {
    let store = MemoryStore::new();
    let user = store.seed_user();
    let product = store.seed_product("10.00");
    let carts = service(&store);

    carts.add_item(user, product, 2).await.unwrap();
    store.set_price(product, "12.50");
    let merged = carts.add_item(user, product, 3).await.unwrap();

    assert_eq!(merged.quantity.get(), 5);
    assert_eq!(merged.price, price_of("12.50"));

    let lines = store.cart_lines(user);
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].id, merged.id);
    assert_eq!(service(&store).view(user).await.unwrap().total, price_of("62.50"));
}

#[tokio::test]
async fn test_merge_past_integer_range_is_invalid_argument() {
    let store = MemoryStore::new();
    let user = store.seed_user();
    let product = store.seed_product("1.00");
    let carts = service(&store);

    carts.add_item(user, product, i32::MAX).await.unwrap();
    let before = store.snapshot();

    let err = carts.add_item(user, product, 1).await.unwrap_err();

    assert!(matches!(err, ServiceError::InvalidArgument(_)));
    assert!(!err.is_retryable());
    assert_eq!(store.snapshot(), before);
}

#[tokio::test]
async fn test_store_reports_merge_overflow_as_out_of_range() {
    let store = MemoryStore::new();
    let user = store.seed_user();
    let product = store.seed_product("1.00");
    let cart = store.get_or_create(user).await.unwrap();
    let max = Quantity::new(i32::MAX).unwrap();

    store.add_item(cart.id, product, max, price_of("1.00")).await.unwrap();
    let err = store
        .add_item(cart.id, product, Quantity::ONE, price_of("1.00"))
        .await
        .unwrap_err();

    assert!(matches!(err, RepositoryError::OutOfRange(_)));
    assert_eq!(store.cart_lines(user)[0].quantity, max);
}

#[tokio::test]
async fn test_add_rejects_non_positive_quantity() {
    let store = MemoryStore::new();
    let user = store.seed_user();
    let product = store.seed_product("1.00");

    for quantity in [0, -1] {
        let err = service(&store).add_item(user, product, quantity).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidArgument(_)));
    }
    // Rejected before the cart was touched.
    assert!(store.snapshot().carts.is_empty());
}

#[tokio::test]
async fn test_add_unknown_product_is_not_found() {
    let store = MemoryStore::new();
    let user = store.seed_user();

    let err = service(&store)
        .add_item(user, ProductId::generate(), 1)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound("product")));
}

#[tokio::test]
async fn test_items_listed_in_insertion_order() {
    let store = MemoryStore::new();
    let user = store.seed_user();
    let products: Vec<ProductId> = (0..4).map(|_| store.seed_product("2.00")).collect();
    let carts = service(&store);

    for product in &products {
        carts.add_item(user, *product, 1).await.unwrap();
    }
    // Merging into the first line keeps its position.
    carts.add_item(user, products[0], 1).await.unwrap();

    let listed: Vec<ProductId> = carts
        .view(user)
        .await
        .unwrap()
        .items
        .iter()
        .map(|item| item.product_id)
        .collect();
    assert_eq!(listed, products);
}

#[tokio::test]
async fn test_set_quantity_replaces_quantity() {
    let store = MemoryStore::new();
    let user = store.seed_user();
    let product = store.seed_product("4.00");
    let carts = service(&store);
    carts.add_item(user, product, 5).await.unwrap();

    let updated = carts.set_quantity(user, product, 2).await.unwrap().unwrap();

    assert_eq!(updated.quantity.get(), 2);
    assert_eq!(carts.view(user).await.unwrap().total, price_of("8.00"));
}

#[tokio::test]
async fn test_set_quantity_zero_removes_line() {
    let store = MemoryStore::new();
    let user = store.seed_user();
    let product = store.seed_product("4.00");
    let carts = service(&store);
    carts.add_item(user, product, 5).await.unwrap();

    assert!(carts.set_quantity(user, product, 0).await.unwrap().is_none());
    assert!(store.cart_lines(user).is_empty());
}

#[tokio::test]
async fn test_set_quantity_on_missing_line() {
    let store = MemoryStore::new();
    let user = store.seed_user();
    let product = store.seed_product("4.00");
    let carts = service(&store);

    let err = carts.set_quantity(user, product, 3).await.unwrap_err();
    assert!(matches!(err, ServiceError::ProductNotInCart));

    let err = carts.set_quantity(user, product, -2).await.unwrap_err();
    assert!(matches!(err, ServiceError::ProductNotInCart));
}

#[tokio::test]
async fn test_remove_never_added_is_product_not_in_cart() {
    let store = MemoryStore::new();
    let user = store.seed_user();
    let product = store.seed_product("4.00");

    let err = service(&store).remove_item(user, product).await.unwrap_err();
    assert!(matches!(err, ServiceError::ProductNotInCart));
}

#[tokio::test]
async fn test_remove_twice_fails_second_time() {
    let store = MemoryStore::new();
    let user = store.seed_user();
    let product = store.seed_product("4.00");
    let carts = service(&store);
    carts.add_item(user, product, 1).await.unwrap();

    carts.remove_item(user, product).await.unwrap();
    assert!(matches!(
        carts.remove_item(user, product).await,
        Err(ServiceError::ProductNotInCart)
    ));
}

#[tokio::test]
async fn test_clear_is_idempotent() {
    let store = MemoryStore::new();
    let user = store.seed_user();
    let product = store.seed_product("4.00");
    let carts = service(&store);
    carts.add_item(user, product, 1).await.unwrap();

    carts.clear(user).await.unwrap();
    carts.clear(user).await.unwrap();

    let view = carts.view(user).await.unwrap();
    assert!(view.items.is_empty());
    assert_eq!(view.total, price_of("0.00"));
}

#[tokio::test]
async fn test_carts_are_per_user() {
    let store = MemoryStore::new();
    let alice = store.seed_user();
    let bob = store.seed_user();
    let product = store.seed_product("4.00");
    let carts = service(&store);

    carts.add_item(alice, product, 1).await.unwrap();

    assert!(carts.view(bob).await.unwrap().items.is_empty());
    assert!(matches!(
        carts.remove_item(bob, product).await,
        Err(ServiceError::ProductNotInCart)
    ));
    assert_eq!(store.cart_lines(alice).len(), 1);
}
