//! Address book and the single-default rule.

#![allow(clippy::unwrap_used)]

use bullet_cloud_api::models::AddressPatch;
use bullet_cloud_api::services::{AddressService, ServiceError};
use bullet_cloud_core::{AddressId, UserId};
use bullet_cloud_integration_tests::{MemoryStore, new_address};

fn service(store: &MemoryStore) -> AddressService<MemoryStore> {
    AddressService::new(store.clone())
}

#[tokio::test]
async fn test_set_default_moves_flag() {
    let store = MemoryStore::new();
    let user = store.seed_user();
    let addresses = service(&store);

    let x = addresses.create(user, new_address("1 Main St", true)).await.unwrap();
    let y = addresses.create(user, new_address("2 Side St", false)).await.unwrap();

    let y = addresses.set_default(user, y.id).await.unwrap();

    assert!(y.is_default);
    assert!(!addresses.get(user, x.id).await.unwrap().is_default);
    assert_eq!(store.default_count(user), 1);
}

#[tokio::test]
async fn test_create_default_clears_previous() {
    let store = MemoryStore::new();
    let user = store.seed_user();
    let addresses = service(&store);

    let first = addresses.create(user, new_address("1 Main St", true)).await.unwrap();
    let second = addresses.create(user, new_address("2 Side St", true)).await.unwrap();

    assert!(!addresses.get(user, first.id).await.unwrap().is_default);
    assert!(addresses.get(user, second.id).await.unwrap().is_default);
    assert_eq!(store.default_count(user), 1);
}

#[tokio::test]
async fn test_patch_default_clears_previous() {
    let store = MemoryStore::new();
    let user = store.seed_user();
    let addresses = service(&store);
    let first = addresses.create(user, new_address("1 Main St", true)).await.unwrap();
    let second = addresses.create(user, new_address("2 Side St", false)).await.unwrap();

    let patch = AddressPatch {
        is_default: Some(true),
        city: Some("Porto".to_owned()),
        ..AddressPatch::default()
    };
    let updated = addresses.update(user, second.id, patch).await.unwrap();

    assert!(updated.is_default);
    assert_eq!(updated.city, "Porto");
    assert_eq!(updated.street, "2 Side St");
    assert!(!addresses.get(user, first.id).await.unwrap().is_default);
}

#[tokio::test]
async fn test_at_most_one_default_after_any_sequence() {
    let store = MemoryStore::new();
    let user = store.seed_user();
    let addresses = service(&store);

    let mut ids = Vec::new();
    for (i, is_default) in [false, true, false, true, false].into_iter().enumerate() {
        let created = addresses
            .create(user, new_address(&format!("{i} Main St"), is_default))
            .await
            .unwrap();
        ids.push(created.id);
        assert!(store.default_count(user) <= 1);
    }

    for id in [ids[2], ids[0], ids[4], ids[4], ids[1]] {
        addresses.set_default(user, id).await.unwrap();
        assert_eq!(store.default_count(user), 1);
    }
    // A failed call changes nothing.
    assert!(addresses.set_default(user, AddressId::generate()).await.is_err());
    assert_eq!(store.default_count(user), 1);
    assert!(addresses.get(user, ids[1]).await.unwrap().is_default);
}

#[tokio::test]
async fn test_concurrent_set_default_leaves_one() {
    let store = MemoryStore::new();
    let user = store.seed_user();
    let addresses = service(&store);
    let a = addresses.create(user, new_address("1 Main St", false)).await.unwrap();
    let b = addresses.create(user, new_address("2 Side St", false)).await.unwrap();

    let (ra, rb) = futures::join!(
        addresses.set_default(user, a.id),
        addresses.set_default(user, b.id)
    );
    ra.unwrap();
    rb.unwrap();

    assert_eq!(store.default_count(user), 1);
}

#[tokio::test]
async fn test_set_default_on_foreign_address_is_not_found() {
    let store = MemoryStore::new();
    let alice = store.seed_user();
    let bob = store.seed_user();
    let addresses = service(&store);
    let mine = addresses.create(alice, new_address("1 Main St", true)).await.unwrap();
    let theirs = addresses.create(bob, new_address("9 Far Rd", false)).await.unwrap();

    let err = addresses.set_default(alice, theirs.id).await.unwrap_err();

    assert!(matches!(err, ServiceError::NotFound("address")));
    assert!(addresses.get(alice, mine.id).await.unwrap().is_default);
    assert!(!addresses.get(bob, theirs.id).await.unwrap().is_default);
}

#[tokio::test]
async fn test_lookups_are_scoped_by_owner() {
    let store = MemoryStore::new();
    let alice = store.seed_user();
    let bob = store.seed_user();
    let addresses = service(&store);
    let theirs = addresses.create(bob, new_address("9 Far Rd", false)).await.unwrap();

    assert!(matches!(
        addresses.get(alice, theirs.id).await,
        Err(ServiceError::NotFound("address"))
    ));
    assert!(matches!(
        addresses.update(alice, theirs.id, AddressPatch::default()).await,
        Err(ServiceError::NotFound("address"))
    ));
    assert!(matches!(
        addresses.delete(alice, theirs.id).await,
        Err(ServiceError::NotFound("address"))
    ));
    assert!(addresses.list(alice).await.unwrap().is_empty());
    assert_eq!(addresses.list(bob).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_delete_then_delete_again() {
    let store = MemoryStore::new();
    let user = store.seed_user();
    let addresses = service(&store);
    let address = addresses.create(user, new_address("1 Main St", false)).await.unwrap();

    addresses.delete(user, address.id).await.unwrap();
    assert!(matches!(
        addresses.delete(user, address.id).await,
        Err(ServiceError::NotFound("address"))
    ));
}

#[tokio::test]
async fn test_list_default_first_then_newest() {
    let store = MemoryStore::new();
    let user = store.seed_user();
    let addresses = service(&store);
    let oldest = addresses.create(user, new_address("1 Main St", false)).await.unwrap();
    let default = addresses.create(user, new_address("2 Side St", true)).await.unwrap();
    let newest = addresses.create(user, new_address("3 Hill Rd", false)).await.unwrap();

    let listed: Vec<AddressId> = addresses
        .list(user)
        .await
        .unwrap()
        .into_iter()
        .map(|a| a.id)
        .collect();
    assert_eq!(listed, [default.id, newest.id, oldest.id]);
}

#[tokio::test]
async fn test_create_validates_fields() {
    let store = MemoryStore::new();
    let user = store.seed_user();
    let mut address = new_address("   ", false);

    let err = service(&store).create(user, address.clone()).await.unwrap_err();
    assert!(matches!(err, ServiceError::InvalidArgument(ref msg) if msg == "street is required"));

    address.street = "  7 Quay St  ".to_owned();
    let created = service(&store).create(user, address).await.unwrap();
    assert_eq!(created.street, "7 Quay St");
}

#[tokio::test]
async fn test_create_for_unknown_user() {
    let store = MemoryStore::new();
    let err = service(&store)
        .create(UserId::generate(), new_address("1 Main St", true))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound("user")));
}
