//! Cart behavior: lazy creation, merge-on-add, overwrite, removal.

mod common;

use assert_matches::assert_matches;
use backoffice_api::errors::ServiceError;

use common::{seed_catalog, spawn_app};

#[tokio::test]
async fn first_access_creates_an_empty_cart() {
    let app = spawn_app().await;
    let catalog = seed_catalog(&app.db).await;

    let view = app.services.carts.get_cart(catalog.customer_id).await.unwrap();
    assert_eq!(view.customer_id, catalog.customer_id);
    assert!(view.items.is_empty());

    // The same cart comes back on the next access.
    let again = app.services.carts.get_cart(catalog.customer_id).await.unwrap();
    assert_eq!(again.cart_id, view.cart_id);
}

#[tokio::test]
async fn adding_the_same_product_merges_quantities() {
    let app = spawn_app().await;
    let catalog = seed_catalog(&app.db).await;

    app.services
        .carts
        .add_item(catalog.customer_id, catalog.product_a, 2)
        .await
        .unwrap();
    let view = app
        .services
        .carts
        .add_item(catalog.customer_id, catalog.product_a, 3)
        .await
        .unwrap();

    assert_eq!(view.items.len(), 1);
    assert_eq!(view.items[0].product_id, catalog.product_a);
    assert_eq!(view.items[0].quantity, 5);
}

#[tokio::test]
async fn update_overwrites_and_requires_the_line_to_exist() {
    let app = spawn_app().await;
    let catalog = seed_catalog(&app.db).await;

    app.services
        .carts
        .add_item(catalog.customer_id, catalog.product_a, 2)
        .await
        .unwrap();

    let view = app
        .services
        .carts
        .update_item(catalog.customer_id, catalog.product_a, 9)
        .await
        .unwrap();
    assert_eq!(view.items[0].quantity, 9);

    let err = app
        .services
        .carts
        .update_item(catalog.customer_id, catalog.product_b, 1)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}

#[tokio::test]
async fn update_without_a_cart_is_not_found() {
    let app = spawn_app().await;
    let catalog = seed_catalog(&app.db).await;

    let err = app
        .services
        .carts
        .update_item(catalog.customer_id, catalog.product_a, 1)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}

#[tokio::test]
async fn non_positive_quantities_are_rejected() {
    let app = spawn_app().await;
    let catalog = seed_catalog(&app.db).await;

    let err = app
        .services
        .carts
        .add_item(catalog.customer_id, catalog.product_a, 0)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));

    app.services
        .carts
        .add_item(catalog.customer_id, catalog.product_a, 1)
        .await
        .unwrap();
    let err = app
        .services
        .carts
        .update_item(catalog.customer_id, catalog.product_a, -2)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
}

#[tokio::test]
async fn remove_and_clear() {
    let app = spawn_app().await;
    let catalog = seed_catalog(&app.db).await;

    app.services
        .carts
        .add_item(catalog.customer_id, catalog.product_a, 2)
        .await
        .unwrap();
    app.services
        .carts
        .add_item(catalog.customer_id, catalog.product_b, 1)
        .await
        .unwrap();

    let view = app
        .services
        .carts
        .remove_item(catalog.customer_id, catalog.product_a)
        .await
        .unwrap();
    assert_eq!(view.items.len(), 1);

    let err = app
        .services
        .carts
        .remove_item(catalog.customer_id, catalog.product_a)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));

    let view = app.services.carts.clear(catalog.customer_id).await.unwrap();
    assert!(view.items.is_empty());

    // Clearing an empty cart succeeds.
    let view = app.services.carts.clear(catalog.customer_id).await.unwrap();
    assert!(view.items.is_empty());
}

#[tokio::test]
async fn carts_never_touch_the_stock_ledger() {
    let app = spawn_app().await;
    let catalog = seed_catalog(&app.db).await;
    app.services
        .stock
        .set_stock(catalog.branch_id, catalog.product_a, 5, 0)
        .await
        .unwrap();

    // Far more than is in stock; carts do not reserve.
    app.services
        .carts
        .add_item(catalog.customer_id, catalog.product_a, 500)
        .await
        .unwrap();

    let level = app
        .services
        .stock
        .get_level(catalog.branch_id, catalog.product_a)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(level.available_quantity, 5);
}
