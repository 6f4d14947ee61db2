//! Purchase processing: totals, ledger credits and atomicity.

mod common;

use assert_matches::assert_matches;
use backoffice_api::entities::{purchase, purchase_line, supplier};
use backoffice_api::errors::ServiceError;
use backoffice_api::services::purchases::CreatePurchase;
use backoffice_api::services::LineItemInput;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::EntityTrait;

use common::{seed_catalog, spawn_app, Catalog, TestApp};

fn line(product_id: i64, quantity: i32, unit_price: Decimal) -> LineItemInput {
    LineItemInput {
        product_id,
        quantity,
        unit_price,
    }
}

fn delivery(catalog: &Catalog, items: Vec<LineItemInput>) -> CreatePurchase {
    CreatePurchase {
        supplier_id: catalog.supplier_id,
        branch_id: catalog.branch_id,
        purchase_date: None,
        items,
    }
}

async fn stock_of(app: &TestApp, branch_id: i64, product_id: i64) -> i32 {
    app.services
        .stock
        .get_level(branch_id, product_id)
        .await
        .unwrap()
        .map(|l| l.available_quantity)
        .unwrap_or(0)
}

#[tokio::test]
async fn purchase_totals_and_credits_every_line() {
    let app = spawn_app().await;
    let catalog = seed_catalog(&app.db).await;

    let created = app
        .services
        .purchases
        .create_purchase(delivery(
            &catalog,
            vec![
                line(catalog.product_a, 5, dec!(2.00)),
                line(catalog.product_b, 3, dec!(3.50)),
            ],
        ))
        .await
        .unwrap();

    assert_eq!(created.total, dec!(20.50));
    assert_eq!(created.status, "paid");
    assert_eq!(stock_of(&app, catalog.branch_id, catalog.product_a).await, 5);
    assert_eq!(stock_of(&app, catalog.branch_id, catalog.product_b).await, 3);
}

#[tokio::test]
async fn repeat_deliveries_accumulate() {
    let app = spawn_app().await;
    let catalog = seed_catalog(&app.db).await;

    for _ in 0..2 {
        app.services
            .purchases
            .create_purchase(delivery(
                &catalog,
                vec![line(catalog.product_a, 4, dec!(2.00))],
            ))
            .await
            .unwrap();
    }

    assert_eq!(stock_of(&app, catalog.branch_id, catalog.product_a).await, 8);
}

#[tokio::test]
async fn invalid_line_rejects_the_whole_batch() {
    let app = spawn_app().await;
    let catalog = seed_catalog(&app.db).await;

    let err = app
        .services
        .purchases
        .create_purchase(delivery(
            &catalog,
            vec![
                line(catalog.product_a, 5, dec!(2.00)),
                line(catalog.product_b, 0, dec!(3.50)),
            ],
        ))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));

    // Nothing was persisted, not even the valid first line.
    assert_eq!(stock_of(&app, catalog.branch_id, catalog.product_a).await, 0);
    let purchases = purchase::Entity::find().all(&*app.db).await.unwrap();
    assert!(purchases.is_empty());
}

#[tokio::test]
async fn empty_batch_is_rejected() {
    let app = spawn_app().await;
    let catalog = seed_catalog(&app.db).await;

    let err = app
        .services
        .purchases
        .create_purchase(delivery(&catalog, vec![]))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
}

#[tokio::test]
async fn mid_batch_failure_rolls_everything_back() {
    let app = spawn_app().await;
    let catalog = seed_catalog(&app.db).await;

    // Second line references a product that does not exist, so its
    // foreign key fails after the first line already credited stock.
    let err = app
        .services
        .purchases
        .create_purchase(delivery(
            &catalog,
            vec![
                line(catalog.product_a, 5, dec!(2.00)),
                line(999_999, 1, dec!(1.00)),
            ],
        ))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::DatabaseError(_));

    assert_eq!(stock_of(&app, catalog.branch_id, catalog.product_a).await, 0);
    let purchases = purchase::Entity::find().all(&*app.db).await.unwrap();
    assert!(purchases.is_empty());
    let lines = purchase_line::Entity::find().all(&*app.db).await.unwrap();
    assert!(lines.is_empty());
}

#[tokio::test]
async fn get_purchase_returns_header_and_lines() {
    let app = spawn_app().await;
    let catalog = seed_catalog(&app.db).await;

    let created = app
        .services
        .purchases
        .create_purchase(delivery(
            &catalog,
            vec![
                line(catalog.product_a, 2, dec!(2.00)),
                line(catalog.product_b, 1, dec!(3.50)),
            ],
        ))
        .await
        .unwrap();

    let details = app
        .services
        .purchases
        .get_purchase(created.id)
        .await
        .unwrap();
    assert_eq!(details.purchase.id, created.id);
    assert_eq!(details.lines.len(), 2);
    assert_eq!(details.lines[0].subtotal, dec!(4.00));
    assert_eq!(details.lines[1].subtotal, dec!(3.50));
}

#[tokio::test]
async fn purchase_joins_back_to_its_supplier() {
    let app = spawn_app().await;
    let catalog = seed_catalog(&app.db).await;

    let created = app
        .services
        .purchases
        .create_purchase(delivery(
            &catalog,
            vec![line(catalog.product_a, 2, dec!(2.00))],
        ))
        .await
        .unwrap();

    let (header, supplier) = purchase::Entity::find_by_id(created.id)
        .find_also_related(supplier::Entity)
        .one(&*app.db)
        .await
        .unwrap()
        .expect("purchase should exist");
    assert_eq!(header.id, created.id);
    assert_eq!(supplier.expect("supplier should join").id, catalog.supplier_id);
}

#[tokio::test]
async fn missing_purchase_is_not_found() {
    let app = spawn_app().await;
    seed_catalog(&app.db).await;

    let err = app.services.purchases.get_purchase(42).await.unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}
