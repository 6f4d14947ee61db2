//! Order lifecycle: creation, the debiting transition, shortfalls and
//! the transition table over real data.

mod common;

use assert_matches::assert_matches;
use backoffice_api::entities::{customer, order as order_entity};
use backoffice_api::errors::ServiceError;
use backoffice_api::events::Event;
use backoffice_api::services::order_status::OrderStatus;
use backoffice_api::services::orders::CreateOrder;
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

fn order(catalog: &Catalog, items: Vec<LineItemInput>) -> CreateOrder {
    CreateOrder {
        customer_id: catalog.customer_id,
        branch_id: catalog.branch_id,
        order_date: None,
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
async fn creation_records_intent_without_touching_stock() {
    let app = spawn_app().await;
    let catalog = seed_catalog(&app.db).await;
    app.services
        .stock
        .set_stock(catalog.branch_id, catalog.product_a, 10, 0)
        .await
        .unwrap();

    let created = app
        .services
        .orders
        .create_order(order(&catalog, vec![line(catalog.product_a, 4, dec!(2.00))]))
        .await
        .unwrap();

    assert_eq!(created.status, "pending");
    assert_eq!(created.total, dec!(8.00));
    assert_eq!(
        stock_of(&app, catalog.branch_id, catalog.product_a).await,
        10
    );
}

#[tokio::test]
async fn processing_debits_each_line_exactly_once() {
    let app = spawn_app().await;
    let catalog = seed_catalog(&app.db).await;
    app.services
        .stock
        .set_stock(catalog.branch_id, catalog.product_a, 10, 0)
        .await
        .unwrap();

    let created = app
        .services
        .orders
        .create_order(order(&catalog, vec![line(catalog.product_a, 4, dec!(2.00))]))
        .await
        .unwrap();

    let updated = app
        .services
        .orders
        .transition_status(created.id, OrderStatus::Processed)
        .await
        .unwrap();
    assert_eq!(updated.status, "processed");
    assert_eq!(stock_of(&app, catalog.branch_id, catalog.product_a).await, 6);

    // Re-processing is rejected and does not debit again.
    let err = app
        .services
        .orders
        .transition_status(created.id, OrderStatus::Processed)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidStatusTransition { .. });
    assert_eq!(stock_of(&app, catalog.branch_id, catalog.product_a).await, 6);
}

#[tokio::test]
async fn shortfall_rolls_back_and_leaves_the_order_pending() {
    let app = spawn_app().await;
    let catalog = seed_catalog(&app.db).await;
    app.services
        .stock
        .set_stock(catalog.branch_id, catalog.product_a, 6, 0)
        .await
        .unwrap();

    let created = app
        .services
        .orders
        .create_order(order(
            &catalog,
            vec![line(catalog.product_a, 10, dec!(2.00))],
        ))
        .await
        .unwrap();

    let err = app
        .services
        .orders
        .transition_status(created.id, OrderStatus::Processed)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InsufficientStock(_));

    assert_eq!(stock_of(&app, catalog.branch_id, catalog.product_a).await, 6);
    let details = app.services.orders.get_order(created.id).await.unwrap();
    assert_eq!(details.order.status, "pending");
}

#[tokio::test]
async fn multi_line_shortfall_debits_nothing() {
    let app = spawn_app().await;
    let catalog = seed_catalog(&app.db).await;
    app.services
        .stock
        .set_stock(catalog.branch_id, catalog.product_a, 10, 0)
        .await
        .unwrap();
    app.services
        .stock
        .set_stock(catalog.branch_id, catalog.product_b, 1, 0)
        .await
        .unwrap();

    let created = app
        .services
        .orders
        .create_order(order(
            &catalog,
            vec![
                line(catalog.product_a, 4, dec!(2.00)),
                line(catalog.product_b, 3, dec!(3.50)),
            ],
        ))
        .await
        .unwrap();

    let err = app
        .services
        .orders
        .transition_status(created.id, OrderStatus::Processed)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InsufficientStock(_));

    // The first line had enough stock; it must not have been debited.
    assert_eq!(
        stock_of(&app, catalog.branch_id, catalog.product_a).await,
        10
    );
    assert_eq!(stock_of(&app, catalog.branch_id, catalog.product_b).await, 1);
}

#[tokio::test]
async fn duplicate_product_lines_are_checked_as_one_demand() {
    let app = spawn_app().await;
    let catalog = seed_catalog(&app.db).await;
    app.services
        .stock
        .set_stock(catalog.branch_id, catalog.product_a, 10, 0)
        .await
        .unwrap();

    // Each line passes on its own; together they oversubscribe.
    let created = app
        .services
        .orders
        .create_order(order(
            &catalog,
            vec![
                line(catalog.product_a, 6, dec!(2.00)),
                line(catalog.product_a, 6, dec!(2.00)),
            ],
        ))
        .await
        .unwrap();

    let err = app
        .services
        .orders
        .transition_status(created.id, OrderStatus::Processed)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InsufficientStock(_));
    assert_eq!(
        stock_of(&app, catalog.branch_id, catalog.product_a).await,
        10
    );

    // A duplicate pair that fits is debited once, for the summed amount.
    let ok = app
        .services
        .orders
        .create_order(order(
            &catalog,
            vec![
                line(catalog.product_a, 4, dec!(2.00)),
                line(catalog.product_a, 4, dec!(2.00)),
            ],
        ))
        .await
        .unwrap();
    app.services
        .orders
        .transition_status(ok.id, OrderStatus::Processed)
        .await
        .unwrap();
    assert_eq!(stock_of(&app, catalog.branch_id, catalog.product_a).await, 2);
}

#[tokio::test]
async fn cancelling_never_moves_stock() {
    let app = spawn_app().await;
    let catalog = seed_catalog(&app.db).await;
    app.services
        .stock
        .set_stock(catalog.branch_id, catalog.product_a, 10, 0)
        .await
        .unwrap();

    // Cancel a pending order.
    let pending = app
        .services
        .orders
        .create_order(order(&catalog, vec![line(catalog.product_a, 4, dec!(2.00))]))
        .await
        .unwrap();
    app.services
        .orders
        .transition_status(pending.id, OrderStatus::Cancelled)
        .await
        .unwrap();
    assert_eq!(
        stock_of(&app, catalog.branch_id, catalog.product_a).await,
        10
    );

    // Cancel a processed order: the debit is not reversed.
    let processed = app
        .services
        .orders
        .create_order(order(&catalog, vec![line(catalog.product_a, 4, dec!(2.00))]))
        .await
        .unwrap();
    app.services
        .orders
        .transition_status(processed.id, OrderStatus::Processed)
        .await
        .unwrap();
    app.services
        .orders
        .transition_status(processed.id, OrderStatus::Cancelled)
        .await
        .unwrap();
    assert_eq!(stock_of(&app, catalog.branch_id, catalog.product_a).await, 6);
}

#[tokio::test]
async fn completing_requires_processed_first() {
    let app = spawn_app().await;
    let catalog = seed_catalog(&app.db).await;
    app.services
        .stock
        .set_stock(catalog.branch_id, catalog.product_a, 10, 0)
        .await
        .unwrap();

    let created = app
        .services
        .orders
        .create_order(order(&catalog, vec![line(catalog.product_a, 4, dec!(2.00))]))
        .await
        .unwrap();

    let err = app
        .services
        .orders
        .transition_status(created.id, OrderStatus::Completed)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidStatusTransition { .. });

    app.services
        .orders
        .transition_status(created.id, OrderStatus::Processed)
        .await
        .unwrap();
    let done = app
        .services
        .orders
        .transition_status(created.id, OrderStatus::Completed)
        .await
        .unwrap();
    assert_eq!(done.status, "completed");
}

#[tokio::test]
async fn order_joins_back_to_its_customer() {
    let app = spawn_app().await;
    let catalog = seed_catalog(&app.db).await;
    app.services
        .stock
        .set_stock(catalog.branch_id, catalog.product_a, 10, 0)
        .await
        .unwrap();

    let created = app
        .services
        .orders
        .create_order(order(&catalog, vec![line(catalog.product_a, 4, dec!(2.00))]))
        .await
        .unwrap();

    let (header, customer) = order_entity::Entity::find_by_id(created.id)
        .find_also_related(customer::Entity)
        .one(&*app.db)
        .await
        .unwrap()
        .expect("order should exist");
    assert_eq!(header.id, created.id);
    assert_eq!(customer.expect("customer should join").id, catalog.customer_id);
}

#[tokio::test]
async fn transition_of_missing_order_is_not_found() {
    let app = spawn_app().await;
    seed_catalog(&app.db).await;

    let err = app
        .services
        .orders
        .transition_status(404, OrderStatus::Processed)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}

#[tokio::test]
async fn debit_below_minimum_emits_a_reorder_event() {
    let mut app = spawn_app().await;
    let catalog = seed_catalog(&app.db).await;
    app.services
        .stock
        .set_stock(catalog.branch_id, catalog.product_a, 10, 8)
        .await
        .unwrap();

    let created = app
        .services
        .orders
        .create_order(order(&catalog, vec![line(catalog.product_a, 4, dec!(2.00))]))
        .await
        .unwrap();
    app.services
        .orders
        .transition_status(created.id, OrderStatus::Processed)
        .await
        .unwrap();

    let mut below_minimum = None;
    while let Ok(event) = app.event_rx.try_recv() {
        if let Event::StockBelowMinimum {
            product_id,
            available,
            minimum,
            ..
        } = event
        {
            below_minimum = Some((product_id, available, minimum));
        }
    }

    assert_eq!(below_minimum, Some((catalog.product_a, 6, 8)));
}
