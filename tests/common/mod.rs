//! Shared test harness: a file-backed SQLite database per test, the full
//! router, seeded catalog rows and a JSON request helper.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, Set};
use tempfile::TempDir;
use tokio::sync::mpsc;
use tower::ServiceExt;

use backoffice_api::config::AppConfig;
use backoffice_api::db::{establish_connection_from_app_config, run_migrations, DbPool};
use backoffice_api::entities::{branch, customer, product, supplier};
use backoffice_api::events::{Event, EventSender};
use backoffice_api::handlers::AppServices;
use backoffice_api::{app, AppState};

pub struct TestApp {
    pub db: Arc<DbPool>,
    pub services: AppServices,
    pub router: Router,
    pub event_rx: mpsc::Receiver<Event>,
    // Holds the SQLite file alive for the duration of the test.
    _tmp: TempDir,
}

/// Spins up the application against a fresh SQLite database.
///
/// The pool is capped at one connection so that concurrent transactions
/// serialize the way row locks serialize them on Postgres.
pub async fn spawn_app() -> TestApp {
    let tmp = TempDir::new().expect("failed to create temp dir");
    let db_path = tmp.path().join("test.sqlite");
    let database_url = format!("sqlite://{}?mode=rwc", db_path.display());

    let mut config = AppConfig::new(
        database_url,
        "127.0.0.1".to_string(),
        18080,
        "test".to_string(),
    );
    config.db_max_connections = 1;
    config.db_min_connections = 1;

    let pool = establish_connection_from_app_config(&config)
        .await
        .expect("failed to connect to test database");
    run_migrations(&pool).await.expect("migrations failed");

    let (tx, event_rx) = mpsc::channel(1024);
    let event_sender = EventSender::new(tx);

    let db = Arc::new(pool);
    let services = AppServices::new(db.clone(), Arc::new(event_sender.clone()));
    let state = AppState {
        db: db.clone(),
        config,
        event_sender,
        services: services.clone(),
    };

    TestApp {
        db,
        services,
        router: app(state),
        event_rx,
        _tmp: tmp,
    }
}

/// Ids of the rows inserted by [`seed_catalog`].
pub struct Catalog {
    pub branch_id: i64,
    pub other_branch_id: i64,
    pub product_a: i64,
    pub product_b: i64,
    pub supplier_id: i64,
    pub customer_id: i64,
}

/// Inserts two branches, two products, a supplier and a customer.
pub async fn seed_catalog(db: &DbPool) -> Catalog {
    let main = branch::ActiveModel {
        name: Set("Main Street".to_string()),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("failed to insert branch");

    let other = branch::ActiveModel {
        name: Set("Harbour".to_string()),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("failed to insert branch");

    let product_a = product::ActiveModel {
        name: Set("Espresso beans 1kg".to_string()),
        price: Set(dec!(2.00)),
        is_active: Set(true),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("failed to insert product");

    let product_b = product::ActiveModel {
        name: Set("Filter paper".to_string()),
        price: Set(dec!(3.50)),
        is_active: Set(true),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("failed to insert product");

    let supplier_row = supplier::ActiveModel {
        name: Set("Roastery Co".to_string()),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("failed to insert supplier");

    let customer_row = customer::ActiveModel {
        name: Set("Ada Retail".to_string()),
        email: Set(Some("ada@example.com".to_string())),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("failed to insert customer");

    Catalog {
        branch_id: main.id,
        other_branch_id: other.id,
        product_a: product_a.id,
        product_b: product_b.id,
        supplier_id: supplier_row.id,
        customer_id: customer_row.id,
    }
}

/// Sends one JSON request through the router and decodes the response.
pub async fn request(
    router: &Router,
    method: &str,
    uri: &str,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let mut builder = Request::builder().method(method).uri(uri);

    let body = match body {
        Some(json) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = router
        .clone()
        .oneshot(builder.body(body).expect("failed to build request"))
        .await
        .expect("request failed");

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read body");

    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("response was not valid JSON")
    };

    (status, json)
}
