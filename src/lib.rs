//! Back-office API library
//!
//! Inventory-consistent transaction core for a multi-branch retail
//! back office: purchases credit a per-branch stock ledger, orders debit
//! it exactly once through an explicit status state machine, and every
//! mutation is applied atomically or not at all.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod migrator;
pub mod queries;
pub mod services;

use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, response::Json, routing::get, Router};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde_json::{json, Value};
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer,
};

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub services: handlers::AppServices,
}

/// Reports service liveness plus a database ping.
async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let db_ok = state.db.ping().await.is_ok();
    Json(json!({
        "status": if db_ok { "ok" } else { "degraded" },
        "database": if db_ok { "up" } else { "down" },
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

/// Assembles the full application router with middleware layers.
pub fn app(state: AppState) -> Router {
    let api = Router::new()
        .nest("/stock", handlers::stock::router())
        .nest("/purchases", handlers::purchases::router())
        .nest("/orders", handlers::orders::router())
        .nest("/carts", handlers::carts::router());

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .with_state(state)
}
