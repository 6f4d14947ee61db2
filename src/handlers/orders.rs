//! Order endpoints, including the status transition that debits stock.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::ServiceError;
use crate::handlers::WireLineItem;
use crate::queries::order_queries::{ListOrdersQuery, OrdersSummaryQuery};
use crate::queries::{Query as _, SummaryRow};
use crate::services::order_status;
use crate::services::orders::{CreateOrder, OrderDetails};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub customer: i64,
    pub branch: i64,
    pub date: Option<NaiveDate>,
    pub items: Vec<WireLineItem>,
}

#[derive(Debug, Serialize)]
pub struct OrderCreatedResponse {
    pub order_id: i64,
    pub total: Decimal,
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct TransitionRequest {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct TransitionResponse {
    pub order_id: i64,
    pub status: String,
}

async fn create_order(
    State(state): State<AppState>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let order = state
        .services
        .orders
        .create_order(CreateOrder {
            customer_id: req.customer,
            branch_id: req.branch,
            order_date: req.date,
            items: req.items.into_iter().map(Into::into).collect(),
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(OrderCreatedResponse {
            order_id: order.id,
            total: order.total,
            status: order.status,
        }),
    ))
}

async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<OrderDetails>, ServiceError> {
    let details = state.services.orders.get_order(id).await?;
    Ok(Json(details))
}

/// The status string is parsed before the transaction opens; unknown
/// values never reach the state machine.
async fn transition_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<TransitionRequest>,
) -> Result<Json<TransitionResponse>, ServiceError> {
    let target = order_status::parse_status(&req.status)?;
    let updated = state.services.orders.transition_status(id, target).await?;

    Ok(Json(TransitionResponse {
        order_id: updated.id,
        status: updated.status,
    }))
}

async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<ListOrdersQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let orders = query.execute(&state.services.read).await?;
    Ok(Json(orders))
}

async fn orders_summary(
    State(state): State<AppState>,
    Query(query): Query<OrdersSummaryQuery>,
) -> Result<Json<Vec<SummaryRow>>, ServiceError> {
    let rows = query.execute(&state.services.read).await?;
    Ok(Json(rows))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_orders).post(create_order))
        .route("/summary", get(orders_summary))
        .route("/:id", get(get_order))
        .route("/:id/status", post(transition_status))
}
