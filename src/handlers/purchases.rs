//! Purchase endpoints.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::ServiceError;
use crate::handlers::WireLineItem;
use crate::queries::purchase_queries::{ListPurchasesQuery, PurchasesSummaryQuery};
use crate::queries::{Query as _, SummaryRow};
use crate::services::purchases::{CreatePurchase, PurchaseDetails};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreatePurchaseRequest {
    pub supplier: i64,
    pub branch: i64,
    pub date: Option<NaiveDate>,
    pub items: Vec<WireLineItem>,
}

#[derive(Debug, Serialize)]
pub struct PurchaseCreatedResponse {
    pub purchase_id: i64,
    pub total: Decimal,
}

async fn create_purchase(
    State(state): State<AppState>,
    Json(req): Json<CreatePurchaseRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let purchase = state
        .services
        .purchases
        .create_purchase(CreatePurchase {
            supplier_id: req.supplier,
            branch_id: req.branch,
            purchase_date: req.date,
            items: req.items.into_iter().map(Into::into).collect(),
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(PurchaseCreatedResponse {
            purchase_id: purchase.id,
            total: purchase.total,
        }),
    ))
}

async fn get_purchase(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<PurchaseDetails>, ServiceError> {
    let details = state.services.purchases.get_purchase(id).await?;
    Ok(Json(details))
}

async fn list_purchases(
    State(state): State<AppState>,
    Query(query): Query<ListPurchasesQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let purchases = query.execute(&state.services.read).await?;
    Ok(Json(purchases))
}

async fn purchases_summary(
    State(state): State<AppState>,
    Query(query): Query<PurchasesSummaryQuery>,
) -> Result<Json<Vec<SummaryRow>>, ServiceError> {
    let rows = query.execute(&state.services.read).await?;
    Ok(Json(rows))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_purchases).post(create_purchase))
        .route("/summary", get(purchases_summary))
        .route("/:id", get(get_purchase))
}
