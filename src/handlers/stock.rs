//! Stock ledger endpoints.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::errors::ServiceError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SetStockRequest {
    pub branch: i64,
    pub product: i64,
    pub quantity: i32,
    #[serde(default)]
    pub minimum: i32,
}

#[derive(Debug, Serialize)]
pub struct StockLevelResponse {
    pub branch: i64,
    pub product: i64,
    pub available: i32,
    pub minimum: i32,
}

async fn set_stock(
    State(state): State<AppState>,
    Json(req): Json<SetStockRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    state
        .services
        .stock
        .set_stock(req.branch, req.product, req.quantity, req.minimum)
        .await?;
    Ok(Json(json!({ "ok": true })))
}

/// Absent ledger entries read as zero stock rather than 404.
async fn get_stock(
    State(state): State<AppState>,
    Path((branch, product)): Path<(i64, i64)>,
) -> Result<Json<StockLevelResponse>, ServiceError> {
    let level = state.services.stock.get_level(branch, product).await?;
    let (available, minimum) = level
        .map(|l| (l.available_quantity, l.minimum_quantity))
        .unwrap_or((0, 0));

    Ok(Json(StockLevelResponse {
        branch,
        product,
        available,
        minimum,
    }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(set_stock))
        .route("/:branch/:product", get(get_stock))
}
