//! Cart endpoints, keyed by customer.

use axum::extract::{Path, State};
use axum::routing::{delete, get};
use axum::{Json, Router};
use serde::Deserialize;

use crate::errors::ServiceError;
use crate::services::cart::CartView;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub product: i64,
    pub quantity: i32,
}

#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub quantity: i32,
}

async fn get_cart(
    State(state): State<AppState>,
    Path(customer): Path<i64>,
) -> Result<Json<CartView>, ServiceError> {
    let view = state.services.carts.get_cart(customer).await?;
    Ok(Json(view))
}

async fn add_item(
    State(state): State<AppState>,
    Path(customer): Path<i64>,
    Json(req): Json<AddItemRequest>,
) -> Result<Json<CartView>, ServiceError> {
    let view = state
        .services
        .carts
        .add_item(customer, req.product, req.quantity)
        .await?;
    Ok(Json(view))
}

async fn update_item(
    State(state): State<AppState>,
    Path((customer, product)): Path<(i64, i64)>,
    Json(req): Json<UpdateItemRequest>,
) -> Result<Json<CartView>, ServiceError> {
    let view = state
        .services
        .carts
        .update_item(customer, product, req.quantity)
        .await?;
    Ok(Json(view))
}

async fn remove_item(
    State(state): State<AppState>,
    Path((customer, product)): Path<(i64, i64)>,
) -> Result<Json<CartView>, ServiceError> {
    let view = state.services.carts.remove_item(customer, product).await?;
    Ok(Json(view))
}

async fn clear_cart(
    State(state): State<AppState>,
    Path(customer): Path<i64>,
) -> Result<Json<CartView>, ServiceError> {
    let view = state.services.carts.clear(customer).await?;
    Ok(Json(view))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/:customer", get(get_cart).delete(clear_cart))
        .route("/:customer/items", axum::routing::post(add_item))
        .route(
            "/:customer/items/:product",
            delete(remove_item).put(update_item),
        )
}
