//! Cart service: a per-customer staging list for a future order.
//!
//! Carts never touch the stock ledger. Quantities are not reserved;
//! availability is checked only when an order built from the cart is
//! processed.

use std::sync::Arc;

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::db::DbPool;
use crate::entities::cart::{self, Entity as Cart};
use crate::entities::cart_item::{self, Entity as CartItem};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};

#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub cart_id: i64,
    pub customer_id: i64,
    pub items: Vec<CartItemView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CartItemView {
    pub product_id: i64,
    pub quantity: i32,
}

async fn find_cart<C: ConnectionTrait>(
    conn: &C,
    customer_id: i64,
) -> Result<Option<cart::Model>, ServiceError> {
    Ok(Cart::find()
        .filter(cart::Column::CustomerId.eq(customer_id))
        .one(conn)
        .await?)
}

/// Carts materialize on first touch; there is no explicit create call.
async fn get_or_create_cart<C: ConnectionTrait>(
    conn: &C,
    customer_id: i64,
) -> Result<cart::Model, ServiceError> {
    if let Some(existing) = find_cart(conn, customer_id).await? {
        return Ok(existing);
    }

    let created = cart::ActiveModel {
        customer_id: Set(customer_id),
        created_at: Set(Utc::now()),
        updated_at: Set(None),
        ..Default::default()
    }
    .insert(conn)
    .await?;

    Ok(created)
}

async fn load_view<C: ConnectionTrait>(
    conn: &C,
    cart: &cart::Model,
) -> Result<CartView, ServiceError> {
    let items = CartItem::find()
        .filter(cart_item::Column::CartId.eq(cart.id))
        .order_by_asc(cart_item::Column::ProductId)
        .all(conn)
        .await?;

    Ok(CartView {
        cart_id: cart.id,
        customer_id: cart.customer_id,
        items: items
            .into_iter()
            .map(|i| CartItemView {
                product_id: i.product_id,
                quantity: i.quantity,
            })
            .collect(),
    })
}

async fn touch_cart<C: ConnectionTrait>(conn: &C, cart_id: i64) -> Result<(), ServiceError> {
    Cart::update_many()
        .col_expr(cart::Column::UpdatedAt, Expr::value(Some(Utc::now())))
        .filter(cart::Column::Id.eq(cart_id))
        .exec(conn)
        .await?;
    Ok(())
}

#[derive(Clone)]
pub struct CartService {
    db: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl CartService {
    pub fn new(db: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Returns the customer's cart, creating an empty one if absent.
    #[instrument(skip(self))]
    pub async fn get_cart(&self, customer_id: i64) -> Result<CartView, ServiceError> {
        let txn = self.db.begin().await?;
        let cart = get_or_create_cart(&txn, customer_id).await?;
        let view = load_view(&txn, &cart).await?;
        txn.commit().await?;
        Ok(view)
    }

    /// Adds to the desired quantity of a product, merging with any
    /// existing line for the same product.
    #[instrument(skip(self))]
    pub async fn add_item(
        &self,
        customer_id: i64,
        product_id: i64,
        quantity: i32,
    ) -> Result<CartView, ServiceError> {
        if quantity <= 0 {
            return Err(ServiceError::ValidationError(format!(
                "cart quantity must be positive, got {}",
                quantity
            )));
        }

        let txn = self.db.begin().await?;
        let cart = get_or_create_cart(&txn, customer_id).await?;

        let result = CartItem::update_many()
            .col_expr(
                cart_item::Column::Quantity,
                Expr::col(cart_item::Column::Quantity).add(quantity),
            )
            .filter(cart_item::Column::CartId.eq(cart.id))
            .filter(cart_item::Column::ProductId.eq(product_id))
            .exec(&txn)
            .await?;

        if result.rows_affected == 0 {
            cart_item::ActiveModel {
                cart_id: Set(cart.id),
                product_id: Set(product_id),
                quantity: Set(quantity),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
        }

        touch_cart(&txn, cart.id).await?;
        let view = load_view(&txn, &cart).await?;
        txn.commit().await?;

        info!(customer_id, product_id, quantity, "Cart item added");
        self.notify(customer_id);
        Ok(view)
    }

    /// Overwrites the desired quantity of a product already in the cart.
    #[instrument(skip(self))]
    pub async fn update_item(
        &self,
        customer_id: i64,
        product_id: i64,
        quantity: i32,
    ) -> Result<CartView, ServiceError> {
        if quantity <= 0 {
            return Err(ServiceError::ValidationError(format!(
                "cart quantity must be positive, got {}",
                quantity
            )));
        }

        let txn = self.db.begin().await?;
        let cart = find_cart(&txn, customer_id).await?.ok_or_else(|| {
            ServiceError::NotFound(format!("Cart for customer {} not found", customer_id))
        })?;

        let result = CartItem::update_many()
            .col_expr(cart_item::Column::Quantity, Expr::value(quantity))
            .filter(cart_item::Column::CartId.eq(cart.id))
            .filter(cart_item::Column::ProductId.eq(product_id))
            .exec(&txn)
            .await?;

        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!(
                "Product {} not in cart for customer {}",
                product_id, customer_id
            )));
        }

        touch_cart(&txn, cart.id).await?;
        let view = load_view(&txn, &cart).await?;
        txn.commit().await?;

        self.notify(customer_id);
        Ok(view)
    }

    #[instrument(skip(self))]
    pub async fn remove_item(
        &self,
        customer_id: i64,
        product_id: i64,
    ) -> Result<CartView, ServiceError> {
        let txn = self.db.begin().await?;
        let cart = find_cart(&txn, customer_id).await?.ok_or_else(|| {
            ServiceError::NotFound(format!("Cart for customer {} not found", customer_id))
        })?;

        let result = CartItem::delete_many()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .filter(cart_item::Column::ProductId.eq(product_id))
            .exec(&txn)
            .await?;

        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!(
                "Product {} not in cart for customer {}",
                product_id, customer_id
            )));
        }

        touch_cart(&txn, cart.id).await?;
        let view = load_view(&txn, &cart).await?;
        txn.commit().await?;

        self.notify(customer_id);
        Ok(view)
    }

    /// Empties the cart. Clearing an already empty cart succeeds.
    #[instrument(skip(self))]
    pub async fn clear(&self, customer_id: i64) -> Result<CartView, ServiceError> {
        let txn = self.db.begin().await?;
        let cart = get_or_create_cart(&txn, customer_id).await?;

        CartItem::delete_many()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .exec(&txn)
            .await?;

        touch_cart(&txn, cart.id).await?;
        let view = load_view(&txn, &cart).await?;
        txn.commit().await?;

        info!(customer_id, "Cart cleared");
        self.notify(customer_id);
        Ok(view)
    }

    fn notify(&self, customer_id: i64) {
        if let Err(e) = self.event_sender.send(Event::CartUpdated { customer_id }) {
            warn!(error = %e, customer_id, "Failed to send cart event");
        }
    }
}
