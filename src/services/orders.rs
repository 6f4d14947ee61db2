//! Order Processor: order creation (no stock effect) and the status
//! transition that debits the ledger.
//!
//! The debit path is the only place in the system where a check-then-act
//! on stock happens; the availability check and the decrements share one
//! transaction and the row locks taken by the check.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::db::DbPool;
use crate::entities::{order, order_line};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::order_status::{self, OrderStatus, StockEffect};
use crate::services::{lines_total, stock, validate_line_items, LineItemInput};

#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrder {
    pub customer_id: i64,
    pub branch_id: i64,
    pub order_date: Option<NaiveDate>,
    pub items: Vec<LineItemInput>,
}

/// Order header plus its lines, as returned to callers.
#[derive(Debug, Clone, Serialize)]
pub struct OrderDetails {
    #[serde(flatten)]
    pub order: order::Model,
    pub lines: Vec<order_line::Model>,
}

#[derive(Clone)]
pub struct OrderService {
    db: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl OrderService {
    pub fn new(db: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Creates an order in `pending` status. Records intent only; stock is
    /// untouched until the order transitions to `processed`.
    #[instrument(skip(self, request), fields(customer_id = request.customer_id, branch_id = request.branch_id))]
    pub async fn create_order(&self, request: CreateOrder) -> Result<order::Model, ServiceError> {
        validate_line_items(&request.items)?;
        let total = lines_total(&request.items);
        let order_date = request
            .order_date
            .unwrap_or_else(|| Utc::now().date_naive());

        let txn = self.db.begin().await?;

        let header = order::ActiveModel {
            customer_id: Set(request.customer_id),
            branch_id: Set(request.branch_id),
            order_date: Set(order_date),
            total: Set(total),
            status: Set(OrderStatus::Pending.to_string()),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        for item in &request.items {
            order_line::ActiveModel {
                order_id: Set(header.id),
                product_id: Set(item.product_id),
                quantity: Set(item.quantity),
                unit_price: Set(item.unit_price),
                subtotal: Set(item.subtotal()),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
        }

        txn.commit().await?;

        info!(order_id = header.id, %total, "Order created");
        metrics::counter!("backoffice.orders_created", 1);

        if let Err(e) = self.event_sender.send(Event::OrderCreated {
            order_id: header.id,
            branch_id: header.branch_id,
            total,
        }) {
            warn!(error = %e, order_id = header.id, "Failed to send order created event");
        }

        Ok(header)
    }

    #[instrument(skip(self))]
    pub async fn get_order(&self, order_id: i64) -> Result<OrderDetails, ServiceError> {
        let header = order::Entity::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let lines = order_line::Entity::find()
            .filter(order_line::Column::OrderId.eq(order_id))
            .order_by_asc(order_line::Column::Id)
            .all(&*self.db)
            .await?;

        Ok(OrderDetails {
            order: header,
            lines,
        })
    }

    /// Applies one status transition. The `pending -> processed` edge
    /// validates availability and debits every line inside the same
    /// transaction; any shortfall rolls the whole transition back and the
    /// order stays `pending`.
    #[instrument(skip(self))]
    pub async fn transition_status(
        &self,
        order_id: i64,
        new_status: OrderStatus,
    ) -> Result<order::Model, ServiceError> {
        let txn = self.db.begin().await?;

        let header = order::Entity::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let current = order_status::parse_status(&header.status).map_err(|_| {
            ServiceError::InternalError(format!(
                "order {} carries unrecognized status '{}'",
                header.id, header.status
            ))
        })?;
        let effect = order_status::transition(current, new_status)?;

        let mut low_stock = Vec::new();
        if effect == StockEffect::Debit {
            let lines = order_line::Entity::find()
                .filter(order_line::Column::OrderId.eq(order_id))
                .all(&txn)
                .await?;

            // One aggregated demand per product. The same product may
            // appear on several lines; checking them independently would
            // each pass against the undebited value.
            let mut demands: Vec<(i64, i32)> = Vec::new();
            for line in &lines {
                match demands.iter_mut().find(|(p, _)| *p == line.product_id) {
                    Some((_, quantity)) => *quantity += line.quantity,
                    None => demands.push((line.product_id, line.quantity)),
                }
            }

            let checks = stock::validate_availability(&txn, header.branch_id, &demands).await?;

            for &(product_id, quantity) in &demands {
                let affected =
                    stock::decrement_stock(&txn, header.branch_id, product_id, quantity).await?;
                if !affected {
                    // Unreachable while the availability check holds its
                    // locks, but a silent skip would corrupt the ledger.
                    return Err(ServiceError::InternalError(format!(
                        "stock for product {} at branch {} changed underneath the transition",
                        product_id, header.branch_id
                    )));
                }
            }

            for check in &checks {
                let remaining = check.available - check.requested;
                if check.minimum > 0 && remaining <= check.minimum {
                    low_stock.push(Event::StockBelowMinimum {
                        branch_id: header.branch_id,
                        product_id: check.product_id,
                        available: remaining,
                        minimum: check.minimum,
                    });
                }
            }
        }

        let old_status = header.status.clone();
        let mut active: order::ActiveModel = header.into();
        active.status = Set(new_status.to_string());
        active.updated_at = Set(Some(Utc::now()));
        let updated = active.update(&txn).await?;

        txn.commit().await?;

        info!(order_id, %old_status, new_status = %updated.status, "Order status changed");
        metrics::counter!("backoffice.order_transitions", 1);

        if let Err(e) = self.event_sender.send(Event::OrderStatusChanged {
            order_id,
            old_status,
            new_status: updated.status.clone(),
        }) {
            warn!(error = %e, order_id, "Failed to send order status event");
        }
        for event in low_stock {
            if let Err(e) = self.event_sender.send(event) {
                warn!(error = %e, order_id, "Failed to send low stock event");
            }
        }

        Ok(updated)
    }
}
