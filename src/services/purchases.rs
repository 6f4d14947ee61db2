//! Purchase Processor: supplier deliveries that credit the stock ledger.
//!
//! A purchase is header + lines + one ledger credit per line, all in a
//! single transaction. There is no partial receipt; any failure rolls
//! everything back.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::db::DbPool;
use crate::entities::{purchase, purchase_line};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::{lines_total, stock, validate_line_items, LineItemInput};

/// Purchases settle on creation; this is the only status they ever carry.
pub const PURCHASE_STATUS_PAID: &str = "paid";

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePurchase {
    pub supplier_id: i64,
    pub branch_id: i64,
    pub purchase_date: Option<NaiveDate>,
    pub items: Vec<LineItemInput>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PurchaseDetails {
    #[serde(flatten)]
    pub purchase: purchase::Model,
    pub lines: Vec<purchase_line::Model>,
}

#[derive(Clone)]
pub struct PurchaseService {
    db: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl PurchaseService {
    pub fn new(db: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Records a delivery and credits the ledger for every line.
    #[instrument(skip(self, request), fields(supplier_id = request.supplier_id, branch_id = request.branch_id))]
    pub async fn create_purchase(
        &self,
        request: CreatePurchase,
    ) -> Result<purchase::Model, ServiceError> {
        validate_line_items(&request.items)?;
        let total = lines_total(&request.items);
        let purchase_date = request
            .purchase_date
            .unwrap_or_else(|| Utc::now().date_naive());

        let txn = self.db.begin().await?;

        let header = purchase::ActiveModel {
            supplier_id: Set(request.supplier_id),
            branch_id: Set(request.branch_id),
            purchase_date: Set(purchase_date),
            total: Set(total),
            status: Set(PURCHASE_STATUS_PAID.to_string()),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        for item in &request.items {
            purchase_line::ActiveModel {
                purchase_id: Set(header.id),
                product_id: Set(item.product_id),
                quantity: Set(item.quantity),
                unit_price: Set(item.unit_price),
                subtotal: Set(item.subtotal()),
                ..Default::default()
            }
            .insert(&txn)
            .await?;

            stock::increment_stock(&txn, request.branch_id, item.product_id, item.quantity)
                .await?;
        }

        txn.commit().await?;

        info!(purchase_id = header.id, %total, "Purchase recorded");
        metrics::counter!("backoffice.purchases_created", 1);

        if let Err(e) = self.event_sender.send(Event::PurchaseCreated {
            purchase_id: header.id,
            branch_id: header.branch_id,
            total,
        }) {
            warn!(error = %e, purchase_id = header.id, "Failed to send purchase event");
        }

        Ok(header)
    }

    #[instrument(skip(self))]
    pub async fn get_purchase(&self, purchase_id: i64) -> Result<PurchaseDetails, ServiceError> {
        let header = purchase::Entity::find_by_id(purchase_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Purchase {} not found", purchase_id))
            })?;

        let lines = purchase_line::Entity::find()
            .filter(purchase_line::Column::PurchaseId.eq(purchase_id))
            .order_by_asc(purchase_line::Column::Id)
            .all(&*self.db)
            .await?;

        Ok(PurchaseDetails {
            purchase: header,
            lines,
        })
    }
}
