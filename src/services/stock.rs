//! Stock Ledger: per-(branch, product) available quantity and reorder
//! threshold, the single source of truth for "how much do we have".
//!
//! The free functions are the ledger primitives. They take any
//! `ConnectionTrait` handle so callers decide the transaction boundary;
//! check-then-act callers must use [`validate_availability`] (which holds
//! row locks) inside the same transaction that later decrements.

use std::sync::Arc;

use chrono::Utc;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DbBackend, EntityTrait, QueryFilter, QuerySelect, Set,
    TransactionTrait,
};
use tracing::{info, instrument, warn};

use crate::db::DbPool;
use crate::entities::stock_level::{self, Entity as StockLevel};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};

/// Result of one availability check, captured under the row lock.
#[derive(Debug, Clone, Copy)]
pub struct StockCheck {
    pub product_id: i64,
    pub requested: i32,
    pub available: i32,
    pub minimum: i32,
}

/// Reads the ledger entry for (branch, product), acquiring an exclusive
/// row lock held until the enclosing transaction ends. Returns `None`
/// when no entry exists (equivalent to zero stock, not an error).
pub async fn find_for_update<C: ConnectionTrait>(
    conn: &C,
    branch_id: i64,
    product_id: i64,
) -> Result<Option<stock_level::Model>, ServiceError> {
    let mut query = StockLevel::find()
        .filter(stock_level::Column::BranchId.eq(branch_id))
        .filter(stock_level::Column::ProductId.eq(product_id));

    // SQLite has no row locks; its single-writer model already serializes
    // conflicting transactions.
    if conn.get_database_backend() != DbBackend::Sqlite {
        query = query.lock_exclusive();
    }

    Ok(query.one(conn).await?)
}

/// Locked read of the available quantity; absent entries read as 0.
pub async fn get_stock_for_update<C: ConnectionTrait>(
    conn: &C,
    branch_id: i64,
    product_id: i64,
) -> Result<i32, ServiceError> {
    let entry = find_for_update(conn, branch_id, product_id).await?;
    Ok(entry.map(|e| e.available_quantity).unwrap_or(0))
}

/// Unconditional upsert: overwrites both quantities, inserting the entry
/// if absent. Used for manual/administrative stock correction. A single
/// statement, so two concurrent first writes cannot both take the
/// insert path.
pub async fn set_stock<C: ConnectionTrait>(
    conn: &C,
    branch_id: i64,
    product_id: i64,
    quantity: i32,
    minimum: i32,
) -> Result<(), ServiceError> {
    StockLevel::insert(stock_level::ActiveModel {
        branch_id: Set(branch_id),
        product_id: Set(product_id),
        available_quantity: Set(quantity),
        minimum_quantity: Set(minimum),
        updated_at: Set(Utc::now()),
        ..Default::default()
    })
    .on_conflict(
        OnConflict::columns([
            stock_level::Column::BranchId,
            stock_level::Column::ProductId,
        ])
        .update_columns([
            stock_level::Column::AvailableQuantity,
            stock_level::Column::MinimumQuantity,
            stock_level::Column::UpdatedAt,
        ])
        .to_owned(),
    )
    .exec(conn)
    .await?;

    Ok(())
}

/// Additive upsert: `available += quantity`, creating the entry with
/// `available = quantity` when absent. The credit needs no lock-read
/// since it has no precondition to race against. Callers guarantee
/// `quantity > 0`; the ledger itself does not reject other values.
pub async fn increment_stock<C: ConnectionTrait>(
    conn: &C,
    branch_id: i64,
    product_id: i64,
    quantity: i32,
) -> Result<(), ServiceError> {
    let now = Utc::now();

    StockLevel::insert(stock_level::ActiveModel {
        branch_id: Set(branch_id),
        product_id: Set(product_id),
        available_quantity: Set(quantity),
        minimum_quantity: Set(0),
        updated_at: Set(now),
        ..Default::default()
    })
    .on_conflict(
        OnConflict::columns([
            stock_level::Column::BranchId,
            stock_level::Column::ProductId,
        ])
        .value(
            stock_level::Column::AvailableQuantity,
            Expr::col((stock_level::Entity, stock_level::Column::AvailableQuantity))
                .add(quantity),
        )
        .value(stock_level::Column::UpdatedAt, Expr::val(now))
        .to_owned(),
    )
    .exec(conn)
    .await?;

    Ok(())
}

/// Subtracts `quantity` from an entry currently holding at least that
/// much. Returns whether a row was affected; `false` (missing entry or
/// insufficient quantity) is a hard failure for callers, never a silent
/// no-op. The guard keeps a committed value from ever going negative
/// even if a caller's availability check was wrong.
pub async fn decrement_stock<C: ConnectionTrait>(
    conn: &C,
    branch_id: i64,
    product_id: i64,
    quantity: i32,
) -> Result<bool, ServiceError> {
    let result = StockLevel::update_many()
        .col_expr(
            stock_level::Column::AvailableQuantity,
            Expr::col(stock_level::Column::AvailableQuantity).sub(quantity),
        )
        .col_expr(stock_level::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(stock_level::Column::BranchId.eq(branch_id))
        .filter(stock_level::Column::ProductId.eq(product_id))
        .filter(stock_level::Column::AvailableQuantity.gte(quantity))
        .exec(conn)
        .await?;

    Ok(result.rows_affected > 0)
}

/// Lock-reads every requested (product, quantity) pair and fails with
/// `InsufficientStock` on the first shortfall, naming the offending
/// product. Must run inside the same transaction that will decrement,
/// otherwise the check is stale. Each product must appear at most once;
/// callers aggregate duplicate demands first, since independent checks
/// against the same row would each pass on the undebited value.
pub async fn validate_availability<C: ConnectionTrait>(
    conn: &C,
    branch_id: i64,
    items: &[(i64, i32)],
) -> Result<Vec<StockCheck>, ServiceError> {
    let mut checks = Vec::with_capacity(items.len());

    for &(product_id, requested) in items {
        let entry = find_for_update(conn, branch_id, product_id).await?;
        let (available, minimum) = entry
            .map(|e| (e.available_quantity, e.minimum_quantity))
            .unwrap_or((0, 0));

        if available < requested {
            return Err(ServiceError::InsufficientStock(format!(
                "product {} at branch {}: requested {}, available {}",
                product_id, branch_id, requested, available
            )));
        }

        checks.push(StockCheck {
            product_id,
            requested,
            available,
            minimum,
        });
    }

    Ok(checks)
}

/// HTTP-facing surface of the ledger: administrative set and plain reads,
/// each inside its own transaction.
#[derive(Clone)]
pub struct StockService {
    db: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl StockService {
    pub fn new(db: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Administrative overwrite of a ledger entry.
    #[instrument(skip(self))]
    pub async fn set_stock(
        &self,
        branch_id: i64,
        product_id: i64,
        quantity: i32,
        minimum: i32,
    ) -> Result<(), ServiceError> {
        if quantity < 0 {
            return Err(ServiceError::ValidationError(format!(
                "stock quantity must not be negative, got {}",
                quantity
            )));
        }
        if minimum < 0 {
            return Err(ServiceError::ValidationError(format!(
                "minimum quantity must not be negative, got {}",
                minimum
            )));
        }

        let txn = self.db.begin().await?;
        set_stock(&txn, branch_id, product_id, quantity, minimum).await?;
        txn.commit().await?;

        info!(branch_id, product_id, quantity, minimum, "Stock level set");

        if let Err(e) = self.event_sender.send(Event::StockSet {
            branch_id,
            product_id,
            quantity,
            minimum,
        }) {
            warn!(error = %e, branch_id, product_id, "Failed to send stock set event");
        }

        Ok(())
    }

    /// Plain (unlocked) read of a ledger entry.
    #[instrument(skip(self))]
    pub async fn get_level(
        &self,
        branch_id: i64,
        product_id: i64,
    ) -> Result<Option<stock_level::Model>, ServiceError> {
        let entry = StockLevel::find()
            .filter(stock_level::Column::BranchId.eq(branch_id))
            .filter(stock_level::Column::ProductId.eq(product_id))
            .one(&*self.db)
            .await?;

        Ok(entry)
    }
}
