//! Read-side query objects for lists and summaries.
//!
//! Queries are plain structs carrying their filters and run through
//! [`DatabaseAccess`] so every read gets the same metrics and error
//! mapping. They never mutate state and never open transactions.

pub mod order_queries;
pub mod purchase_queries;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::db::DatabaseAccess;
use crate::errors::ServiceError;

/// Upper bound applied to every list query regardless of what the
/// caller asked for.
pub const MAX_PAGE_SIZE: u64 = 250;

pub(crate) fn default_limit() -> u64 {
    50
}

pub(crate) fn effective_limit(requested: u64) -> u64 {
    requested.min(MAX_PAGE_SIZE)
}

#[async_trait]
pub trait Query: Send + Sync {
    type Result: Send;

    async fn execute(&self, db: &DatabaseAccess) -> Result<Self::Result, ServiceError>;
}

/// One bucket of an aggregation: grouping key, row count for the bucket
/// and the summed monetary total.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub key: String,
    pub count: i64,
    pub total: Decimal,
}
