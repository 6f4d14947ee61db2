//! List and summary queries over orders.

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::sea_query::JoinType;
use sea_orm::{
    ColumnTrait, EntityTrait, FromQueryResult, QueryFilter, QueryOrder, QuerySelect, RelationTrait,
};
use serde::Deserialize;

use crate::db::DatabaseAccess;
use crate::entities::{order, order_line};
use crate::errors::ServiceError;
use crate::queries::{default_limit, effective_limit, Query, SummaryRow};
use crate::services::order_status::OrderStatus;

/// Filtered, paginated order listing. All filters combine with AND.
#[derive(Debug, Clone, Deserialize)]
pub struct ListOrdersQuery {
    pub branch: Option<i64>,
    pub status: Option<OrderStatus>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    /// Restricts to orders containing this product on any line.
    pub product: Option<i64>,
    #[serde(default = "default_limit")]
    pub limit: u64,
    #[serde(default)]
    pub offset: u64,
}

#[async_trait]
impl Query for ListOrdersQuery {
    type Result = Vec<order::Model>;

    async fn execute(&self, db: &DatabaseAccess) -> Result<Self::Result, ServiceError> {
        let mut query = order::Entity::find();

        if let Some(branch_id) = self.branch {
            query = query.filter(order::Column::BranchId.eq(branch_id));
        }
        if let Some(status) = self.status {
            query = query.filter(order::Column::Status.eq(status.to_string()));
        }
        if let Some(from) = self.date_from {
            query = query.filter(order::Column::OrderDate.gte(from));
        }
        if let Some(to) = self.date_to {
            query = query.filter(order::Column::OrderDate.lte(to));
        }
        if let Some(product_id) = self.product {
            // The join can match several lines per order.
            query = query
                .join(JoinType::InnerJoin, order::Relation::OrderLine.def())
                .filter(order_line::Column::ProductId.eq(product_id))
                .distinct();
        }

        let query = query
            .order_by_desc(order::Column::Id)
            .limit(effective_limit(self.limit))
            .offset(self.offset);

        db.execute("list_orders", query.all(db.get_pool())).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderGroupBy {
    Status,
    Branch,
    Product,
}

/// Aggregated order totals, bucketed by the requested dimension.
/// For `product` grouping the count is the number of matching lines and
/// the total sums line subtotals; otherwise the count is whole orders.
#[derive(Debug, Clone, Deserialize)]
pub struct OrdersSummaryQuery {
    pub group_by: OrderGroupBy,
    pub branch: Option<i64>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

#[derive(Debug, FromQueryResult)]
struct TextKeyRow {
    key: String,
    count: i64,
    total: Option<Decimal>,
}

#[derive(Debug, FromQueryResult)]
struct IntKeyRow {
    key: i64,
    count: i64,
    total: Option<Decimal>,
}

impl From<TextKeyRow> for SummaryRow {
    fn from(row: TextKeyRow) -> Self {
        SummaryRow {
            key: row.key,
            count: row.count,
            total: row.total.unwrap_or_default(),
        }
    }
}

impl From<IntKeyRow> for SummaryRow {
    fn from(row: IntKeyRow) -> Self {
        SummaryRow {
            key: row.key.to_string(),
            count: row.count,
            total: row.total.unwrap_or_default(),
        }
    }
}

#[async_trait]
impl Query for OrdersSummaryQuery {
    type Result = Vec<SummaryRow>;

    async fn execute(&self, db: &DatabaseAccess) -> Result<Self::Result, ServiceError> {
        match self.group_by {
            OrderGroupBy::Status => {
                let query = self
                    .base_filters(order::Entity::find())
                    .select_only()
                    .column_as(order::Column::Status, "key")
                    .column_as(order::Column::Id.count(), "count")
                    .column_as(order::Column::Total.sum(), "total")
                    .group_by(order::Column::Status)
                    .into_model::<TextKeyRow>();

                let rows = db
                    .execute("orders_summary_by_status", query.all(db.get_pool()))
                    .await?;
                Ok(rows.into_iter().map(SummaryRow::from).collect())
            }
            OrderGroupBy::Branch => {
                let query = self
                    .base_filters(order::Entity::find())
                    .select_only()
                    .column_as(order::Column::BranchId, "key")
                    .column_as(order::Column::Id.count(), "count")
                    .column_as(order::Column::Total.sum(), "total")
                    .group_by(order::Column::BranchId)
                    .into_model::<IntKeyRow>();

                let rows = db
                    .execute("orders_summary_by_branch", query.all(db.get_pool()))
                    .await?;
                Ok(rows.into_iter().map(SummaryRow::from).collect())
            }
            OrderGroupBy::Product => {
                let mut query = order_line::Entity::find()
                    .join(JoinType::InnerJoin, order_line::Relation::Order.def());

                if let Some(branch_id) = self.branch {
                    query = query.filter(order::Column::BranchId.eq(branch_id));
                }
                if let Some(from) = self.date_from {
                    query = query.filter(order::Column::OrderDate.gte(from));
                }
                if let Some(to) = self.date_to {
                    query = query.filter(order::Column::OrderDate.lte(to));
                }

                let query = query
                    .select_only()
                    .column_as(order_line::Column::ProductId, "key")
                    .column_as(order_line::Column::Id.count(), "count")
                    .column_as(order_line::Column::Subtotal.sum(), "total")
                    .group_by(order_line::Column::ProductId)
                    .into_model::<IntKeyRow>();

                let rows = db
                    .execute("orders_summary_by_product", query.all(db.get_pool()))
                    .await?;
                Ok(rows.into_iter().map(SummaryRow::from).collect())
            }
        }
    }
}

impl OrdersSummaryQuery {
    fn base_filters(
        &self,
        mut query: sea_orm::Select<order::Entity>,
    ) -> sea_orm::Select<order::Entity> {
        if let Some(branch_id) = self.branch {
            query = query.filter(order::Column::BranchId.eq(branch_id));
        }
        if let Some(from) = self.date_from {
            query = query.filter(order::Column::OrderDate.gte(from));
        }
        if let Some(to) = self.date_to {
            query = query.filter(order::Column::OrderDate.lte(to));
        }
        query
    }
}
