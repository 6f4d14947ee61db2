//! List and summary queries over purchases.

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::sea_query::JoinType;
use sea_orm::{
    ColumnTrait, EntityTrait, FromQueryResult, QueryFilter, QueryOrder, QuerySelect, RelationTrait,
};
use serde::Deserialize;

use crate::db::DatabaseAccess;
use crate::entities::{purchase, purchase_line};
use crate::errors::ServiceError;
use crate::queries::{default_limit, effective_limit, Query, SummaryRow};

#[derive(Debug, Clone, Deserialize)]
pub struct ListPurchasesQuery {
    pub branch: Option<i64>,
    pub supplier: Option<i64>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    #[serde(default = "default_limit")]
    pub limit: u64,
    #[serde(default)]
    pub offset: u64,
}

#[async_trait]
impl Query for ListPurchasesQuery {
    type Result = Vec<purchase::Model>;

    async fn execute(&self, db: &DatabaseAccess) -> Result<Self::Result, ServiceError> {
        let mut query = purchase::Entity::find();

        if let Some(branch_id) = self.branch {
            query = query.filter(purchase::Column::BranchId.eq(branch_id));
        }
        if let Some(supplier_id) = self.supplier {
            query = query.filter(purchase::Column::SupplierId.eq(supplier_id));
        }
        if let Some(from) = self.date_from {
            query = query.filter(purchase::Column::PurchaseDate.gte(from));
        }
        if let Some(to) = self.date_to {
            query = query.filter(purchase::Column::PurchaseDate.lte(to));
        }

        let query = query
            .order_by_desc(purchase::Column::Id)
            .limit(effective_limit(self.limit))
            .offset(self.offset);

        db.execute("list_purchases", query.all(db.get_pool())).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PurchaseGroupBy {
    Branch,
    Supplier,
    Product,
}

/// Aggregated purchase spend by branch, supplier or delivered product.
#[derive(Debug, Clone, Deserialize)]
pub struct PurchasesSummaryQuery {
    pub group_by: PurchaseGroupBy,
    pub branch: Option<i64>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

#[derive(Debug, FromQueryResult)]
struct IntKeyRow {
    key: i64,
    count: i64,
    total: Option<Decimal>,
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
impl Query for PurchasesSummaryQuery {
    type Result = Vec<SummaryRow>;

    async fn execute(&self, db: &DatabaseAccess) -> Result<Self::Result, ServiceError> {
        match self.group_by {
            PurchaseGroupBy::Branch => {
                let query = self
                    .base_filters(purchase::Entity::find())
                    .select_only()
                    .column_as(purchase::Column::BranchId, "key")
                    .column_as(purchase::Column::Id.count(), "count")
                    .column_as(purchase::Column::Total.sum(), "total")
                    .group_by(purchase::Column::BranchId)
                    .into_model::<IntKeyRow>();

                let rows = db
                    .execute("purchases_summary_by_branch", query.all(db.get_pool()))
                    .await?;
                Ok(rows.into_iter().map(SummaryRow::from).collect())
            }
            PurchaseGroupBy::Supplier => {
                let query = self
                    .base_filters(purchase::Entity::find())
                    .select_only()
                    .column_as(purchase::Column::SupplierId, "key")
                    .column_as(purchase::Column::Id.count(), "count")
                    .column_as(purchase::Column::Total.sum(), "total")
                    .group_by(purchase::Column::SupplierId)
                    .into_model::<IntKeyRow>();

                let rows = db
                    .execute("purchases_summary_by_supplier", query.all(db.get_pool()))
                    .await?;
                Ok(rows.into_iter().map(SummaryRow::from).collect())
            }
            PurchaseGroupBy::Product => {
                let mut query = purchase_line::Entity::find()
                    .join(JoinType::InnerJoin, purchase_line::Relation::Purchase.def());

                if let Some(branch_id) = self.branch {
                    query = query.filter(purchase::Column::BranchId.eq(branch_id));
                }
                if let Some(from) = self.date_from {
                    query = query.filter(purchase::Column::PurchaseDate.gte(from));
                }
                if let Some(to) = self.date_to {
                    query = query.filter(purchase::Column::PurchaseDate.lte(to));
                }

                let query = query
                    .select_only()
                    .column_as(purchase_line::Column::ProductId, "key")
                    .column_as(purchase_line::Column::Id.count(), "count")
                    .column_as(purchase_line::Column::Subtotal.sum(), "total")
                    .group_by(purchase_line::Column::ProductId)
                    .into_model::<IntKeyRow>();

                let rows = db
                    .execute("purchases_summary_by_product", query.all(db.get_pool()))
                    .await?;
                Ok(rows.into_iter().map(SummaryRow::from).collect())
            }
        }
    }
}

impl PurchasesSummaryQuery {
    fn base_filters(
        &self,
        mut query: sea_orm::Select<purchase::Entity>,
    ) -> sea_orm::Select<purchase::Entity> {
        if let Some(branch_id) = self.branch {
            query = query.filter(purchase::Column::BranchId.eq(branch_id));
        }
        if let Some(from) = self.date_from {
            query = query.filter(purchase::Column::PurchaseDate.gte(from));
        }
        if let Some(to) = self.date_to {
            query = query.filter(purchase::Column::PurchaseDate.lte(to));
        }
        query
    }
}
