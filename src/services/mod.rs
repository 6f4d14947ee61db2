//! Business services of the transaction core.
//!
//! Ledger primitives in [`stock`] are generic over the connection handle so
//! they run inside whatever transaction the caller opened; the services own
//! the transaction boundaries (one creation or one transition = one
//! transaction).

pub mod cart;
pub mod order_status;
pub mod orders;
pub mod purchases;
pub mod stock;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::ServiceError;

/// Strongly typed line item accepted by both processors. Loosely shaped
/// JSON is rejected at the handler boundary before this type exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItemInput {
    pub product_id: i64,
    pub quantity: i32,
    pub unit_price: Decimal,
}

impl LineItemInput {
    pub fn subtotal(&self) -> Decimal {
        Decimal::from(self.quantity) * self.unit_price
    }
}

/// Input validation shared by purchases and orders. Runs before any
/// transaction opens; a failing batch leaves the store untouched.
pub(crate) fn validate_line_items(items: &[LineItemInput]) -> Result<(), ServiceError> {
    if items.is_empty() {
        return Err(ServiceError::ValidationError(
            "at least one line item is required".to_string(),
        ));
    }
    for item in items {
        if item.quantity <= 0 {
            return Err(ServiceError::ValidationError(format!(
                "quantity for product {} must be positive, got {}",
                item.product_id, item.quantity
            )));
        }
        if item.unit_price < Decimal::ZERO {
            return Err(ServiceError::ValidationError(format!(
                "unit price for product {} must not be negative, got {}",
                item.product_id, item.unit_price
            )));
        }
    }
    Ok(())
}

pub(crate) fn lines_total(items: &[LineItemInput]) -> Decimal {
    items.iter().map(LineItemInput::subtotal).sum()
}
