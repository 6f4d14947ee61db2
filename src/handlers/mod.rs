//! HTTP handlers: thin translation between the JSON wire surface and
//! the services. No business rules live here.

pub mod carts;
pub mod orders;
pub mod purchases;
pub mod stock;

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::db::{DatabaseAccess, DbPool};
use crate::events::EventSender;
use crate::services::cart::CartService;
use crate::services::orders::OrderService;
use crate::services::purchases::PurchaseService;
use crate::services::stock::StockService;
use crate::services::LineItemInput;

/// All services, constructed once at startup and cloned into handlers
/// through the router state.
#[derive(Clone)]
pub struct AppServices {
    pub stock: StockService,
    pub purchases: PurchaseService,
    pub orders: OrderService,
    pub carts: CartService,
    /// Read-side access used by the query objects.
    pub read: DatabaseAccess,
}

impl AppServices {
    pub fn new(db: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            stock: StockService::new(db.clone(), event_sender.clone()),
            purchases: PurchaseService::new(db.clone(), event_sender.clone()),
            orders: OrderService::new(db.clone(), event_sender.clone()),
            carts: CartService::new(db.clone(), event_sender),
            read: DatabaseAccess::new(db),
        }
    }
}

/// Wire shape of a line item as clients send it.
#[derive(Debug, Deserialize)]
pub struct WireLineItem {
    pub product: i64,
    pub quantity: i32,
    pub unit_price: Decimal,
}

impl From<WireLineItem> for LineItemInput {
    fn from(item: WireLineItem) -> Self {
        LineItemInput {
            product_id: item.product,
            quantity: item.quantity,
            unit_price: item.unit_price,
        }
    }
}
