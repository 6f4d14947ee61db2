//! sea-orm entities backing the transaction core.
//!
//! Catalog tables (branches, products, suppliers, customers) are owned by
//! out-of-scope CRUD; the core only references them by id.

pub mod branch;
pub mod cart;
pub mod cart_item;
pub mod customer;
pub mod order;
pub mod order_line;
pub mod product;
pub mod purchase;
pub mod purchase_line;
pub mod stock_level;
pub mod supplier;
