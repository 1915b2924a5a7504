//! Inventory domain module (event-sourced).
//!
//! One `StockItem` stream per product holds its on-hand quantity. Every movement
//! (purchase receipt, sale, manual adjustment) is an event carrying the resulting level.

pub mod stock;

pub use stock::{
    AdjustStock, InventoryCommand, InventoryEvent, OpenStockItem, ReceiptReversed, ReceiveStock,
    RestoreStock, ReverseReceipt, SellStock, StockAdjusted, StockItem, StockItemId,
    StockItemOpened, StockReceived, StockRestored, StockSold,
};
