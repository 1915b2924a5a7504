use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use arkpos_auth::UserId;
use arkpos_catalog::ProductId;
use arkpos_core::{Aggregate, AggregateId, AggregateRoot, DomainError, rules};
use arkpos_events::Event;

arkpos_core::typed_id!(StockItemId);

/// Aggregate root: on-hand stock of one product.
///
/// # Invariants
/// - Stock never goes negative.
/// - Every movement quantity is strictly positive (adjustments: non-zero delta).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockItem {
    id: StockItemId,
    product_id: Option<ProductId>,
    stock: i64,
    version: u64,
    created: bool,
}

impl StockItem {
    pub fn empty(id: StockItemId) -> Self {
        Self {
            id,
            product_id: None,
            stock: 0,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> StockItemId {
        self.id
    }

    pub fn exists(&self) -> bool {
        self.created
    }

    pub fn product_id(&self) -> Option<ProductId> {
        self.product_id
    }

    pub fn stock(&self) -> i64 {
        self.stock
    }
}

impl AggregateRoot for StockItem {
    type Id = StockItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

// Commands

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenStockItem {
    pub stock_item_id: StockItemId,
    pub product_id: ProductId,
    pub opening_quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveStock {
    pub stock_item_id: StockItemId,
    pub quantity: i64,
    pub purchase_id: AggregateId,
    pub occurred_at: DateTime<Utc>,
}

/// Takes back a quantity received by a purchase that is being revised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReverseReceipt {
    pub stock_item_id: StockItemId,
    pub quantity: i64,
    pub purchase_id: AggregateId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SellStock {
    pub stock_item_id: StockItemId,
    pub quantity: i64,
    pub sale_id: AggregateId,
    pub occurred_at: DateTime<Utc>,
}

/// Puts back a quantity taken by a voided sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreStock {
    pub stock_item_id: StockItemId,
    pub quantity: i64,
    pub sale_id: AggregateId,
    pub occurred_at: DateTime<Utc>,
}

/// Manual correction (count differences, damage, gifts).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustStock {
    pub stock_item_id: StockItemId,
    pub delta: i64,
    pub reason: String,
    pub user_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InventoryCommand {
    Open(OpenStockItem),
    Receive(ReceiveStock),
    ReverseReceipt(ReverseReceipt),
    Sell(SellStock),
    Restore(RestoreStock),
    Adjust(AdjustStock),
}

// Events

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockItemOpened {
    pub stock_item_id: StockItemId,
    pub product_id: ProductId,
    pub quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockReceived {
    pub stock_item_id: StockItemId,
    pub product_id: ProductId,
    pub quantity: i64,
    pub purchase_id: AggregateId,
    pub stock_after: i64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptReversed {
    pub stock_item_id: StockItemId,
    pub product_id: ProductId,
    pub quantity: i64,
    pub purchase_id: AggregateId,
    pub stock_after: i64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockSold {
    pub stock_item_id: StockItemId,
    pub product_id: ProductId,
    pub quantity: i64,
    pub sale_id: AggregateId,
    pub stock_after: i64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockRestored {
    pub stock_item_id: StockItemId,
    pub product_id: ProductId,
    pub quantity: i64,
    pub sale_id: AggregateId,
    pub stock_after: i64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAdjusted {
    pub stock_item_id: StockItemId,
    pub product_id: ProductId,
    pub delta: i64,
    pub reason: String,
    pub user_id: UserId,
    pub stock_after: i64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InventoryEvent {
    Opened(StockItemOpened),
    Received(StockReceived),
    ReceiptReversed(ReceiptReversed),
    Sold(StockSold),
    Restored(StockRestored),
    Adjusted(StockAdjusted),
}

impl InventoryEvent {
    /// On-hand quantity right after this event.
    pub fn stock_after(&self) -> i64 {
        match self {
            InventoryEvent::Opened(e) => e.quantity,
            InventoryEvent::Received(e) => e.stock_after,
            InventoryEvent::ReceiptReversed(e) => e.stock_after,
            InventoryEvent::Sold(e) => e.stock_after,
            InventoryEvent::Restored(e) => e.stock_after,
            InventoryEvent::Adjusted(e) => e.stock_after,
        }
    }

    pub fn product_id(&self) -> ProductId {
        match self {
            InventoryEvent::Opened(e) => e.product_id,
            InventoryEvent::Received(e) => e.product_id,
            InventoryEvent::ReceiptReversed(e) => e.product_id,
            InventoryEvent::Sold(e) => e.product_id,
            InventoryEvent::Restored(e) => e.product_id,
            InventoryEvent::Adjusted(e) => e.product_id,
        }
    }
}

impl Event for InventoryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            InventoryEvent::Opened(_) => "inventory.stock.opened",
            InventoryEvent::Received(_) => "inventory.stock.received",
            InventoryEvent::ReceiptReversed(_) => "inventory.stock.receipt_reversed",
            InventoryEvent::Sold(_) => "inventory.stock.sold",
            InventoryEvent::Restored(_) => "inventory.stock.restored",
            InventoryEvent::Adjusted(_) => "inventory.stock.adjusted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            InventoryEvent::Opened(e) => e.occurred_at,
            InventoryEvent::Received(e) => e.occurred_at,
            InventoryEvent::ReceiptReversed(e) => e.occurred_at,
            InventoryEvent::Sold(e) => e.occurred_at,
            InventoryEvent::Restored(e) => e.occurred_at,
            InventoryEvent::Adjusted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for StockItem {
    type Command = InventoryCommand;
    type Event = InventoryEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        if let InventoryEvent::Opened(e) = event {
            self.id = e.stock_item_id;
            self.product_id = Some(e.product_id);
            self.created = true;
        }
        self.stock = event.stock_after();
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            InventoryCommand::Open(cmd) => self.handle_open(cmd),
            InventoryCommand::Receive(cmd) => {
                let (product_id, stock_after) = self.movement(cmd.stock_item_id, cmd.quantity, 1)?;
                Ok(vec![InventoryEvent::Received(StockReceived {
                    stock_item_id: cmd.stock_item_id,
                    product_id,
                    quantity: cmd.quantity,
                    purchase_id: cmd.purchase_id,
                    stock_after,
                    occurred_at: cmd.occurred_at,
                })])
            }
            InventoryCommand::ReverseReceipt(cmd) => {
                let (product_id, stock_after) = self.movement(cmd.stock_item_id, cmd.quantity, -1)?;
                Ok(vec![InventoryEvent::ReceiptReversed(ReceiptReversed {
                    stock_item_id: cmd.stock_item_id,
                    product_id,
                    quantity: cmd.quantity,
                    purchase_id: cmd.purchase_id,
                    stock_after,
                    occurred_at: cmd.occurred_at,
                })])
            }
            InventoryCommand::Sell(cmd) => {
                let (product_id, stock_after) = self.movement(cmd.stock_item_id, cmd.quantity, -1)?;
                Ok(vec![InventoryEvent::Sold(StockSold {
                    stock_item_id: cmd.stock_item_id,
                    product_id,
                    quantity: cmd.quantity,
                    sale_id: cmd.sale_id,
                    stock_after,
                    occurred_at: cmd.occurred_at,
                })])
            }
            InventoryCommand::Restore(cmd) => {
                let (product_id, stock_after) = self.movement(cmd.stock_item_id, cmd.quantity, 1)?;
                Ok(vec![InventoryEvent::Restored(StockRestored {
                    stock_item_id: cmd.stock_item_id,
                    product_id,
                    quantity: cmd.quantity,
                    sale_id: cmd.sale_id,
                    stock_after,
                    occurred_at: cmd.occurred_at,
                })])
            }
            InventoryCommand::Adjust(cmd) => self.handle_adjust(cmd),
        }
    }
}

impl StockItem {
    fn ensure_item(&self, stock_item_id: StockItemId) -> Result<ProductId, DomainError> {
        if self.id != stock_item_id {
            return Err(DomainError::invariant("stock_item_id mismatch"));
        }
        match (self.created, self.product_id) {
            (true, Some(product_id)) => Ok(product_id),
            _ => Err(DomainError::not_found()),
        }
    }

    fn next_level(&self, delta: i64) -> Result<i64, DomainError> {
        let next = self
            .stock
            .checked_add(delta)
            .ok_or_else(|| DomainError::validation("quantity out of range"))?;
        if next < 0 {
            return Err(DomainError::invariant(format!(
                "insufficient stock: {} on hand, {} requested",
                self.stock,
                delta.unsigned_abs()
            )));
        }
        Ok(next)
    }

    /// Validates a positive `quantity` moving in `direction` (+1 in, -1 out).
    fn movement(
        &self,
        stock_item_id: StockItemId,
        quantity: i64,
        direction: i64,
    ) -> Result<(ProductId, i64), DomainError> {
        let product_id = self.ensure_item(stock_item_id)?;
        if quantity <= 0 {
            return Err(DomainError::validation("quantity must be greater than zero"));
        }
        Ok((product_id, self.next_level(quantity * direction)?))
    }

    fn handle_open(&self, cmd: &OpenStockItem) -> Result<Vec<InventoryEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("stock item already exists"));
        }
        if cmd.opening_quantity < 0 {
            return Err(DomainError::validation("opening quantity cannot be negative"));
        }

        Ok(vec![InventoryEvent::Opened(StockItemOpened {
            stock_item_id: cmd.stock_item_id,
            product_id: cmd.product_id,
            quantity: cmd.opening_quantity,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_adjust(&self, cmd: &AdjustStock) -> Result<Vec<InventoryEvent>, DomainError> {
        let product_id = self.ensure_item(cmd.stock_item_id)?;

        if cmd.delta == 0 {
            return Err(DomainError::validation("adjustment cannot be zero"));
        }
        let reason = rules::required("reason", &cmd.reason)?;
        let stock_after = self.next_level(cmd.delta)?;

        Ok(vec![InventoryEvent::Adjusted(StockAdjusted {
            stock_item_id: cmd.stock_item_id,
            product_id,
            delta: cmd.delta,
            reason,
            user_id: cmd.user_id,
            stock_after,
            occurred_at: cmd.occurred_at,
        })])
    }
}
