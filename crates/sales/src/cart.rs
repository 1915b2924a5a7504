//! Shopping cart used while ringing up a sale.
//!
//! Pure value: no events, no IO. Stock limits come from the snapshot taken when a
//! product is scanned.

use serde::{Deserialize, Serialize};

use arkpos_catalog::ProductId;
use arkpos_core::{DomainError, Money};

/// What the cashier sees of a product when adding it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub product_id: ProductId,
    pub name: String,
    pub unit_price: Money,
    pub stock: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: ProductId,
    pub name: String,
    pub unit_price: Money,
    pub quantity: i64,
    pub max_stock: i64,
}

impl CartItem {
    pub fn subtotal(&self) -> Money {
        self.unit_price.times(self.quantity)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Adds one unit of the product.
    pub fn add(&mut self, snapshot: &ProductSnapshot) -> Result<(), DomainError> {
        if snapshot.stock <= 0 {
            return Err(DomainError::invariant(format!("{} is out of stock", snapshot.name)));
        }

        if let Some(item) = self.items.iter_mut().find(|i| i.product_id == snapshot.product_id) {
            if item.quantity >= item.max_stock {
                return Err(DomainError::invariant(format!(
                    "only {} units of {} in stock",
                    item.max_stock, item.name
                )));
            }
            item.quantity += 1;
            return Ok(());
        }

        self.items.push(CartItem {
            product_id: snapshot.product_id,
            name: snapshot.name.clone(),
            unit_price: snapshot.unit_price,
            quantity: 1,
            max_stock: snapshot.stock,
        });
        Ok(())
    }

    /// Sets a line's quantity, clamped to `1..=max_stock`. Returns the stored quantity,
    /// or `None` when the product is not in the cart.
    pub fn set_quantity(&mut self, product_id: ProductId, quantity: i64) -> Option<i64> {
        let item = self.items.iter_mut().find(|i| i.product_id == product_id)?;
        item.quantity = quantity.clamp(1, item.max_stock.max(1));
        Some(item.quantity)
    }

    pub fn remove(&mut self, product_id: ProductId) -> bool {
        let before = self.items.len();
        self.items.retain(|i| i.product_id != product_id);
        self.items.len() != before
    }

    pub fn total(&self) -> Money {
        self.items.iter().map(CartItem::subtotal).sum()
    }

    /// Change owed for `cash`; zero when the cash does not cover a non-empty total.
    pub fn change_for(&self, cash: Money) -> Money {
        change_for(self.total(), cash)
    }
}

pub(crate) fn change_for(total: Money, cash: Money) -> Money {
    if total.is_positive() && cash >= total {
        cash - total
    } else {
        Money::zero()
    }
}
