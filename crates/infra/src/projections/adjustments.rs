//! Manual stock adjustment log.

use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use arkpos_auth::{UserEvent, UserId};
use arkpos_catalog::{ProductEvent, ProductId};
use arkpos_events::{EventEnvelope, Projection, ProjectionError, StreamCursors};
use arkpos_inventory::InventoryEvent;

use super::{decode, in_order};
use crate::read_model::{InMemoryReadStore, Page, PageRequest, ReadStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustmentRow {
    pub date: DateTime<Utc>,
    pub product_id: ProductId,
    pub product_code: String,
    pub product_name: String,
    pub user_id: UserId,
    pub user_name: String,
    /// Signed change applied to stock.
    pub quantity: i64,
    pub reason: String,
    pub stock_after: i64,
}

#[derive(Debug, Clone)]
struct Entry {
    date: DateTime<Utc>,
    product_id: ProductId,
    user_id: UserId,
    delta: i64,
    reason: String,
    stock_after: i64,
}

#[derive(Debug, Default)]
pub struct AdjustmentLogProjection {
    entries: RwLock<Vec<Entry>>,
    products: InMemoryReadStore<ProductId, (String, String)>,
    users: InMemoryReadStore<UserId, String>,
    cursors: StreamCursors,
}

impl AdjustmentLogProjection {
    pub fn new() -> Self {
        Self::default()
    }

    fn apply_inventory(&self, event: InventoryEvent) {
        if let InventoryEvent::Adjusted(e) = event {
            if let Ok(mut entries) = self.entries.write() {
                entries.push(Entry {
                    date: e.occurred_at,
                    product_id: e.product_id,
                    user_id: e.user_id,
                    delta: e.delta,
                    reason: e.reason,
                    stock_after: e.stock_after,
                });
            }
        }
    }

    fn apply_product(&self, event: ProductEvent) {
        match event {
            ProductEvent::Registered(e) => self.products.upsert(e.product_id, (e.details.code, e.details.name)),
            ProductEvent::Updated(e) => self.products.upsert(e.product_id, (e.details.code, e.details.name)),
            _ => {}
        }
    }

    fn apply_user(&self, event: UserEvent) {
        match event {
            UserEvent::Registered(e) => self.users.upsert(e.user_id, e.full_name),
            UserEvent::ProfileUpdated(e) => self.users.upsert(e.user_id, e.full_name),
            _ => {}
        }
    }

    /// Adjustments, newest first.
    pub fn page(&self, page: PageRequest) -> Page<AdjustmentRow> {
        let mut entries = self.entries.read().map(|e| e.clone()).unwrap_or_default();
        entries.reverse();
        entries.sort_by(|a, b| b.date.cmp(&a.date));

        Page::from_sorted(entries, page).map(|e| {
            let (product_code, product_name) = self.products.get(&e.product_id).unwrap_or_default();
            AdjustmentRow {
                date: e.date,
                product_id: e.product_id,
                product_code,
                product_name,
                user_id: e.user_id,
                user_name: self.users.get(&e.user_id).unwrap_or_else(|| e.user_id.to_string()),
                quantity: e.delta,
                reason: e.reason,
                stock_after: e.stock_after,
            }
        })
    }
}

impl Projection for AdjustmentLogProjection {
    fn name(&self) -> &'static str {
        "inventory.adjustments"
    }

    fn handles(&self, aggregate_type: &str) -> bool {
        matches!(aggregate_type, "inventory.stock" | "catalog.product" | "auth.user")
    }

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        in_order(&self.cursors, envelope, || {
            match envelope.aggregate_type() {
                "inventory.stock" => self.apply_inventory(decode(envelope)?),
                "catalog.product" => self.apply_product(decode(envelope)?),
                "auth.user" => self.apply_user(decode(envelope)?),
                _ => {}
            }
            Ok(())
        })
    }

    fn reset(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
        self.products.clear();
        self.users.clear();
        self.cursors.clear();
    }
}
