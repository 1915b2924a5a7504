//! Purchase list and the price history ledger.
//!
//! Supplier names, user names and current sale prices are tracked from their own
//! streams and joined when queried.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use arkpos_auth::{UserEvent, UserId};
use arkpos_catalog::{ProductEvent, ProductId};
use arkpos_core::Money;
use arkpos_events::{EventEnvelope, Projection, ProjectionError, StreamCursors};
use arkpos_parties::{PartyEvent, PartyId};
use arkpos_purchasing::{PurchaseEvent, PurchaseId, PurchaseLine, PurchaseStatus};

use super::{decode, in_order};
use crate::read_model::{InMemoryReadStore, Page, PageRequest, ReadStore};

/// Supplier label for purchases whose supplier is unknown to the directory.
pub const SIN_PROVEEDOR: &str = "Sin Proveedor";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseRow {
    pub purchase_id: PurchaseId,
    pub supplier_id: PartyId,
    pub supplier_name: String,
    pub user_id: UserId,
    pub user_name: String,
    pub lines: Vec<PurchaseLine>,
    pub total: Money,
    pub status: PurchaseStatus,
    pub registered_at: DateTime<Utc>,
    pub revised_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseSummary {
    pub purchase_id: PurchaseId,
    pub date: DateTime<Utc>,
    pub supplier_name: String,
    pub user_name: String,
    pub total: Money,
    pub status: PurchaseStatus,
}

/// One purchase line as the price history shows it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceHistoryEntry {
    pub date: DateTime<Utc>,
    pub code: String,
    pub product_name: String,
    pub user_name: String,
    /// Price registered with the purchase.
    pub purchase_price: Money,
    /// The product's sale price today.
    pub current_sale_price: Money,
    pub quantity: i64,
    pub purchase_id: PurchaseId,
}

#[derive(Debug, Clone)]
struct StoredPurchase {
    purchase_id: PurchaseId,
    supplier_id: PartyId,
    user_id: UserId,
    lines: Vec<PurchaseLine>,
    total: Money,
    status: PurchaseStatus,
    registered_at: DateTime<Utc>,
    revised_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
pub struct PurchasesProjection {
    purchases: InMemoryReadStore<PurchaseId, StoredPurchase>,
    suppliers: InMemoryReadStore<PartyId, String>,
    users: InMemoryReadStore<UserId, String>,
    sale_prices: InMemoryReadStore<ProductId, Money>,
    cursors: StreamCursors,
}

impl PurchasesProjection {
    pub fn new() -> Self {
        Self::default()
    }

    fn apply_purchase(&self, event: PurchaseEvent) {
        match event {
            PurchaseEvent::Registered(e) => self.purchases.upsert(
                e.purchase_id,
                StoredPurchase {
                    purchase_id: e.purchase_id,
                    supplier_id: e.supplier_id,
                    user_id: e.user_id,
                    lines: e.lines,
                    total: e.total,
                    status: PurchaseStatus::Completed,
                    registered_at: e.occurred_at,
                    revised_at: None,
                },
            ),
            PurchaseEvent::Revised(e) => {
                self.purchases.update(&e.purchase_id, |p| {
                    p.supplier_id = e.supplier_id;
                    p.user_id = e.user_id;
                    p.lines = e.lines;
                    p.total = e.total;
                    p.revised_at = Some(e.occurred_at);
                });
            }
        }
    }

    fn apply_party(&self, event: PartyEvent) {
        match event {
            PartyEvent::Registered(e) => self.suppliers.upsert(e.party_id, e.details.name),
            PartyEvent::Updated(e) => self.suppliers.upsert(e.party_id, e.details.name),
            PartyEvent::Removed(_) => {}
        }
    }

    fn apply_user(&self, event: UserEvent) {
        match event {
            UserEvent::Registered(e) => self.users.upsert(e.user_id, e.full_name),
            UserEvent::ProfileUpdated(e) => self.users.upsert(e.user_id, e.full_name),
            _ => {}
        }
    }

    fn apply_product(&self, event: ProductEvent) {
        match event {
            ProductEvent::Registered(e) => self.sale_prices.upsert(e.product_id, e.details.sale_price),
            ProductEvent::Updated(e) => self.sale_prices.upsert(e.product_id, e.details.sale_price),
            ProductEvent::Repriced(e) => self.sale_prices.upsert(e.product_id, e.sale_price),
            _ => {}
        }
    }

    fn supplier_name(&self, supplier_id: PartyId) -> String {
        self.suppliers.get(&supplier_id).unwrap_or_else(|| SIN_PROVEEDOR.to_string())
    }

    fn user_name(&self, user_id: UserId) -> String {
        self.users.get(&user_id).unwrap_or_else(|| user_id.to_string())
    }

    fn row(&self, p: StoredPurchase) -> PurchaseRow {
        PurchaseRow {
            purchase_id: p.purchase_id,
            supplier_id: p.supplier_id,
            supplier_name: self.supplier_name(p.supplier_id),
            user_id: p.user_id,
            user_name: self.user_name(p.user_id),
            lines: p.lines,
            total: p.total,
            status: p.status,
            registered_at: p.registered_at,
            revised_at: p.revised_at,
        }
    }

    fn newest_first(&self) -> Vec<StoredPurchase> {
        let mut all = self.purchases.list();
        all.sort_by(|a, b| b.registered_at.cmp(&a.registered_at).then(b.purchase_id.cmp(&a.purchase_id)));
        all
    }

    pub fn get(&self, purchase_id: PurchaseId) -> Option<PurchaseRow> {
        self.purchases.get(&purchase_id).map(|p| self.row(p))
    }

    /// All purchases, newest first.
    pub fn list(&self) -> Vec<PurchaseSummary> {
        self.newest_first()
            .into_iter()
            .map(|p| PurchaseSummary {
                purchase_id: p.purchase_id,
                date: p.registered_at,
                supplier_name: self.supplier_name(p.supplier_id),
                user_name: self.user_name(p.user_id),
                total: p.total,
                status: p.status,
            })
            .collect()
    }

    pub fn has_purchases_from(&self, supplier_id: PartyId) -> bool {
        self.purchases.list().iter().any(|p| p.supplier_id == supplier_id)
    }

    /// One entry per purchase line, newest purchase first, lines in order.
    pub fn price_history(&self, page: PageRequest) -> Page<PriceHistoryEntry> {
        let mut entries = Vec::new();
        for p in self.newest_first() {
            let user_name = self.user_name(p.user_id);
            for line in p.lines {
                entries.push(PriceHistoryEntry {
                    date: p.registered_at,
                    current_sale_price: self.sale_prices.get(&line.product_id).unwrap_or(line.sale_price),
                    code: line.code,
                    product_name: line.name,
                    user_name: user_name.clone(),
                    purchase_price: line.purchase_price,
                    quantity: line.quantity,
                    purchase_id: p.purchase_id,
                });
            }
        }
        Page::from_sorted(entries, page)
    }
}

impl Projection for PurchasesProjection {
    fn name(&self) -> &'static str {
        "purchasing.purchases"
    }

    fn handles(&self, aggregate_type: &str) -> bool {
        matches!(
            aggregate_type,
            "purchasing.purchase" | "parties.party" | "auth.user" | "catalog.product"
        )
    }

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        in_order(&self.cursors, envelope, || {
            match envelope.aggregate_type() {
                "purchasing.purchase" => self.apply_purchase(decode(envelope)?),
                "parties.party" => self.apply_party(decode(envelope)?),
                "auth.user" => self.apply_user(decode(envelope)?),
                "catalog.product" => self.apply_product(decode(envelope)?),
                _ => {}
            }
            Ok(())
        })
    }

    fn reset(&self) {
        self.purchases.clear();
        self.suppliers.clear();
        self.users.clear();
        self.sale_prices.clear();
        self.cursors.clear();
    }
}
