//! Read-model builders.
//!
//! Every projection here:
//! - consumes committed JSON envelopes from the bus;
//! - skips envelopes at or below its per-stream cursor (at-least-once safe);
//! - can be thrown away and rebuilt from `EventStore::load_all`.

pub mod adjustments;
pub mod catalog;
pub mod parties;
pub mod purchases;
pub mod sales;
pub mod users;

use std::sync::Arc;
use std::time::Instant;

use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use tracing::{info, warn};

use arkpos_events::{EventEnvelope, Projection, ProjectionError, StreamCursors};

use crate::event_store::StoredEvent;
use crate::read_model::InMemoryReadStore;

pub use adjustments::{AdjustmentLogProjection, AdjustmentRow};
pub use catalog::{CatalogProjection, CategoryRow, ProductRow};
pub use parties::{PartyDirectoryProjection, PartyRow};
pub use purchases::{PriceHistoryEntry, PurchaseRow, PurchaseSummary, PurchasesProjection, SIN_PROVEEDOR};
pub use sales::{SaleRecord, SalesFilter, SalesProjection};
pub use users::{UserRow, UsersProjection};

/// Typed payload of an envelope.
pub(crate) fn decode<E: DeserializeOwned>(envelope: &EventEnvelope<JsonValue>) -> Result<E, ProjectionError> {
    serde_json::from_value(envelope.payload().clone())
        .map_err(|e| ProjectionError::deserialize(envelope.aggregate_type(), e))
}

/// Runs `apply` only for the next envelope of its stream, then moves the cursor.
/// Duplicates are skipped; gaps are errors.
pub(crate) fn in_order(
    cursors: &StreamCursors,
    envelope: &EventEnvelope<JsonValue>,
    apply: impl FnOnce() -> Result<(), ProjectionError>,
) -> Result<(), ProjectionError> {
    let id = envelope.aggregate_id();
    let seq = envelope.sequence_number();
    if !cursors.is_next(id, seq)? {
        return Ok(());
    }
    apply()?;
    cursors.advance(id, seq);
    Ok(())
}

/// Every read model the API serves, fed from one subscription.
#[derive(Clone)]
pub struct Projections {
    pub catalog: Arc<CatalogProjection>,
    pub parties: Arc<PartyDirectoryProjection>,
    pub users: Arc<UsersProjection<InMemoryReadStore<arkpos_auth::UserId, UserRow>>>,
    pub purchases: Arc<PurchasesProjection>,
    pub sales: Arc<SalesProjection>,
    pub adjustments: Arc<AdjustmentLogProjection>,
}

impl Default for Projections {
    fn default() -> Self {
        Self::new()
    }
}

impl Projections {
    pub fn new() -> Self {
        Self {
            catalog: Arc::new(CatalogProjection::new()),
            parties: Arc::new(PartyDirectoryProjection::new()),
            users: Arc::new(UsersProjection::new(InMemoryReadStore::new())),
            purchases: Arc::new(PurchasesProjection::new()),
            sales: Arc::new(SalesProjection::new()),
            adjustments: Arc::new(AdjustmentLogProjection::new()),
        }
    }

    fn all(&self) -> [&dyn Projection; 6] {
        [
            self.catalog.as_ref(),
            self.parties.as_ref(),
            self.users.as_ref(),
            self.purchases.as_ref(),
            self.sales.as_ref(),
            self.adjustments.as_ref(),
        ]
    }

    /// Feed one envelope to every interested projection.
    ///
    /// A failing projection does not stop the others; the first error is returned.
    pub fn apply(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        let mut first_error = None;
        for projection in self.all() {
            if !projection.handles(envelope.aggregate_type()) {
                continue;
            }
            if let Err(e) = projection.apply_envelope(envelope) {
                warn!(
                    projection = projection.name(),
                    aggregate_id = %envelope.aggregate_id(),
                    sequence = envelope.sequence_number(),
                    error = %e,
                    "projection failed to apply envelope"
                );
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Reset every read model and replay the full log.
    pub fn rebuild(&self, events: &[StoredEvent]) -> Result<(), ProjectionError> {
        let started = Instant::now();
        let envelopes: Vec<_> = events.iter().map(StoredEvent::to_envelope).collect();
        for projection in self.all() {
            projection.rebuild(&envelopes)?;
        }
        info!(
            events = envelopes.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "read models rebuilt"
        );
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use super::testing::Sequencer;

    use arkpos_catalog::{ProductDetails, ProductEvent, ProductId, ProductRegistered};
    use arkpos_core::Money;
    use arkpos_inventory::{InventoryEvent, StockItemId, StockItemOpened};
    use chrono::Utc;

    fn product_events(seq: &mut Sequencer) -> Vec<EventEnvelope<JsonValue>> {
        let product_id = ProductId::generate();
        let stock_item_id = StockItemId::generate();
        vec![
            seq.next(
                product_id.aggregate_id(),
                "catalog.product",
                &ProductEvent::Registered(ProductRegistered {
                    product_id,
                    stock_item_id: stock_item_id.aggregate_id(),
                    details: ProductDetails {
                        code: "GOR-01".to_string(),
                        name: "Gorra".to_string(),
                        category_id: None,
                        size: None,
                        color: None,
                        unit: Some("Unidad".to_string()),
                        purchase_price: Money::from_cents(2_000),
                        sale_price: Money::from_cents(3_500),
                        min_stock: 5,
                    },
                    occurred_at: Utc::now(),
                }),
            ),
            seq.next(
                stock_item_id.aggregate_id(),
                "inventory.stock",
                &InventoryEvent::Opened(StockItemOpened {
                    stock_item_id,
                    product_id,
                    quantity: 3,
                    occurred_at: Utc::now(),
                }),
            ),
        ]
    }

    #[test]
    fn apply_routes_envelopes_by_aggregate_type() {
        let projections = Projections::new();
        let mut seq = Sequencer::default();
        for env in product_events(&mut seq) {
            projections.apply(&env).unwrap();
        }

        let products = projections.catalog.list(None, false);
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].stock, 3);
        assert_eq!(projections.catalog.low_stock().len(), 1);
    }

    #[test]
    fn rebuild_replaces_previous_state() {
        let projections = Projections::new();
        let mut seq = Sequencer::default();
        for env in product_events(&mut seq) {
            projections.apply(&env).unwrap();
        }

        let log: Vec<StoredEvent> = product_events(&mut Sequencer::default())
            .into_iter()
            .map(|env| StoredEvent {
                event_id: env.event_id(),
                aggregate_id: env.aggregate_id(),
                aggregate_type: env.aggregate_type().to_string(),
                sequence_number: env.sequence_number(),
                event_type: "replayed".to_string(),
                event_version: 1,
                occurred_at: env.occurred_at(),
                payload: env.payload().clone(),
            })
            .collect();

        projections.rebuild(&log).unwrap();
        assert_eq!(projections.catalog.list(None, false).len(), 1);
    }

    #[test]
    fn gap_in_stream_is_reported() {
        let projections = Projections::new();
        let mut envs = product_events(&mut Sequencer::default());
        let stock = envs.remove(1);
        let gapped = EventEnvelope::new(
            stock.event_id(),
            stock.aggregate_id(),
            stock.aggregate_type(),
            3,
            stock.occurred_at(),
            stock.payload().clone(),
        );

        let err = projections.apply(&gapped).unwrap_err();
        assert!(matches!(err, ProjectionError::NonMonotonicSequence { last: 0, found: 3 }));
    }
}
