use chrono::Utc;
use serde_json::Value as JsonValue;
use tracing::{info, instrument};

use arkpos_auth::UserId;
use arkpos_catalog::ProductId;
use arkpos_events::{EventBus, EventEnvelope};
use arkpos_inventory::{AdjustStock, InventoryCommand, StockItem, StockItemId};

use super::{WorkflowResult, Workflows};
use crate::event_store::EventStore;
use crate::streams;

impl<S, B> Workflows<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Manual correction of a product's stock. Returns the new level.
    #[instrument(skip(self, reason))]
    pub fn adjust_stock(&self, product_id: ProductId, delta: i64, reason: &str, user_id: UserId) -> WorkflowResult<i64> {
        let product = self.product(product_id)?;
        let stock_item_id = self.stock_item(&product)?.id_typed();

        self.dispatcher.dispatch(
            stock_item_id.aggregate_id(),
            streams::STOCK,
            InventoryCommand::Adjust(AdjustStock {
                stock_item_id,
                delta,
                reason: reason.to_string(),
                user_id,
                occurred_at: Utc::now(),
            }),
            |id| StockItem::empty(StockItemId::new(id)),
        )?;

        let stock = self.stock_item(&product)?.stock();
        info!(%product_id, delta, stock, "stock adjusted");
        Ok(stock)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command_dispatcher::DispatchError;
    use crate::read_model::PageRequest;
    use crate::workflows::testing::{catch_up, workflows};
    use crate::workflows::{NewProduct, WorkflowError};
    use arkpos_catalog::ProductDetails;
    use arkpos_core::Money;

    fn product(wf: &crate::workflows::testing::TestWorkflows, stock: i64) -> ProductId {
        wf.register_product(NewProduct {
            details: ProductDetails {
                code: "BUF-1".to_string(),
                name: "Bufanda".to_string(),
                category_id: None,
                size: None,
                color: Some("Rojo".to_string()),
                unit: None,
                purchase_price: Money::from_cents(1_500),
                sale_price: Money::from_cents(3_000),
                min_stock: 5,
            },
            opening_stock: stock,
        })
        .unwrap()
    }

    #[test]
    fn adjustments_move_stock_and_are_logged() {
        let wf = workflows();
        let id = product(&wf, 10);
        let user = UserId::generate();

        assert_eq!(wf.adjust_stock(id, -3, "prendas dañadas", user).unwrap(), 7);
        assert_eq!(wf.adjust_stock(id, 2, "conteo físico", user).unwrap(), 9);

        catch_up(&wf);
        let log = wf.projections().adjustments.page(PageRequest::default());
        assert_eq!(log.total_items, 2);
        assert_eq!(log.items[0].stock_after, 9);
        assert_eq!(log.items[0].product_code, "BUF-1");
    }

    #[test]
    fn stock_cannot_go_negative() {
        let wf = workflows();
        let id = product(&wf, 2);
        let err = wf.adjust_stock(id, -3, "robo", UserId::generate()).unwrap_err();
        assert!(matches!(err, WorkflowError::Dispatch(DispatchError::InvariantViolation(_))));
    }

    #[test]
    fn adjustments_need_a_reason_and_a_delta() {
        let wf = workflows();
        let id = product(&wf, 2);
        assert!(wf.adjust_stock(id, 1, "  ", UserId::generate()).is_err());
        assert!(wf.adjust_stock(id, 0, "nada", UserId::generate()).is_err());
    }

    #[test]
    fn low_stock_follows_adjustments() {
        let wf = workflows();
        let id = product(&wf, 8);
        wf.adjust_stock(id, -4, "merma", UserId::generate()).unwrap();

        catch_up(&wf);
        let low = wf.projections().catalog.low_stock();
        assert_eq!(low.len(), 1);
        assert_eq!(low[0].stock, 4);
    }

    #[test]
    fn concurrent_adjustments_reach_subscribers_in_stream_order() {
        use crate::projections::Projections;

        const WRITERS: usize = 8;
        const PER_WRITER: i64 = 50;

        let wf = workflows();
        let sub = wf.dispatcher().bus().subscribe();
        let id = product(&wf, 1);

        std::thread::scope(|scope| {
            for _ in 0..WRITERS {
                scope.spawn(|| {
                    let user = UserId::generate();
                    let mut done = 0;
                    while done < PER_WRITER {
                        match wf.adjust_stock(id, 1, "conteo físico", user) {
                            Ok(_) => done += 1,
                            Err(WorkflowError::Dispatch(DispatchError::Concurrency(_))) => continue,
                            Err(e) => panic!("unexpected adjustment failure: {e}"),
                        }
                    }
                });
            }
        });

        let live = Projections::new();
        while let Ok(env) = sub.try_recv() {
            live.apply(&env).unwrap();
        }

        let expected = 1 + WRITERS as i64 * PER_WRITER;
        assert_eq!(wf.stock_item(&wf.product(id).unwrap()).unwrap().stock(), expected);
        assert_eq!(live.catalog.get(id).unwrap().stock, expected);
        assert_eq!(live.adjustments.page(PageRequest::default()).total_items, WRITERS as u64 * PER_WRITER as u64);
    }
}
