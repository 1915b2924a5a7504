use chrono::Utc;
use serde_json::Value as JsonValue;
use tracing::{info, instrument};

use arkpos_catalog::{
    Category, CategoryCommand, CategoryId, CreateCategory, DeactivateProduct, Product, ProductCommand,
    ProductDetails, ProductId, ReactivateProduct, RegisterProduct, RemoveCategory, RenameCategory, UpdateProduct,
};
use arkpos_core::{AggregateId, DomainError};
use arkpos_events::{EventBus, EventEnvelope};
use arkpos_inventory::{InventoryCommand, OpenStockItem, StockItem, StockItemId};

use super::{WorkflowResult, Workflows};
use crate::event_store::EventStore;
use crate::streams;
use crate::unique_index::PRODUCT_CODE;

#[derive(Debug, Clone)]
pub struct NewProduct {
    pub details: ProductDetails,
    /// Units on hand when the product is first registered. Must be at least one.
    pub opening_stock: i64,
}

impl<S, B> Workflows<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Claims the code, then registers the product and opens its stock item in one commit.
    #[instrument(skip(self, input), fields(code = %input.details.code))]
    pub fn register_product(&self, input: NewProduct) -> WorkflowResult<ProductId> {
        if input.opening_stock < 1 {
            return Err(DomainError::validation("opening stock must be at least one unit").into());
        }
        let details = input.details.normalized()?;
        self.ensure_category(details.category_id)?;

        let product_id = ProductId::generate();
        self.index.claim(PRODUCT_CODE, &details.code, product_id.aggregate_id())?;

        let result = self.stage_new_product(product_id, &details, input.opening_stock);
        if result.is_err() {
            self.index.release(PRODUCT_CODE, &details.code, product_id.aggregate_id());
        }
        let stock_item_id = result?;

        info!(%product_id, %stock_item_id, opening_stock = input.opening_stock, "product registered");
        Ok(product_id)
    }

    fn stage_new_product(&self, product_id: ProductId, details: &ProductDetails, opening: i64) -> WorkflowResult<StockItemId> {
        let stock_item_id = StockItemId::generate();
        let now = Utc::now();

        let mut uow = self.dispatcher.unit_of_work();
        uow.execute(
            product_id.aggregate_id(),
            streams::PRODUCT,
            ProductCommand::Register(RegisterProduct {
                product_id,
                stock_item_id: stock_item_id.aggregate_id(),
                details: details.clone(),
                occurred_at: now,
            }),
            |id| Product::empty(ProductId::new(id)),
        )?;
        uow.execute(
            stock_item_id.aggregate_id(),
            streams::STOCK,
            InventoryCommand::Open(OpenStockItem {
                stock_item_id,
                product_id,
                opening_quantity: opening,
                occurred_at: now,
            }),
            |id| StockItem::empty(StockItemId::new(id)),
        )?;
        uow.commit()?;
        Ok(stock_item_id)
    }

    /// Updates descriptive fields and prices. A changed code moves the unique claim.
    #[instrument(skip(self, details))]
    pub fn update_product(&self, product_id: ProductId, details: ProductDetails) -> WorkflowResult<Product> {
        let current = self.product(product_id)?;
        let details = details.normalized()?;
        self.ensure_category(details.category_id)?;

        let owner = product_id.aggregate_id();
        let old_code = current.code().to_string();
        let code_changed = old_code.to_lowercase() != details.code.to_lowercase();
        if code_changed {
            self.index.claim(PRODUCT_CODE, &details.code, owner)?;
        }

        let result = self.dispatcher.dispatch(
            owner,
            streams::PRODUCT,
            ProductCommand::Update(UpdateProduct {
                product_id,
                details: details.clone(),
                occurred_at: Utc::now(),
            }),
            |id| Product::empty(ProductId::new(id)),
        );

        match result {
            Ok(_) if code_changed => self.index.release(PRODUCT_CODE, &old_code, owner),
            Ok(_) => {}
            Err(e) => {
                if code_changed {
                    self.index.release(PRODUCT_CODE, &details.code, owner);
                }
                return Err(e.into());
            }
        }

        info!(%product_id, code = %details.code, "product updated");
        self.product(product_id)
    }

    #[instrument(skip(self))]
    pub fn deactivate_product(&self, product_id: ProductId) -> WorkflowResult<()> {
        self.dispatcher.dispatch(
            product_id.aggregate_id(),
            streams::PRODUCT,
            ProductCommand::Deactivate(DeactivateProduct {
                product_id,
                occurred_at: Utc::now(),
            }),
            |id| Product::empty(ProductId::new(id)),
        )?;
        info!(%product_id, "product deactivated");
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn reactivate_product(&self, product_id: ProductId) -> WorkflowResult<()> {
        self.dispatcher.dispatch(
            product_id.aggregate_id(),
            streams::PRODUCT,
            ProductCommand::Reactivate(ReactivateProduct {
                product_id,
                occurred_at: Utc::now(),
            }),
            |id| Product::empty(ProductId::new(id)),
        )?;
        info!(%product_id, "product reactivated");
        Ok(())
    }

    pub(super) fn ensure_category(&self, category_id: Option<CategoryId>) -> WorkflowResult<()> {
        if let Some(id) = category_id {
            self.category(id)
                .map_err(|_| DomainError::validation(format!("category {id} does not exist")))?;
        }
        Ok(())
    }

    // ── categories ───────────────────────────────────────────────────────────

    #[instrument(skip(self))]
    pub fn create_category(&self, name: &str) -> WorkflowResult<CategoryId> {
        let category_id = CategoryId::generate();
        self.dispatch_category(
            category_id.aggregate_id(),
            CategoryCommand::Create(CreateCategory {
                category_id,
                name: name.to_string(),
                occurred_at: Utc::now(),
            }),
        )?;
        info!(%category_id, "category created");
        Ok(category_id)
    }

    #[instrument(skip(self))]
    pub fn rename_category(&self, category_id: CategoryId, name: &str) -> WorkflowResult<()> {
        self.dispatch_category(
            category_id.aggregate_id(),
            CategoryCommand::Rename(RenameCategory {
                category_id,
                name: name.to_string(),
                occurred_at: Utc::now(),
            }),
        )?;
        info!(%category_id, "category renamed");
        Ok(())
    }

    /// Products keep their category id; listings show them without a category name.
    #[instrument(skip(self))]
    pub fn remove_category(&self, category_id: CategoryId) -> WorkflowResult<()> {
        self.dispatch_category(
            category_id.aggregate_id(),
            CategoryCommand::Remove(RemoveCategory {
                category_id,
                occurred_at: Utc::now(),
            }),
        )?;
        info!(%category_id, "category removed");
        Ok(())
    }

    fn dispatch_category(&self, id: AggregateId, command: CategoryCommand) -> WorkflowResult<()> {
        self.dispatcher
            .dispatch(id, streams::CATEGORY, command, |id| Category::empty(CategoryId::new(id)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command_dispatcher::DispatchError;
    use crate::workflows::WorkflowError;
    use crate::workflows::testing::{catch_up, workflows};
    use arkpos_catalog::DEFAULT_MIN_STOCK;
    use arkpos_core::Money;

    fn details(code: &str, name: &str) -> ProductDetails {
        ProductDetails {
            code: code.to_string(),
            name: name.to_string(),
            category_id: None,
            size: Some("M".to_string()),
            color: None,
            unit: None,
            purchase_price: Money::from_cents(4_000),
            sale_price: Money::from_cents(6_500),
            min_stock: DEFAULT_MIN_STOCK,
        }
    }

    fn register(wf: &crate::workflows::testing::TestWorkflows, code: &str, stock: i64) -> WorkflowResult<ProductId> {
        wf.register_product(NewProduct {
            details: details(code, "Polera algodón"),
            opening_stock: stock,
        })
    }

    #[test]
    fn registers_product_with_opening_stock() {
        let wf = workflows();
        let id = register(&wf, "POL-001", 12).unwrap();

        let product = wf.product(id).unwrap();
        assert_eq!(product.code(), "POL-001");
        assert_eq!(wf.stock_item(&product).unwrap().stock(), 12);
        assert_eq!(wf.index().lookup(PRODUCT_CODE, "pol-001"), Some(id.aggregate_id()));

        catch_up(&wf);
        let row = wf.projections().catalog.get(id).unwrap();
        assert_eq!(row.stock, 12);
        assert_eq!(row.unit.as_deref(), Some("Unidad"));
    }

    #[test]
    fn opening_stock_must_be_positive() {
        let wf = workflows();
        let err = register(&wf, "POL-001", 0).unwrap_err();
        assert!(matches!(err, WorkflowError::Dispatch(DispatchError::Validation(_))));
        assert!(wf.index().lookup(PRODUCT_CODE, "POL-001").is_none());
    }

    #[test]
    fn duplicate_codes_conflict_case_insensitively() {
        let wf = workflows();
        register(&wf, "POL-001", 3).unwrap();
        let err = register(&wf, " pol-001", 3).unwrap_err();
        assert!(matches!(err, WorkflowError::Dispatch(DispatchError::Concurrency(_))));
    }

    #[test]
    fn unknown_category_is_rejected() {
        let wf = workflows();
        let input = NewProduct {
            details: ProductDetails {
                category_id: Some(CategoryId::generate()),
                ..details("POL-001", "Polera")
            },
            opening_stock: 1,
        };
        assert!(wf.register_product(input).is_err());
    }

    #[test]
    fn changing_the_code_moves_the_claim() {
        let wf = workflows();
        let a = register(&wf, "POL-001", 3).unwrap();
        let b = register(&wf, "POL-002", 3).unwrap();

        let taken = wf.update_product(a, details("POL-002", "Polera")).unwrap_err();
        assert!(matches!(taken, WorkflowError::Dispatch(DispatchError::Concurrency(_))));

        wf.update_product(a, details("POL-100", "Polera")).unwrap();
        assert_eq!(wf.index().lookup(PRODUCT_CODE, "POL-100"), Some(a.aggregate_id()));
        assert!(wf.index().lookup(PRODUCT_CODE, "POL-001").is_none());

        // The old code is free again.
        wf.update_product(b, details("POL-001", "Polera")).unwrap();
    }

    #[test]
    fn deactivate_and_reactivate() {
        let wf = workflows();
        let id = register(&wf, "POL-001", 3).unwrap();

        wf.deactivate_product(id).unwrap();
        assert!(!wf.product(id).unwrap().is_active());
        assert!(wf.deactivate_product(id).is_err());

        wf.reactivate_product(id).unwrap();
        assert!(wf.product(id).unwrap().is_active());
    }

    #[test]
    fn category_lifecycle() {
        let wf = workflows();
        let id = wf.create_category("Poleras").unwrap();
        wf.rename_category(id, "Poleras y blusas").unwrap();

        let product = wf
            .register_product(NewProduct {
                details: ProductDetails {
                    category_id: Some(id),
                    ..details("POL-001", "Polera")
                },
                opening_stock: 2,
            })
            .unwrap();

        catch_up(&wf);
        let row = wf.projections().catalog.get(product).unwrap();
        assert_eq!(row.category_name.as_deref(), Some("Poleras y blusas"));

        wf.remove_category(id).unwrap();
        assert!(wf.category(id).is_err());
    }
}
