//! Catalog read model: products with their live stock and category name, plus the
//! category list.
//!
//! Product, category and stock streams are stored separately and joined at query
//! time, so cross-stream arrival order does not matter.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use arkpos_catalog::{CategoryEvent, CategoryId, ProductDetails, ProductEvent, ProductId};
use arkpos_core::{AggregateId, Money};
use arkpos_events::{EventEnvelope, Projection, ProjectionError, StreamCursors};
use arkpos_inventory::InventoryEvent;
use arkpos_reporting::LowStockRow;

use super::{decode, in_order};
use crate::read_model::{InMemoryReadStore, ReadStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRow {
    pub product_id: ProductId,
    pub stock_item_id: AggregateId,
    pub code: String,
    pub name: String,
    pub category_id: Option<CategoryId>,
    pub category_name: Option<String>,
    pub size: Option<String>,
    pub color: Option<String>,
    pub unit: Option<String>,
    pub purchase_price: Money,
    pub sale_price: Money,
    pub min_stock: i64,
    pub stock: i64,
    pub active: bool,
    pub registered_at: DateTime<Utc>,
}

impl ProductRow {
    fn matches(&self, needle: &str) -> bool {
        self.name.to_lowercase().contains(needle) || self.code.to_lowercase().contains(needle)
    }

    fn set_details(&mut self, details: ProductDetails) {
        self.code = details.code;
        self.name = details.name;
        self.category_id = details.category_id;
        self.size = details.size;
        self.color = details.color;
        self.unit = details.unit;
        self.purchase_price = details.purchase_price;
        self.sale_price = details.sale_price;
        self.min_stock = details.min_stock;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRow {
    pub category_id: CategoryId,
    pub name: String,
}

#[derive(Debug, Clone)]
struct CategoryState {
    row: CategoryRow,
    removed: bool,
}

#[derive(Debug, Default)]
pub struct CatalogProjection {
    products: InMemoryReadStore<ProductId, ProductRow>,
    categories: InMemoryReadStore<CategoryId, CategoryState>,
    stock: InMemoryReadStore<ProductId, i64>,
    cursors: StreamCursors,
}

impl CatalogProjection {
    pub fn new() -> Self {
        Self::default()
    }

    fn apply_product(&self, event: ProductEvent) {
        match event {
            ProductEvent::Registered(e) => {
                let mut row = ProductRow {
                    product_id: e.product_id,
                    stock_item_id: e.stock_item_id,
                    code: String::new(),
                    name: String::new(),
                    category_id: None,
                    category_name: None,
                    size: None,
                    color: None,
                    unit: None,
                    purchase_price: Money::zero(),
                    sale_price: Money::zero(),
                    min_stock: 0,
                    stock: 0,
                    active: true,
                    registered_at: e.occurred_at,
                };
                row.set_details(e.details);
                self.products.upsert(e.product_id, row);
            }
            ProductEvent::Updated(e) => {
                self.products.update(&e.product_id, |row| row.set_details(e.details));
            }
            ProductEvent::Repriced(e) => {
                self.products.update(&e.product_id, |row| {
                    row.purchase_price = e.purchase_price;
                    row.sale_price = e.sale_price;
                });
            }
            ProductEvent::Deactivated(e) => {
                self.products.update(&e.product_id, |row| row.active = false);
            }
            ProductEvent::Reactivated(e) => {
                self.products.update(&e.product_id, |row| row.active = true);
            }
        }
    }

    fn apply_category(&self, event: CategoryEvent) {
        match event {
            CategoryEvent::Created(e) => self.categories.upsert(
                e.category_id,
                CategoryState {
                    row: CategoryRow {
                        category_id: e.category_id,
                        name: e.name,
                    },
                    removed: false,
                },
            ),
            CategoryEvent::Renamed(e) => {
                self.categories.update(&e.category_id, |c| c.row.name = e.name);
            }
            CategoryEvent::Removed(e) => {
                self.categories.update(&e.category_id, |c| c.removed = true);
            }
        }
    }

    /// Category name plus live stock, filled in at read time.
    fn joined(&self, mut row: ProductRow) -> ProductRow {
        row.stock = self.stock.get(&row.product_id).unwrap_or(0);
        row.category_name = row
            .category_id
            .and_then(|id| self.categories.get(&id))
            .filter(|c| !c.removed)
            .map(|c| c.row.name);
        row
    }

    pub fn get(&self, product_id: ProductId) -> Option<ProductRow> {
        self.products.get(&product_id).map(|row| self.joined(row))
    }

    /// Products ordered by name. `query` matches name or code, case-insensitive.
    pub fn list(&self, query: Option<&str>, include_inactive: bool) -> Vec<ProductRow> {
        let needle = query.map(str::trim).filter(|q| !q.is_empty()).map(str::to_lowercase);
        let mut rows: Vec<ProductRow> = self
            .products
            .list()
            .into_iter()
            .filter(|row| include_inactive || row.active)
            .filter(|row| needle.as_deref().is_none_or(|n| row.matches(n)))
            .map(|row| self.joined(row))
            .collect();
        rows.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()).then(a.code.cmp(&b.code)));
        rows
    }

    /// Active products at or below their minimum, lowest stock first.
    pub fn low_stock(&self) -> Vec<LowStockRow> {
        let mut rows: Vec<LowStockRow> = self
            .list(None, false)
            .into_iter()
            .filter(|p| p.stock <= p.min_stock)
            .map(|p| LowStockRow {
                code: p.code,
                name: p.name,
                stock: p.stock,
                min_stock: p.min_stock,
            })
            .collect();
        rows.sort_by(|a, b| a.stock.cmp(&b.stock).then_with(|| a.name.cmp(&b.name)));
        rows
    }

    pub fn product_count(&self) -> usize {
        self.products.list().iter().filter(|p| p.active).count()
    }

    /// Live categories ordered by name, case-insensitive.
    pub fn categories(&self) -> Vec<CategoryRow> {
        let mut rows: Vec<CategoryRow> = self
            .categories
            .list()
            .into_iter()
            .filter(|c| !c.removed)
            .map(|c| c.row)
            .collect();
        rows.sort_by_key(|c| c.name.to_lowercase());
        rows
    }

    pub fn category(&self, category_id: CategoryId) -> Option<CategoryRow> {
        self.categories.get(&category_id).filter(|c| !c.removed).map(|c| c.row)
    }
}

impl Projection for CatalogProjection {
    fn name(&self) -> &'static str {
        "catalog"
    }

    fn handles(&self, aggregate_type: &str) -> bool {
        matches!(aggregate_type, "catalog.product" | "catalog.category" | "inventory.stock")
    }

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        in_order(&self.cursors, envelope, || {
            match envelope.aggregate_type() {
                "catalog.product" => self.apply_product(decode(envelope)?),
                "catalog.category" => self.apply_category(decode(envelope)?),
                "inventory.stock" => {
                    let event: InventoryEvent = decode(envelope)?;
                    self.stock.upsert(event.product_id(), event.stock_after());
                }
                _ => {}
            }
            Ok(())
        })
    }

    fn reset(&self) {
        self.products.clear();
        self.categories.clear();
        self.stock.clear();
        self.cursors.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projections::testing::Sequencer;

    use arkpos_catalog::{
        CategoryCreated, CategoryRemoved, ProductDeactivated, ProductRegistered, ProductRepriced,
    };
    use arkpos_auth::UserId;
    use arkpos_inventory::{StockAdjusted, StockItemId, StockItemOpened, StockSold};

    fn details(code: &str, name: &str, category_id: Option<CategoryId>) -> ProductDetails {
        ProductDetails {
            code: code.to_string(),
            name: name.to_string(),
            category_id,
            size: None,
            color: None,
            unit: Some("Unidad".to_string()),
            purchase_price: Money::from_cents(4_000),
            sale_price: Money::from_cents(6_000),
            min_stock: 5,
        }
    }

    struct Fixture {
        projection: CatalogProjection,
        seq: Sequencer,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                projection: CatalogProjection::new(),
                seq: Sequencer::default(),
            }
        }

        fn product(&mut self, code: &str, name: &str, stock: i64, category_id: Option<CategoryId>) -> (ProductId, StockItemId) {
            let product_id = ProductId::generate();
            let stock_item_id = StockItemId::generate();
            let env = self.seq.next(
                product_id.aggregate_id(),
                "catalog.product",
                &ProductEvent::Registered(ProductRegistered {
                    product_id,
                    stock_item_id: stock_item_id.aggregate_id(),
                    details: details(code, name, category_id),
                    occurred_at: Utc::now(),
                }),
            );
            self.projection.apply_envelope(&env).unwrap();
            let env = self.seq.next(
                stock_item_id.aggregate_id(),
                "inventory.stock",
                &InventoryEvent::Opened(StockItemOpened {
                    stock_item_id,
                    product_id,
                    quantity: stock,
                    occurred_at: Utc::now(),
                }),
            );
            self.projection.apply_envelope(&env).unwrap();
            (product_id, stock_item_id)
        }

        fn product_event(&mut self, product_id: ProductId, event: ProductEvent) {
            let env = self.seq.next(product_id.aggregate_id(), "catalog.product", &event);
            self.projection.apply_envelope(&env).unwrap();
        }

        fn category(&mut self, name: &str) -> CategoryId {
            let category_id = CategoryId::generate();
            let env = self.seq.next(
                category_id.aggregate_id(),
                "catalog.category",
                &CategoryEvent::Created(CategoryCreated {
                    category_id,
                    name: name.to_string(),
                    occurred_at: Utc::now(),
                }),
            );
            self.projection.apply_envelope(&env).unwrap();
            category_id
        }
    }

    #[test]
    fn products_carry_stock_and_category_name() {
        let mut f = Fixture::new();
        let cat = f.category("Poleras");
        let (id, stock_item_id) = f.product("POL-1", "Polera", 10, Some(cat));

        let env = f.seq.next(
            stock_item_id.aggregate_id(),
            "inventory.stock",
            &InventoryEvent::Sold(StockSold {
                stock_item_id,
                product_id: id,
                quantity: 4,
                sale_id: AggregateId::new(),
                stock_after: 6,
                occurred_at: Utc::now(),
            }),
        );
        f.projection.apply_envelope(&env).unwrap();

        let row = f.projection.get(id).unwrap();
        assert_eq!(row.stock, 6);
        assert_eq!(row.category_name.as_deref(), Some("Poleras"));
    }

    #[test]
    fn search_matches_name_or_code_case_insensitively() {
        let mut f = Fixture::new();
        f.product("JEAN-01", "Pantalón jean", 10, None);
        f.product("POL-01", "Polera", 10, None);
        f.product("CHA-01", "Chamarra", 10, None);

        let names = |q: &str| -> Vec<String> { f.projection.list(Some(q), false).into_iter().map(|p| p.name).collect() };
        assert_eq!(names("JEAN"), vec!["Pantalón jean".to_string()]);
        assert_eq!(names("pol-"), vec!["Polera".to_string()]);
        assert_eq!(f.projection.list(Some("  "), false).len(), 3);
    }

    #[test]
    fn list_is_sorted_by_name_and_hides_inactive() {
        let mut f = Fixture::new();
        let (zapato, _) = f.product("Z-1", "zapato", 10, None);
        f.product("A-1", "Abrigo", 10, None);
        f.product_event(
            zapato,
            ProductEvent::Deactivated(ProductDeactivated { product_id: zapato, occurred_at: Utc::now() }),
        );

        let active: Vec<_> = f.projection.list(None, false).into_iter().map(|p| p.code).collect();
        assert_eq!(active, vec!["A-1"]);
        let all: Vec<_> = f.projection.list(None, true).into_iter().map(|p| p.code).collect();
        assert_eq!(all, vec!["A-1", "Z-1"]);
        assert_eq!(f.projection.product_count(), 1);
    }

    #[test]
    fn low_stock_orders_by_stock_ascending() {
        let mut f = Fixture::new();
        f.product("A", "Abrigo", 4, None);
        f.product("B", "Bufanda", 1, None);
        f.product("C", "Camisa", 20, None);
        let (d, stock_d) = f.product("D", "Cinturón", 9, None);

        let env = f.seq.next(
            stock_d.aggregate_id(),
            "inventory.stock",
            &InventoryEvent::Adjusted(StockAdjusted {
                stock_item_id: stock_d,
                product_id: d,
                delta: -4,
                reason: "merma".to_string(),
                user_id: UserId::generate(),
                stock_after: 5,
                occurred_at: Utc::now(),
            }),
        );
        f.projection.apply_envelope(&env).unwrap();

        let low: Vec<_> = f.projection.low_stock().into_iter().map(|r| (r.code, r.stock)).collect();
        assert_eq!(low, vec![("B".to_string(), 1), ("A".to_string(), 4), ("D".to_string(), 5)]);
    }

    #[test]
    fn reprice_updates_prices() {
        let mut f = Fixture::new();
        let (id, _) = f.product("A", "Abrigo", 4, None);
        f.product_event(
            id,
            ProductEvent::Repriced(ProductRepriced {
                product_id: id,
                purchase_price: Money::from_cents(4_500),
                sale_price: Money::from_cents(7_000),
                occurred_at: Utc::now(),
            }),
        );
        let row = f.projection.get(id).unwrap();
        assert_eq!(row.purchase_price, Money::from_cents(4_500));
        assert_eq!(row.sale_price, Money::from_cents(7_000));
    }

    #[test]
    fn categories_sorted_case_insensitively_and_removed_hidden() {
        let mut f = Fixture::new();
        f.category("zapatos");
        f.category("Accesorios");
        let gone = f.category("Bolsos");
        let (p, _) = f.product("X", "Cartera", 1, Some(gone));

        let env = f.seq.next(
            gone.aggregate_id(),
            "catalog.category",
            &CategoryEvent::Removed(CategoryRemoved { category_id: gone, occurred_at: Utc::now() }),
        );
        f.projection.apply_envelope(&env).unwrap();

        let names: Vec<_> = f.projection.categories().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["Accesorios", "zapatos"]);
        assert!(f.projection.category(gone).is_none());
        assert_eq!(f.projection.get(p).unwrap().category_name, None);
    }

    #[test]
    fn duplicate_delivery_is_ignored() {
        let projection = CatalogProjection::new();
        let product_id = ProductId::generate();
        let env = crate::projections::testing::envelope(
            product_id.aggregate_id(),
            "catalog.product",
            1,
            &ProductEvent::Registered(ProductRegistered {
                product_id,
                stock_item_id: AggregateId::new(),
                details: details("A", "Abrigo", None),
                occurred_at: Utc::now(),
            }),
        );
        projection.apply_envelope(&env).unwrap();
        projection.apply_envelope(&env).unwrap();
        assert_eq!(projection.list(None, true).len(), 1);
    }
}
