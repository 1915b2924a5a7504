use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use tracing::{debug, info, instrument};

use arkpos_auth::UserId;
use arkpos_catalog::{
    CategoryId, DEFAULT_MIN_STOCK, Product, ProductCommand, ProductDetails, ProductId, RegisterProduct,
    RepriceProduct,
};
use arkpos_core::{DomainError, Money};
use arkpos_events::{EventBus, EventEnvelope};
use arkpos_inventory::{InventoryCommand, OpenStockItem, ReceiveStock, ReverseReceipt, StockItem, StockItemId};
use arkpos_parties::{PartyId, PartyKind};
use arkpos_purchasing::{Purchase, PurchaseCommand, PurchaseId, PurchaseLine, RegisterPurchase, RevisePurchase};

use super::{WorkflowResult, Workflows, stock_item_of};
use crate::event_store::EventStore;
use crate::streams;
use crate::unique_index::PRODUCT_CODE;
use crate::unit_of_work::UnitOfWork;

/// One line of a purchase as entered at intake.
///
/// With `product_id` set the line refers to that product. Otherwise the code is looked
/// up, and an unknown code registers a new product from the remaining fields.
#[derive(Debug, Clone)]
pub struct PurchaseLineInput {
    pub product_id: Option<ProductId>,
    pub code: String,
    pub name: String,
    pub category_id: Option<CategoryId>,
    pub size: Option<String>,
    pub color: Option<String>,
    pub unit: Option<String>,
    pub min_stock: Option<i64>,
    pub quantity: i64,
    pub purchase_price: Money,
    pub sale_price: Money,
}

#[derive(Debug, Clone)]
struct Resolved {
    product_id: ProductId,
    stock_item_id: StockItemId,
    code: String,
    name: String,
}

/// Products touched by one intake.
#[derive(Default)]
struct Intake {
    by_code: HashMap<String, Resolved>,
    /// Products first seen in this intake, registered when the intake commits.
    new_products: BTreeMap<StockItemId, (ProductId, ProductDetails)>,
    prices: BTreeMap<ProductId, Pricing>,
}

/// Purchase and sale price of a known product, before and after the intake.
struct Pricing {
    current: (Money, Money),
    wanted: (Money, Money),
}

impl Intake {
    fn find(&self, input: &PurchaseLineInput) -> Option<Resolved> {
        match input.product_id {
            Some(id) => self.by_code.values().find(|r| r.product_id == id).cloned(),
            None => self.by_code.get(&code_key(&input.code)).cloned(),
        }
    }

    fn remember(&mut self, resolved: &Resolved) {
        self.by_code.insert(code_key(&resolved.code), resolved.clone());
    }

    /// A later line for the same product overrides the prices of earlier ones.
    fn reprice_again(&mut self, resolved: &Resolved, input: &PurchaseLineInput) -> Result<(), DomainError> {
        if let Some((_, details)) = self.new_products.get_mut(&resolved.stock_item_id) {
            *details = ProductDetails {
                purchase_price: input.purchase_price,
                sale_price: input.sale_price,
                ..details.clone()
            }
            .normalized()?;
        } else if let Some(pricing) = self.prices.get_mut(&resolved.product_id) {
            pricing.wanted = (input.purchase_price, input.sale_price);
        }
        Ok(())
    }

    fn repriced(&self) -> impl Iterator<Item = (ProductId, Money, Money)> + '_ {
        self.prices
            .iter()
            .filter(|(_, p)| p.current != p.wanted)
            .map(|(&product_id, p)| (product_id, p.wanted.0, p.wanted.1))
    }
}

fn code_key(code: &str) -> String {
    code.trim().to_lowercase()
}

impl<S, B> Workflows<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Records a purchase, registering unknown products, repricing known ones and
    /// receiving stock, all in one commit.
    #[instrument(skip(self, lines), fields(lines = lines.len()))]
    pub fn register_purchase(
        &self,
        supplier_id: PartyId,
        user_id: UserId,
        lines: Vec<PurchaseLineInput>,
    ) -> WorkflowResult<PurchaseId> {
        self.party(PartyKind::Supplier, supplier_id)?;
        let purchase_id = PurchaseId::generate();

        let total = self.commit_intake(purchase_id, &lines, BTreeMap::new(), |purchase_lines, now| {
            PurchaseCommand::Register(RegisterPurchase {
                purchase_id,
                supplier_id,
                user_id,
                lines: purchase_lines,
                occurred_at: now,
            })
        })?;

        info!(%purchase_id, %supplier_id, total_cents = total.cents(), "purchase registered");
        Ok(purchase_id)
    }

    /// Replaces a purchase's supplier and lines. Stock moves by the difference between
    /// the previous and the new quantity of each product.
    #[instrument(skip(self, lines), fields(lines = lines.len()))]
    pub fn revise_purchase(
        &self,
        purchase_id: PurchaseId,
        supplier_id: PartyId,
        user_id: UserId,
        lines: Vec<PurchaseLineInput>,
    ) -> WorkflowResult<()> {
        let current = self.purchase(purchase_id)?;
        self.party(PartyKind::Supplier, supplier_id)?;

        let mut previous = BTreeMap::new();
        for line in current.lines() {
            let product = self.product(line.product_id)?;
            *previous.entry(stock_item_of(&product)?).or_insert(0) += line.quantity;
        }

        let total = self.commit_intake(purchase_id, &lines, previous, |purchase_lines, now| {
            PurchaseCommand::Revise(RevisePurchase {
                purchase_id,
                supplier_id,
                user_id,
                lines: purchase_lines,
                occurred_at: now,
            })
        })?;

        info!(%purchase_id, %supplier_id, total_cents = total.cents(), "purchase revised");
        Ok(())
    }

    fn commit_intake(
        &self,
        purchase_id: PurchaseId,
        lines: &[PurchaseLineInput],
        previous: BTreeMap<StockItemId, i64>,
        purchase_command: impl FnOnce(Vec<PurchaseLine>, DateTime<Utc>) -> PurchaseCommand,
    ) -> WorkflowResult<Money> {
        if lines.is_empty() {
            return Err(DomainError::validation("a purchase needs at least one line").into());
        }

        let mut intake = Intake::default();
        let result = self.stage_and_commit(&mut intake, purchase_id, lines, previous, purchase_command);
        if result.is_err() {
            for (product_id, details) in intake.new_products.values() {
                self.index.release(PRODUCT_CODE, &details.code, product_id.aggregate_id());
            }
        }
        result
    }

    fn stage_and_commit(
        &self,
        intake: &mut Intake,
        purchase_id: PurchaseId,
        lines: &[PurchaseLineInput],
        previous: BTreeMap<StockItemId, i64>,
        purchase_command: impl FnOnce(Vec<PurchaseLine>, DateTime<Utc>) -> PurchaseCommand,
    ) -> WorkflowResult<Money> {
        let now = Utc::now();

        let mut purchase_lines = Vec::with_capacity(lines.len());
        let mut received: BTreeMap<StockItemId, i64> = BTreeMap::new();
        for (i, input) in lines.iter().enumerate() {
            let line_no = (i + 1) as u32;
            if input.quantity <= 0 {
                return Err(DomainError::validation(format!(
                    "line {line_no}: quantity must be greater than zero"
                ))
                .into());
            }
            let product = self.resolve_line(intake, input)?;
            *received.entry(product.stock_item_id).or_insert(0) += input.quantity;
            purchase_lines.push(PurchaseLine {
                line_no,
                product_id: product.product_id,
                code: product.code,
                name: product.name,
                quantity: input.quantity,
                purchase_price: input.purchase_price,
                sale_price: input.sale_price,
            });
        }
        let total = purchase_lines.iter().map(PurchaseLine::subtotal).sum();

        let mut uow = self.dispatcher.unit_of_work();
        uow.execute(
            purchase_id.aggregate_id(),
            streams::PURCHASE,
            purchase_command(purchase_lines, now),
            |id| Purchase::empty(PurchaseId::new(id)),
        )?;

        for (product_id, purchase_price, sale_price) in intake.repriced() {
            uow.execute(
                product_id.aggregate_id(),
                streams::PRODUCT,
                ProductCommand::Reprice(RepriceProduct {
                    product_id,
                    purchase_price,
                    sale_price,
                    occurred_at: now,
                }),
                |id| Product::empty(ProductId::new(id)),
            )?;
        }

        let mut items: Vec<StockItemId> = previous.keys().chain(received.keys()).copied().collect();
        items.sort();
        items.dedup();
        for stock_item_id in items {
            let delta = received.get(&stock_item_id).copied().unwrap_or(0)
                - previous.get(&stock_item_id).copied().unwrap_or(0);
            match intake.new_products.get(&stock_item_id) {
                Some((product_id, details)) => {
                    open_new_product(&mut uow, *product_id, stock_item_id, details, delta, now)?
                }
                None => move_stock(&mut uow, stock_item_id, purchase_id, delta, now)?,
            }
        }

        uow.commit()?;
        Ok(total)
    }

    fn resolve_line(&self, intake: &mut Intake, input: &PurchaseLineInput) -> WorkflowResult<Resolved> {
        if let Some(hit) = intake.find(input) {
            intake.reprice_again(&hit, input)?;
            return Ok(hit);
        }

        let existing = match input.product_id {
            Some(id) => Some(self.product(id)?),
            None => self
                .index
                .lookup(PRODUCT_CODE, &input.code)
                .map(|owner| self.product(ProductId::new(owner)))
                .transpose()?,
        };

        let resolved = match existing {
            Some(product) => {
                intake.prices.insert(
                    product.id_typed(),
                    Pricing {
                        current: (product.purchase_price(), product.sale_price()),
                        wanted: (input.purchase_price, input.sale_price),
                    },
                );
                Resolved {
                    product_id: product.id_typed(),
                    stock_item_id: stock_item_of(&product)?,
                    code: product.code().to_string(),
                    name: product.name().to_string(),
                }
            }
            None => self.claim_new_product(intake, input)?,
        };

        intake.remember(&resolved);
        Ok(resolved)
    }

    fn claim_new_product(&self, intake: &mut Intake, input: &PurchaseLineInput) -> WorkflowResult<Resolved> {
        let details = ProductDetails {
            code: input.code.clone(),
            name: input.name.clone(),
            category_id: input.category_id,
            size: input.size.clone(),
            color: input.color.clone(),
            unit: input.unit.clone(),
            purchase_price: input.purchase_price,
            sale_price: input.sale_price,
            min_stock: input.min_stock.unwrap_or(DEFAULT_MIN_STOCK),
        }
        .normalized()?;
        self.ensure_category(details.category_id)?;

        let product_id = ProductId::generate();
        let stock_item_id = StockItemId::generate();
        self.index.claim(PRODUCT_CODE, &details.code, product_id.aggregate_id())?;
        debug!(%product_id, code = %details.code, "new product at intake");

        let resolved = Resolved {
            product_id,
            stock_item_id,
            code: details.code.clone(),
            name: details.name.clone(),
        };
        intake.new_products.insert(stock_item_id, (product_id, details));
        Ok(resolved)
    }
}

fn open_new_product<S, B>(
    uow: &mut UnitOfWork<'_, S, B>,
    product_id: ProductId,
    stock_item_id: StockItemId,
    details: &ProductDetails,
    quantity: i64,
    now: DateTime<Utc>,
) -> WorkflowResult<()>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
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
            opening_quantity: quantity,
            occurred_at: now,
        }),
        |id| StockItem::empty(StockItemId::new(id)),
    )?;
    Ok(())
}

fn move_stock<S, B>(
    uow: &mut UnitOfWork<'_, S, B>,
    stock_item_id: StockItemId,
    purchase_id: PurchaseId,
    delta: i64,
    now: DateTime<Utc>,
) -> WorkflowResult<()>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    let command = match delta {
        0 => return Ok(()),
        d if d > 0 => InventoryCommand::Receive(ReceiveStock {
            stock_item_id,
            quantity: d,
            purchase_id: purchase_id.aggregate_id(),
            occurred_at: now,
        }),
        d => InventoryCommand::ReverseReceipt(ReverseReceipt {
            stock_item_id,
            quantity: -d,
            purchase_id: purchase_id.aggregate_id(),
            occurred_at: now,
        }),
    };
    uow.execute(stock_item_id.aggregate_id(), streams::STOCK, command, |id| {
        StockItem::empty(StockItemId::new(id))
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command_dispatcher::DispatchError;
    use crate::read_model::PageRequest;
    use crate::workflows::testing::{TestWorkflows, catch_up, workflows};
    use crate::workflows::{NewProduct, WorkflowError};
    use arkpos_core::AggregateRoot;
    use arkpos_parties::PartyDetails;

    fn line(code: &str, quantity: i64, buy: i64, sell: i64) -> PurchaseLineInput {
        PurchaseLineInput {
            product_id: None,
            code: code.to_string(),
            name: format!("Producto {code}"),
            category_id: None,
            size: None,
            color: None,
            unit: None,
            min_stock: None,
            quantity,
            purchase_price: Money::from_cents(buy),
            sale_price: Money::from_cents(sell),
        }
    }

    fn setup() -> (TestWorkflows, PartyId, UserId) {
        let wf = workflows();
        let supplier = wf
            .register_party(PartyKind::Supplier, PartyDetails::named("Textiles Andinos"))
            .unwrap();
        (wf, supplier, UserId::generate())
    }

    fn stock_of(wf: &TestWorkflows, code: &str) -> i64 {
        let id = wf.index().lookup(PRODUCT_CODE, code).unwrap();
        let product = wf.product(ProductId::new(id)).unwrap();
        wf.stock_item(&product).unwrap().stock()
    }

    #[test]
    fn unknown_codes_register_products_with_received_stock() {
        let (wf, supplier, user) = setup();
        let purchase = wf
            .register_purchase(
                supplier,
                user,
                vec![line("CAM-1", 10, 3_000, 5_000), line("CAM-1", 5, 3_000, 5_000), line("PAN-1", 4, 6_000, 9_000)],
            )
            .unwrap();

        assert_eq!(stock_of(&wf, "CAM-1"), 15);
        assert_eq!(stock_of(&wf, "PAN-1"), 4);

        let recorded = wf.purchase(purchase).unwrap();
        assert_eq!(recorded.lines().len(), 3);
        assert_eq!(recorded.total(), Money::from_cents(15 * 3_000 + 4 * 6_000));
        assert_eq!(recorded.lines()[0].product_id, recorded.lines()[1].product_id);
    }

    #[test]
    fn known_products_are_repriced_and_received() {
        let (wf, supplier, user) = setup();
        let product = wf
            .register_product(NewProduct {
                details: ProductDetails {
                    code: "CAM-1".to_string(),
                    name: "Camisa".to_string(),
                    category_id: None,
                    size: None,
                    color: None,
                    unit: None,
                    purchase_price: Money::from_cents(3_000),
                    sale_price: Money::from_cents(5_000),
                    min_stock: 2,
                },
                opening_stock: 2,
            })
            .unwrap();

        wf.register_purchase(supplier, user, vec![line("cam-1", 6, 3_200, 5_500)]).unwrap();

        let reloaded = wf.product(product).unwrap();
        assert_eq!(reloaded.purchase_price(), Money::from_cents(3_200));
        assert_eq!(reloaded.sale_price(), Money::from_cents(5_500));
        assert_eq!(stock_of(&wf, "CAM-1"), 8);

        catch_up(&wf);
        let history = wf.projections().purchases.price_history(PageRequest::default());
        assert_eq!(history.total_items, 1);
        assert_eq!(history.items[0].purchase_price, Money::from_cents(3_200));
    }

    #[test]
    fn repeated_lines_for_one_product_keep_the_last_prices() {
        let (wf, supplier, user) = setup();
        wf.register_purchase(supplier, user, vec![line("CAM-1", 1, 3_000, 5_000)]).unwrap();

        wf.register_purchase(
            supplier,
            user,
            vec![
                line("CAM-1", 2, 3_400, 5_800),
                line("PAN-1", 3, 6_000, 9_000),
                line("CAM-1", 1, 3_600, 6_000),
                line("PAN-1", 1, 6_500, 9_900),
            ],
        )
        .unwrap();

        let product = |code: &str| wf.product(ProductId::new(wf.index().lookup(PRODUCT_CODE, code).unwrap())).unwrap();
        assert_eq!(product("CAM-1").purchase_price(), Money::from_cents(3_600));
        assert_eq!(product("CAM-1").sale_price(), Money::from_cents(6_000));
        assert_eq!(product("PAN-1").purchase_price(), Money::from_cents(6_500));
        assert_eq!(product("PAN-1").sale_price(), Money::from_cents(9_900));
        assert_eq!(stock_of(&wf, "CAM-1"), 4);
        assert_eq!(stock_of(&wf, "PAN-1"), 4);

        // Ending on the current prices leaves the product untouched.
        let before = product("CAM-1").version();
        wf.register_purchase(supplier, user, vec![line("CAM-1", 1, 9_000, 9_500), line("CAM-1", 1, 3_600, 6_000)])
            .unwrap();
        assert_eq!(product("CAM-1").version(), before);
    }

    #[test]
    fn revision_moves_stock_by_the_difference() {
        let (wf, supplier, user) = setup();
        let purchase = wf
            .register_purchase(supplier, user, vec![line("CAM-1", 10, 3_000, 5_000), line("PAN-1", 4, 6_000, 9_000)])
            .unwrap();

        wf.revise_purchase(purchase, supplier, user, vec![line("CAM-1", 7, 3_000, 5_000), line("GOR-1", 3, 1_000, 2_000)])
            .unwrap();

        assert_eq!(stock_of(&wf, "CAM-1"), 7);
        assert_eq!(stock_of(&wf, "PAN-1"), 0);
        assert_eq!(stock_of(&wf, "GOR-1"), 3);
        assert_eq!(wf.purchase(purchase).unwrap().total(), Money::from_cents(7 * 3_000 + 3 * 1_000));
    }

    #[test]
    fn revision_cannot_reverse_stock_already_sold() {
        let (wf, supplier, user) = setup();
        let purchase = wf
            .register_purchase(supplier, user, vec![line("CAM-1", 5, 3_000, 5_000)])
            .unwrap();
        let id = ProductId::new(wf.index().lookup(PRODUCT_CODE, "CAM-1").unwrap());
        wf.adjust_stock(id, -4, "prendas dañadas", user).unwrap();

        let err = wf
            .revise_purchase(purchase, supplier, user, vec![line("CAM-1", 1, 3_000, 5_000)])
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Dispatch(DispatchError::InvariantViolation(_))));
        assert_eq!(stock_of(&wf, "CAM-1"), 1);
    }

    #[test]
    fn failed_intake_releases_new_codes() {
        let (wf, supplier, user) = setup();
        let err = wf
            .register_purchase(supplier, user, vec![line("CAM-1", 3, 3_000, 5_000), line("PAN-1", 2, 6_000, 0)])
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Dispatch(DispatchError::Validation(_))));
        assert!(wf.index().lookup(PRODUCT_CODE, "CAM-1").is_none());
    }

    #[test]
    fn suppliers_with_purchases_cannot_be_removed() {
        let (wf, supplier, user) = setup();
        wf.register_purchase(supplier, user, vec![line("CAM-1", 1, 3_000, 5_000)]).unwrap();
        catch_up(&wf);

        let err = wf.remove_supplier(supplier).unwrap_err();
        assert!(matches!(err, WorkflowError::Dispatch(DispatchError::Concurrency(_))));
    }

    #[test]
    fn purchases_need_a_live_supplier_and_lines() {
        let (wf, supplier, user) = setup();
        assert!(wf.register_purchase(supplier, user, vec![]).is_err());
        assert!(wf
            .register_purchase(PartyId::generate(), user, vec![line("CAM-1", 1, 3_000, 5_000)])
            .is_err());
    }
}
