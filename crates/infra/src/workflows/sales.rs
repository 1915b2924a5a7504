use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::{debug, info, instrument};

use arkpos_auth::UserId;
use arkpos_catalog::ProductId;
use arkpos_core::{DomainError, Discount, Money};
use arkpos_events::{EventBus, EventEnvelope};
use arkpos_inventory::{InventoryCommand, RestoreStock, SellStock, StockItem, StockItemId};
use arkpos_parties::{PartyId, PartyKind};
use arkpos_sales::{
    Cart, PaymentMethod, ProductSnapshot, RecordSale, Sale, SaleCommand, SaleId, SaleLine, SaleLineInput,
    SaleTotals, TicketData, VoidSale,
};

use super::{WorkflowResult, Workflows, stock_item_of};
use crate::event_store::EventStore;
use crate::streams;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutLine {
    pub product_id: ProductId,
    pub quantity: i64,
    pub discount: Discount,
}

#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub user_id: UserId,
    /// `None` sells to the walk-in client.
    pub client_id: Option<PartyId>,
    pub lines: Vec<CheckoutLine>,
    pub discount: Discount,
    pub payment_method: PaymentMethod,
    pub cash_received: Money,
}

/// Priced cart, as the checkout screen shows it before the sale is recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub lines: Vec<SaleLine>,
    pub totals: SaleTotals,
}

struct PreparedLine {
    input: SaleLineInput,
    stock_item_id: StockItemId,
}

/// Sums quantities of repeated products, keeping the first line's discount and order.
fn merge_lines(lines: &[CheckoutLine]) -> Vec<CheckoutLine> {
    let mut merged: Vec<CheckoutLine> = Vec::with_capacity(lines.len());
    for line in lines {
        match merged.iter_mut().find(|m| m.product_id == line.product_id) {
            Some(existing) => existing.quantity = existing.quantity.saturating_add(line.quantity),
            None => merged.push(line.clone()),
        }
    }
    merged
}

impl<S, B> Workflows<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Loads live product and stock state and fills a cart with it.
    fn prepare_lines(&self, lines: &[CheckoutLine]) -> WorkflowResult<Vec<PreparedLine>> {
        if lines.is_empty() {
            return Err(DomainError::validation("a sale needs at least one line").into());
        }

        let mut cart = Cart::new();
        let mut prepared = Vec::new();
        for line in merge_lines(lines) {
            if line.quantity <= 0 {
                return Err(DomainError::validation("quantity must be greater than zero").into());
            }
            let product = self.product(line.product_id)?;
            if !product.can_be_sold() {
                return Err(DomainError::validation(format!("{} is inactive", product.name())).into());
            }
            let stock = self.stock_item(&product)?;

            cart.add(&ProductSnapshot {
                product_id: line.product_id,
                name: product.name().to_string(),
                unit_price: product.sale_price(),
                stock: stock.stock(),
            })?;
            if line.quantity > stock.stock() {
                return Err(DomainError::invariant(format!(
                    "only {} units of {} in stock",
                    stock.stock(),
                    product.name()
                ))
                .into());
            }
            cart.set_quantity(line.product_id, line.quantity);

            prepared.push(PreparedLine {
                input: SaleLineInput {
                    product_id: line.product_id,
                    code: product.code().to_string(),
                    name: product.name().to_string(),
                    quantity: line.quantity,
                    unit_price: product.sale_price(),
                    unit_cost: product.purchase_price(),
                    discount: line.discount,
                },
                stock_item_id: stock.id_typed(),
            });
        }

        debug!(items = cart.items().len(), gross_cents = cart.total().cents(), "cart priced");
        Ok(prepared)
    }

    /// Prices a cart without recording anything.
    pub fn quote(
        &self,
        lines: &[CheckoutLine],
        discount: &Discount,
        payment_method: PaymentMethod,
        cash_received: Money,
    ) -> WorkflowResult<Quote> {
        let inputs: Vec<SaleLineInput> = self.prepare_lines(lines)?.into_iter().map(|p| p.input).collect();
        let (lines, totals) = SaleTotals::compute(&inputs, discount, payment_method, cash_received)?;
        Ok(Quote { lines, totals })
    }

    /// Records the sale and takes every line out of stock in one commit.
    #[instrument(skip(self, request), fields(user_id = %request.user_id, lines = request.lines.len()))]
    pub fn checkout(&self, request: CheckoutRequest) -> WorkflowResult<SaleId> {
        let cashier = self.user(request.user_id)?;
        let client_name = match request.client_id {
            Some(id) => Some(self.party(PartyKind::Client, id)?.name().to_string()),
            None => None,
        };
        let prepared = self.prepare_lines(&request.lines)?;

        let sale_id = SaleId::generate();
        let now = Utc::now();
        let mut uow = self.dispatcher.unit_of_work();
        let sale = uow.execute(
            sale_id.aggregate_id(),
            streams::SALE,
            SaleCommand::Record(RecordSale {
                sale_id,
                user_id: request.user_id,
                cashier_name: cashier.full_name().to_string(),
                client_id: request.client_id,
                client_name,
                lines: prepared.iter().map(|p| p.input.clone()).collect(),
                discount: request.discount,
                payment_method: request.payment_method,
                cash_received: request.cash_received,
                occurred_at: now,
            }),
            |id| Sale::empty(SaleId::new(id)),
        )?;

        for line in &prepared {
            uow.execute(
                line.stock_item_id.aggregate_id(),
                streams::STOCK,
                InventoryCommand::Sell(SellStock {
                    stock_item_id: line.stock_item_id,
                    quantity: line.input.quantity,
                    sale_id: sale_id.aggregate_id(),
                    occurred_at: now,
                }),
                |id| StockItem::empty(StockItemId::new(id)),
            )?;
        }
        uow.commit()?;

        let total = sale.totals().map(|t| t.total).unwrap_or_default();
        info!(%sale_id, total_cents = total.cents(), method = sale.payment_method().label(), "sale recorded");
        Ok(sale_id)
    }

    /// Voids a completed sale and puts its units back in stock in one commit.
    #[instrument(skip(self, reason))]
    pub fn void_sale(&self, sale_id: SaleId, user_id: UserId, reason: &str) -> WorkflowResult<()> {
        let sale = self.sale(sale_id)?;

        let mut restock: Vec<(StockItemId, i64)> = Vec::new();
        for line in sale.lines() {
            let stock_item_id = stock_item_of(&self.product(line.product_id)?)?;
            match restock.iter_mut().find(|(id, _)| *id == stock_item_id) {
                Some((_, quantity)) => *quantity += line.quantity,
                None => restock.push((stock_item_id, line.quantity)),
            }
        }

        let now = Utc::now();
        let mut uow = self.dispatcher.unit_of_work();
        uow.execute(
            sale_id.aggregate_id(),
            streams::SALE,
            SaleCommand::Void(VoidSale {
                sale_id,
                user_id,
                reason: reason.to_string(),
                occurred_at: now,
            }),
            |id| Sale::empty(SaleId::new(id)),
        )?;
        for (stock_item_id, quantity) in restock {
            uow.execute(
                stock_item_id.aggregate_id(),
                streams::STOCK,
                InventoryCommand::Restore(RestoreStock {
                    stock_item_id,
                    quantity,
                    sale_id: sale_id.aggregate_id(),
                    occurred_at: now,
                }),
                |id| StockItem::empty(StockItemId::new(id)),
            )?;
        }
        uow.commit()?;

        info!(%sale_id, %user_id, "sale voided");
        Ok(())
    }

    /// Ticket contents for a recorded sale, headed by the company profile when one is saved.
    pub fn ticket(&self, sale_id: SaleId) -> WorkflowResult<TicketData> {
        let sale = self.sale(sale_id)?;
        let company = self.company()?;
        Ok(TicketData::from_sale(&sale, company.profile())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command_dispatcher::DispatchError;
    use crate::workflows::testing::{TestWorkflows, catch_up, workflows};
    use crate::workflows::{NewProduct, NewUser, WorkflowError};
    use arkpos_catalog::ProductDetails;
    use arkpos_parties::{CompanyProfile, PartyDetails};
    use arkpos_sales::{SaleStatus, WALK_IN_CLIENT};

    struct Shop {
        wf: TestWorkflows,
        cashier: UserId,
    }

    impl Shop {
        fn new() -> Self {
            let wf = workflows();
            let cashier = wf
                .register_user(NewUser {
                    full_name: "Ana Flores".to_string(),
                    ci: "1234567".to_string(),
                    email: "ana@tienda.bo".to_string(),
                    phone: None,
                    password: "secreto1".to_string(),
                })
                .unwrap()
                .id_typed();
            Self { wf, cashier }
        }

        fn product(&self, code: &str, price: i64, stock: i64) -> ProductId {
            self.wf
                .register_product(NewProduct {
                    details: ProductDetails {
                        code: code.to_string(),
                        name: format!("Producto {code}"),
                        category_id: None,
                        size: None,
                        color: None,
                        unit: None,
                        purchase_price: Money::from_cents(price / 2),
                        sale_price: Money::from_cents(price),
                        min_stock: 1,
                    },
                    opening_stock: stock,
                })
                .unwrap()
        }

        fn stock(&self, product_id: ProductId) -> i64 {
            let product = self.wf.product(product_id).unwrap();
            self.wf.stock_item(&product).unwrap().stock()
        }

        fn request(&self, lines: Vec<CheckoutLine>, cash: i64) -> CheckoutRequest {
            CheckoutRequest {
                user_id: self.cashier,
                client_id: None,
                lines,
                discount: Discount::default(),
                payment_method: PaymentMethod::Cash,
                cash_received: Money::from_cents(cash),
            }
        }
    }

    fn line(product_id: ProductId, quantity: i64) -> CheckoutLine {
        CheckoutLine {
            product_id,
            quantity,
            discount: Discount::default(),
        }
    }

    #[test]
    fn checkout_records_sale_and_takes_stock() {
        let shop = Shop::new();
        let polera = shop.product("POL-1", 5_000, 10);
        let gorra = shop.product("GOR-1", 2_000, 3);

        let sale_id = shop
            .wf
            .checkout(shop.request(vec![line(polera, 2), line(gorra, 1), line(polera, 1)], 20_000))
            .unwrap();

        assert_eq!(shop.stock(polera), 7);
        assert_eq!(shop.stock(gorra), 2);

        let sale = shop.wf.sale(sale_id).unwrap();
        assert_eq!(sale.lines().len(), 2);
        assert_eq!(sale.client_name(), WALK_IN_CLIENT);
        assert_eq!(sale.cashier_name(), "Ana Flores");
        let totals = sale.totals().unwrap();
        assert_eq!(totals.total, Money::from_cents(17_000));
        assert_eq!(totals.change, Money::from_cents(3_000));

        catch_up(&shop.wf);
        let record = shop.wf.projections().sales.get(sale_id).unwrap();
        assert_eq!(record.cost, Money::from_cents(8_500));
        assert_eq!(shop.wf.projections().catalog.get(polera).unwrap().stock, 7);
    }

    #[test]
    fn overselling_is_rejected_without_side_effects() {
        let shop = Shop::new();
        let polera = shop.product("POL-1", 5_000, 2);
        let gorra = shop.product("GOR-1", 2_000, 5);

        let err = shop
            .wf
            .checkout(shop.request(vec![line(gorra, 1), line(polera, 3)], 50_000))
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Dispatch(DispatchError::InvariantViolation(_))));
        assert_eq!(shop.stock(gorra), 5);
        assert_eq!(shop.stock(polera), 2);
    }

    #[test]
    fn inactive_products_cannot_be_sold() {
        let shop = Shop::new();
        let polera = shop.product("POL-1", 5_000, 2);
        shop.wf.deactivate_product(polera).unwrap();

        let err = shop.wf.checkout(shop.request(vec![line(polera, 1)], 5_000)).unwrap_err();
        assert!(matches!(err, WorkflowError::Dispatch(DispatchError::Validation(_))));
    }

    #[test]
    fn short_cash_is_rejected() {
        let shop = Shop::new();
        let polera = shop.product("POL-1", 5_000, 2);
        let err = shop.wf.checkout(shop.request(vec![line(polera, 1)], 4_999)).unwrap_err();
        assert!(matches!(err, WorkflowError::Dispatch(DispatchError::Validation(_))));
        assert_eq!(shop.stock(polera), 2);
    }

    #[test]
    fn card_sales_to_a_registered_client() {
        let shop = Shop::new();
        let polera = shop.product("POL-1", 5_000, 2);
        let client = shop
            .wf
            .register_party(PartyKind::Client, PartyDetails::named("Juan Mamani"))
            .unwrap();

        let sale_id = shop
            .wf
            .checkout(CheckoutRequest {
                client_id: Some(client),
                payment_method: PaymentMethod::Card,
                discount: Discount::percent(1_000),
                ..shop.request(vec![line(polera, 2)], 0)
            })
            .unwrap();

        let sale = shop.wf.sale(sale_id).unwrap();
        assert_eq!(sale.client_name(), "Juan Mamani");
        let totals = sale.totals().unwrap();
        assert_eq!(totals.total, Money::from_cents(9_000));
        assert_eq!(totals.amount_received, totals.total);
        assert_eq!(totals.change, Money::zero());
    }

    #[test]
    fn void_restores_stock_once() {
        let shop = Shop::new();
        let polera = shop.product("POL-1", 5_000, 5);
        let sale_id = shop.wf.checkout(shop.request(vec![line(polera, 3)], 15_000)).unwrap();
        assert_eq!(shop.stock(polera), 2);

        shop.wf.void_sale(sale_id, shop.cashier, "cliente devolvió todo").unwrap();
        assert_eq!(shop.stock(polera), 5);
        assert_eq!(shop.wf.sale(sale_id).unwrap().status(), SaleStatus::Voided);

        assert!(shop.wf.void_sale(sale_id, shop.cashier, "otra vez").is_err());
        assert_eq!(shop.stock(polera), 5);
    }

    #[test]
    fn quote_matches_checkout_math() {
        let shop = Shop::new();
        let polera = shop.product("POL-1", 5_000, 5);
        let lines = vec![CheckoutLine {
            discount: Discount::fixed(Money::from_cents(500)),
            ..line(polera, 2)
        }];

        let quote = shop
            .wf
            .quote(&lines, &Discount::default(), PaymentMethod::Cash, Money::from_cents(10_000))
            .unwrap();
        assert_eq!(quote.totals.subtotal, Money::from_cents(9_500));
        assert_eq!(quote.totals.change, Money::from_cents(500));
        assert_eq!(shop.stock(polera), 5);
    }

    #[test]
    fn ticket_uses_the_company_profile() {
        let shop = Shop::new();
        let polera = shop.product("POL-1", 5_000, 5);
        let sale_id = shop.wf.checkout(shop.request(vec![line(polera, 1)], 5_000)).unwrap();

        shop.wf
            .save_company(CompanyProfile {
                name: "Tienda Sol".to_string(),
                phones: None,
                address: Some("Av. Arce 123".to_string()),
                email: None,
                website: None,
            })
            .unwrap();

        let ticket = shop.wf.ticket(sale_id).unwrap();
        assert_eq!(ticket.header.company_name, "Tienda Sol");
        assert_eq!(ticket.items.len(), 1);
        assert_eq!(ticket.total, Money::from_cents(5_000));
    }
}
