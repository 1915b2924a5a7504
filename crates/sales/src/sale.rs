use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use arkpos_auth::UserId;
use arkpos_catalog::ProductId;
use arkpos_core::{Aggregate, AggregateRoot, Discount, DomainError, Money, rules};
use arkpos_events::Event;
use arkpos_parties::PartyId;

use crate::cart::change_for;

arkpos_core::typed_id!(SaleId);

/// Name shown for sales without a registered client.
pub const WALK_IN_CLIENT: &str = "Cliente Ocasional";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    #[default]
    Cash,
    Card,
    Qr,
    Transfer,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 4] = [
        PaymentMethod::Cash,
        PaymentMethod::Card,
        PaymentMethod::Qr,
        PaymentMethod::Transfer,
    ];

    /// Label printed on tickets and reports.
    pub fn label(self) -> &'static str {
        match self {
            PaymentMethod::Cash => "Efectivo",
            PaymentMethod::Card => "Tarjeta",
            PaymentMethod::Qr => "QR",
            PaymentMethod::Transfer => "Transferencia",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SaleStatus {
    #[default]
    Completed,
    Voided,
}

/// Line as requested at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleLineInput {
    pub product_id: ProductId,
    pub code: String,
    pub name: String,
    pub quantity: i64,
    pub unit_price: Money,
    /// Purchase price at the time of sale, for profit figures.
    pub unit_cost: Money,
    #[serde(default)]
    pub discount: Discount,
}

/// Line as recorded, with its discount resolved to an amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleLine {
    pub product_id: ProductId,
    pub code: String,
    pub name: String,
    pub quantity: i64,
    pub unit_price: Money,
    pub unit_cost: Money,
    pub discount: Money,
    pub subtotal: Money,
}

impl SaleLine {
    pub fn cost(&self) -> Money {
        self.unit_cost.times(self.quantity)
    }
}

/// Money figures of a sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleTotals {
    pub subtotal: Money,
    pub discount: Money,
    pub total: Money,
    pub amount_received: Money,
    pub change: Money,
}

impl SaleTotals {
    /// Resolves line and sale discounts, then payment.
    pub fn compute(
        lines: &[SaleLineInput],
        discount: &Discount,
        payment_method: PaymentMethod,
        cash_received: Money,
    ) -> Result<(Vec<SaleLine>, SaleTotals), DomainError> {
        if lines.is_empty() {
            return Err(DomainError::validation("a sale needs at least one line"));
        }
        discount.validate()?;

        let mut recorded = Vec::with_capacity(lines.len());
        for line in lines {
            if line.quantity <= 0 {
                return Err(DomainError::validation(format!(
                    "{}: quantity must be greater than zero",
                    line.name
                )));
            }
            if !line.unit_price.is_positive() {
                return Err(DomainError::validation(format!(
                    "{}: unit price must be greater than zero",
                    line.name
                )));
            }
            line.discount.validate()?;

            let gross = line.unit_price.checked_times(line.quantity).ok_or_else(|| {
                DomainError::validation(format!("{}: line amount is out of range", line.name))
            })?;
            let line_discount = line.discount.applied_to(gross);
            recorded.push(SaleLine {
                product_id: line.product_id,
                code: line.code.clone(),
                name: line.name.clone(),
                quantity: line.quantity,
                unit_price: line.unit_price,
                unit_cost: line.unit_cost,
                discount: line_discount,
                subtotal: gross - line_discount,
            });
        }

        let subtotal = Money::checked_sum(recorded.iter().map(|l| l.subtotal))
            .ok_or_else(|| DomainError::validation("sale total is out of range"))?;
        let sale_discount = discount.applied_to(subtotal);
        let total = subtotal - sale_discount;

        let amount_received = match payment_method {
            PaymentMethod::Cash => {
                if cash_received < total {
                    return Err(DomainError::validation("cash received does not cover the total"));
                }
                cash_received
            }
            _ => total,
        };

        Ok((
            recorded,
            SaleTotals {
                subtotal,
                discount: sale_discount,
                total,
                amount_received,
                change: change_for(total, amount_received),
            },
        ))
    }
}

/// Aggregate root: Sale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sale {
    id: SaleId,
    user_id: Option<UserId>,
    cashier_name: String,
    client_id: Option<PartyId>,
    client_name: String,
    lines: Vec<SaleLine>,
    totals: Option<SaleTotals>,
    payment_method: PaymentMethod,
    status: SaleStatus,
    sold_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl Sale {
    pub fn empty(id: SaleId) -> Self {
        Self {
            id,
            user_id: None,
            cashier_name: String::new(),
            client_id: None,
            client_name: String::new(),
            lines: Vec::new(),
            totals: None,
            payment_method: PaymentMethod::Cash,
            status: SaleStatus::Completed,
            sold_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> SaleId {
        self.id
    }

    pub fn exists(&self) -> bool {
        self.created
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    pub fn cashier_name(&self) -> &str {
        &self.cashier_name
    }

    pub fn client_id(&self) -> Option<PartyId> {
        self.client_id
    }

    pub fn client_name(&self) -> &str {
        &self.client_name
    }

    pub fn lines(&self) -> &[SaleLine] {
        &self.lines
    }

    pub fn totals(&self) -> Option<&SaleTotals> {
        self.totals.as_ref()
    }

    pub fn payment_method(&self) -> PaymentMethod {
        self.payment_method
    }

    pub fn status(&self) -> SaleStatus {
        self.status
    }

    pub fn sold_at(&self) -> Option<DateTime<Utc>> {
        self.sold_at
    }
}

impl AggregateRoot for Sale {
    type Id = SaleId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSale {
    pub sale_id: SaleId,
    pub user_id: UserId,
    pub cashier_name: String,
    /// `None` sells to a walk-in client.
    pub client_id: Option<PartyId>,
    pub client_name: Option<String>,
    pub lines: Vec<SaleLineInput>,
    #[serde(default)]
    pub discount: Discount,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub cash_received: Money,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoidSale {
    pub sale_id: SaleId,
    pub user_id: UserId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SaleCommand {
    Record(RecordSale),
    Void(VoidSale),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleRecorded {
    pub sale_id: SaleId,
    pub user_id: UserId,
    pub cashier_name: String,
    pub client_id: Option<PartyId>,
    pub client_name: String,
    pub lines: Vec<SaleLine>,
    pub totals: SaleTotals,
    pub payment_method: PaymentMethod,
    pub occurred_at: DateTime<Utc>,
}

impl SaleRecorded {
    pub fn cost(&self) -> Money {
        self.lines.iter().map(SaleLine::cost).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleVoided {
    pub sale_id: SaleId,
    pub user_id: UserId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SaleEvent {
    Recorded(SaleRecorded),
    Voided(SaleVoided),
}

impl Event for SaleEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SaleEvent::Recorded(_) => "sales.sale.recorded",
            SaleEvent::Voided(_) => "sales.sale.voided",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            SaleEvent::Recorded(e) => e.occurred_at,
            SaleEvent::Voided(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Sale {
    type Command = SaleCommand;
    type Event = SaleEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            SaleEvent::Recorded(e) => {
                self.id = e.sale_id;
                self.user_id = Some(e.user_id);
                self.cashier_name = e.cashier_name.clone();
                self.client_id = e.client_id;
                self.client_name = e.client_name.clone();
                self.lines = e.lines.clone();
                self.totals = Some(e.totals);
                self.payment_method = e.payment_method;
                self.status = SaleStatus::Completed;
                self.sold_at = Some(e.occurred_at);
                self.created = true;
            }
            SaleEvent::Voided(_) => self.status = SaleStatus::Voided,
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            SaleCommand::Record(cmd) => self.handle_record(cmd),
            SaleCommand::Void(cmd) => self.handle_void(cmd),
        }
    }
}

impl Sale {
    fn handle_record(&self, cmd: &RecordSale) -> Result<Vec<SaleEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("sale already exists"));
        }

        let (lines, totals) =
            SaleTotals::compute(&cmd.lines, &cmd.discount, cmd.payment_method, cmd.cash_received)?;

        let client_name = match cmd.client_id {
            Some(_) => rules::optional(cmd.client_name.as_deref())
                .ok_or_else(|| DomainError::validation("client name is required"))?,
            None => WALK_IN_CLIENT.to_string(),
        };

        Ok(vec![SaleEvent::Recorded(SaleRecorded {
            sale_id: cmd.sale_id,
            user_id: cmd.user_id,
            cashier_name: cmd.cashier_name.trim().to_string(),
            client_id: cmd.client_id,
            client_name,
            lines,
            totals,
            payment_method: cmd.payment_method,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_void(&self, cmd: &VoidSale) -> Result<Vec<SaleEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.id != cmd.sale_id {
            return Err(DomainError::invariant("sale_id mismatch"));
        }
        if self.status != SaleStatus::Completed {
            return Err(DomainError::invariant("only completed sales can be voided"));
        }

        Ok(vec![SaleEvent::Voided(SaleVoided {
            sale_id: cmd.sale_id,
            user_id: cmd.user_id,
            reason: rules::required("reason", &cmd.reason)?,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn line(quantity: i64, price: i64) -> SaleLineInput {
        SaleLineInput {
            product_id: ProductId::generate(),
            code: "P-001".to_string(),
            name: "Polera".to_string(),
            quantity,
            unit_price: Money::from_cents(price),
            unit_cost: Money::from_cents(price / 2),
            discount: Discount::NONE,
        }
    }

    fn record(lines: Vec<SaleLineInput>, method: PaymentMethod, cash: i64) -> RecordSale {
        RecordSale {
            sale_id: SaleId::generate(),
            user_id: UserId::generate(),
            cashier_name: "Ana".to_string(),
            client_id: None,
            client_name: None,
            lines,
            discount: Discount::NONE,
            payment_method: method,
            cash_received: Money::from_cents(cash),
            occurred_at: test_time(),
        }
    }

    fn recorded(cmd: RecordSale) -> Sale {
        let mut sale = Sale::empty(cmd.sale_id);
        let events = sale.handle(&SaleCommand::Record(cmd)).unwrap();
        sale.apply(&events[0]);
        sale
    }

    #[test]
    fn cash_sale_computes_change() {
        let sale = recorded(record(vec![line(2, 6_000), line(1, 2_500)], PaymentMethod::Cash, 20_000));
        let totals = sale.totals().unwrap();

        assert_eq!(totals.subtotal, Money::from_cents(14_500));
        assert_eq!(totals.total, Money::from_cents(14_500));
        assert_eq!(totals.amount_received, Money::from_cents(20_000));
        assert_eq!(totals.change, Money::from_cents(5_500));
        assert_eq!(sale.client_name(), WALK_IN_CLIENT);
        assert_eq!(sale.status(), SaleStatus::Completed);
    }

    #[test]
    fn short_cash_is_rejected() {
        let cmd = record(vec![line(1, 6_000)], PaymentMethod::Cash, 5_999);
        let err = Sale::empty(cmd.sale_id).handle(&SaleCommand::Record(cmd)).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn non_cash_records_total_as_received() {
        for method in [PaymentMethod::Card, PaymentMethod::Qr, PaymentMethod::Transfer] {
            let sale = recorded(record(vec![line(3, 1_000)], method, 0));
            let totals = sale.totals().unwrap();
            assert_eq!(totals.amount_received, totals.total);
            assert_eq!(totals.change, Money::zero());
        }
    }

    #[test]
    fn line_and_sale_discounts_stack() {
        let mut discounted = line(2, 5_000);
        discounted.discount = Discount::fixed(Money::from_cents(1_000));
        let mut cmd = record(vec![discounted, line(1, 1_000)], PaymentMethod::Card, 0);
        cmd.discount = Discount::percent(1_000);

        let sale = recorded(cmd);
        let totals = sale.totals().unwrap();
        assert_eq!(sale.lines()[0].subtotal, Money::from_cents(9_000));
        assert_eq!(totals.subtotal, Money::from_cents(10_000));
        assert_eq!(totals.discount, Money::from_cents(1_000));
        assert_eq!(totals.total, Money::from_cents(9_000));
    }

    #[test]
    fn rejects_empty_and_invalid_lines() {
        for lines in [vec![], vec![line(0, 1_000)], vec![line(1, 0)]] {
            let cmd = record(lines, PaymentMethod::Card, 0);
            let err = Sale::empty(cmd.sale_id).handle(&SaleCommand::Record(cmd)).unwrap_err();
            assert!(matches!(err, DomainError::Validation(_)));
        }
    }

    #[test]
    fn overflowing_line_amounts_are_rejected() {
        let cmd = record(vec![line(i64::MAX / 10, 1_000)], PaymentMethod::Card, 0);
        let err = Sale::empty(cmd.sale_id).handle(&SaleCommand::Record(cmd)).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn named_client_requires_name() {
        let mut cmd = record(vec![line(1, 1_000)], PaymentMethod::Card, 0);
        cmd.client_id = Some(PartyId::generate());
        assert!(Sale::empty(cmd.sale_id).handle(&SaleCommand::Record(cmd.clone())).is_err());

        cmd.client_name = Some("Rosa Flores".to_string());
        assert_eq!(recorded(cmd).client_name(), "Rosa Flores");
    }

    #[test]
    fn void_only_once() {
        let mut sale = recorded(record(vec![line(1, 1_000)], PaymentMethod::Qr, 0));
        let void = SaleCommand::Void(VoidSale {
            sale_id: sale.id_typed(),
            user_id: UserId::generate(),
            reason: "cliente devolvió".to_string(),
            occurred_at: test_time(),
        });
        let events = sale.handle(&void).unwrap();
        sale.apply(&events[0]);
        assert_eq!(sale.status(), SaleStatus::Voided);

        assert!(matches!(sale.handle(&void), Err(DomainError::InvariantViolation(_))));
    }

    #[test]
    fn recorded_cost_sums_line_costs() {
        let cmd = record(vec![line(2, 6_000), line(1, 2_000)], PaymentMethod::Card, 0);
        let events = Sale::empty(cmd.sale_id).handle(&SaleCommand::Record(cmd)).unwrap();
        match &events[0] {
            SaleEvent::Recorded(e) => assert_eq!(e.cost(), Money::from_cents(7_000)),
            other => panic!("unexpected event {other:?}"),
        }
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 500,
                ..ProptestConfig::default()
            })]

            /// total = subtotal - discount, never negative, and change never negative.
            #[test]
            fn totals_are_consistent(
                specs in proptest::collection::vec((1i64..10, 1i64..50_000, 0u32..=10_000), 1..8),
                sale_bps in 0u32..=10_000,
                extra_cash in 0i64..100_000
            ) {
                let lines: Vec<SaleLineInput> = specs
                    .iter()
                    .map(|(q, p, bps)| {
                        let mut l = line(*q, *p);
                        l.discount = Discount::percent(*bps);
                        l
                    })
                    .collect();

                let (_, probe) = SaleTotals::compute(
                    &lines, &Discount::percent(sale_bps), PaymentMethod::Card, Money::zero()
                ).unwrap();
                let cash = probe.total + Money::from_cents(extra_cash);
                let (recorded, totals) = SaleTotals::compute(
                    &lines, &Discount::percent(sale_bps), PaymentMethod::Cash, cash
                ).unwrap();

                prop_assert_eq!(totals.total, totals.subtotal - totals.discount);
                prop_assert!(!totals.total.is_negative());
                prop_assert!(!totals.change.is_negative());
                prop_assert_eq!(totals.subtotal, recorded.iter().map(|l| l.subtotal).sum::<Money>());
            }
        }
    }
}
