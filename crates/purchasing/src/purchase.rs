use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use arkpos_auth::UserId;
use arkpos_catalog::ProductId;
use arkpos_core::{Aggregate, AggregateRoot, DomainError, Money};
use arkpos_events::Event;
use arkpos_parties::PartyId;

arkpos_core::typed_id!(PurchaseId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PurchaseStatus {
    #[default]
    Completed,
}

/// One received product at the prices registered with the purchase.
///
/// `code` and `name` are snapshots taken when the line was registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseLine {
    pub line_no: u32,
    pub product_id: ProductId,
    pub code: String,
    pub name: String,
    pub quantity: i64,
    pub purchase_price: Money,
    pub sale_price: Money,
}

impl PurchaseLine {
    pub fn subtotal(&self) -> Money {
        self.purchase_price.times(self.quantity)
    }

    fn validate(&self) -> Result<(), DomainError> {
        if self.quantity <= 0 {
            return Err(DomainError::validation(format!(
                "line {}: quantity must be greater than zero",
                self.line_no
            )));
        }
        if self.purchase_price.is_negative() {
            return Err(DomainError::validation(format!(
                "line {}: purchase price cannot be negative",
                self.line_no
            )));
        }
        if !self.sale_price.is_positive() {
            return Err(DomainError::validation(format!(
                "line {}: sale price must be greater than zero",
                self.line_no
            )));
        }
        if self.purchase_price.checked_times(self.quantity).is_none() {
            return Err(DomainError::validation(format!(
                "line {}: amount is out of range",
                self.line_no
            )));
        }
        Ok(())
    }
}

fn validate_lines(lines: &[PurchaseLine]) -> Result<Money, DomainError> {
    if lines.is_empty() {
        return Err(DomainError::validation("a purchase needs at least one line"));
    }
    for line in lines {
        line.validate()?;
    }
    Money::checked_sum(lines.iter().map(PurchaseLine::subtotal))
        .ok_or_else(|| DomainError::validation("purchase total is out of range"))
}

/// Aggregate root: Purchase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Purchase {
    id: PurchaseId,
    supplier_id: Option<PartyId>,
    user_id: Option<UserId>,
    lines: Vec<PurchaseLine>,
    total: Money,
    status: PurchaseStatus,
    registered_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl Purchase {
    pub fn empty(id: PurchaseId) -> Self {
        Self {
            id,
            supplier_id: None,
            user_id: None,
            lines: Vec::new(),
            total: Money::zero(),
            status: PurchaseStatus::Completed,
            registered_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> PurchaseId {
        self.id
    }

    pub fn exists(&self) -> bool {
        self.created
    }

    pub fn supplier_id(&self) -> Option<PartyId> {
        self.supplier_id
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    pub fn lines(&self) -> &[PurchaseLine] {
        &self.lines
    }

    pub fn total(&self) -> Money {
        self.total
    }

    pub fn status(&self) -> PurchaseStatus {
        self.status
    }

    pub fn registered_at(&self) -> Option<DateTime<Utc>> {
        self.registered_at
    }
}

impl AggregateRoot for Purchase {
    type Id = PurchaseId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterPurchase {
    pub purchase_id: PurchaseId,
    pub supplier_id: PartyId,
    pub user_id: UserId,
    pub lines: Vec<PurchaseLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Replaces supplier and lines of an existing purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisePurchase {
    pub purchase_id: PurchaseId,
    pub supplier_id: PartyId,
    pub user_id: UserId,
    pub lines: Vec<PurchaseLine>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchaseCommand {
    Register(RegisterPurchase),
    Revise(RevisePurchase),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseRegistered {
    pub purchase_id: PurchaseId,
    pub supplier_id: PartyId,
    pub user_id: UserId,
    pub lines: Vec<PurchaseLine>,
    pub total: Money,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseRevised {
    pub purchase_id: PurchaseId,
    pub supplier_id: PartyId,
    pub user_id: UserId,
    pub previous_lines: Vec<PurchaseLine>,
    pub lines: Vec<PurchaseLine>,
    pub total: Money,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchaseEvent {
    Registered(PurchaseRegistered),
    Revised(PurchaseRevised),
}

impl Event for PurchaseEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PurchaseEvent::Registered(_) => "purchasing.purchase.registered",
            PurchaseEvent::Revised(_) => "purchasing.purchase.revised",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PurchaseEvent::Registered(e) => e.occurred_at,
            PurchaseEvent::Revised(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Purchase {
    type Command = PurchaseCommand;
    type Event = PurchaseEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            PurchaseEvent::Registered(e) => {
                self.id = e.purchase_id;
                self.supplier_id = Some(e.supplier_id);
                self.user_id = Some(e.user_id);
                self.lines = e.lines.clone();
                self.total = e.total;
                self.status = PurchaseStatus::Completed;
                self.registered_at = Some(e.occurred_at);
                self.created = true;
            }
            PurchaseEvent::Revised(e) => {
                self.supplier_id = Some(e.supplier_id);
                self.user_id = Some(e.user_id);
                self.lines = e.lines.clone();
                self.total = e.total;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            PurchaseCommand::Register(cmd) => {
                if self.created {
                    return Err(DomainError::conflict("purchase already exists"));
                }
                let total = validate_lines(&cmd.lines)?;

                Ok(vec![PurchaseEvent::Registered(PurchaseRegistered {
                    purchase_id: cmd.purchase_id,
                    supplier_id: cmd.supplier_id,
                    user_id: cmd.user_id,
                    lines: cmd.lines.clone(),
                    total,
                    occurred_at: cmd.occurred_at,
                })])
            }
            PurchaseCommand::Revise(cmd) => {
                if !self.created {
                    return Err(DomainError::not_found());
                }
                if self.id != cmd.purchase_id {
                    return Err(DomainError::invariant("purchase_id mismatch"));
                }
                let total = validate_lines(&cmd.lines)?;

                Ok(vec![PurchaseEvent::Revised(PurchaseRevised {
                    purchase_id: cmd.purchase_id,
                    supplier_id: cmd.supplier_id,
                    user_id: cmd.user_id,
                    previous_lines: self.lines.clone(),
                    lines: cmd.lines.clone(),
                    total,
                    occurred_at: cmd.occurred_at,
                })])
            }
        }
    }
}
