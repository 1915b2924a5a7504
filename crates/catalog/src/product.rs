use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use arkpos_core::{Aggregate, AggregateId, AggregateRoot, DomainError, Money, rules};
use arkpos_events::Event;

use crate::CategoryId;

arkpos_core::typed_id!(ProductId);

/// Unit shown when none is given.
pub const DEFAULT_UNIT: &str = "Unidad";

/// Low-stock threshold when none is given.
pub const DEFAULT_MIN_STOCK: i64 = 5;

fn default_min_stock() -> i64 {
    DEFAULT_MIN_STOCK
}

/// Descriptive fields and prices, shared by registration and edits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDetails {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
    pub purchase_price: Money,
    pub sale_price: Money,
    #[serde(default = "default_min_stock")]
    pub min_stock: i64,
}

impl ProductDetails {
    /// Trimmed copy with defaults filled in, or the first rule it breaks.
    pub fn normalized(&self) -> Result<ProductDetails, DomainError> {
        let code = rules::required("code", &self.code)?;
        let name = rules::required("name", &self.name)?;

        if !self.sale_price.is_positive() {
            return Err(DomainError::validation("sale price must be greater than zero"));
        }
        if self.purchase_price.is_negative() {
            return Err(DomainError::validation("purchase price cannot be negative"));
        }
        if self.min_stock < 0 {
            return Err(DomainError::validation("minimum stock cannot be negative"));
        }

        Ok(ProductDetails {
            code,
            name,
            category_id: self.category_id,
            size: rules::optional(self.size.as_deref()),
            color: rules::optional(self.color.as_deref()),
            unit: Some(rules::optional(self.unit.as_deref()).unwrap_or_else(|| DEFAULT_UNIT.to_string())),
            purchase_price: self.purchase_price,
            sale_price: self.sale_price,
            min_stock: self.min_stock,
        })
    }
}

/// Aggregate root: Product.
///
/// The stock level itself lives in the inventory stream referenced by `stock_item_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    id: ProductId,
    details: Option<ProductDetails>,
    stock_item_id: Option<AggregateId>,
    active: bool,
    registered_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl Product {
    pub fn empty(id: ProductId) -> Self {
        Self {
            id,
            details: None,
            stock_item_id: None,
            active: false,
            registered_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> ProductId {
        self.id
    }

    pub fn exists(&self) -> bool {
        self.created
    }

    pub fn details(&self) -> Option<&ProductDetails> {
        self.details.as_ref()
    }

    pub fn code(&self) -> &str {
        self.details.as_ref().map(|d| d.code.as_str()).unwrap_or("")
    }

    pub fn name(&self) -> &str {
        self.details.as_ref().map(|d| d.name.as_str()).unwrap_or("")
    }

    pub fn purchase_price(&self) -> Money {
        self.details.as_ref().map(|d| d.purchase_price).unwrap_or_default()
    }

    pub fn sale_price(&self) -> Money {
        self.details.as_ref().map(|d| d.sale_price).unwrap_or_default()
    }

    pub fn stock_item_id(&self) -> Option<AggregateId> {
        self.stock_item_id
    }

    pub fn registered_at(&self) -> Option<DateTime<Utc>> {
        self.registered_at
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn can_be_sold(&self) -> bool {
        self.created && self.active
    }
}

impl AggregateRoot for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

// Commands

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterProduct {
    pub product_id: ProductId,
    pub stock_item_id: AggregateId,
    pub details: ProductDetails,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateProduct {
    pub product_id: ProductId,
    pub details: ProductDetails,
    pub occurred_at: DateTime<Utc>,
}

/// Prices carried in by a purchase line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepriceProduct {
    pub product_id: ProductId,
    pub purchase_price: Money,
    pub sale_price: Money,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeactivateProduct {
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactivateProduct {
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductCommand {
    Register(RegisterProduct),
    Update(UpdateProduct),
    Reprice(RepriceProduct),
    Deactivate(DeactivateProduct),
    Reactivate(ReactivateProduct),
}

// Events

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRegistered {
    pub product_id: ProductId,
    pub stock_item_id: AggregateId,
    pub details: ProductDetails,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductUpdated {
    pub product_id: ProductId,
    pub details: ProductDetails,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRepriced {
    pub product_id: ProductId,
    pub purchase_price: Money,
    pub sale_price: Money,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDeactivated {
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductReactivated {
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductEvent {
    Registered(ProductRegistered),
    Updated(ProductUpdated),
    Repriced(ProductRepriced),
    Deactivated(ProductDeactivated),
    Reactivated(ProductReactivated),
}

impl Event for ProductEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ProductEvent::Registered(_) => "catalog.product.registered",
            ProductEvent::Updated(_) => "catalog.product.updated",
            ProductEvent::Repriced(_) => "catalog.product.repriced",
            ProductEvent::Deactivated(_) => "catalog.product.deactivated",
            ProductEvent::Reactivated(_) => "catalog.product.reactivated",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ProductEvent::Registered(e) => e.occurred_at,
            ProductEvent::Updated(e) => e.occurred_at,
            ProductEvent::Repriced(e) => e.occurred_at,
            ProductEvent::Deactivated(e) => e.occurred_at,
            ProductEvent::Reactivated(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Product {
    type Command = ProductCommand;
    type Event = ProductEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ProductEvent::Registered(e) => {
                self.id = e.product_id;
                self.details = Some(e.details.clone());
                self.stock_item_id = Some(e.stock_item_id);
                self.registered_at = Some(e.occurred_at);
                self.active = true;
                self.created = true;
            }
            ProductEvent::Updated(e) => {
                self.details = Some(e.details.clone());
            }
            ProductEvent::Repriced(e) => {
                if let Some(details) = self.details.as_mut() {
                    details.purchase_price = e.purchase_price;
                    details.sale_price = e.sale_price;
                }
            }
            ProductEvent::Deactivated(_) => self.active = false,
            ProductEvent::Reactivated(_) => self.active = true,
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ProductCommand::Register(cmd) => self.handle_register(cmd),
            ProductCommand::Update(cmd) => self.handle_update(cmd),
            ProductCommand::Reprice(cmd) => self.handle_reprice(cmd),
            ProductCommand::Deactivate(cmd) => self.handle_deactivate(cmd),
            ProductCommand::Reactivate(cmd) => self.handle_reactivate(cmd),
        }
    }
}

impl Product {
    fn ensure_product(&self, product_id: ProductId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.id != product_id {
            return Err(DomainError::invariant("product_id mismatch"));
        }
        Ok(())
    }

    fn handle_register(&self, cmd: &RegisterProduct) -> Result<Vec<ProductEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("product already exists"));
        }

        // Code uniqueness is claimed by the caller before dispatch.
        let details = cmd.details.normalized()?;

        Ok(vec![ProductEvent::Registered(ProductRegistered {
            product_id: cmd.product_id,
            stock_item_id: cmd.stock_item_id,
            details,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update(&self, cmd: &UpdateProduct) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_product(cmd.product_id)?;

        let details = cmd.details.normalized()?;
        if self.details.as_ref() == Some(&details) {
            return Ok(vec![]);
        }

        Ok(vec![ProductEvent::Updated(ProductUpdated {
            product_id: cmd.product_id,
            details,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reprice(&self, cmd: &RepriceProduct) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_product(cmd.product_id)?;

        if !cmd.sale_price.is_positive() {
            return Err(DomainError::validation("sale price must be greater than zero"));
        }
        if cmd.purchase_price.is_negative() {
            return Err(DomainError::validation("purchase price cannot be negative"));
        }
        if self.purchase_price() == cmd.purchase_price && self.sale_price() == cmd.sale_price {
            return Ok(vec![]);
        }

        Ok(vec![ProductEvent::Repriced(ProductRepriced {
            product_id: cmd.product_id,
            purchase_price: cmd.purchase_price,
            sale_price: cmd.sale_price,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_deactivate(&self, cmd: &DeactivateProduct) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_product(cmd.product_id)?;

        if !self.active {
            return Err(DomainError::conflict("product is already inactive"));
        }

        Ok(vec![ProductEvent::Deactivated(ProductDeactivated {
            product_id: cmd.product_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reactivate(&self, cmd: &ReactivateProduct) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_product(cmd.product_id)?;

        if self.active {
            return Err(DomainError::conflict("product is already active"));
        }

        Ok(vec![ProductEvent::Reactivated(ProductReactivated {
            product_id: cmd.product_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}
