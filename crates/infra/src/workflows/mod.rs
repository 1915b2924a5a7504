//! Multi-step use cases.
//!
//! Each workflow reads what it needs from aggregates and the [`UniqueIndex`] (both
//! consistent with the store), decides, and commits through the dispatcher or a
//! [`UnitOfWork`](crate::UnitOfWork). Projections are only consulted where the rule
//! itself is about history, such as refusing to remove a supplier with purchases.

mod catalog;
mod inventory;
mod parties;
mod purchasing;
mod sales;
mod users;

use std::sync::Mutex;

use serde_json::Value as JsonValue;
use thiserror::Error;

use arkpos_auth::{PasswordError, User, UserId};
use arkpos_catalog::{Category, CategoryId, Product, ProductId};
use arkpos_core::DomainError;
use arkpos_events::{EventBus, EventEnvelope};
use arkpos_inventory::{StockItem, StockItemId};
use arkpos_parties::{Company, Party, PartyId, PartyKind};
use arkpos_purchasing::{Purchase, PurchaseId};
use arkpos_sales::{Sale, SaleId};

use crate::command_dispatcher::{CommandDispatcher, DispatchError};
use crate::event_store::{EventStore, EventStoreError};
use crate::projections::Projections;
use crate::unique_index::UniqueIndex;

pub use catalog::NewProduct;
pub use purchasing::PurchaseLineInput;
pub use sales::{CheckoutLine, CheckoutRequest, Quote};
pub use users::NewUser;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error("user not found")]
    UserNotFound,

    #[error("invalid password")]
    InvalidPassword,

    #[error("user is suspended")]
    Suspended,

    #[error(transparent)]
    Password(#[from] PasswordError),
}

impl From<DomainError> for WorkflowError {
    fn from(value: DomainError) -> Self {
        WorkflowError::Dispatch(value.into())
    }
}

impl From<EventStoreError> for WorkflowError {
    fn from(value: EventStoreError) -> Self {
        WorkflowError::Dispatch(value.into())
    }
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;

/// Entry point for every state-changing use case.
pub struct Workflows<S, B> {
    dispatcher: CommandDispatcher<S, B>,
    index: UniqueIndex,
    projections: Projections,
    bcrypt_cost: u32,
    // Serializes registrations so exactly one account becomes the first admin.
    registration: Mutex<()>,
}

impl<S, B> Workflows<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(dispatcher: CommandDispatcher<S, B>, projections: Projections, bcrypt_cost: u32) -> Self {
        Self {
            dispatcher,
            index: UniqueIndex::new(),
            projections,
            bcrypt_cost,
            registration: Mutex::new(()),
        }
    }

    pub fn dispatcher(&self) -> &CommandDispatcher<S, B> {
        &self.dispatcher
    }

    pub fn index(&self) -> &UniqueIndex {
        &self.index
    }

    pub fn projections(&self) -> &Projections {
        &self.projections
    }

    /// Replay the whole store into the unique index and every projection.
    #[tracing::instrument(skip(self))]
    pub fn bootstrap(&self) -> WorkflowResult<usize> {
        let events = self.dispatcher.store().load_all()?;
        self.index
            .rebuild(&events)
            .map_err(|e| DispatchError::Deserialize(e.to_string()))?;
        self.projections
            .rebuild(&events)
            .map_err(|e| DispatchError::Deserialize(e.to_string()))?;
        Ok(events.len())
    }

    // ── aggregate loaders ────────────────────────────────────────────────────

    pub fn user(&self, user_id: UserId) -> WorkflowResult<User> {
        let user = self.dispatcher.load(user_id.aggregate_id(), |id| User::empty(UserId::new(id)))?;
        if !user.exists() {
            return Err(WorkflowError::UserNotFound);
        }
        Ok(user)
    }

    pub fn product(&self, product_id: ProductId) -> WorkflowResult<Product> {
        let product = self
            .dispatcher
            .load(product_id.aggregate_id(), |id| Product::empty(ProductId::new(id)))?;
        if !product.exists() {
            return Err(DomainError::not_found().into());
        }
        Ok(product)
    }

    pub(crate) fn stock_item(&self, product: &Product) -> WorkflowResult<StockItem> {
        let id = stock_item_of(product)?;
        let item = self.dispatcher.load(id.aggregate_id(), |id| StockItem::empty(StockItemId::new(id)))?;
        if !item.exists() {
            return Err(DomainError::invariant(format!("{} has no stock item", product.code())).into());
        }
        Ok(item)
    }

    pub fn category(&self, category_id: CategoryId) -> WorkflowResult<Category> {
        let category = self
            .dispatcher
            .load(category_id.aggregate_id(), |id| Category::empty(CategoryId::new(id)))?;
        if !category.is_live() {
            return Err(DomainError::not_found().into());
        }
        Ok(category)
    }

    /// A live party of the given kind.
    pub fn party(&self, kind: PartyKind, party_id: PartyId) -> WorkflowResult<Party> {
        let party = self.dispatcher.load(party_id.aggregate_id(), |id| Party::empty(PartyId::new(id)))?;
        if !party.exists() || party.kind() != kind || !party.can_transact() {
            return Err(DomainError::not_found().into());
        }
        Ok(party)
    }

    pub fn purchase(&self, purchase_id: PurchaseId) -> WorkflowResult<Purchase> {
        let purchase = self
            .dispatcher
            .load(purchase_id.aggregate_id(), |id| Purchase::empty(PurchaseId::new(id)))?;
        if !purchase.exists() {
            return Err(DomainError::not_found().into());
        }
        Ok(purchase)
    }

    pub fn sale(&self, sale_id: SaleId) -> WorkflowResult<Sale> {
        let sale = self.dispatcher.load(sale_id.aggregate_id(), |id| Sale::empty(SaleId::new(id)))?;
        if !sale.exists() {
            return Err(DomainError::not_found().into());
        }
        Ok(sale)
    }

    pub fn company(&self) -> WorkflowResult<Company> {
        Ok(self.dispatcher.load(arkpos_parties::COMPANY_ID, Company::empty)?)
    }
}

pub(crate) fn stock_item_of(product: &Product) -> WorkflowResult<StockItemId> {
    product
        .stock_item_id()
        .map(StockItemId::new)
        .ok_or_else(|| DomainError::invariant(format!("{} has no stock item", product.code())).into())
}
