//! Infrastructure layer: event store, command pipeline, read models and the
//! workflows that tie the domain crates together.

pub mod command_dispatcher;
pub mod event_store;
pub mod projections;
pub mod read_model;
pub mod unique_index;
pub mod unit_of_work;
pub mod workflows;

pub use command_dispatcher::{CommandDispatcher, DispatchError};
pub use projections::Projections;
pub use unique_index::UniqueIndex;
pub use unit_of_work::UnitOfWork;
pub use workflows::{WorkflowError, WorkflowResult, Workflows};

/// Aggregate type written on every stored event of a stream.
pub mod streams {
    pub const USER: &str = "auth.user";
    pub const PRODUCT: &str = "catalog.product";
    pub const CATEGORY: &str = "catalog.category";
    pub const PARTY: &str = "parties.party";
    pub const COMPANY: &str = "parties.company";
    pub const STOCK: &str = "inventory.stock";
    pub const PURCHASE: &str = "purchasing.purchase";
    pub const SALE: &str = "sales.sale";
}
