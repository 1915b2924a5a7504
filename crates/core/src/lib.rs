//! `arkpos-core`: domain building blocks shared by every arkpos module.
//!
//! Pure types only: identifiers, the aggregate contract, the domain error model
//! and money arithmetic. Nothing here performs IO.

pub mod aggregate;
pub mod error;
pub mod id;
pub mod money;
pub mod rules;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use error::{DomainError, DomainResult};
pub use id::AggregateId;
pub use money::{Discount, Money};
