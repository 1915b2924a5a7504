//! Append-only event store boundary.
//!
//! `InMemoryEventStore` backs tests and database-less runs; `PostgresEventStore`
//! persists to a single `events` table.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryEventStore;
pub use postgres::PostgresEventStore;
pub use r#trait::{EventStore, EventStoreError, StoredEvent, StreamAppend, UncommittedEvent};
