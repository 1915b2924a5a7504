//! Command execution pipeline for event-sourced aggregates.
//!
//! ```text
//! command
//!   → load stream → check ordering → rehydrate
//!   → handle (pure; decides events)
//!   → append with ExpectedVersion::Exact(current)
//!   → publish committed envelopes
//! ```
//!
//! Commands that touch several aggregates go through a [`UnitOfWork`] instead,
//! which stages each stream and commits them with one `append_batch`.
//!
//! Append and publish happen under one commit lock, so subscribers see each
//! stream in sequence order.

use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use arkpos_core::{Aggregate, AggregateId, DomainError, ExpectedVersion};
use arkpos_events::{EventBus, EventEnvelope};

use crate::event_store::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};
use crate::unit_of_work::UnitOfWork;

#[derive(Debug, Error)]
pub enum DispatchError {
    /// Stale version or duplicate creation.
    #[error("conflict: {0}")]
    Concurrency(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("not found")]
    NotFound,

    /// Stored payloads no longer match the aggregate's event type.
    #[error("failed to deserialize stored event: {0}")]
    Deserialize(String),

    #[error(transparent)]
    Store(EventStoreError),

    /// The append succeeded but the bus refused the envelope. Events are durable;
    /// projections catch up on the next rebuild.
    #[error("event publication failed: {0}")]
    Publish(String),
}

impl From<EventStoreError> for DispatchError {
    fn from(value: EventStoreError) -> Self {
        match value {
            EventStoreError::Concurrency(msg) => DispatchError::Concurrency(msg),
            other => DispatchError::Store(other),
        }
    }
}

impl From<DomainError> for DispatchError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => DispatchError::Validation(msg),
            DomainError::InvariantViolation(msg) => DispatchError::InvariantViolation(msg),
            DomainError::Conflict(msg) => DispatchError::Concurrency(msg),
            DomainError::Unauthorized => DispatchError::Unauthorized,
            DomainError::NotFound => DispatchError::NotFound,
            DomainError::InvalidId(msg) => DispatchError::Validation(msg),
        }
    }
}

/// Runs commands against aggregates held in an [`EventStore`] and publishes what
/// was committed on an [`EventBus`].
///
/// Aggregates must be deterministic: replaying the same events yields the same
/// state, and `handle` never mutates.
#[derive(Debug)]
pub struct CommandDispatcher<S, B> {
    store: S,
    bus: B,
    commit: Mutex<()>,
}

impl<S, B> CommandDispatcher<S, B> {
    pub fn new(store: S, bus: B) -> Self {
        Self {
            store,
            bus,
            commit: Mutex::new(()),
        }
    }

    /// Held from append until the committed envelopes are on the bus.
    pub(crate) fn commit_guard(&self) -> MutexGuard<'_, ()> {
        // The guarded state is `()`; a panicked holder leaves nothing half-written.
        self.commit.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }
}

impl<S, B> CommandDispatcher<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Execute one command against one aggregate.
    ///
    /// Returns the committed events; an empty vector when the command was a no-op.
    pub fn dispatch<A>(
        &self,
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        command: A::Command,
        make_aggregate: impl FnOnce(AggregateId) -> A,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: arkpos_events::Event + Serialize + DeserializeOwned,
    {
        let (aggregate, version) = self.rehydrate(aggregate_id, make_aggregate)?;

        let decided = aggregate.handle(&command)?;
        if decided.is_empty() {
            return Ok(vec![]);
        }

        let uncommitted = to_uncommitted(aggregate_id, &aggregate_type.into(), &decided)?;
        let _commit = self.commit_guard();
        let committed = self.store.append(uncommitted, ExpectedVersion::Exact(version))?;
        self.publish(&committed)?;

        Ok(committed)
    }

    /// Rehydrated current state. A stream with no events yields the empty aggregate;
    /// callers decide whether that means "not found".
    pub fn load<A>(&self, aggregate_id: AggregateId, make_aggregate: impl FnOnce(AggregateId) -> A) -> Result<A, DispatchError>
    where
        A: Aggregate,
        A::Event: DeserializeOwned,
    {
        self.rehydrate(aggregate_id, make_aggregate).map(|(aggregate, _)| aggregate)
    }

    /// Start an atomic multi-stream commit.
    pub fn unit_of_work(&self) -> UnitOfWork<'_, S, B> {
        UnitOfWork::new(self)
    }

    pub(crate) fn rehydrate<A>(
        &self,
        aggregate_id: AggregateId,
        make_aggregate: impl FnOnce(AggregateId) -> A,
    ) -> Result<(A, u64), DispatchError>
    where
        A: Aggregate,
        A::Event: DeserializeOwned,
    {
        let history = self.store.load_stream(aggregate_id)?;
        validate_loaded_stream(aggregate_id, &history)?;

        let mut aggregate = make_aggregate(aggregate_id);
        for stored in &history {
            let event: A::Event = serde_json::from_value(stored.payload.clone())
                .map_err(|e| DispatchError::Deserialize(format!("{} #{}: {e}", stored.event_type, stored.sequence_number)))?;
            aggregate.apply(&event);
        }

        Ok((aggregate, stream_version(&history)))
    }

    /// Publish committed events in commit order.
    pub(crate) fn publish(&self, committed: &[StoredEvent]) -> Result<(), DispatchError> {
        for stored in committed {
            self.bus
                .publish(stored.to_envelope())
                .map_err(|e| DispatchError::Publish(format!("{e:?}")))?;
        }
        Ok(())
    }
}

pub(crate) fn to_uncommitted<E>(
    aggregate_id: AggregateId,
    aggregate_type: &str,
    events: &[E],
) -> Result<Vec<UncommittedEvent>, DispatchError>
where
    E: arkpos_events::Event + Serialize,
{
    events
        .iter()
        .map(|ev| UncommittedEvent::from_typed(aggregate_id, aggregate_type, Uuid::now_v7(), ev))
        .collect::<Result<Vec<_>, _>>()
        .map_err(DispatchError::from)
}

fn stream_version(stream: &[StoredEvent]) -> u64 {
    stream.last().map(|e| e.sequence_number).unwrap_or(0)
}

/// A loaded stream must belong to the requested aggregate and run 1, 2, 3, ...
fn validate_loaded_stream(aggregate_id: AggregateId, stream: &[StoredEvent]) -> Result<(), DispatchError> {
    for (idx, e) in stream.iter().enumerate() {
        if e.aggregate_id != aggregate_id {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(format!(
                "loaded stream contains wrong aggregate_id at index {idx}"
            ))));
        }
        let expected = idx as u64 + 1;
        if e.sequence_number != expected {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(format!(
                "non-contiguous stream: expected sequence {expected}, found {}",
                e.sequence_number
            ))));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use arkpos_catalog::{
        DeactivateProduct, Product, ProductCommand, ProductDetails, ProductId, RegisterProduct,
    };
    use arkpos_core::{AggregateRoot, Money};
    use arkpos_events::InMemoryEventBus;
    use chrono::Utc;

    use crate::event_store::InMemoryEventStore;

    type Dispatcher = CommandDispatcher<Arc<InMemoryEventStore>, Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>>;

    fn dispatcher() -> Dispatcher {
        CommandDispatcher::new(Arc::new(InMemoryEventStore::new()), Arc::new(InMemoryEventBus::new()))
    }

    fn details(code: &str) -> ProductDetails {
        ProductDetails {
            code: code.to_string(),
            name: "Polera básica".to_string(),
            category_id: None,
            size: Some("M".to_string()),
            color: None,
            unit: None,
            purchase_price: Money::from_cents(3_000),
            sale_price: Money::from_cents(5_500),
            min_stock: 5,
        }
    }

    fn register(id: ProductId) -> ProductCommand {
        ProductCommand::Register(RegisterProduct {
            product_id: id,
            stock_item_id: AggregateId::new(),
            details: details("POL-001"),
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn dispatch_persists_and_publishes() {
        let d = dispatcher();
        let sub = d.bus().subscribe();
        let id = ProductId::generate();

        let committed = d
            .dispatch::<Product>(id.aggregate_id(), "catalog.product", register(id), |a| Product::empty(ProductId::new(a)))
            .unwrap();

        assert_eq!(committed.len(), 1);
        assert_eq!(committed[0].sequence_number, 1);
        assert_eq!(committed[0].event_type, "catalog.product.registered");

        let env = sub.try_recv().unwrap();
        assert_eq!(env.aggregate_id(), id.aggregate_id());
        assert_eq!(env.aggregate_type(), "catalog.product");
    }

    #[test]
    fn load_rehydrates_state() {
        let d = dispatcher();
        let id = ProductId::generate();
        let make = |a| Product::empty(ProductId::new(a));

        d.dispatch::<Product>(id.aggregate_id(), "catalog.product", register(id), make).unwrap();
        d.dispatch::<Product>(
            id.aggregate_id(),
            "catalog.product",
            ProductCommand::Deactivate(DeactivateProduct { product_id: id, occurred_at: Utc::now() }),
            make,
        )
        .unwrap();

        let product = d.load(id.aggregate_id(), make).unwrap();
        assert!(product.exists());
        assert!(!product.is_active());
        assert_eq!(product.version(), 2);
    }

    #[test]
    fn domain_errors_map_to_dispatch_errors() {
        let d = dispatcher();
        let id = ProductId::generate();
        let make = |a| Product::empty(ProductId::new(a));

        let err = d
            .dispatch::<Product>(
                id.aggregate_id(),
                "catalog.product",
                ProductCommand::Deactivate(DeactivateProduct { product_id: id, occurred_at: Utc::now() }),
                make,
            )
            .unwrap_err();
        assert!(matches!(err, DispatchError::NotFound));

        d.dispatch::<Product>(id.aggregate_id(), "catalog.product", register(id), make).unwrap();
        let err = d.dispatch::<Product>(id.aggregate_id(), "catalog.product", register(id), make).unwrap_err();
        assert!(matches!(err, DispatchError::Concurrency(_)));
    }

    #[test]
    fn unknown_stream_loads_as_empty_aggregate() {
        let d = dispatcher();
        let product = d.load(AggregateId::new(), |a| Product::empty(ProductId::new(a))).unwrap();
        assert!(!product.exists());
        assert_eq!(product.version(), 0);
    }
}
