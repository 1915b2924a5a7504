use std::collections::HashMap;
use std::sync::RwLock;

use arkpos_core::{AggregateId, ExpectedVersion};

use super::r#trait::{
    EventStore, EventStoreError, StoredEvent, StreamAppend, UncommittedEvent, single_stream,
    validate_batch,
};

#[derive(Debug, Default)]
struct Inner {
    streams: HashMap<AggregateId, Vec<StoredEvent>>,
    /// Global append order, for `load_all`.
    log: Vec<StoredEvent>,
}

/// In-memory append-only event store for tests and single-process dev runs.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    inner: RwLock<Inner>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn current_version(stream: &[StoredEvent]) -> u64 {
        stream.last().map(|e| e.sequence_number).unwrap_or(0)
    }

    /// Version and type checks for one stream, without writing.
    fn check(inner: &Inner, part: &StreamAppend) -> Result<u64, EventStoreError> {
        let stream = inner
            .streams
            .get(&part.aggregate_id)
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        let current = Self::current_version(stream);

        if !part.expected_version.matches(current) {
            return Err(EventStoreError::Concurrency(format!(
                "stream {}: expected {:?}, found {current}",
                part.aggregate_id, part.expected_version
            )));
        }

        if let (Some(existing), Some(incoming)) = (stream.first(), part.events.first()) {
            if existing.aggregate_type != incoming.aggregate_type {
                return Err(EventStoreError::AggregateTypeMismatch(format!(
                    "stream aggregate_type is '{}', attempted append with '{}'",
                    existing.aggregate_type, incoming.aggregate_type
                )));
            }
        }

        Ok(current)
    }

    fn write(inner: &mut Inner, aggregate_id: AggregateId, current: u64, events: Vec<UncommittedEvent>) -> Vec<StoredEvent> {
        let mut next = current + 1;
        let mut committed = Vec::with_capacity(events.len());
        for e in events {
            let stored = StoredEvent {
                event_id: e.event_id,
                aggregate_id: e.aggregate_id,
                aggregate_type: e.aggregate_type,
                sequence_number: next,
                event_type: e.event_type,
                event_version: e.event_version,
                occurred_at: e.occurred_at,
                payload: e.payload,
            };
            next += 1;
            committed.push(stored);
        }

        inner
            .streams
            .entry(aggregate_id)
            .or_default()
            .extend(committed.iter().cloned());
        inner.log.extend(committed.iter().cloned());
        committed
    }
}

impl EventStore for InMemoryEventStore {
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        if events.is_empty() {
            return Ok(vec![]);
        }
        let (aggregate_id, _) = single_stream(&events)?;
        self.append_batch(vec![StreamAppend {
            aggregate_id,
            expected_version,
            events,
        }])
    }

    fn append_batch(&self, batch: Vec<StreamAppend>) -> Result<Vec<StoredEvent>, EventStoreError> {
        validate_batch(&batch)?;

        let mut inner = self
            .inner
            .write()
            .map_err(|_| EventStoreError::Backend("lock poisoned".to_string()))?;

        // Check every stream first so a failure leaves the store untouched.
        let mut versions = Vec::with_capacity(batch.len());
        for part in &batch {
            versions.push(Self::check(&inner, part)?);
        }

        let mut committed = Vec::new();
        for (part, current) in batch.into_iter().zip(versions) {
            if part.events.is_empty() {
                continue;
            }
            committed.extend(Self::write(&mut inner, part.aggregate_id, current, part.events));
        }

        Ok(committed)
    }

    fn load_stream(&self, aggregate_id: AggregateId) -> Result<Vec<StoredEvent>, EventStoreError> {
        let inner = self
            .inner
            .read()
            .map_err(|_| EventStoreError::Backend("lock poisoned".to_string()))?;

        Ok(inner.streams.get(&aggregate_id).cloned().unwrap_or_default())
    }

    fn load_all(&self) -> Result<Vec<StoredEvent>, EventStoreError> {
        let inner = self
            .inner
            .read()
            .map_err(|_| EventStoreError::Backend("lock poisoned".to_string()))?;

        Ok(inner.log.clone())
    }
}
