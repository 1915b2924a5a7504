use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use arkpos_core::{Aggregate, AggregateId, AggregateRoot, DomainError, ExpectedVersion};
use arkpos_events::{EventBus, EventEnvelope};

use crate::command_dispatcher::{CommandDispatcher, DispatchError, to_uncommitted};
use crate::event_store::{EventStore, EventStoreError, StoredEvent, StreamAppend};

/// Stages commands against several aggregates and commits them as one atomic
/// `append_batch`.
///
/// Each staged stream carries `ExpectedVersion::Exact` of the version it was loaded
/// at, so a concurrent writer to any of them fails the whole commit. Nothing is
/// published until the batch is durable.
pub struct UnitOfWork<'a, S, B> {
    dispatcher: &'a CommandDispatcher<S, B>,
    staged: Vec<StreamAppend>,
}

impl<'a, S, B> UnitOfWork<'a, S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub(crate) fn new(dispatcher: &'a CommandDispatcher<S, B>) -> Self {
        Self {
            dispatcher,
            staged: Vec::new(),
        }
    }

    /// Decide `command` against the current state of `aggregate_id` and stage the
    /// resulting events. Returns the aggregate with those events applied.
    pub fn execute<A>(
        &mut self,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        command: A::Command,
        make_aggregate: impl FnOnce(AggregateId) -> A,
    ) -> Result<A, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: arkpos_events::Event + Serialize + DeserializeOwned,
    {
        if self.is_staged(aggregate_id) {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(format!(
                "stream {aggregate_id} already staged in this unit of work"
            ))));
        }

        let (mut aggregate, version) = self.dispatcher.rehydrate(aggregate_id, make_aggregate)?;
        let decided = aggregate.handle(&command)?;
        if decided.is_empty() {
            return Ok(aggregate);
        }

        for event in &decided {
            aggregate.apply(event);
        }
        debug_assert_eq!(aggregate.version(), version + decided.len() as u64);

        self.staged.push(StreamAppend {
            aggregate_id,
            expected_version: ExpectedVersion::Exact(version),
            events: to_uncommitted(aggregate_id, aggregate_type, &decided)?,
        });

        Ok(aggregate)
    }

    pub fn is_staged(&self, aggregate_id: AggregateId) -> bool {
        self.staged.iter().any(|s| s.aggregate_id == aggregate_id)
    }

    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }

    /// Append every staged stream atomically, then publish in commit order.
    pub fn commit(self) -> Result<Vec<StoredEvent>, DispatchError> {
        if self.staged.is_empty() {
            return Ok(vec![]);
        }
        let _commit = self.dispatcher.commit_guard();
        let committed = self.dispatcher.store().append_batch(self.staged)?;
        self.dispatcher.publish(&committed)?;
        Ok(committed)
    }
}
