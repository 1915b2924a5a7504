use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::Value as JsonValue;
use thiserror::Error;

use arkpos_core::AggregateId;

use crate::EventEnvelope;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProjectionError {
    #[error("failed to deserialize {aggregate_type} event: {message}")]
    Deserialize {
        aggregate_type: String,
        message: String,
    },

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },

    #[error("inconsistent event: {0}")]
    Inconsistent(String),
}

impl ProjectionError {
    pub fn deserialize(aggregate_type: &str, err: impl core::fmt::Display) -> Self {
        Self::Deserialize {
            aggregate_type: aggregate_type.to_string(),
            message: err.to_string(),
        }
    }
}

/// Builds a disposable read model from committed JSON envelopes.
///
/// Projections are idempotent: an envelope at or below the stream cursor is skipped,
/// so at-least-once delivery from the bus is safe. A read model can always be thrown
/// away and rebuilt from the event log.
pub trait Projection: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether envelopes of this aggregate type feed the projection.
    fn handles(&self, aggregate_type: &str) -> bool;

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError>;

    /// Drop all state, cursors included.
    fn reset(&self);

    /// Reset, then replay `envelopes` (global append order).
    fn rebuild(&self, envelopes: &[EventEnvelope<JsonValue>]) -> Result<(), ProjectionError> {
        self.reset();
        for env in envelopes.iter().filter(|e| self.handles(e.aggregate_type())) {
            self.apply_envelope(env)?;
        }
        Ok(())
    }
}

/// Per-stream high-water marks used for deduplication.
#[derive(Debug, Default)]
pub struct StreamCursors {
    inner: RwLock<HashMap<AggregateId, u64>>,
}

impl StreamCursors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, aggregate_id: AggregateId) -> u64 {
        self.inner
            .read()
            .ok()
            .and_then(|m| m.get(&aggregate_id).copied())
            .unwrap_or(0)
    }

    /// `Ok(true)` when `sequence_number` is the next one to apply, `Ok(false)` for a
    /// duplicate, and an error on a gap.
    pub fn is_next(&self, aggregate_id: AggregateId, sequence_number: u64) -> Result<bool, ProjectionError> {
        let last = self.get(aggregate_id);
        if sequence_number == 0 {
            return Err(ProjectionError::NonMonotonicSequence { last, found: 0 });
        }
        if sequence_number <= last {
            return Ok(false);
        }
        if sequence_number != last + 1 {
            return Err(ProjectionError::NonMonotonicSequence {
                last,
                found: sequence_number,
            });
        }
        Ok(true)
    }

    pub fn advance(&self, aggregate_id: AggregateId, sequence_number: u64) {
        if let Ok(mut m) = self.inner.write() {
            m.insert(aggregate_id, sequence_number);
        }
    }

    pub fn clear(&self) {
        if let Ok(mut m) = self.inner.write() {
            m.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_accepts_next_and_skips_duplicates() {
        let cursors = StreamCursors::new();
        let id = AggregateId::new();

        assert!(cursors.is_next(id, 1).unwrap());
        cursors.advance(id, 1);
        assert!(!cursors.is_next(id, 1).unwrap());
        assert!(cursors.is_next(id, 2).unwrap());
    }

    #[test]
    fn cursor_rejects_gaps_and_zero() {
        let cursors = StreamCursors::new();
        let id = AggregateId::new();

        assert_eq!(
            cursors.is_next(id, 3),
            Err(ProjectionError::NonMonotonicSequence { last: 0, found: 3 })
        );
        assert!(cursors.is_next(id, 0).is_err());
    }

    #[test]
    fn clear_forgets_positions() {
        let cursors = StreamCursors::new();
        let id = AggregateId::new();
        cursors.advance(id, 5);
        cursors.clear();
        assert_eq!(cursors.get(id), 0);
    }
}
