//! Fan-out of committed events to the read models.
//!
//! Every committed checkout or stock movement is published here once it is
//! durable. The bus keeps nothing: read models skip envelopes they already applied,
//! and on startup they are rebuilt from the store.

use std::sync::Arc;
use std::sync::mpsc::Receiver;

/// One consumer's queue. Every subscription sees every message, in publish order.
///
/// The API drains one on a blocking thread into the live read models:
///
/// ```ignore
/// let sub = bus.subscribe();
/// while let Ok(envelope) = sub.recv() {
///     projections.apply(&envelope);
/// }
/// ```
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: Receiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: Receiver<M>) -> Self {
        Self { receiver }
    }

    /// Block until the next message arrives or the bus is dropped.
    pub fn recv(&self) -> Result<M, std::sync::mpsc::RecvError> {
        self.receiver.recv()
    }

    pub fn try_recv(&self) -> Result<M, std::sync::mpsc::TryRecvError> {
        self.receiver.try_recv()
    }
}

/// Broadcast of committed events.
///
/// ```text
/// checkout → event store (append) → bus (publish) → read models
/// ```
///
/// Callers publish only after a successful append and in append order, so a
/// failed publish loses nothing that a rebuild from the store would not restore.
pub trait EventBus<M>: Send + Sync {
    type Error: core::fmt::Debug + Send + Sync + 'static;

    fn publish(&self, message: M) -> Result<(), Self::Error>;

    fn subscribe(&self) -> Subscription<M>;
}

impl<M, B> EventBus<M> for Arc<B>
where
    B: EventBus<M> + ?Sized,
{
    type Error = B::Error;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        (**self).publish(message)
    }

    fn subscribe(&self) -> Subscription<M> {
        (**self).subscribe()
    }
}
