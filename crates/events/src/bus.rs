//! Event distribution abstraction (mechanics only).
//!
//! The bus is the transport layer for event objects after a save completes:
//! extraction produces them, the bus fans them out to consumers. It makes
//! minimal assumptions; implementations may be in-memory channels or a real
//! message transport. Delivery is at-least-once; consumers must be
//! idempotent.

use std::sync::Arc;
use std::sync::mpsc::Receiver;

/// A subscription to a published-event stream.
///
/// Each subscription receives a copy of every message published after it was
/// created (broadcast semantics). Intended for single-threaded consumption.
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: Receiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: Receiver<M>) -> Self {
        Self { receiver }
    }

    /// Block until the next message is available.
    pub fn recv(&self) -> Result<M, std::sync::mpsc::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a message without blocking.
    pub fn try_recv(&self) -> Result<M, std::sync::mpsc::TryRecvError> {
        self.receiver.try_recv()
    }
}

/// Publish/subscribe contract for post-save event distribution.
///
/// Publication failures are surfaced to the caller (the save pipeline), which
/// reports them without unwinding the already-committed write; events can be
/// re-published from the entities' next unit-of-work or an outbox.
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
