//! Publish/subscribe seam for domain events.
//!
//! Delivery is at-least-once with broadcast semantics: every subscription
//! receives its own copy of every message published after it subscribed.
//! Consumers must tolerate duplicates.

use std::sync::Arc;
use std::sync::mpsc::Receiver;

/// Receiving end of a bus subscription. Meant for a single consumer thread.
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: Receiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: Receiver<M>) -> Self {
        Self { receiver }
    }

    /// Drain everything currently queued without blocking.
    pub fn drain(&self) -> Vec<M> {
        self.receiver.try_iter().collect()
    }
}

/// Transport-agnostic event bus.
///
/// Records are saved before their events are published, so a failed publish
/// never loses state; the caller decides whether to retry.
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
