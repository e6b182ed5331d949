//! Event publishing/subscription abstraction (mechanics only).
//!
//! The engine publishes every stage transition on an [`EventBus`]; UIs, log
//! writers and tests subscribe. The engine itself holds no display state.
//!
//! - **Broadcast**: every subscription receives every message published after
//!   it subscribed.
//! - **Ordered**: a single publisher's messages arrive in publication order.
//! - **No persistence**: late subscribers miss earlier messages.

use std::sync::Arc;
use std::sync::mpsc::{Receiver, RecvError, RecvTimeoutError, TryRecvError};
use std::time::Duration;

/// A subscription to an event stream.
///
/// ```ignore
/// let subscription = bus.subscribe();
///
/// while let Ok(envelope) = subscription.recv() {
///     println!("{}", envelope.payload());
///     if envelope.payload().is_terminal() {
///         break;
///     }
/// }
/// ```
///
/// `recv` blocks the calling thread; async consumers should read from
/// `spawn_blocking` or use `try_recv`/`drain`.
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: Receiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: Receiver<M>) -> Self {
        Self { receiver }
    }

    /// Block until the next message is available.
    pub fn recv(&self) -> Result<M, RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a message without blocking.
    pub fn try_recv(&self) -> Result<M, TryRecvError> {
        self.receiver.try_recv()
    }

    /// Block for up to `timeout` waiting for a message.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<M, RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Take every message that is already queued.
    pub fn drain(&self) -> Vec<M> {
        self.receiver.try_iter().collect()
    }
}

/// Publish-subscribe transport for engine events.
///
/// `publish()` can fail (e.g. a poisoned lock). Publishers treat failures as
/// non-fatal: events are a side channel, never part of a job's result.
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
