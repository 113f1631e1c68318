//! Outbound messages that survive a transport failure.

use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};

use futures::Stream;
use futures::stream::BoxStream;

type Slot<M> = Arc<Mutex<Option<BoxStream<'static, M>>>>;

/// The request messages of one call.
///
/// Each attempt gets a [`Replay`] view. The first view the transport polls
/// takes the messages; until then they stay in the slot and a later attempt
/// can send them.
pub(super) struct Outbound<M> {
    slot: Slot<M>,
}

impl<M> Outbound<M> {
    pub(super) fn new<S>(messages: S) -> Self
    where
        S: Stream<Item = M> + Send + 'static,
    {
        let messages: BoxStream<'static, M> = Box::pin(messages);
        Self {
            slot: Arc::new(Mutex::new(Some(messages))),
        }
    }

    /// A stream over the messages for the next attempt.
    pub(super) fn replay(&self) -> Replay<M> {
        Replay {
            slot: self.slot.clone(),
            active: None,
        }
    }

    /// Whether no attempt has read the messages yet.
    pub(super) fn is_untouched(&self) -> bool {
        lock(&self.slot).is_some()
    }
}

/// Request stream handed to the transport for one attempt.
pub(super) struct Replay<M> {
    slot: Slot<M>,
    active: Option<BoxStream<'static, M>>,
}

impl<M> Stream for Replay<M> {
    type Item = M;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<M>> {
        let this = self.get_mut();
        if this.active.is_none() {
            this.active = lock(&this.slot).take();
        }
        match this.active.as_mut() {
            Some(messages) => messages.as_mut().poll_next(cx),
            // Another attempt already took the messages.
            None => Poll::Ready(None),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
