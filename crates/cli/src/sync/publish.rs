// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Push-based publication of state and events.
//!
//! Each component owns its state and publishes immutable values outward.
//! Consumers subscribe once and receive every update in order; nothing is
//! polled and nothing is dropped while the subscription is alive.

use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use futures_util::Stream;
use tokio::sync::mpsc;

/// Lock a std mutex, recovering the data if a holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A consumer's handle on a publisher.
///
/// After [`Subscription::cancel`] returns, no further values are yielded.
/// Dropping the handle unregisters it on the publisher's next send.
pub struct Subscription<T> {
    rx: mpsc::UnboundedReceiver<T>,
    cancelled: bool,
}

impl<T> Subscription<T> {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<T>) -> Self {
        Subscription {
            rx,
            cancelled: false,
        }
    }

    /// Wait for the next value.
    ///
    /// Returns `None` once cancelled or when the publisher is gone.
    pub async fn next(&mut self) -> Option<T> {
        if self.cancelled {
            return None;
        }
        self.rx.recv().await
    }

    /// Take the next value if one is already buffered.
    pub fn try_next(&mut self) -> Option<T> {
        if self.cancelled {
            return None;
        }
        self.rx.try_recv().ok()
    }

    /// Stop receiving. Idempotent.
    pub fn cancel(&mut self) {
        self.cancelled = true;
        self.rx.close();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}

impl<T> Stream for Subscription<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        let this = self.get_mut();
        if this.cancelled {
            return Poll::Ready(None);
        }
        this.rx.poll_recv(cx)
    }
}

struct StateInner<T> {
    current: T,
    subscribers: Vec<mpsc::UnboundedSender<T>>,
}

/// Publisher of a single current value.
///
/// New subscribers receive the current value immediately, then every change.
/// Publishing a value equal to the current one is a no-op.
pub struct StatePublisher<T> {
    inner: Arc<Mutex<StateInner<T>>>,
}

impl<T> Clone for StatePublisher<T> {
    fn clone(&self) -> Self {
        StatePublisher {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + PartialEq + Send + 'static> StatePublisher<T> {
    pub fn new(initial: T) -> Self {
        StatePublisher {
            inner: Arc::new(Mutex::new(StateInner {
                current: initial,
                subscribers: Vec::new(),
            })),
        }
    }

    /// The last published value.
    pub fn get(&self) -> T {
        lock(&self.inner).current.clone()
    }

    pub fn subscribe(&self) -> Subscription<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = lock(&self.inner);
        // Cannot fail: rx is alive
        let _ = tx.send(inner.current.clone());
        inner.subscribers.push(tx);
        Subscription::new(rx)
    }

    /// Publish a new value. Returns false if it equals the current one.
    pub fn publish(&self, value: T) -> bool {
        let mut inner = lock(&self.inner);
        if inner.current == value {
            return false;
        }
        inner.current = value.clone();
        inner.subscribers.retain(|tx| tx.send(value.clone()).is_ok());
        true
    }

    /// Number of live subscribers as of the last send.
    pub fn subscriber_count(&self) -> usize {
        let mut inner = lock(&self.inner);
        inner.subscribers.retain(|tx| !tx.is_closed());
        inner.subscribers.len()
    }
}

/// Publisher of discrete events with no current value.
pub struct EventPublisher<T> {
    subscribers: Arc<Mutex<Vec<mpsc::UnboundedSender<T>>>>,
}

impl<T> Clone for EventPublisher<T> {
    fn clone(&self) -> Self {
        EventPublisher {
            subscribers: Arc::clone(&self.subscribers),
        }
    }
}

impl<T> Default for EventPublisher<T> {
    fn default() -> Self {
        EventPublisher {
            subscribers: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl<T: Clone + Send + 'static> EventPublisher<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to events emitted from now on.
    pub fn subscribe(&self) -> Subscription<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        lock(&self.subscribers).push(tx);
        Subscription::new(rx)
    }

    /// Deliver an event to every live subscriber.
    pub fn emit(&self, event: T) {
        lock(&self.subscribers).retain(|tx| tx.send(event.clone()).is_ok());
    }
}

#[cfg(test)]
#[path = "publish_tests.rs"]
mod tests;
