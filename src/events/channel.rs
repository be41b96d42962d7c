//! # Emission channel: broadcast of accepted states.
//!
//! [`Channel`] is a thin wrapper around [`tokio::sync::broadcast`] with an
//! explicit close flag:
//!
//! - **No replay**: a subscriber only receives states published after it
//!   subscribed. The container separately exposes `state()` for the
//!   synchronous initial read, so a caller using both paths sees a value at
//!   least once even before any emission.
//! - **Closed is loud**: `publish` after `close()` returns
//!   [`ContainerError::Closed`] instead of silently dropping — emitting into
//!   a closed channel is a lifecycle bug in the caller.
//! - **Idempotent close**: `close()` may be called any number of times.
//! - **Lag handling**: a subscriber that falls behind the channel capacity
//!   skips the oldest states (`RecvError::Lagged`).

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::error::ContainerError;

use super::event::State;

/// Broadcast channel for accepted states.
///
/// Cheap to share behind the container; publishers and subscribers never
/// block each other.
#[derive(Debug)]
pub struct Channel<S> {
    tx: broadcast::Sender<S>,
    closed: AtomicBool,
}

impl<S: State> Channel<S> {
    /// Creates a channel with the given capacity (clamped to at least 1).
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel::<S>(capacity.max(1));
        Self {
            tx,
            closed: AtomicBool::new(false),
        }
    }

    /// Publishes a state to all active subscribers.
    ///
    /// Returns [`ContainerError::Closed`] if the channel has been closed.
    /// With no subscribers the state is dropped; that is not an error.
    pub fn publish(&self, state: S) -> Result<(), ContainerError> {
        if self.is_closed() {
            return Err(ContainerError::Closed);
        }
        let _ = self.tx.send(state);
        Ok(())
    }

    /// Creates an independent receiver observing subsequent states only.
    pub fn subscribe(&self) -> broadcast::Receiver<S> {
        self.tx.subscribe()
    }

    /// Closes the channel. Idempotent; further publishes are rejected.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// Returns `true` once [`close`](Channel::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Handle to a callback subscription created via `Container::subscribe_with`.
///
/// Dropping the handle leaves the listener running for the container's
/// lifetime; call [`dispose`](Subscription::dispose) to stop it early.
#[derive(Debug)]
pub struct Subscription {
    handle: JoinHandle<()>,
}

impl Subscription {
    pub(crate) fn new(handle: JoinHandle<()>) -> Self {
        Self { handle }
    }

    /// Stops delivery to this subscriber.
    pub fn dispose(self) {
        self.handle.abort();
    }
}
