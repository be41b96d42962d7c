//! # Emitter: the handle a handler uses to produce states.
//!
//! Each handler invocation rents an [`EmitterSlot`] from the container's
//! freelist and receives an [`Emitter`] bound to it. The slot carries
//! everything an emission needs: a weak handle to the container, the
//! triggering event (for transition auditing), and the invocation's
//! cancellation token.
//!
//! ## Generation guard
//! Slots are reused across invocations. Every activation bumps the slot's
//! generation counter and each `Emitter` remembers the generation it was
//! created under, so a handle leaked past its invocation observes a
//! mismatch and is rejected — use-after-complete can never write into a
//! reused slot.
//!
//! ## Rejection rules
//! `emit` fails with [`ContainerError::Closed`] when the invocation has
//! completed, the slot was re-activated, or the container is disposed or
//! dropped; it fails with [`ContainerError::Canceled`] when the invocation's
//! token has fired (restartable supersession or disposal).

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use tokio_util::sync::CancellationToken;

use crate::error::ContainerError;
use crate::events::{Event, State};

use super::container::Inner;
use super::pool::lock;

/// Pooled backing storage for one in-flight invocation's emitter.
pub(crate) struct EmitterSlot<S> {
    container: Mutex<Weak<Inner<S>>>,
    event: Mutex<Option<Arc<dyn Event>>>,
    token: Mutex<Option<CancellationToken>>,
    generation: AtomicU64,
    completed: AtomicBool,
}

impl<S> Default for EmitterSlot<S> {
    fn default() -> Self {
        Self {
            container: Mutex::new(Weak::new()),
            event: Mutex::new(None),
            token: Mutex::new(None),
            generation: AtomicU64::new(0),
            completed: AtomicBool::new(true),
        }
    }
}

impl<S: State> EmitterSlot<S> {
    /// Binds the slot to a new invocation and returns its generation.
    pub(crate) fn activate(
        &self,
        container: Weak<Inner<S>>,
        event: Option<Arc<dyn Event>>,
        token: Option<CancellationToken>,
    ) -> u64 {
        *lock(&self.container) = container;
        *lock(&self.event) = event;
        *lock(&self.token) = token;
        self.completed.store(false, Ordering::SeqCst);
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Marks the invocation finished; further emits through any handle fail.
    pub(crate) fn complete(&self) {
        self.completed.store(true, Ordering::SeqCst);
    }

    /// Drops the invocation's references so pooling cannot leak them.
    pub(crate) fn clear(&self) {
        *lock(&self.container) = Weak::new();
        *lock(&self.event) = None;
        *lock(&self.token) = None;
    }

    /// Validates a handle's generation and liveness, returning the container.
    fn guard(&self, generation: u64) -> Result<Arc<Inner<S>>, ContainerError> {
        if self.completed.load(Ordering::SeqCst)
            || self.generation.load(Ordering::SeqCst) != generation
        {
            return Err(ContainerError::Closed);
        }
        if let Some(token) = lock(&self.token).as_ref() {
            if token.is_cancelled() {
                return Err(ContainerError::Canceled);
            }
        }
        lock(&self.container)
            .upgrade()
            .ok_or(ContainerError::Closed)
    }

    fn emit(&self, generation: u64, next: S) -> Result<(), ContainerError> {
        let inner = self.guard(generation)?;
        let event = lock(&self.event).clone();
        inner.apply(event.as_deref(), next)
    }
}

/// Handle bound to exactly one in-flight handler invocation.
///
/// Valid until the invocation completes; afterwards every call fails with
/// [`ContainerError::Closed`].
pub struct Emitter<S> {
    slot: Arc<EmitterSlot<S>>,
    generation: u64,
}

impl<S: State> Emitter<S> {
    pub(crate) fn new(slot: Arc<EmitterSlot<S>>, generation: u64) -> Self {
        Self { slot, generation }
    }

    /// Emits a new state.
    ///
    /// A state equal to the current one is a silent no-op once at least one
    /// emission has occurred. Failures route through the container's error
    /// path and come back as `Err` — propagate them with `?`.
    pub fn emit(&self, state: S) -> Result<(), ContainerError> {
        self.slot.emit(self.generation, state)
    }

    /// Reads the container's current state.
    pub fn state(&self) -> Result<S, ContainerError> {
        let inner = self.slot.guard(self.generation)?;
        Ok(inner.snapshot())
    }

    /// Reports a fault without producing a state. Fire-and-forget.
    pub fn add_error(&self, error: ContainerError) {
        if let Ok(inner) = self.slot.guard(self.generation) {
            inner.error_path(&error);
        }
    }

    /// Returns `true` once the owning invocation has completed.
    pub fn is_done(&self) -> bool {
        self.slot.guard(self.generation).is_err()
    }
}
