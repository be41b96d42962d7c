//! # Local auditing hooks.
//!
//! [`Hooks`] is the per-container counterpart of the process-wide
//! [`Observe`](crate::Observe) trait: one implementation per container,
//! receiving its raw lifecycle in typed form. All methods default to no-ops.
//!
//! ## Invocation order
//! For an accepted emission: `on_transition` (event-driven emissions only) →
//! `on_change` → global observer `on_change`. For a fault: `on_error` →
//! global observer `on_error`, after which the original fault still
//! propagates to whoever triggered it.
//!
//! ## Reentrancy contract
//! `on_change` and `on_transition` run inside the container's state
//! mutual-exclusion region — they must not call back into the container.
//! `on_event`, `on_error`, and `on_event_done` run outside the region, so
//! submitting a recovery event from `on_error` is supported.

use crate::error::ContainerError;
use crate::events::{Change, Event, Transition};

/// Per-container lifecycle hooks.
pub trait Hooks<S>: Send + Sync + 'static {
    /// An event was accepted for dispatch (before the handler runs).
    fn on_event(&self, _event: &dyn Event) {}

    /// An emission was accepted; fires once per state change.
    fn on_change(&self, _change: &Change<S>) {}

    /// An event-driven emission was accepted; carries the triggering event.
    fn on_transition(&self, _transition: &Transition<'_, S>) {}

    /// A fault was routed through the error path.
    fn on_error(&self, _error: &ContainerError) {}

    /// An event's handler invocation finished (normally or faulted).
    fn on_event_done(&self, _event: &dyn Event) {}
}

/// Hooks implementation that ignores everything (the default).
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHooks;

impl<S> Hooks<S> for NoopHooks {}
