//! # Observer: process-wide auditing hook.
//!
//! [`Observe`] is the extension point for auditing **every** container in a
//! process: lifecycle, accepted changes, and faults. One observer instance is
//! typically shared by all containers (metrics export, structured logging,
//! alerting).
//!
//! ```text
//! Container A ──┐
//! Container B ──┼──► Arc<dyn Observe> ──► metrics / logs / alerts
//! Container C ──┘
//! ```
//!
//! The observer is an explicitly injected handle, not ambient global state:
//! pass the same `Arc<dyn Observe>` to each `ContainerBuilder` at
//! construction. The default is [`NoopObserver`].
//!
//! Because one observer serves containers of every state type, callbacks
//! receive erased views: the container's configured name plus a `Debug`
//! rendering of the change.
//!
//! ## Contract
//! - Callbacks run synchronously on the emitting path, *after* the
//!   container's local hook (local-before-global ordering). Keep them cheap;
//!   offload slow work.
//! - Callbacks must not assume any container-specific locking; they may be
//!   invoked from any container on any task.
//!
//! ## Example
//! ```
//! use stateflow::{ContainerError, Observe};
//!
//! struct Metrics;
//!
//! impl Observe for Metrics {
//!     fn on_error(&self, container: &str, error: &ContainerError) {
//!         println!("[metrics] container={container} error={}", error.as_label());
//!     }
//! }
//! ```

use std::fmt;

use crate::error::ContainerError;

/// Contract for process-wide container auditing.
///
/// All methods default to no-ops; implement only what you need.
pub trait Observe: Send + Sync + 'static {
    /// A container was constructed.
    fn on_create(&self, _container: &str) {}

    /// A container accepted an emission. `change` renders as
    /// `Change { previous: .., next: .. }`.
    fn on_change(&self, _container: &str, _change: &dyn fmt::Debug) {}

    /// A fault was routed through a container's error path.
    fn on_error(&self, _container: &str, _error: &ContainerError) {}

    /// A container was disposed.
    fn on_dispose(&self, _container: &str) {}
}

/// Observer that ignores everything (the default).
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl Observe for NoopObserver {}
