//! Error types used by the container runtime and event handlers.
//!
//! A single enum, [`ContainerError`], covers the whole fault taxonomy:
//!
//! - [`ContainerError::Closed`] — emission or submission after `dispose()`.
//! - [`ContainerError::Canceled`] — the invocation's cancellation token fired
//!   (container disposal or a restartable-lane supersession).
//! - [`ContainerError::DuplicateHandler`] — two handlers registered for the
//!   same concrete event type; rejected at build time.
//! - [`ContainerError::Handler`] — a fault raised inside a handler body, or
//!   reported explicitly via `add_error`.
//!
//! Helper methods (`as_label`, `as_message`) provide stable strings for
//! logs/metrics.

use thiserror::Error;

/// Errors produced by the container runtime and by event handlers.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContainerError {
    /// The container (or its emission channel) is closed; no further states
    /// may be emitted and no further events accepted.
    #[error("cannot emit new states after dispose")]
    Closed,

    /// The invocation was cancelled before completion.
    ///
    /// Raised when a restartable lane supersedes an in-flight handler, or
    /// when disposal cancels the runtime token. Treated as a graceful stop,
    /// not a fault: it does not ring the error hooks.
    #[error("invocation cancelled")]
    Canceled,

    /// A second handler was registered for an event type that already has
    /// one. Registration is by exact type and each type takes at most one
    /// handler.
    #[error("duplicate handler registered for event type `{event}`")]
    DuplicateHandler {
        /// Type name of the offending event.
        event: &'static str,
    },

    /// A handler body failed, or a caller reported a fault via `add_error`.
    #[error("handler failed: {reason}")]
    Handler {
        /// Human-readable failure description.
        reason: String,
    },
}

impl ContainerError {
    /// Builds a [`ContainerError::Handler`] from any displayable reason.
    ///
    /// # Example
    /// ```
    /// use stateflow::ContainerError;
    ///
    /// let err = ContainerError::handler("overflow");
    /// assert_eq!(err.as_label(), "handler_failed");
    /// ```
    pub fn handler(reason: impl Into<String>) -> Self {
        ContainerError::Handler {
            reason: reason.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use stateflow::ContainerError;
    ///
    /// assert_eq!(ContainerError::Closed.as_label(), "container_closed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ContainerError::Closed => "container_closed",
            ContainerError::Canceled => "invocation_canceled",
            ContainerError::DuplicateHandler { .. } => "duplicate_handler",
            ContainerError::Handler { .. } => "handler_failed",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            ContainerError::Closed => "closed: emission rejected".to_string(),
            ContainerError::Canceled => "cancelled before completion".to_string(),
            ContainerError::DuplicateHandler { event } => {
                format!("duplicate handler for `{event}`")
            }
            ContainerError::Handler { reason } => format!("handler fault: {reason}"),
        }
    }

    /// Indicates whether the error is a scheduling outcome rather than a
    /// fault. Cancellation does not flow through the error hooks.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, ContainerError::Canceled)
    }
}
