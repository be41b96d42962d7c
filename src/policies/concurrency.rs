//! # Concurrency modes for asynchronous event handlers.
//!
//! [`ConcurrencyMode`] decides what happens when a new event of a type
//! arrives while a previous event of the *same* type still has a handler in
//! flight. It only matters for suspending (async) handlers — synchronous
//! handlers always run to completion before the next event is considered.
//!
//! The mode is selected per registration; different event types on the same
//! container schedule independently and never interact with each other's
//! lanes.
//!
//! ## Choosing the right mode
//!
//! **Ordered processing** (default):
//! ```text
//! ConcurrencyMode::Sequential   → queue; one at a time, arrival order
//! ```
//!
//! **Independent work items**:
//! ```text
//! ConcurrencyMode::Concurrent   → every event starts immediately
//! ```
//!
//! **Debounce-style inputs** (ignore repeats while busy):
//! ```text
//! ConcurrencyMode::Droppable    → discard arrivals while one is in flight
//! ```
//!
//! **Latest-wins inputs** (search-as-you-type, refresh):
//! ```text
//! ConcurrencyMode::Restartable  → cancel the in-flight handler, start new
//! ```

/// Policy governing overlap of same-typed in-flight event handlers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConcurrencyMode {
    /// Queue events and process them strictly one at a time, in arrival
    /// order. A new event waits for the current handler to finish (default).
    Sequential,
    /// Start every event's handler immediately; no ordering guarantee
    /// between completions.
    Concurrent,
    /// While a handler for this type is in flight, discard newly arriving
    /// events of the same type without invoking the handler.
    Droppable,
    /// Cancel the in-flight handler (via its cancellation token) when a new
    /// event of the same type arrives, then start the new one. A cancelled
    /// handler can no longer emit.
    Restartable,
}

impl Default for ConcurrencyMode {
    /// Returns [`ConcurrencyMode::Sequential`].
    fn default() -> Self {
        ConcurrencyMode::Sequential
    }
}

impl ConcurrencyMode {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ConcurrencyMode::Sequential => "sequential",
            ConcurrencyMode::Concurrent => "concurrent",
            ConcurrencyMode::Droppable => "droppable",
            ConcurrencyMode::Restartable => "restartable",
        }
    }
}
