//! # Change and transition records.
//!
//! Both types describe a single accepted emission and are handed to hooks by
//! reference. Neither is retained by the container.
//!
//! - [`Change`] pairs the previous and next state.
//! - [`Transition`] additionally carries the triggering event, so it only
//!   exists for event-driven emissions (never for a bare `emit` outside a
//!   handler). It borrows its fields, which keeps it ephemeral by
//!   construction.

use super::event::Event;

/// A `(previous, next)` state pair for one accepted emission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change<S> {
    /// State before the emission was applied.
    pub previous: S,
    /// State after the emission was applied.
    pub next: S,
}

/// A `(previous, event, next)` triple for one accepted emission.
///
/// Richer than [`Change`] because it retains the identity of the event whose
/// handler produced the state.
#[derive(Debug, Clone, Copy)]
pub struct Transition<'a, S> {
    /// State before the emission was applied.
    pub previous: &'a S,
    /// Event whose handler produced `next`.
    pub event: &'a dyn Event,
    /// State after the emission was applied.
    pub next: &'a S,
}
