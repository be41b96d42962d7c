//! # stateflow
//!
//! **stateflow** is an event-driven state container library for Rust.
//!
//! External actors submit typed **events**; one declarative handler per event
//! type computes zero or more new **states**, which are broadcast to
//! subscribers. Handlers may suspend, and overlapping events of the same
//! type are scheduled by a per-registration [`ConcurrencyMode`].
//!
//! ## Architecture
//! ```text
//!   submit(EventA)   submit(EventB)   submit(EventC)
//!        │                │                │
//!        ▼                ▼                ▼
//! ┌───────────────────────────────────────────────────────────────┐
//! │  Container<S>                                                 │
//! │  - handler table (exact event type → handler + mode)          │
//! │  - state cell (value equality suppresses duplicate emissions) │
//! │  - emission channel (broadcast to subscribers)                │
//! │  - pools (execution contexts, emitter slots)                  │
//! └──────┬──────────────────┬──────────────────┬──────────────────┘
//!        ▼                  ▼                  ▼
//!   [lane: inline]   [lane: sequential]  [lane: restartable]
//!   sync handler      queue + worker      cancel + respawn
//!        │                  │                  │
//!        │   emit(state)    │   emit(state)    │
//!        ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────┐
//! │ apply(): transition/change hooks → observer → publish          │
//! └───────────────────────────────┬───────────────────────────────┘
//!                                 ▼
//!                     ┌───────────────────────┐
//!                     │   emission channel     │
//!                     └───┬───────────────┬───┘
//!                         ▼               ▼
//!                   subscriber 1 ... subscriber N
//! ```
//!
//! ## Lifecycle
//! ```text
//! Container::builder(initial)
//!   .on::<Ev>(handler)                      sync, inline
//!   .on_async::<Ev>(mode, handler)          suspending, per-mode lane
//!   .hooks(...) .observer(...) .config(...)
//!   .build()?                               duplicate types rejected here
//!
//! submit(event)
//!   ├─► lookup by exact type (miss → dropped)
//!   ├─► on_event hook
//!   └─► lane dispatch → handler → emit*(state) → broadcast
//!
//! dispose()                                 idempotent, terminal
//!   ├─► cancel runtime token (in-flight handlers can no longer emit)
//!   ├─► close emission channel (publish-after-close is an error)
//!   └─► observer.on_dispose
//! ```
//!
//! ## Features
//! | Area             | Description                                              | Key types / traits                     |
//! |------------------|----------------------------------------------------------|----------------------------------------|
//! | **Containers**   | Own state, dispatch events, broadcast accepted states.   | [`Container`], [`ContainerBuilder`]    |
//! | **Events**       | Typed messages routed by exact runtime type.             | [`Event`], [`State`]                   |
//! | **Emission**     | Pooled per-invocation handle handlers emit through.      | [`Emitter`]                            |
//! | **Scheduling**   | Overlap policy for same-typed suspending handlers.       | [`ConcurrencyMode`]                    |
//! | **Auditing**     | Local hooks and a process-wide observer.                 | [`Hooks`], [`Observe`], [`LogObserver`]|
//! | **Errors**       | One fault taxonomy for lifecycle and handler errors.     | [`ContainerError`]                     |
//!
//! ## Example
//! ```rust
//! use stateflow::{Container, ContainerError, Event};
//!
//! #[derive(Debug)]
//! struct Increment {
//!     amount: i64,
//! }
//! impl Event for Increment {}
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), ContainerError> {
//!     let counter = Container::builder(0i64)
//!         .on::<Increment, _>(|event, emitter| {
//!             let current = emitter.state()?;
//!             emitter.emit(current + event.amount)
//!         })
//!         .build()?;
//!
//!     let mut states = counter.subscribe();
//!     counter.submit(Increment { amount: 2 })?;
//!     counter.submit(Increment { amount: 3 })?;
//!
//!     assert_eq!(states.recv().await, Ok(2));
//!     assert_eq!(states.recv().await, Ok(5));
//!     assert_eq!(counter.state(), 5);
//!
//!     counter.dispose();
//!     Ok(())
//! }
//! ```

mod config;
mod core;
mod error;
mod events;
mod observers;
mod policies;

// ---- Public re-exports ----

pub use config::ContainerConfig;
pub use core::{Container, ContainerBuilder, ContainerStats, Emitter, Hooks, NoopHooks};
pub use error::ContainerError;
pub use events::{Change, Event, State, Subscription, Transition};
pub use observers::{LogObserver, NoopObserver, Observe};
pub use policies::ConcurrencyMode;
