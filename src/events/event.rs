//! # Event and state traits.
//!
//! [`Event`] marks a concrete, immutable input message. Routing is by exact
//! runtime type: the container resolves each event's `TypeId` against the
//! handler table built at registration time, so dispatch is a map lookup plus
//! a downcast that cannot fail by construction. There is no base-type
//! walking; an event type without a registration is dropped.
//!
//! [`State`] is the bound every container state must satisfy. States are
//! compared by value equality to suppress duplicate emissions, cloned into
//! the broadcast channel, and rendered through `Debug` for the global
//! observer.
//!
//! ## Example
//! ```
//! use stateflow::Event;
//!
//! #[derive(Debug)]
//! struct Increment {
//!     amount: i64,
//! }
//!
//! impl Event for Increment {}
//!
//! let ev: &dyn Event = &Increment { amount: 2 };
//! assert!(ev.downcast_ref::<Increment>().is_some());
//! ```

use std::any::Any;
use std::fmt;

/// Marker trait for container events.
///
/// Implement on each concrete event type (typically a small struct, one per
/// logical input). Events are created by the caller, moved into the
/// container, and never retained beyond the handler invocation that consumes
/// them.
pub trait Event: Any + Send + Sync + fmt::Debug {}

impl dyn Event {
    /// Returns a typed view of the event if it is exactly `T`.
    pub fn downcast_ref<T: Event>(&self) -> Option<&T> {
        let any: &dyn Any = self;
        any.downcast_ref::<T>()
    }

    /// Returns `true` if the event's concrete type is exactly `T`.
    pub fn is<T: Event>(&self) -> bool {
        let any: &dyn Any = self;
        any.is::<T>()
    }
}

/// Bound for container state values.
///
/// States are immutable-by-convention values: cloned on read and on publish,
/// compared by value equality for duplicate suppression, and `Debug`-rendered
/// for the global observer. Blanket-implemented; never implement manually.
pub trait State: Clone + PartialEq + fmt::Debug + Send + Sync + 'static {}

impl<T> State for T where T: Clone + PartialEq + fmt::Debug + Send + Sync + 'static {}
