//! Event and state value types plus the emission channel.

mod change;
mod channel;
mod event;

pub use change::{Change, Transition};
pub use channel::{Channel, Subscription};
pub use event::{Event, State};
