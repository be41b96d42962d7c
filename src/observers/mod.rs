//! Process-wide auditing observers.

mod log;
mod observer;

pub use log::LogObserver;
pub use observer::{NoopObserver, Observe};
