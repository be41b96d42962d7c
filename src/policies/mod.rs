//! Scheduling policies for overlapping events of the same type.

mod concurrency;

pub use concurrency::ConcurrencyMode;
