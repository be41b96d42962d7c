//! # Simple logging observer for debugging and demos.
//!
//! [`LogObserver`] prints container activity to stdout in a human-readable
//! format:
//!
//! ```text
//! [create] container=counter
//! [change] container=counter Change { previous: 0, next: 2 }
//! [error] container=counter label=handler_failed msg="handler fault: overflow"
//! [dispose] container=counter
//! ```
//!
//! Useful for development and examples. Not intended for production use —
//! implement a custom [`Observe`] for structured logging or metrics.

use std::fmt;

use crate::error::ContainerError;

use super::observer::Observe;

/// Stdout logging observer.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl Observe for LogObserver {
    fn on_create(&self, container: &str) {
        println!("[create] container={container}");
    }

    fn on_change(&self, container: &str, change: &dyn fmt::Debug) {
        println!("[change] container={container} {change:?}");
    }

    fn on_error(&self, container: &str, error: &ContainerError) {
        println!(
            "[error] container={container} label={} msg={:?}",
            error.as_label(),
            error.as_message()
        );
    }

    fn on_dispose(&self, container: &str) {
        println!("[dispose] container={container}");
    }
}
