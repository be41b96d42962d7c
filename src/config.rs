//! Per-container configuration.
//!
//! [`ContainerConfig`] controls the container's observable identity and the
//! capacity of its broadcast channel.
//!
//! # Example
//! ```
//! use stateflow::ContainerConfig;
//!
//! let mut cfg = ContainerConfig::default();
//! cfg.name = "counter".into();
//! cfg.channel_capacity = 64;
//!
//! assert_eq!(cfg.name, "counter");
//! ```

use std::borrow::Cow;

/// Configuration for a single container instance.
#[derive(Clone, Debug)]
pub struct ContainerConfig {
    /// Name reported to the global observer (`on_create`, `on_change`, ...).
    pub name: Cow<'static, str>,
    /// Capacity of the broadcast emission channel. Slow subscribers that fall
    /// more than this many states behind observe a lag and skip ahead.
    pub channel_capacity: usize,
}

impl Default for ContainerConfig {
    /// Provides a default configuration:
    /// - `name = "container"`
    /// - `channel_capacity = 128`
    fn default() -> Self {
        Self {
            name: Cow::Borrowed("container"),
            channel_capacity: 128,
        }
    }
}

impl ContainerConfig {
    /// Returns the channel capacity clamped to at least 1.
    pub(crate) fn channel_capacity_clamped(&self) -> usize {
        self.channel_capacity.max(1)
    }
}
