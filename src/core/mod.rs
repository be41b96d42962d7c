//! Container core: state cell, handler table, pooled execution contexts.

mod builder;
mod container;
mod context;
mod emitter;
mod hooks;
mod pool;

pub use builder::ContainerBuilder;
pub use container::{Container, ContainerStats};
pub use emitter::Emitter;
pub use hooks::{Hooks, NoopHooks};
