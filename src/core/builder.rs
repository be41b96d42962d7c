//! # Builder: registration surface and container wiring.
//!
//! [`ContainerBuilder`] collects handler registrations, hooks, the observer
//! handle, and configuration, then `build()` materializes the container:
//! duplicate registrations are rejected, each async sequential registration
//! gets its queue and dedicated worker, and the observer's `on_create`
//! fires.
//!
//! Registration happens once, before any event is submitted; the handler
//! table is immutable afterwards.

use std::any::{self, Any, TypeId};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use futures::{future, FutureExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::ContainerConfig;
use crate::error::ContainerError;
use crate::events::{Event, State};
use crate::observers::{NoopObserver, Observe};
use crate::policies::ConcurrencyMode;

use super::container::{AsyncHandler, Container, HandlerKind, Inner, Lane, Registration, SyncHandler};
use super::context;
use super::emitter::Emitter;
use super::hooks::{Hooks, NoopHooks};
use super::pool::Pool;

struct Pending<S> {
    tid: TypeId,
    name: &'static str,
    mode: ConcurrencyMode,
    handler: HandlerKind<S>,
}

/// Builder for a [`Container`].
pub struct ContainerBuilder<S: State> {
    initial: S,
    config: ContainerConfig,
    hooks: Arc<dyn Hooks<S>>,
    observer: Arc<dyn Observe>,
    pending: Vec<Pending<S>>,
}

impl<S: State> ContainerBuilder<S> {
    /// Creates a builder with the given initial state, no-op hooks, and the
    /// no-op observer.
    pub fn new(initial: S) -> Self {
        Self {
            initial,
            config: ContainerConfig::default(),
            hooks: Arc::new(NoopHooks),
            observer: Arc::new(NoopObserver),
            pending: Vec::new(),
        }
    }

    /// Sets the container configuration.
    pub fn config(mut self, config: ContainerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the per-container lifecycle hooks.
    pub fn hooks(mut self, hooks: Arc<dyn Hooks<S>>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Sets the process-wide observer handle shared with other containers.
    pub fn observer(mut self, observer: Arc<dyn Observe>) -> Self {
        self.observer = observer;
        self
    }

    /// Registers a synchronous handler for the exact event type `T`.
    ///
    /// Synchronous handlers run to completion on the submitting call;
    /// concurrency modes do not apply to them.
    ///
    /// ## Example
    /// ```
    /// use stateflow::{Container, Event};
    ///
    /// #[derive(Debug, Default)]
    /// struct Reset;
    /// impl Event for Reset {}
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// let container = Container::builder(7i64)
    ///     .on::<Reset, _>(|_, emitter| emitter.emit(0))
    ///     .build()
    ///     .unwrap();
    /// # }
    /// ```
    pub fn on<T, F>(mut self, handler: F) -> Self
    where
        T: Event,
        F: Fn(&T, &Emitter<S>) -> Result<(), ContainerError> + Send + Sync + 'static,
    {
        // The table is keyed by T's TypeId, so the downcast cannot fail.
        let erased: SyncHandler<S> =
            Box::new(move |event, emitter| match event.downcast_ref::<T>() {
                Some(typed) => handler(typed, emitter),
                None => Ok(()),
            });
        self.pending.push(Pending {
            tid: TypeId::of::<T>(),
            name: any::type_name::<T>(),
            mode: ConcurrencyMode::Sequential,
            handler: HandlerKind::Sync(erased),
        });
        self
    }

    /// Registers a suspending handler for the exact event type `T`, scheduled
    /// per `mode` when same-typed events overlap.
    ///
    /// The handler receives the event, an owned [`Emitter`], and the
    /// invocation's cancellation token (fired on disposal and on restartable
    /// supersession).
    pub fn on_async<T, F, Fut>(mut self, mode: ConcurrencyMode, handler: F) -> Self
    where
        T: Event,
        F: Fn(Arc<T>, Emitter<S>, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), ContainerError>> + Send + 'static,
    {
        let erased: AsyncHandler<S> = Box::new(move |event, emitter, token| {
            let any: Arc<dyn Any + Send + Sync> = event;
            match any.downcast::<T>() {
                Ok(typed) => handler(typed, emitter, token).boxed(),
                Err(_) => future::ready(Ok(())).boxed(),
            }
        });
        self.pending.push(Pending {
            tid: TypeId::of::<T>(),
            name: any::type_name::<T>(),
            mode,
            handler: HandlerKind::Async(erased),
        });
        self
    }

    /// Builds the container: resolves the handler table, spawns sequential
    /// lane workers, and notifies the observer.
    ///
    /// Fails with [`ContainerError::DuplicateHandler`] if two registrations
    /// name the same event type.
    pub fn build(self) -> Result<Container<S>, ContainerError> {
        let mut handlers: HashMap<TypeId, Registration<S>> =
            HashMap::with_capacity(self.pending.len());
        let mut sequential: Vec<(TypeId, mpsc::UnboundedReceiver<Arc<dyn Event>>)> = Vec::new();

        for pending in self.pending {
            if handlers.contains_key(&pending.tid) {
                return Err(ContainerError::DuplicateHandler {
                    event: pending.name,
                });
            }
            let lane = match (&pending.handler, pending.mode) {
                (HandlerKind::Sync(_), _) => Lane::Inline,
                (HandlerKind::Async(_), ConcurrencyMode::Sequential) => {
                    let (tx, rx) = mpsc::unbounded_channel();
                    sequential.push((pending.tid, rx));
                    Lane::Sequential { queue: tx }
                }
                (HandlerKind::Async(_), ConcurrencyMode::Concurrent) => Lane::Concurrent,
                (HandlerKind::Async(_), ConcurrencyMode::Droppable) => Lane::Droppable {
                    busy: AtomicBool::new(false),
                },
                (HandlerKind::Async(_), ConcurrencyMode::Restartable) => Lane::Restartable {
                    current: Mutex::new(None),
                },
            };
            handlers.insert(
                pending.tid,
                Registration {
                    name: pending.name,
                    mode: pending.mode,
                    handler: pending.handler,
                    lane,
                    contexts: Pool::new(),
                },
            );
        }

        let inner = Arc::new(Inner::new(
            self.config,
            self.initial,
            handlers,
            self.hooks,
            self.observer,
        ));
        let workers = sequential
            .into_iter()
            .map(|(tid, rx)| context::spawn_sequential_worker(Arc::clone(&inner), tid, rx))
            .collect();

        inner.observer.on_create(inner.name.as_ref());
        Ok(Container::from_parts(inner, workers))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Tick;
    impl Event for Tick {}

    #[tokio::test]
    async fn test_duplicate_registration_rejected_at_build() {
        let outcome = ContainerBuilder::new(0i64)
            .on::<Tick, _>(|_, emitter| emitter.emit(1))
            .on_async::<Tick, _, _>(ConcurrencyMode::Concurrent, |_, emitter, _| async move {
                emitter.emit(2)
            })
            .build();

        match outcome.err() {
            Some(ContainerError::DuplicateHandler { event }) => {
                assert!(event.contains("Tick"));
            }
            other => panic!("expected duplicate rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_build_applies_config_name() {
        let mut config = ContainerConfig::default();
        config.name = "ticker".into();
        let container = ContainerBuilder::new(0i64)
            .config(config)
            .on::<Tick, _>(|_, emitter| emitter.emit(1))
            .build()
            .unwrap();
        assert_eq!(container.name(), "ticker");
    }
}
