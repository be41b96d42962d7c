//! # Container core.
//!
//! [`Container`] owns the current state, the handler table resolved at build
//! time, the emission channel, and the lifecycle flag. It orchestrates the
//! whole dispatch path:
//!
//! ```text
//! submit(event)
//!   ├─► handler lookup by exact TypeId (miss → silently dropped)
//!   ├─► on_event hook
//!   └─► lane dispatch (per the registration's ConcurrencyMode)
//!         ├─ Inline       → sync handler runs to completion on this call
//!         ├─ Sequential   → queued; dedicated worker drains in order
//!         ├─ Concurrent   → spawned immediately
//!         ├─ Droppable    → discarded while one is in flight
//!         └─ Restartable  → cancels the in-flight invocation, spawns new
//!
//! handler ── emit(state) ──► apply():
//!   disposed? ──► Closed (routed through error path, then returned)
//!   equal to current AND already emitted once? ──► silent no-op
//!   on_transition → on_change → observer.on_change
//!   state = next → channel.publish → emitted = true
//! ```
//!
//! ## Serialization
//! Handlers may suspend, but every state transition runs inside one
//! mutual-exclusion region (`apply`), which preserves the
//! equality-suppression and change-pairing invariants even when the
//! concurrent lane interleaves emissions (last writer wins, each paired with
//! a correct `Change`).
//!
//! ## Lifecycle
//! `dispose()` is idempotent and terminal: it cancels the runtime token
//! (in-flight async handlers observe cancellation), closes the channel, and
//! notifies the observer. In-flight handlers are not forcibly joined —
//! `shutdown()` additionally awaits the sequential lane workers.

use std::any::TypeId;
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::ContainerConfig;
use crate::error::ContainerError;
use crate::events::{Change, Channel, Event, State, Subscription, Transition};
use crate::observers::Observe;
use crate::policies::ConcurrencyMode;

use super::context;
use super::emitter::{Emitter, EmitterSlot};
use super::hooks::Hooks;
use super::pool::{lock, Pool};

/// Erased synchronous handler, resolved from the typed closure at
/// registration time.
pub(crate) type SyncHandler<S> =
    Box<dyn Fn(&dyn Event, &Emitter<S>) -> Result<(), ContainerError> + Send + Sync>;

/// Erased suspending handler; the future owns its event and emitter.
pub(crate) type AsyncHandler<S> = Box<
    dyn Fn(
            Arc<dyn Event>,
            Emitter<S>,
            CancellationToken,
        ) -> BoxFuture<'static, Result<(), ContainerError>>
        + Send
        + Sync,
>;

pub(crate) enum HandlerKind<S> {
    Sync(SyncHandler<S>),
    Async(AsyncHandler<S>),
}

/// Per-registration dispatch state. One lane per event type; lanes never
/// interact.
pub(crate) enum Lane {
    /// Synchronous handlers run to completion on the submitting call.
    Inline,
    /// Queue feeding a dedicated worker; strict arrival order.
    Sequential {
        queue: mpsc::UnboundedSender<Arc<dyn Event>>,
    },
    /// Every event is spawned immediately.
    Concurrent,
    /// Arrivals are discarded while an invocation is in flight.
    Droppable { busy: AtomicBool },
    /// The newest arrival cancels and replaces the in-flight invocation.
    Restartable {
        current: Mutex<Option<CancellationToken>>,
    },
}

/// One entry of the handler table: exact event type → handler + policy.
pub(crate) struct Registration<S> {
    /// Event type name, for diagnostics.
    pub(crate) name: &'static str,
    pub(crate) mode: ConcurrencyMode,
    pub(crate) handler: HandlerKind<S>,
    pub(crate) lane: Lane,
    /// Freelist of execution contexts for this registration.
    pub(crate) contexts: Pool<context::Context<S>>,
}

struct Cell<S> {
    state: S,
    /// Set once the first emission has been accepted; equality suppression
    /// only applies afterwards.
    emitted: bool,
}

/// Shared container internals. Handler table is immutable after build.
pub(crate) struct Inner<S> {
    pub(crate) name: Cow<'static, str>,
    cell: Mutex<Cell<S>>,
    pub(crate) channel: Channel<S>,
    pub(crate) handlers: HashMap<TypeId, Registration<S>>,
    pub(crate) hooks: Arc<dyn Hooks<S>>,
    pub(crate) observer: Arc<dyn Observe>,
    pub(crate) runtime_token: CancellationToken,
    disposed: AtomicBool,
    live: AtomicUsize,
    pub(crate) emitter_slots: Pool<Arc<EmitterSlot<S>>>,
}

impl<S: State> Inner<S> {
    pub(crate) fn new(
        config: ContainerConfig,
        initial: S,
        handlers: HashMap<TypeId, Registration<S>>,
        hooks: Arc<dyn Hooks<S>>,
        observer: Arc<dyn Observe>,
    ) -> Self {
        Self {
            channel: Channel::new(config.channel_capacity_clamped()),
            name: config.name,
            cell: Mutex::new(Cell {
                state: initial,
                emitted: false,
            }),
            handlers,
            hooks,
            observer,
            runtime_token: CancellationToken::new(),
            disposed: AtomicBool::new(false),
            live: AtomicUsize::new(0),
            emitter_slots: Pool::new(),
        }
    }

    /// Clone of the current state.
    pub(crate) fn snapshot(&self) -> S {
        lock(&self.cell).state.clone()
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Flips the disposed flag; returns `true` for the first caller only.
    fn mark_disposed(&self) -> bool {
        !self.disposed.swap(true, Ordering::SeqCst)
    }

    pub(crate) fn enter_live(&self) {
        self.live.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn exit_live(&self) {
        self.live.fetch_sub(1, Ordering::Relaxed);
    }

    fn live(&self) -> usize {
        self.live.load(Ordering::Relaxed)
    }

    /// Applies one emission. The transition hook fires only for
    /// event-driven emissions, where the triggering event is known.
    pub(crate) fn apply(
        &self,
        event: Option<&dyn Event>,
        next: S,
    ) -> Result<(), ContainerError> {
        let outcome = self.apply_guarded(event, next);
        if let Err(err) = &outcome {
            if !err.is_cancellation() {
                self.error_path(err);
            }
        }
        outcome
    }

    fn apply_guarded(&self, event: Option<&dyn Event>, next: S) -> Result<(), ContainerError> {
        if self.is_disposed() {
            return Err(ContainerError::Closed);
        }
        let mut cell = lock(&self.cell);
        if cell.emitted && cell.state == next {
            return Ok(());
        }
        if let Some(event) = event {
            self.hooks.on_transition(&Transition {
                previous: &cell.state,
                event,
                next: &next,
            });
        }
        let change = Change {
            previous: cell.state.clone(),
            next: next.clone(),
        };
        self.hooks.on_change(&change);
        self.observer.on_change(self.name.as_ref(), &change);
        cell.state = next;
        self.channel.publish(cell.state.clone())?;
        cell.emitted = true;
        Ok(())
    }

    /// Routes a fault through the local hook, then the global observer.
    /// Auditing only — never suppresses the original error.
    pub(crate) fn error_path(&self, error: &ContainerError) {
        self.hooks.on_error(error);
        self.observer.on_error(self.name.as_ref(), error);
    }
}

/// Snapshot of the container's pooling and in-flight accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerStats {
    /// Handler invocations currently in flight.
    pub active_invocations: usize,
    /// Idle emitter slots in the freelist.
    pub pooled_emitters: usize,
    /// Idle execution contexts across all registrations.
    pub pooled_contexts: usize,
}

/// Event-driven state container.
///
/// Constructed through [`ContainerBuilder`](crate::ContainerBuilder) with an
/// initial state and a fixed handler table. Requires a tokio runtime:
/// asynchronous lanes spawn worker tasks.
///
/// The container is the unique owning handle; dropping it disposes it.
///
/// ## Example
/// ```
/// use stateflow::{Container, ContainerError, Event};
///
/// #[derive(Debug)]
/// struct Increment {
///     amount: i64,
/// }
/// impl Event for Increment {}
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() -> Result<(), ContainerError> {
///     let container = Container::builder(0i64)
///         .on::<Increment, _>(|event, emitter| {
///             let current = emitter.state()?;
///             emitter.emit(current + event.amount)
///         })
///         .build()?;
///
///     container.submit(Increment { amount: 2 })?;
///     assert_eq!(container.state(), 2);
///     container.dispose();
///     Ok(())
/// }
/// ```
pub struct Container<S: State> {
    inner: Arc<Inner<S>>,
    workers: Vec<JoinHandle<()>>,
}

impl<S: State> Container<S> {
    /// Starts building a container with the given initial state.
    pub fn builder(initial: S) -> super::builder::ContainerBuilder<S> {
        super::builder::ContainerBuilder::new(initial)
    }

    pub(crate) fn from_parts(inner: Arc<Inner<S>>, workers: Vec<JoinHandle<()>>) -> Self {
        Self { inner, workers }
    }

    /// Last accepted state (the initial state before any emission). Never
    /// blocks beyond a short lock; remains readable after disposal.
    pub fn state(&self) -> S {
        self.inner.snapshot()
    }

    /// Name reported to the global observer.
    pub fn name(&self) -> &str {
        self.inner.name.as_ref()
    }

    /// Submits an event for dispatch.
    ///
    /// Routing is by the event's exact type. An unregistered type is
    /// silently dropped (`Ok`). After disposal, submission fails with
    /// [`ContainerError::Closed`]. A synchronous handler runs on this call
    /// and its fault (if any) is returned; asynchronous handler faults
    /// surface through the error path instead.
    pub fn submit<T: Event>(&self, event: T) -> Result<(), ContainerError> {
        if self.inner.is_disposed() {
            return Err(ContainerError::Closed);
        }
        let tid = TypeId::of::<T>();
        let Some(reg) = self.inner.handlers.get(&tid) else {
            return Ok(());
        };
        let event: Arc<dyn Event> = Arc::new(event);
        self.inner.hooks.on_event(event.as_ref());

        match &reg.lane {
            Lane::Inline => context::run_sync(&self.inner, reg, event),
            Lane::Sequential { queue } => {
                // Worker outlives every submit that passed the dispose check.
                let _ = queue.send(event);
                Ok(())
            }
            Lane::Concurrent => {
                let token = self.inner.runtime_token.child_token();
                let inner = Arc::clone(&self.inner);
                tokio::spawn(async move {
                    context::run_async(&inner, tid, event, token).await;
                });
                Ok(())
            }
            Lane::Droppable { busy } => {
                if busy
                    .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                    .is_err()
                {
                    return Ok(());
                }
                let token = self.inner.runtime_token.child_token();
                let inner = Arc::clone(&self.inner);
                tokio::spawn(async move {
                    context::run_async(&inner, tid, event, token).await;
                    if let Some(reg) = inner.handlers.get(&tid) {
                        if let Lane::Droppable { busy } = &reg.lane {
                            busy.store(false, Ordering::SeqCst);
                        }
                    }
                });
                Ok(())
            }
            Lane::Restartable { current } => {
                let token = self.inner.runtime_token.child_token();
                {
                    let mut slot = lock(current);
                    if let Some(superseded) = slot.take() {
                        superseded.cancel();
                    }
                    *slot = Some(token.clone());
                }
                let inner = Arc::clone(&self.inner);
                tokio::spawn(async move {
                    context::run_async(&inner, tid, event, token).await;
                });
                Ok(())
            }
        }
    }

    /// Submits a parameterless event.
    pub fn submit_default<T: Event + Default>(&self) -> Result<(), ContainerError> {
        self.submit(T::default())
    }

    /// Reports a fault with no state change. Fire-and-forget: routes local
    /// `on_error`, then the global observer.
    pub fn add_error(&self, error: ContainerError) {
        self.inner.error_path(&error);
    }

    /// Creates a receiver observing every state accepted after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<S> {
        self.inner.channel.subscribe()
    }

    /// Spawns a listener invoking `on_next` for every state accepted after
    /// this call. Dispose the returned handle to unsubscribe.
    pub fn subscribe_with<F>(&self, mut on_next: F) -> Subscription
    where
        F: FnMut(S) + Send + 'static,
    {
        let mut rx = self.inner.channel.subscribe();
        let handle = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(state) => on_next(state),
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        Subscription::new(handle)
    }

    /// Disposes the container. Idempotent and terminal.
    ///
    /// Cancels the runtime token (in-flight async handlers observe
    /// cancellation and their emissions are rejected), closes the emission
    /// channel, and notifies the global observer. The current state remains
    /// readable, frozen at its last value.
    pub fn dispose(&self) {
        if !self.inner.mark_disposed() {
            return;
        }
        self.inner.runtime_token.cancel();
        self.inner.channel.close();
        self.inner.observer.on_dispose(self.inner.name.as_ref());
    }

    /// Returns `true` once [`dispose`](Container::dispose) has run.
    pub fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }

    /// Disposes the container and joins its lane workers.
    pub async fn shutdown(mut self) {
        self.dispose();
        for worker in self.workers.drain(..) {
            let _ = worker.await;
        }
    }

    /// Registered event types and their concurrency modes.
    pub fn registrations(&self) -> Vec<(&'static str, ConcurrencyMode)> {
        self.inner
            .handlers
            .values()
            .map(|reg| (reg.name, reg.mode))
            .collect()
    }

    /// Pooling and in-flight accounting, for observability.
    pub fn stats(&self) -> ContainerStats {
        ContainerStats {
            active_invocations: self.inner.live(),
            pooled_emitters: self.inner.emitter_slots.len(),
            pooled_contexts: self
                .inner
                .handlers
                .values()
                .map(|reg| reg.contexts.len())
                .sum(),
        }
    }
}

impl<S: State> Drop for Container<S> {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Transition;
    use crate::observers::Observe;

    #[derive(Debug)]
    struct Add(i64);
    impl Event for Add {}

    #[derive(Debug, Default)]
    struct Reset;
    impl Event for Reset {}

    #[derive(Debug)]
    struct Unregistered;
    impl Event for Unregistered {}

    /// Hooks and observer sharing one call log, so cross-layer ordering is
    /// observable.
    struct Recording {
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl Recording {
        fn push(&self, entry: impl Into<String>) {
            lock(&self.calls).push(entry.into());
        }
    }

    impl Hooks<i64> for Recording {
        fn on_event(&self, _event: &dyn Event) {
            self.push("event");
        }
        fn on_change(&self, change: &Change<i64>) {
            self.push(format!("change {}->{}", change.previous, change.next));
        }
        fn on_transition(&self, transition: &Transition<'_, i64>) {
            self.push(format!(
                "transition {}->{}",
                transition.previous, transition.next
            ));
        }
        fn on_error(&self, error: &ContainerError) {
            self.push(format!("local {}", error.as_label()));
        }
        fn on_event_done(&self, _event: &dyn Event) {
            self.push("done");
        }
    }

    impl Observe for Recording {
        fn on_error(&self, _container: &str, error: &ContainerError) {
            self.push(format!("global {}", error.as_label()));
        }
    }

    fn recording_pair() -> (Arc<Recording>, Arc<Mutex<Vec<String>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        (
            Arc::new(Recording {
                calls: Arc::clone(&calls),
            }),
            calls,
        )
    }

    fn counter() -> Container<i64> {
        Container::builder(0i64)
            .on::<Add, _>(|event, emitter| {
                let current = emitter.state()?;
                emitter.emit(current + event.0)
            })
            .on::<Reset, _>(|_, emitter| emitter.emit(0))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_inline_handler_updates_state_on_submit() {
        let container = counter();
        let mut states = container.subscribe();

        container.submit(Add(2)).unwrap();
        container.submit(Add(3)).unwrap();

        assert_eq!(container.state(), 5);
        assert_eq!(states.recv().await.unwrap(), 2);
        assert_eq!(states.recv().await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_first_emission_accepted_even_when_equal_to_initial() {
        let (rec, calls) = recording_pair();
        let container = Container::builder(0i64)
            .on::<Reset, _>(|_, emitter| emitter.emit(0))
            .hooks(rec)
            .build()
            .unwrap();

        container.submit(Reset).unwrap();
        assert_eq!(
            *lock(&calls),
            vec!["event", "transition 0->0", "change 0->0", "done"]
        );
    }

    #[tokio::test]
    async fn test_equal_state_suppressed_after_first_emission() {
        let (rec, calls) = recording_pair();
        let container = Container::builder(0i64)
            .on::<Add, _>(|event, emitter| {
                let current = emitter.state()?;
                emitter.emit(current + event.0)?;
                // Same value again; must be a silent no-op.
                emitter.emit(current + event.0)
            })
            .hooks(rec)
            .build()
            .unwrap();

        container.submit(Add(2)).unwrap();
        assert_eq!(container.state(), 2);
        assert_eq!(
            *lock(&calls),
            vec!["event", "transition 0->2", "change 0->2", "done"]
        );
    }

    #[tokio::test]
    async fn test_transition_fires_before_change() {
        let (rec, calls) = recording_pair();
        let container = Container::builder(1i64)
            .on::<Add, _>(|event, emitter| emitter.emit(event.0))
            .hooks(rec)
            .build()
            .unwrap();

        container.submit(Add(9)).unwrap();
        let calls = lock(&calls);
        let transition = calls.iter().position(|c| c == "transition 1->9").unwrap();
        let change = calls.iter().position(|c| c == "change 1->9").unwrap();
        assert!(transition < change);
    }

    #[tokio::test]
    async fn test_unregistered_event_silently_dropped() {
        let container = counter();
        assert_eq!(container.submit(Unregistered), Ok(()));
        assert_eq!(container.state(), 0);
    }

    #[tokio::test]
    async fn test_submit_after_dispose_errs() {
        let container = counter();
        container.dispose();
        assert_eq!(container.submit(Add(1)), Err(ContainerError::Closed));
        assert_eq!(container.state(), 0);
    }

    #[tokio::test]
    async fn test_dispose_is_idempotent_and_freezes_state() {
        let container = counter();
        container.submit(Add(4)).unwrap();
        container.dispose();
        container.dispose();
        assert!(container.is_disposed());
        assert_eq!(container.state(), 4);
    }

    #[tokio::test]
    async fn test_handler_fault_routes_local_then_global_and_propagates() {
        let (rec, calls) = recording_pair();
        let container = Container::builder(0i64)
            .on::<Add, _>(|_, _| Err(ContainerError::handler("boom")))
            .hooks(rec.clone())
            .observer(rec)
            .build()
            .unwrap();

        let outcome = container.submit(Add(1));
        assert_eq!(outcome, Err(ContainerError::handler("boom")));

        let calls = lock(&calls);
        let local = calls.iter().position(|c| c == "local handler_failed").unwrap();
        let global = calls.iter().position(|c| c == "global handler_failed").unwrap();
        assert!(local < global);
    }

    #[tokio::test]
    async fn test_add_error_is_fire_and_forget() {
        let (rec, calls) = recording_pair();
        let container = Container::builder(0i64)
            .on::<Add, _>(|event, emitter| emitter.emit(event.0))
            .hooks(rec.clone())
            .observer(rec)
            .build()
            .unwrap();

        container.add_error(ContainerError::handler("late fault"));
        container.submit(Add(7)).unwrap();

        assert_eq!(container.state(), 7);
        assert!(lock(&calls).contains(&"local handler_failed".to_string()));
        assert!(lock(&calls).contains(&"global handler_failed".to_string()));
    }

    #[tokio::test]
    async fn test_error_hook_may_submit_recovery_event() {
        struct Recover {
            container: Mutex<Option<Arc<dyn Fn() + Send + Sync>>>,
        }
        impl Hooks<i64> for Recover {
            fn on_error(&self, _error: &ContainerError) {
                if let Some(submit) = lock(&self.container).as_ref() {
                    submit();
                }
            }
        }

        let hooks = Arc::new(Recover {
            container: Mutex::new(None),
        });
        let container = Arc::new(
            Container::builder(3i64)
                .on::<Add, _>(|_, _| Err(ContainerError::handler("overflow")))
                .on::<Reset, _>(|_, emitter| emitter.emit(0))
                .hooks(Arc::clone(&hooks) as Arc<dyn Hooks<i64>>)
                .build()
                .unwrap(),
        );

        let weak = Arc::downgrade(&container);
        *lock(&hooks.container) = Some(Arc::new(move || {
            if let Some(container) = weak.upgrade() {
                let _ = container.submit_default::<Reset>();
            }
        }));

        assert!(container.submit(Add(1)).is_err());
        assert_eq!(container.state(), 0);
    }

    #[tokio::test]
    async fn test_subscribe_with_delivers_each_accepted_state() {
        let container = counter();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let sub = container.subscribe_with(move |state| lock(&sink).push(state));

        container.submit(Add(2)).unwrap();
        container.submit(Add(3)).unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        assert_eq!(*lock(&seen), vec![2, 5]);
        sub.dispose();
    }

    #[tokio::test]
    async fn test_stats_reflect_pooling_after_inline_invocation() {
        let container = counter();
        container.submit(Add(1)).unwrap();
        container.submit(Add(1)).unwrap();

        let stats = container.stats();
        assert_eq!(stats.active_invocations, 0);
        assert_eq!(stats.pooled_emitters, 1);
        assert_eq!(stats.pooled_contexts, 1);
    }

    #[tokio::test]
    async fn test_counter_end_to_end_observed_sequence() {
        let container = counter();

        // The initial value comes from the synchronous read; the channel
        // replays nothing.
        let mut observed = vec![container.state()];
        let mut states = container.subscribe();

        container.submit(Add(2)).unwrap();
        container.submit(Add(3)).unwrap();
        observed.push(states.recv().await.unwrap());
        observed.push(states.recv().await.unwrap());

        assert_eq!(observed, vec![0, 2, 5]);
    }

    #[tokio::test]
    async fn test_registrations_report_name_and_mode() {
        let container = counter();
        let regs = container.registrations();
        assert_eq!(regs.len(), 2);
        assert!(regs
            .iter()
            .all(|(_, mode)| *mode == ConcurrencyMode::Sequential));
    }
}
