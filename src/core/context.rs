//! # Execution contexts: driving one handler invocation.
//!
//! A [`Context`] binds one event, the target container, and a rented emitter
//! slot for the duration of a single invocation. The drivers here perform
//! the invocation, the post-processing (error routing, completion, the
//! "event done" hook), and the return of both context and slot to their
//! pools — including when the handler faults or panics.
//!
//! ```text
//! rent context ─► bind event + rent emitter slot ─► invoke handler
//!      │                                                │
//!      │                     fault ─► error path ───────┤
//!      │                     panic ─► error path ───────┤
//!      ▼                                                ▼
//! release: complete slot → live-- → on_event_done → clear → pool both
//! ```
//!
//! Panics are isolated with `catch_unwind` so cleanup always runs; a
//! synchronous handler's panic is then re-raised to the submitting caller.

use std::any::{Any, TypeId};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::ContainerError;
use crate::events::{Event, State};

use super::container::{HandlerKind, Inner, Registration};
use super::emitter::{Emitter, EmitterSlot};

/// Pooled carrier for one invocation: the event plus the rented emitter slot.
///
/// Cleared before being returned to its pool so references cannot leak
/// between invocations.
pub(crate) struct Context<S> {
    event: Option<Arc<dyn Event>>,
    slot: Option<Arc<EmitterSlot<S>>>,
}

impl<S> Default for Context<S> {
    fn default() -> Self {
        Self {
            event: None,
            slot: None,
        }
    }
}

impl<S: State> Context<S> {
    /// Binds the invocation and rents an emitter slot; returns the handle to
    /// pass into the handler. Registers the invocation as live.
    fn bind(
        &mut self,
        inner: &Arc<Inner<S>>,
        event: Arc<dyn Event>,
        token: Option<CancellationToken>,
    ) -> Emitter<S> {
        let slot = inner.emitter_slots.rent();
        let generation = slot.activate(Arc::downgrade(inner), Some(Arc::clone(&event)), token);
        let emitter = Emitter::new(Arc::clone(&slot), generation);
        self.event = Some(event);
        self.slot = Some(slot);
        inner.enter_live();
        emitter
    }

    /// Post-processing: completes the emitter, unregisters the invocation,
    /// fires `on_event_done`, and returns the slot to its freelist.
    fn release(&mut self, inner: &Arc<Inner<S>>) {
        if let Some(slot) = self.slot.take() {
            slot.complete();
            inner.exit_live();
            if let Some(event) = self.event.as_deref() {
                inner.hooks.on_event_done(event);
            }
            slot.clear();
            // A handle smuggled out of the invocation keeps the slot alive;
            // it must not re-enter the pool while aliased.
            if Arc::strong_count(&slot) == 1 {
                inner.emitter_slots.give_back(slot);
            }
        }
        self.event = None;
    }
}

/// Runs a synchronous handler to completion on the calling task.
///
/// The handler's fault is routed through the error path and returned; a
/// panic is re-raised after cleanup.
pub(crate) fn run_sync<S: State>(
    inner: &Arc<Inner<S>>,
    reg: &Registration<S>,
    event: Arc<dyn Event>,
) -> Result<(), ContainerError> {
    let mut ctx = reg.contexts.rent();
    let emitter = ctx.bind(inner, Arc::clone(&event), None);

    let outcome = match &reg.handler {
        HandlerKind::Sync(handler) => {
            panic::catch_unwind(AssertUnwindSafe(|| handler(event.as_ref(), &emitter)))
        }
        // Inline lanes only ever hold sync handlers.
        HandlerKind::Async(_) => Ok(Ok(())),
    };
    drop(emitter);

    let result = match outcome {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => {
            if !err.is_cancellation() {
                inner.error_path(&err);
            }
            Err(err)
        }
        Err(payload) => {
            inner.error_path(&ContainerError::handler(panic_message(payload.as_ref())));
            finish(inner, reg, ctx);
            panic::resume_unwind(payload);
        }
    };
    finish(inner, reg, ctx);
    result
}

/// Runs a suspending handler, racing it against its cancellation token.
///
/// Cancellation is a graceful stop; faults and panics route through the
/// error path. Cleanup runs in every case.
pub(crate) async fn run_async<S: State>(
    inner: &Arc<Inner<S>>,
    tid: TypeId,
    event: Arc<dyn Event>,
    token: CancellationToken,
) {
    let Some(reg) = inner.handlers.get(&tid) else {
        return;
    };
    let HandlerKind::Async(handler) = &reg.handler else {
        return;
    };

    let mut ctx = reg.contexts.rent();
    let emitter = ctx.bind(inner, Arc::clone(&event), Some(token.clone()));

    let fut = handler(Arc::clone(&event), emitter, token.clone());
    let outcome = tokio::select! {
        _ = token.cancelled() => Ok(Err(ContainerError::Canceled)),
        res = AssertUnwindSafe(fut).catch_unwind() => res,
    };
    match outcome {
        Ok(Ok(())) => {}
        Ok(Err(err)) => {
            if !err.is_cancellation() {
                inner.error_path(&err);
            }
        }
        Err(payload) => {
            inner.error_path(&ContainerError::handler(panic_message(payload.as_ref())));
        }
    }
    finish(inner, reg, ctx);
}

/// Spawns the dedicated worker draining a sequential lane's queue, one event
/// to completion at a time, in arrival order.
pub(crate) fn spawn_sequential_worker<S: State>(
    inner: Arc<Inner<S>>,
    tid: TypeId,
    mut queue: mpsc::UnboundedReceiver<Arc<dyn Event>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let token = inner.runtime_token.clone();
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                next = queue.recv() => match next {
                    Some(event) => {
                        let child = token.child_token();
                        run_async(&inner, tid, event, child).await;
                    }
                    None => break,
                }
            }
        }
    })
}

fn finish<S: State>(inner: &Arc<Inner<S>>, reg: &Registration<S>, mut ctx: Context<S>) {
    ctx.release(inner);
    reg.contexts.give_back(ctx);
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "handler panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use tokio::time::sleep;

    use crate::core::container::Container;
    use crate::core::hooks::Hooks;
    use crate::core::pool::lock;
    use crate::error::ContainerError;
    use crate::events::Event;
    use crate::policies::ConcurrencyMode;

    #[derive(Debug)]
    struct Work {
        id: i64,
        delay: Duration,
    }
    impl Event for Work {}

    /// Counts error-path activations.
    struct ErrorCount(AtomicUsize);
    impl Hooks<Vec<i64>> for ErrorCount {
        fn on_error(&self, _error: &ContainerError) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn tracker(mode: ConcurrencyMode) -> (Container<Vec<i64>>, Arc<ErrorCount>) {
        let errors = Arc::new(ErrorCount(AtomicUsize::new(0)));
        let container = Container::builder(Vec::new())
            .on_async::<Work, _, _>(mode, |event, emitter, _token| async move {
                sleep(event.delay).await;
                let mut done = emitter.state()?;
                done.push(event.id);
                emitter.emit(done)
            })
            .hooks(Arc::clone(&errors) as Arc<dyn Hooks<Vec<i64>>>)
            .build()
            .unwrap();
        (container, errors)
    }

    #[tokio::test]
    async fn test_sequential_lane_preserves_arrival_order() {
        let (container, _) = tracker(ConcurrencyMode::Sequential);

        // The first event sleeps longest; order must still be arrival order.
        container
            .submit(Work {
                id: 1,
                delay: Duration::from_millis(40),
            })
            .unwrap();
        container
            .submit(Work {
                id: 2,
                delay: Duration::from_millis(5),
            })
            .unwrap();

        sleep(Duration::from_millis(200)).await;
        assert_eq!(container.state(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_concurrent_lane_completes_out_of_order() {
        let (container, _) = tracker(ConcurrencyMode::Concurrent);

        container
            .submit(Work {
                id: 1,
                delay: Duration::from_millis(80),
            })
            .unwrap();
        container
            .submit(Work {
                id: 2,
                delay: Duration::from_millis(5),
            })
            .unwrap();

        sleep(Duration::from_millis(250)).await;
        assert_eq!(container.state(), vec![2, 1]);
    }

    #[tokio::test]
    async fn test_droppable_lane_discards_arrivals_while_busy() {
        let invocations = Arc::new(AtomicUsize::new(0));
        let count = Arc::clone(&invocations);
        let container = Container::builder(0i64)
            .on_async::<Work, _, _>(ConcurrencyMode::Droppable, move |event, emitter, _| {
                let count = Arc::clone(&count);
                async move {
                    count.fetch_add(1, Ordering::SeqCst);
                    sleep(event.delay).await;
                    emitter.emit(event.id)
                }
            })
            .build()
            .unwrap();

        for id in 1..=3 {
            container
                .submit(Work {
                    id,
                    delay: Duration::from_millis(40),
                })
                .unwrap();
        }
        sleep(Duration::from_millis(200)).await;

        // Only the first arrival ran; the lane is idle again afterwards.
        assert_eq!(invocations.load(Ordering::SeqCst), 1);
        assert_eq!(container.state(), 1);

        container
            .submit(Work {
                id: 9,
                delay: Duration::from_millis(1),
            })
            .unwrap();
        sleep(Duration::from_millis(100)).await;
        assert_eq!(invocations.load(Ordering::SeqCst), 2);
        assert_eq!(container.state(), 9);
    }

    #[tokio::test]
    async fn test_restartable_lane_cancels_superseded_invocation() {
        let (container, errors) = tracker(ConcurrencyMode::Restartable);

        container
            .submit(Work {
                id: 1,
                delay: Duration::from_millis(60),
            })
            .unwrap();
        container
            .submit(Work {
                id: 2,
                delay: Duration::from_millis(5),
            })
            .unwrap();

        sleep(Duration::from_millis(250)).await;
        // Only the superseding event lands; cancellation is not a fault.
        assert_eq!(container.state(), vec![2]);
        assert_eq!(errors.0.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_disposal_cancels_in_flight_async_handler() {
        let (container, errors) = tracker(ConcurrencyMode::Concurrent);

        container
            .submit(Work {
                id: 1,
                delay: Duration::from_millis(60),
            })
            .unwrap();
        sleep(Duration::from_millis(10)).await;
        container.dispose();
        sleep(Duration::from_millis(150)).await;

        assert_eq!(container.state(), Vec::<i64>::new());
        assert_eq!(errors.0.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_shutdown_joins_sequential_workers() {
        let (container, _) = tracker(ConcurrencyMode::Sequential);
        container
            .submit(Work {
                id: 1,
                delay: Duration::from_millis(5),
            })
            .unwrap();
        sleep(Duration::from_millis(50)).await;
        container.shutdown().await;
    }

    #[tokio::test]
    async fn test_panic_in_sync_handler_is_isolated() {
        let faults = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&faults);

        struct Faults(Arc<Mutex<Vec<String>>>);
        impl Hooks<i64> for Faults {
            fn on_error(&self, error: &ContainerError) {
                lock(&self.0).push(error.as_message());
            }
        }

        #[derive(Debug)]
        struct Boom;
        impl Event for Boom {}
        #[derive(Debug)]
        struct Bump;
        impl Event for Bump {}

        let container = Container::builder(0i64)
            .on::<Boom, _>(|_, _| panic!("handler blew up"))
            .on::<Bump, _>(|_, emitter| emitter.emit(1))
            .hooks(Arc::new(Faults(sink)) as Arc<dyn Hooks<i64>>)
            .build()
            .unwrap();

        let escaped = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ = container.submit(Boom);
        }));
        assert!(escaped.is_err());
        assert_eq!(
            *lock(&faults),
            vec!["handler fault: handler blew up".to_string()]
        );

        // The container survives the panic and its pools are intact.
        container.submit(Bump).unwrap();
        assert_eq!(container.state(), 1);
        let stats = container.stats();
        assert_eq!(stats.active_invocations, 0);
        assert_eq!(stats.pooled_emitters, 1);
    }
}
