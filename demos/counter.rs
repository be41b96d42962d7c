//! # Counter Container Example
//!
//! Builds a counter container with three event types:
//! - `Increment` — synchronous, runs inline on submit, guards against
//!   overflow by reporting a fault instead of emitting.
//! - `Decrement` — asynchronous with a short delay, scheduled sequentially.
//! - `Reset` — synchronous, jumps back to zero.
//!
//! Container activity is printed through the stdout [`LogObserver`].
//!
//! ## Run
//! ```bash
//! cargo run --example counter
//! ```

use std::{sync::Arc, time::Duration};

use stateflow::{
    ConcurrencyMode, Container, ContainerConfig, ContainerError, Event, LogObserver,
};

#[derive(Debug)]
struct Increment {
    amount: i64,
}
impl Event for Increment {}

#[derive(Debug)]
struct Decrement {
    amount: i64,
}
impl Event for Decrement {}

#[derive(Debug, Default)]
struct Reset;
impl Event for Reset {}

fn build_counter() -> Result<Container<i64>, ContainerError> {
    let mut config = ContainerConfig::default();
    config.name = "counter".into();

    Container::builder(0i64)
        .config(config)
        .observer(Arc::new(LogObserver))
        .on::<Increment, _>(|event, emitter| {
            let current = emitter.state()?;
            match current.checked_add(event.amount) {
                Some(next) => emitter.emit(next),
                None => {
                    emitter.add_error(ContainerError::handler("counter overflow"));
                    Ok(())
                }
            }
        })
        .on_async::<Decrement, _, _>(ConcurrencyMode::Sequential, |event, emitter, _token| {
            async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                let current = emitter.state()?;
                emitter.emit(current - event.amount)
            }
        })
        .on::<Reset, _>(|_, emitter| emitter.emit(0))
        .build()
}

#[tokio::main]
async fn main() -> Result<(), ContainerError> {
    let counter = build_counter()?;

    let subscription = counter.subscribe_with(|state| {
        println!(" └─► state: {state}");
    });

    println!("Registrations:");
    for (event, mode) in counter.registrations() {
        println!(" ├─► {event} [{}]", mode.as_label());
    }
    println!();

    counter.submit(Increment { amount: 2 })?;
    counter.submit(Increment { amount: 3 })?;

    counter.submit(Decrement { amount: 1 })?;
    counter.submit(Decrement { amount: 1 })?;
    tokio::time::sleep(Duration::from_millis(200)).await;

    // Saturate the counter; the handler reports a fault instead of emitting.
    counter.submit(Increment { amount: i64::MAX })?;
    counter.submit(Increment { amount: i64::MAX })?;

    counter.submit_default::<Reset>()?;
    tokio::time::sleep(Duration::from_millis(50)).await;

    println!();
    println!("final state: {}", counter.state());

    subscription.dispose();
    counter.shutdown().await;
    Ok(())
}
