//! # Freelist pools for execution contexts and emitter slots.
//!
//! Dispatch must not allocate a fresh context or emitter per event in steady
//! state. [`Pool`] is the shared freelist discipline: rent pops a slot (or
//! builds one the first time), give-back pushes it for reuse. Pools are
//! unbounded and never shrink; they grow to the peak concurrent in-flight
//! count and stay there.
//!
//! Reuse is correctness-sensitive: callers reset a slot before returning it,
//! and the emitter layer adds a generation guard on top so a stale handle can
//! never write into a reused slot.

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Locks a mutex, recovering the guard if a previous holder panicked.
///
/// Hooks run user code while container regions are held; a panicking hook
/// must not wedge every later lock on poison.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Unbounded freelist of reusable slots.
pub(crate) struct Pool<T> {
    slots: Mutex<Vec<T>>,
}

impl<T: Default> Pool<T> {
    pub(crate) fn new() -> Self {
        Self {
            slots: Mutex::new(Vec::new()),
        }
    }

    /// Pops a pooled slot, or builds a fresh one if the pool is empty.
    pub(crate) fn rent(&self) -> T {
        lock(&self.slots).pop().unwrap_or_default()
    }

    /// Returns a slot to the pool. The caller resets it first.
    pub(crate) fn give_back(&self, slot: T) {
        lock(&self.slots).push(slot);
    }

    /// Number of idle slots currently pooled.
    pub(crate) fn len(&self) -> usize {
        lock(&self.slots).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rents_fresh_when_empty_and_reuses_returned() {
        let pool: Pool<Vec<u8>> = Pool::new();
        assert_eq!(pool.len(), 0);

        let mut a = pool.rent();
        a.push(1);
        a.clear();
        pool.give_back(a);
        assert_eq!(pool.len(), 1);

        let b = pool.rent();
        assert!(b.is_empty());
        assert_eq!(pool.len(), 0);
    }

    #[test]
    fn test_grows_to_peak_and_never_shrinks() {
        let pool: Pool<Vec<u8>> = Pool::new();
        let a = pool.rent();
        let b = pool.rent();
        let c = pool.rent();
        pool.give_back(a);
        pool.give_back(b);
        pool.give_back(c);
        assert_eq!(pool.len(), 3);

        let _one = pool.rent();
        assert_eq!(pool.len(), 2);
    }
}
